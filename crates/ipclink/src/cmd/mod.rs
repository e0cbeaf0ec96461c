use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Args, Subcommand};
use ipclink_transport::{Client, ClientConfig, Connection, ServerConfig};

use crate::exit::{CliError, CliResult, INTERNAL};
use crate::output::OutputFormat;

pub mod doctor;
pub mod echo;
pub mod listen;
pub mod send;
pub mod version;

/// Receive buffer size used when `--buffer-size` is not given.
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve peers one after another and echo every message back.
    Echo(EchoArgs),
    /// Send a single message, optionally waiting for the reply.
    Send(SendArgs),
    /// Listen and print received messages.
    Listen(ListenArgs),
    /// Show version information.
    Version(VersionArgs),
    /// Run local environment health checks.
    Doctor(DoctorArgs),
}

/// Settings shared by every subcommand.
#[derive(Debug, Clone)]
pub struct Context {
    pub format: OutputFormat,
    pub socket_dir: Option<PathBuf>,
}

impl Context {
    pub fn server_config(&self) -> ServerConfig {
        match &self.socket_dir {
            Some(dir) => ServerConfig::default().with_socket_dir(dir),
            None => ServerConfig::default(),
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        match &self.socket_dir {
            Some(dir) => ClientConfig::default().with_socket_dir(dir),
            None => ClientConfig::default(),
        }
    }
}

pub fn run(command: Command, ctx: &Context) -> CliResult<i32> {
    match command {
        Command::Echo(args) => echo::run(args, ctx),
        Command::Send(args) => send::run(args, ctx),
        Command::Listen(args) => listen::run(args, ctx),
        Command::Version(args) => version::run(args, ctx),
        Command::Doctor(args) => doctor::run(args, ctx),
    }
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    /// Channel name to bind.
    pub name: String,
    /// Largest message accepted; longer messages are truncated.
    #[arg(long, default_value_t = DEFAULT_BUFFER_SIZE)]
    pub buffer_size: usize,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Channel name to connect to.
    pub name: String,
    /// Raw string payload.
    #[arg(long, conflicts_with = "file", required_unless_present = "file")]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
    /// Wait for one reply message and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time for the exchange when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
    /// Largest reply accepted with --wait.
    #[arg(long, default_value_t = DEFAULT_BUFFER_SIZE)]
    pub buffer_size: usize,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Channel name to bind.
    pub name: String,
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
    /// Largest message accepted; longer messages are truncated.
    #[arg(long, default_value_t = DEFAULT_BUFFER_SIZE)]
    pub buffer_size: usize,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[derive(Args, Debug, Default)]
pub struct DoctorArgs {}

/// Stop the serve loop on Ctrl-C.
///
/// The first signal clears `running` and connects once to `wake` so a
/// blocked `accept` returns. A second signal exits immediately, which covers
/// a `recv` blocked on a silent peer.
pub fn install_shutdown_handler(running: Arc<AtomicBool>, wake: Client) -> CliResult<()> {
    ctrlc::set_handler(move || {
        if !running.swap(false, Ordering::SeqCst) {
            std::process::exit(130);
        }
        drop(wake.try_connect());
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

/// Human-readable label for the remote end of `conn`.
pub fn peer_label(conn: &Connection, seq: usize) -> String {
    match conn.peer_credentials() {
        Some((_, _, pid)) => format!("pid:{pid}"),
        None => format!("peer-{seq}"),
    }
}
