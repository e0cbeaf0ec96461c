mod cmd;
mod exit;
mod logging;
mod output;

use std::path::PathBuf;

use clap::Parser;

use crate::cmd::{Command, Context};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "ipclink", version, about = "Local message IPC CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    /// Directory holding channel sockets (seqpacket backend only).
    #[arg(long, value_name = "DIR", env = "IPCLINK_SOCKET_DIR", global = true)]
    socket_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let ctx = Context {
        format: cli.format.unwrap_or_else(OutputFormat::default_for_stdout),
        socket_dir: cli.socket_dir,
    };

    match cmd::run(cli.command, &ctx) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from([
            "ipclink",
            "send",
            "IpcTest",
            "--data",
            "hello",
            "--wait",
            "--timeout",
            "500ms",
        ])
        .expect("send args should parse");

        match cli.command {
            Command::Send(args) => {
                assert_eq!(args.name, "IpcTest");
                assert!(args.wait);
                assert_eq!(args.timeout, "500ms");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_conflicting_payload_args() {
        let err = Cli::try_parse_from([
            "ipclink",
            "send",
            "IpcTest",
            "--file",
            "/tmp/payload.bin",
            "--data",
            "hello",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn send_requires_a_payload() {
        let err = Cli::try_parse_from(["ipclink", "send", "IpcTest"])
            .expect_err("payload should be required");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn socket_dir_is_global() {
        let cli = Cli::try_parse_from(["ipclink", "listen", "IpcTest", "--socket-dir", "/run/x"])
            .expect("listen args should parse");
        assert_eq!(cli.socket_dir, Some(PathBuf::from("/run/x")));
        assert!(matches!(cli.command, Command::Listen(_)));
    }
}
