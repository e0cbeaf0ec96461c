use std::path::Path;
use std::time::Duration;

use crate::name::Namespace;

/// Pending-connection backlog passed to `listen(2)`.
pub const DEFAULT_BACKLOG: i32 = 5;

/// Default permission mode for created socket files.
pub const DEFAULT_SOCKET_MODE: u32 = 0o600;

/// Default in/out buffer size for named-pipe instances.
pub const DEFAULT_PIPE_BUFFER_SIZE: u32 = 16 * 1024;

/// Bounded wait for the named-pipe request/response transaction.
pub const DEFAULT_TRANSACT_TIMEOUT: Duration = Duration::from_secs(2);

/// Listening-side configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub namespace: Namespace,
    pub backlog: i32,
    pub socket_mode: u32,
    pub pipe_buffer_size: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            namespace: Namespace::default(),
            backlog: DEFAULT_BACKLOG,
            socket_mode: DEFAULT_SOCKET_MODE,
            pipe_buffer_size: DEFAULT_PIPE_BUFFER_SIZE,
        }
    }
}

impl ServerConfig {
    pub fn with_socket_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.namespace.socket_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_backlog(mut self, backlog: i32) -> Self {
        self.backlog = backlog;
        self
    }

    pub fn with_socket_mode(mut self, mode: u32) -> Self {
        self.socket_mode = mode;
        self
    }

    pub fn with_pipe_buffer_size(mut self, size: u32) -> Self {
        self.pipe_buffer_size = size;
        self
    }
}

/// Connecting-side configuration.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub namespace: Namespace,
    /// Upper bound for one `sendrecv` exchange.
    ///
    /// The named-pipe backend always needs a bound and uses
    /// [`DEFAULT_TRANSACT_TIMEOUT`] when this is `None`. The seqpacket backend
    /// only applies a timeout when one is set.
    pub transact_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            namespace: Namespace::default(),
            transact_timeout: default_transact_timeout(),
        }
    }
}

impl ClientConfig {
    pub fn with_socket_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.namespace.socket_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_transact_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.transact_timeout = timeout;
        self
    }
}

fn default_transact_timeout() -> Option<Duration> {
    if cfg!(windows) {
        Some(DEFAULT_TRANSACT_TIMEOUT)
    } else {
        None
    }
}
