use std::path::PathBuf;

/// Errors that can occur in IPC transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The channel name cannot be mapped into the backend namespace.
    #[error("invalid channel name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// The socket path is too long for the platform.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },

    /// Failed to acquire or bind the listening resource.
    #[error("failed to bind to {endpoint}: {source}")]
    Bind {
        endpoint: PathBuf,
        source: std::io::Error,
    },

    /// `init` was called on a server that is already listening.
    #[error("server is already bound")]
    AlreadyBound,

    /// `accept` was called before `init` or after `close`.
    #[error("server is not bound")]
    NotBound,

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// Failed to connect to the specified endpoint.
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: PathBuf,
        source: std::io::Error,
    },

    /// The connection holds no live handle.
    #[error("connection is invalid")]
    InvalidConnection,

    /// An I/O error occurred on the connection.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No IPC backend exists for this platform.
    #[error("local IPC is not supported on this platform")]
    Unsupported,
}

impl TransportError {
    /// The underlying OS error, if this error wraps one.
    pub fn io_source(&self) -> Option<&std::io::Error> {
        match self {
            TransportError::Bind { source, .. } | TransportError::Connect { source, .. } => {
                Some(source)
            }
            TransportError::Accept(source) | TransportError::Io(source) => Some(source),
            _ => None,
        }
    }
}

impl From<TransportError> for std::io::Error {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Bind { source, .. }
            | TransportError::Connect { source, .. }
            | TransportError::Accept(source)
            | TransportError::Io(source) => source,
            TransportError::InvalidConnection => {
                std::io::Error::new(std::io::ErrorKind::NotConnected, err.to_string())
            }
            TransportError::Unsupported => {
                std::io::Error::new(std::io::ErrorKind::Unsupported, err.to_string())
            }
            TransportError::InvalidName { .. } | TransportError::PathTooLong { .. } => {
                std::io::Error::new(std::io::ErrorKind::InvalidInput, err.to_string())
            }
            other => std::io::Error::other(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_connection_maps_to_not_connected() {
        let io: std::io::Error = TransportError::InvalidConnection.into();
        assert_eq!(io.kind(), std::io::ErrorKind::NotConnected);
    }

    #[test]
    fn connect_error_unwraps_os_source() {
        let err = TransportError::Connect {
            endpoint: PathBuf::from("/tmp/missing"),
            source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
        };
        assert_eq!(
            err.io_source().map(std::io::Error::kind),
            Some(std::io::ErrorKind::ConnectionRefused)
        );
        let io: std::io::Error = err.into();
        assert_eq!(io.kind(), std::io::ErrorKind::ConnectionRefused);
    }
}
