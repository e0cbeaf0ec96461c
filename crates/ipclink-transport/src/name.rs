use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Result, TransportError};

/// Default directory for seqpacket socket files.
pub const DEFAULT_SOCKET_DIR: &str = "/tmp";

/// Default root of the Windows named-pipe namespace.
pub const DEFAULT_PIPE_PREFIX: &str = r"\\.\pipe\";

/// Logical identifier two processes use to rendezvous.
///
/// A channel name is a single path component: it is mapped to
/// `<socket_dir>/<name>` on the seqpacket backend and to
/// `\\.\pipe\<name>` on the named-pipe backend, so it must not contain
/// separators or NUL bytes.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChannelName(String);

impl ChannelName {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let reason = if name.is_empty() {
            Some("name must not be empty")
        } else if name == "." || name == ".." {
            Some("name must not be a relative directory")
        } else if name.contains(['/', '\\']) {
            Some("name must not contain path separators")
        } else if name.contains('\0') {
            Some("name must not contain NUL bytes")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(TransportError::InvalidName { name, reason }),
            None => Ok(Self(name)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<&str> for ChannelName {
    type Error = TransportError;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<String> for ChannelName {
    type Error = TransportError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

/// Where channel names live on this host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Namespace {
    /// Directory holding seqpacket socket files.
    pub socket_dir: PathBuf,
    /// Prefix prepended to pipe names.
    pub pipe_prefix: String,
}

impl Default for Namespace {
    fn default() -> Self {
        Self {
            socket_dir: PathBuf::from(DEFAULT_SOCKET_DIR),
            pipe_prefix: DEFAULT_PIPE_PREFIX.to_string(),
        }
    }
}

impl Namespace {
    /// Namespace rooted at a custom socket directory.
    pub fn in_dir(socket_dir: impl AsRef<Path>) -> Self {
        Self {
            socket_dir: socket_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Map a channel name to the endpoint the active backend binds/connects to.
    pub fn resolve(&self, name: &ChannelName) -> PathBuf {
        #[cfg(windows)]
        {
            PathBuf::from(format!("{}{}", self.pipe_prefix, name.as_str()))
        }

        #[cfg(not(windows))]
        {
            self.socket_dir.join(name.as_str())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_names() {
        let name = ChannelName::new("IpcTest").expect("plain name should be valid");
        assert_eq!(name.as_str(), "IpcTest");
        assert_eq!(name.to_string(), "IpcTest");
    }

    #[test]
    fn rejects_empty_and_separators() {
        for bad in ["", ".", "..", "a/b", r"a\b", "nul\0byte"] {
            let err = ChannelName::new(bad).expect_err("name should be rejected");
            assert!(matches!(err, TransportError::InvalidName { .. }), "{bad:?}");
        }
    }

    #[cfg(not(windows))]
    #[test]
    fn resolves_under_socket_dir() {
        let name = ChannelName::new("IpcTest").unwrap();
        assert_eq!(
            Namespace::default().resolve(&name),
            PathBuf::from("/tmp/IpcTest")
        );
        assert_eq!(
            Namespace::in_dir("/run/user/1000").resolve(&name),
            PathBuf::from("/run/user/1000/IpcTest")
        );
    }

    #[cfg(windows)]
    #[test]
    fn resolves_under_pipe_prefix() {
        let name = ChannelName::new("IpcTest").unwrap();
        assert_eq!(
            Namespace::default().resolve(&name),
            PathBuf::from(r"\\.\pipe\IpcTest")
        );
    }
}
