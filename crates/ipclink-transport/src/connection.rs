use std::io::{Read, Write};

use tracing::debug;

use crate::backend::{ConnectionHandle, Handle};
use crate::error::{Result, TransportError};

/// Result of a non-destructive read.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Peek {
    /// Bytes copied into the caller's buffer.
    pub received: usize,
    /// Bytes queued on the connection, which may exceed the buffer.
    pub available: usize,
}

/// One connected peer.
///
/// A `Connection` exclusively owns one OS handle (a socket descriptor or a
/// pipe instance) and releases it exactly once, when dropped or closed.
/// Every `send` is delivered to the peer as one discrete message.
///
/// Operations block the calling thread. There is no cancellation: a
/// blocked `recv` returns only when the peer sends, closes, or the process
/// exits.
pub struct Connection {
    handle: Option<Handle>,
}

impl Connection {
    pub(crate) fn from_handle(handle: Handle) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    /// A connection with no handle; every operation on it fails.
    pub fn invalid() -> Self {
        Self { handle: None }
    }

    /// `true` when this connection holds no live handle.
    pub fn is_invalid(&self) -> bool {
        self.handle.is_none()
    }

    /// Send `src` as one message. Returns the number of bytes the transport accepted.
    pub fn send(&mut self, src: &[u8]) -> Result<usize> {
        let handle = self.live()?;
        handle.send(src).map_err(|err| {
            debug!(error = %err, len = src.len(), "send failed");
            TransportError::Io(err)
        })
    }

    /// Receive one message into `dst`.
    ///
    /// `Ok(0)` means the peer closed the connection in an orderly way. A
    /// message longer than `dst` is cut to `dst.len()`; use [`Connection::peek`]
    /// first when the size is not known up front. An empty `dst` is an
    /// `InvalidInput` error and leaves the pending message queued.
    pub fn recv(&mut self, dst: &mut [u8]) -> Result<usize> {
        let handle = self.live()?;
        handle.recv(dst).map_err(|err| {
            debug!(error = %err, "recv failed");
            TransportError::Io(err)
        })
    }

    /// Copy pending data into `dst` without consuming it.
    pub fn peek(&mut self, dst: &mut [u8]) -> Result<Peek> {
        let handle = self.live()?;
        let (received, available) = handle.peek(dst).map_err(|err| {
            debug!(error = %err, "peek failed");
            TransportError::Io(err)
        })?;
        Ok(Peek {
            received,
            available,
        })
    }

    /// Release the handle now. Later operations fail with `InvalidConnection`.
    pub fn close(&mut self) {
        if self.handle.take().is_some() {
            debug!("connection closed");
        }
    }

    /// Move the handle into a new `Connection`, leaving this one invalid.
    pub fn take(&mut self) -> Connection {
        Connection {
            handle: self.handle.take(),
        }
    }

    /// Credentials of the connected peer as `(uid, gid, pid)`.
    ///
    /// Only available on the seqpacket backend.
    pub fn peer_credentials(&self) -> Option<(u32, u32, u32)> {
        self.handle.as_ref()?.peer_credentials()
    }

    fn live(&self) -> Result<&Handle> {
        self.handle.as_ref().ok_or(TransportError::InvalidConnection)
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::invalid()
    }
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.recv(buf).map_err(Into::into)
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.send(buf).map_err(Into::into)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.live().map(|_| ()).map_err(Into::into)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("backend", &crate::backend::backend_name())
            .field("valid", &!self.is_invalid())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_connection_rejects_every_operation() {
        let mut conn = Connection::invalid();
        let mut buf = [0u8; 8];

        assert!(conn.is_invalid());
        assert!(matches!(
            conn.send(b"x"),
            Err(TransportError::InvalidConnection)
        ));
        assert!(matches!(
            conn.recv(&mut buf),
            Err(TransportError::InvalidConnection)
        ));
        assert!(matches!(
            conn.peek(&mut buf),
            Err(TransportError::InvalidConnection)
        ));
    }

    #[test]
    fn io_traits_surface_not_connected() {
        let mut conn = Connection::default();
        let err = conn.write(b"x").expect_err("write should fail");
        assert_eq!(err.kind(), std::io::ErrorKind::NotConnected);
        assert!(conn.flush().is_err());
    }

    #[test]
    fn take_and_close_leave_source_invalid() {
        let mut conn = Connection::invalid();
        let moved = Connection::take(&mut conn);
        assert!(moved.is_invalid());
        assert!(conn.is_invalid());
        conn.close();
        assert!(conn.is_invalid());
    }

    #[test]
    fn debug_reports_validity() {
        let text = format!("{:?}", Connection::invalid());
        assert!(text.contains("valid: false"));
    }
}
