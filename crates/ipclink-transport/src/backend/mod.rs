//! Platform backends.
//!
//! Exactly one backend is compiled per target. Each one provides the same
//! three capabilities: a connected message handle, a listener that binds a
//! resolved endpoint and accepts peers, and a connector that dials one.

use std::io;
use std::path::Path;
use std::time::Duration;

use crate::config::ServerConfig;
use crate::error::{Result, TransportError};

#[cfg(any(target_os = "linux", target_os = "android"))]
mod seqpacket;
#[cfg(any(target_os = "linux", target_os = "android"))]
pub(crate) use seqpacket::{SeqpacketHandle as Handle, SeqpacketListener as PlatformListener};
#[cfg(any(target_os = "linux", target_os = "android"))]
pub(crate) type Platform = seqpacket::Seqpacket;

#[cfg(windows)]
mod pipe;
#[cfg(windows)]
pub(crate) use pipe::{PipeHandle as Handle, PipeListener as PlatformListener};
#[cfg(windows)]
pub(crate) type Platform = pipe::NamedPipe;

#[cfg(not(any(target_os = "linux", target_os = "android", windows)))]
mod inert;
#[cfg(not(any(target_os = "linux", target_os = "android", windows)))]
pub(crate) use inert::{InertHandle as Handle, InertListener as PlatformListener};
#[cfg(not(any(target_os = "linux", target_os = "android", windows)))]
pub(crate) type Platform = inert::Inert;

/// Short name of the compiled backend, for diagnostics.
pub fn backend_name() -> &'static str {
    <Platform as Connector>::NAME
}

/// A connected, message-preserving OS handle.
pub(crate) trait ConnectionHandle: Sized + Send {
    /// Write one message.
    fn send(&self, src: &[u8]) -> io::Result<usize>;

    /// Read one message; `Ok(0)` is an orderly close.
    fn recv(&self, dst: &mut [u8]) -> io::Result<usize>;

    /// Read without consuming. Returns `(copied, available)`.
    fn peek(&self, dst: &mut [u8]) -> io::Result<(usize, usize)>;

    /// Bound blocking send/recv on this handle.
    fn set_timeout(&self, _timeout: Option<Duration>) -> io::Result<()> {
        Ok(())
    }

    /// Peer `(uid, gid, pid)`, where the OS reports it.
    fn peer_credentials(&self) -> Option<(u32, u32, u32)> {
        None
    }
}

/// A bound listening resource.
pub(crate) trait Listener: Sized {
    type Handle: ConnectionHandle;

    fn bind(endpoint: &Path, config: &ServerConfig) -> Result<Self>;

    fn accept(&mut self) -> io::Result<Self::Handle>;
}

/// Active side of the rendezvous.
pub(crate) trait Connector {
    type Handle: ConnectionHandle;

    const NAME: &'static str;

    fn connect(endpoint: &Path) -> io::Result<Self::Handle>;

    /// Connect, send one request and receive one reply.
    fn transact(
        endpoint: &Path,
        dst: &mut [u8],
        src: &[u8],
        timeout: Option<Duration>,
    ) -> Result<usize> {
        let handle = Self::connect(endpoint).map_err(|source| TransportError::Connect {
            endpoint: endpoint.to_path_buf(),
            source,
        })?;
        handle.set_timeout(timeout)?;
        handle.send(src).map_err(timed_out)?;
        handle.recv(dst).map_err(timed_out)
    }
}

/// A zero-length receive would discard the pending message and read as an orderly close.
pub(crate) fn empty_buffer() -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        "receive buffer must not be empty",
    )
}

// SO_RCVTIMEO/SO_SNDTIMEO expiry surfaces as EAGAIN.
fn timed_out(err: io::Error) -> TransportError {
    if err.kind() == io::ErrorKind::WouldBlock {
        TransportError::Io(io::Error::new(io::ErrorKind::TimedOut, err))
    } else {
        TransportError::Io(err)
    }
}
