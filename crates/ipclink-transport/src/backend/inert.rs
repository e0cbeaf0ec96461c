//! Inert backend for targets without a supported IPC mechanism.
//!
//! Binding fails with `Unsupported`, connecting yields invalid connections.

use std::io;
use std::path::Path;

use super::{ConnectionHandle, Connector, Listener};
use crate::config::ServerConfig;
use crate::error::{Result, TransportError};

pub(crate) struct Inert;

/// A handle that can never be constructed.
pub(crate) enum InertHandle {}

/// A listener that can never be constructed.
pub(crate) enum InertListener {}

fn unsupported() -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        "local IPC is not supported on this platform",
    )
}

impl ConnectionHandle for InertHandle {
    fn send(&self, _src: &[u8]) -> io::Result<usize> {
        match *self {}
    }

    fn recv(&self, _dst: &mut [u8]) -> io::Result<usize> {
        match *self {}
    }

    fn peek(&self, _dst: &mut [u8]) -> io::Result<(usize, usize)> {
        match *self {}
    }
}

impl Listener for InertListener {
    type Handle = InertHandle;

    fn bind(_endpoint: &Path, _config: &ServerConfig) -> Result<Self> {
        Err(TransportError::Unsupported)
    }

    fn accept(&mut self) -> io::Result<InertHandle> {
        match *self {}
    }
}

impl Connector for Inert {
    type Handle = InertHandle;

    const NAME: &'static str = "unsupported";

    fn connect(_endpoint: &Path) -> io::Result<InertHandle> {
        Err(unsupported())
    }

    fn transact(
        _endpoint: &Path,
        _dst: &mut [u8],
        _src: &[u8],
        _timeout: Option<std::time::Duration>,
    ) -> Result<usize> {
        Err(TransportError::Unsupported)
    }
}
