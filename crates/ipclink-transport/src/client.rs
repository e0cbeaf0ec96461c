use std::path::PathBuf;

use tracing::{debug, warn};

use crate::backend::{Connector, Platform};
use crate::config::ClientConfig;
use crate::connection::Connection;
use crate::error::{Result, TransportError};
use crate::name::ChannelName;

/// Connects to a named channel.
///
/// A client holds no connection state: every `connect` or `sendrecv` is a
/// fresh attempt against the channel's endpoint.
#[derive(Clone, Debug)]
pub struct Client {
    name: ChannelName,
    endpoint: PathBuf,
    config: ClientConfig,
}

impl Client {
    pub fn new(name: &str) -> Result<Self> {
        Self::with_config(name, ClientConfig::default())
    }

    pub fn with_config(name: &str, config: ClientConfig) -> Result<Self> {
        let name = ChannelName::new(name)?;
        let endpoint = config.namespace.resolve(&name);
        Ok(Self {
            name,
            endpoint,
            config,
        })
    }

    /// Connect to the channel.
    ///
    /// On failure (no listener, refused) the returned connection is invalid;
    /// check [`Connection::is_invalid`]. Use [`Client::try_connect`] to get the cause.
    pub fn connect(&self) -> Connection {
        match self.try_connect() {
            Ok(conn) => conn,
            Err(err) => {
                warn!(channel = %self.name, error = %err, "connect failed");
                Connection::invalid()
            }
        }
    }

    pub fn try_connect(&self) -> Result<Connection> {
        let handle =
            Platform::connect(&self.endpoint).map_err(|source| TransportError::Connect {
                endpoint: self.endpoint.clone(),
                source,
            })?;
        Ok(Connection::from_handle(handle))
    }

    /// Connect, send `src` as one request and receive one reply into `dst`.
    ///
    /// Returns the reply length. The exchange stops at the first failing step.
    /// An empty `dst` is rejected before connecting.
    pub fn sendrecv(&self, dst: &mut [u8], src: &[u8]) -> Result<usize> {
        if dst.is_empty() {
            return Err(TransportError::Io(crate::backend::empty_buffer()));
        }
        let received =
            Platform::transact(&self.endpoint, dst, src, self.config.transact_timeout)
                .inspect_err(|err| {
                    debug!(channel = %self.name, error = %err, "sendrecv failed");
                })?;
        debug!(channel = %self.name, sent = src.len(), received, "sendrecv complete");
        Ok(received)
    }

    pub fn name(&self) -> &ChannelName {
        &self.name
    }

    pub fn endpoint(&self) -> &std::path::Path {
        &self.endpoint
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}
