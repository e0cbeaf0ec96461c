use std::path::{Path, PathBuf};

use tracing::debug;

use crate::backend::{Listener, PlatformListener};
use crate::config::ServerConfig;
use crate::connection::Connection;
use crate::error::{Result, TransportError};
use crate::name::ChannelName;

/// Listens under a channel name and accepts one peer at a time.
///
/// `Server::new()` starts unbound; `init` binds the listening resource and
/// `accept` may then be called repeatedly to serve sequential peers. The
/// resource is released by `close` or on drop, which also removes the
/// socket file on the seqpacket backend.
pub struct Server {
    config: ServerConfig,
    bound: Option<Bound>,
}

struct Bound {
    name: ChannelName,
    endpoint: PathBuf,
    listener: PlatformListener,
}

impl Server {
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    pub fn with_config(config: ServerConfig) -> Self {
        Self {
            config,
            bound: None,
        }
    }

    /// Create a server and bind it in one step.
    pub fn bind(name: &str) -> Result<Self> {
        Self::bind_with_config(name, ServerConfig::default())
    }

    pub fn bind_with_config(name: &str, config: ServerConfig) -> Result<Self> {
        let mut server = Self::with_config(config);
        server.init(name)?;
        Ok(server)
    }

    /// Bind the listening resource for `name`.
    pub fn init(&mut self, name: &str) -> Result<()> {
        if self.bound.is_some() {
            return Err(TransportError::AlreadyBound);
        }

        let name = ChannelName::new(name)?;
        let endpoint = self.config.namespace.resolve(&name);
        let listener = PlatformListener::bind(&endpoint, &self.config).inspect_err(|err| {
            debug!(channel = %name, error = %err, "bind failed");
        })?;

        self.bound = Some(Bound {
            name,
            endpoint,
            listener,
        });
        Ok(())
    }

    /// Block until a peer connects and return its connection.
    pub fn accept(&mut self) -> Result<Connection> {
        let bound = self.bound.as_mut().ok_or(TransportError::NotBound)?;
        let handle = bound.listener.accept().map_err(|err| {
            debug!(channel = %bound.name, error = %err, "accept failed");
            TransportError::Accept(err)
        })?;
        Ok(Connection::from_handle(handle))
    }

    /// Release the listening resource. The server can be re-initialized afterwards.
    pub fn close(&mut self) {
        if let Some(bound) = self.bound.take() {
            debug!(channel = %bound.name, "closing server");
        }
    }

    pub fn is_bound(&self) -> bool {
        self.bound.is_some()
    }

    pub fn name(&self) -> Option<&ChannelName> {
        self.bound.as_ref().map(|b| &b.name)
    }

    /// Socket path or pipe name this server is bound to.
    pub fn endpoint(&self) -> Option<&Path> {
        self.bound.as_ref().map(|b| b.endpoint.as_path())
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("endpoint", &self.endpoint())
            .finish()
    }
}
