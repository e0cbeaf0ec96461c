//! Message-oriented local IPC between two processes on one host.
//!
//! A [`Server`] listens under a channel name, a [`Client`] connects to one,
//! and both produce a [`Connection`] with blocking `send`, `recv` and a
//! non-destructive `peek`. Each `send` arrives as one discrete message.
//!
//! The backend is chosen at build time:
//! - Linux/Android: `AF_UNIX` sequenced-packet sockets under a directory (`/tmp` by default)
//! - Windows: message-mode duplex named pipes under `\\.\pipe\`
//! - anything else: an inert backend whose operations all fail
//!
//! Backends do not interoperate; both ends must run on the same platform.

mod backend;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod name;
pub mod server;

pub use backend::backend_name;
pub use client::Client;
pub use config::{ClientConfig, ServerConfig};
pub use connection::{Connection, Peek};
pub use error::{Result, TransportError};
pub use name::{ChannelName, Namespace};
pub use server::Server;
