//! Platform-uniform local IPC with message boundaries.
//!
//! ipclink gives two processes on one host a named rendezvous point and a
//! connection on which every `send` arrives as exactly one message: `AF_UNIX`
//! sequenced-packet sockets on Linux, message-mode named pipes on Windows.
//!
//! ```no_run
//! use ipclink::{Client, Server};
//!
//! fn serve_once() -> ipclink::Result<()> {
//!     let mut server = Server::bind("IpcTest")?;
//!     let mut conn = server.accept()?;
//!     let mut buf = [0u8; 64];
//!     let n = conn.recv(&mut buf)?;
//!     conn.send(&buf[..n])?;
//!     Ok(())
//! }
//!
//! fn request() -> ipclink::Result<Vec<u8>> {
//!     let mut reply = [0u8; 64];
//!     let n = Client::new("IpcTest")?.sendrecv(&mut reply, b"ping")?;
//!     Ok(reply[..n].to_vec())
//! }
//! # let _ = (serve_once, request);
//! ```
//!
//! # Crate Structure
//!
//! - [`transport`]: server, client, connection and their configuration

/// Re-export transport types.
pub mod transport {
    pub use ipclink_transport::*;
}

pub use ipclink_transport::{
    backend_name, ChannelName, Client, ClientConfig, Connection, Namespace, Peek, Result,
    Server, ServerConfig, TransportError,
};
