//! Echo server: serves peers one after another and sends every message back.
//!
//! Run with:
//!   cargo run -p ipclink --example echo-server
//!
//! In another terminal:
//!   cargo run -p ipclink --example request-reply

use ipclink::Server;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut server = Server::bind("IpcTest")?;
    eprintln!(
        "Listening on {} ({} backend)",
        server.endpoint().map(|p| p.display().to_string()).unwrap_or_default(),
        ipclink::backend_name()
    );

    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let mut conn = server.accept()?;
        eprintln!("Peer connected");

        loop {
            let n = conn.recv(&mut buf)?;
            if n == 0 {
                eprintln!("Peer disconnected");
                break;
            }
            eprintln!("Received {n} bytes");
            conn.send(&buf[..n])?;
        }
    }
}
