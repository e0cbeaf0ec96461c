//! One request/reply exchange against the `IpcTest` channel.
//!
//! Start `echo-server` first, then:
//!   cargo run -p ipclink --example request-reply

use ipclink::Client;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let client = Client::new("IpcTest")?;

    // Explicit connection: peek to size the reply before consuming it.
    let mut conn = client.connect();
    if conn.is_invalid() {
        return Err("no server listening on IpcTest".into());
    }
    conn.send(b"Hello server\0")?;

    let mut head = [0u8; 1];
    let peek = conn.peek(&mut head)?;
    let mut reply = vec![0u8; peek.available.max(1)];
    let n = conn.recv(&mut reply)?;
    println!("reply ({n} bytes): {}", String::from_utf8_lossy(&reply[..n]));
    conn.close();

    // The same exchange in one call.
    let mut buf = [0u8; 64];
    let n = client.sendrecv(&mut buf, b"Hello again\0")?;
    println!("sendrecv ({n} bytes): {}", String::from_utf8_lossy(&buf[..n]));
    Ok(())
}
