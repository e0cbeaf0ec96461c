use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ipclink_transport::{Client, Connection, Server, TransportError};

use crate::cmd::{install_shutdown_handler, peer_label, Context, EchoArgs};
use crate::exit::{transport_error, CliError, CliResult, SUCCESS, USAGE};

pub fn run(args: EchoArgs, ctx: &Context) -> CliResult<i32> {
    if args.buffer_size == 0 {
        return Err(CliError::new(USAGE, "--buffer-size must be greater than zero"));
    }

    let mut server = Server::bind_with_config(&args.name, ctx.server_config())
        .map_err(|err| transport_error("bind failed", err))?;
    let wake = Client::with_config(&args.name, ctx.client_config())
        .map_err(|err| transport_error("bind failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_shutdown_handler(running.clone(), wake)?;

    tracing::info!(
        channel = %args.name,
        endpoint = %server.endpoint().map(|p| p.display().to_string()).unwrap_or_default(),
        "echo server ready"
    );

    let mut buf = vec![0u8; args.buffer_size];
    let mut seq = 0usize;

    while running.load(Ordering::SeqCst) {
        let mut conn = server
            .accept()
            .map_err(|err| transport_error("accept failed", err))?;
        seq = seq.saturating_add(1);
        if !running.load(Ordering::SeqCst) {
            break;
        }

        let peer = peer_label(&conn, seq);
        tracing::debug!(peer = %peer, "peer connected");
        let echoed = echo_session(&mut conn, &mut buf, &running)
            .map_err(|err| transport_error("echo failed", err))?;
        tracing::debug!(peer = %peer, echoed, "peer disconnected");
    }

    Ok(SUCCESS)
}

/// Echo every message on `conn` until the peer closes. Returns the number of messages echoed.
fn echo_session(
    conn: &mut Connection,
    buf: &mut [u8],
    running: &AtomicBool,
) -> Result<usize, TransportError> {
    let mut echoed = 0usize;
    while running.load(Ordering::SeqCst) {
        let n = match conn.recv(buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if is_disconnect(&err) => break,
            Err(err) => return Err(err),
        };

        tracing::info!(size = n, "echoing message");
        match conn.send(&buf[..n]) {
            Ok(_) => echoed += 1,
            Err(err) if is_disconnect(&err) => break,
            Err(err) => return Err(err),
        }
    }
    Ok(echoed)
}

fn is_disconnect(err: &TransportError) -> bool {
    matches!(
        err.io_source().map(std::io::Error::kind),
        Some(std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::ConnectionReset)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_and_broken_pipe_end_the_session() {
        for kind in [
            std::io::ErrorKind::BrokenPipe,
            std::io::ErrorKind::ConnectionReset,
        ] {
            assert!(is_disconnect(&TransportError::Io(kind.into())));
        }
        assert!(!is_disconnect(&TransportError::Io(
            std::io::ErrorKind::PermissionDenied.into()
        )));
        assert!(!is_disconnect(&TransportError::InvalidConnection));
    }

    #[test]
    fn invalid_connection_is_an_error() {
        let mut conn = Connection::invalid();
        let running = AtomicBool::new(true);
        let mut buf = [0u8; 8];
        assert!(matches!(
            echo_session(&mut conn, &mut buf, &running),
            Err(TransportError::InvalidConnection)
        ));
    }

    #[test]
    fn stopped_session_echoes_nothing() {
        let mut conn = Connection::invalid();
        let running = AtomicBool::new(false);
        let mut buf = [0u8; 8];
        assert_eq!(echo_session(&mut conn, &mut buf, &running).unwrap(), 0);
    }
}
