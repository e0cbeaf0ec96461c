use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ipclink_transport::{Client, Server};

use crate::cmd::{install_shutdown_handler, peer_label, Context, ListenArgs};
use crate::exit::{transport_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::print_message;

pub fn run(args: ListenArgs, ctx: &Context) -> CliResult<i32> {
    if args.buffer_size == 0 {
        return Err(CliError::new(USAGE, "--buffer-size must be greater than zero"));
    }
    if args.count == Some(0) {
        return Ok(SUCCESS);
    }

    let mut server = Server::bind_with_config(&args.name, ctx.server_config())
        .map_err(|err| transport_error("bind failed", err))?;
    let wake = Client::with_config(&args.name, ctx.client_config())
        .map_err(|err| transport_error("bind failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_shutdown_handler(running.clone(), wake)?;

    let mut buf = vec![0u8; args.buffer_size];
    let mut printed = 0usize;
    let mut seq = 0usize;

    while running.load(Ordering::SeqCst) {
        let mut conn = server
            .accept()
            .map_err(|err| transport_error("accept failed", err))?;
        seq = seq.saturating_add(1);
        let peer = peer_label(&conn, seq);

        while running.load(Ordering::SeqCst) {
            let n = conn
                .recv(&mut buf)
                .map_err(|err| transport_error("receive failed", err))?;
            if n == 0 {
                break;
            }

            print_message(&buf[..n], &args.name, &peer, ctx.format);
            printed = printed.saturating_add(1);

            if let Some(count) = args.count {
                if printed >= count {
                    return Ok(SUCCESS);
                }
            }
        }
    }

    Ok(SUCCESS)
}
