use std::fs;
use std::time::Duration;

use ipclink_transport::Client;

use crate::cmd::{Context, SendArgs};
use crate::exit::{transport_error, CliError, CliResult, DATA_INVALID, SUCCESS, USAGE};
use crate::output::print_message;

pub fn run(args: SendArgs, ctx: &Context) -> CliResult<i32> {
    let payload = resolve_payload(&args)?;

    if !args.wait {
        let client = Client::with_config(&args.name, ctx.client_config())
            .map_err(|err| transport_error("connect failed", err))?;
        let mut conn = client
            .try_connect()
            .map_err(|err| transport_error("connect failed", err))?;
        let sent = conn
            .send(&payload)
            .map_err(|err| transport_error("send failed", err))?;
        tracing::debug!(channel = %args.name, sent, "message sent");
        return Ok(SUCCESS);
    }

    if args.buffer_size == 0 {
        return Err(CliError::new(USAGE, "--buffer-size must be greater than zero"));
    }
    let timeout = parse_duration(&args.timeout)?;
    let config = ctx.client_config().with_transact_timeout(Some(timeout));
    let client = Client::with_config(&args.name, config)
        .map_err(|err| transport_error("connect failed", err))?;

    let mut reply = vec![0u8; args.buffer_size];
    let received = client
        .sendrecv(&mut reply, &payload)
        .map_err(|err| transport_error("sendrecv failed", err))?;
    if received == 0 {
        return Err(CliError::new(
            crate::exit::FAILURE,
            "sendrecv failed: peer closed without replying",
        ));
    }

    print_message(&reply[..received], &args.name, "server", ctx.format);
    Ok(SUCCESS)
}

/// An empty message cannot be told apart from an orderly close, so it is rejected.
fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    let payload = if let Some(data) = &args.data {
        data.as_bytes().to_vec()
    } else if let Some(path) = &args.file {
        fs::read(path).map_err(|err| {
            crate::exit::io_error(&format!("failed reading {}", path.display()), err)
        })?
    } else {
        return Err(CliError::new(USAGE, "one of --data or --file is required"));
    };

    if payload.is_empty() {
        return Err(CliError::new(DATA_INVALID, "payload must not be empty"));
    }
    Ok(payload)
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
