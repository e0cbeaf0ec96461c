use serde::Serialize;

use crate::cmd::{Context, VersionArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::OutputFormat;

#[derive(Debug, Serialize)]
struct VersionInfo {
    name: &'static str,
    version: &'static str,
    target: &'static str,
    backend: &'static str,
    /// Where channel names resolve to on this build.
    namespace: String,
    transact_timeout_ms: Option<u128>,
}

impl VersionInfo {
    fn collect(ctx: &Context) -> Self {
        let client = ctx.client_config();
        let namespace = if cfg!(windows) {
            client.namespace.pipe_prefix.clone()
        } else {
            client.namespace.socket_dir.display().to_string()
        };

        Self {
            name: "ipclink",
            version: env!("CARGO_PKG_VERSION"),
            target: option_env!("IPCLINK_BUILD_TARGET").unwrap_or("unknown"),
            backend: ipclink_transport::backend_name(),
            namespace,
            transact_timeout_ms: client.transact_timeout.map(|t| t.as_millis()),
        }
    }
}

pub fn run(args: VersionArgs, ctx: &Context) -> CliResult<i32> {
    if !args.extended {
        println!("ipclink {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    let info = VersionInfo::collect(ctx);
    match ctx.format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(&info).unwrap_or_else(|_| "{}".to_string())
        ),
        _ => {
            println!("name: {}", info.name);
            println!("version: {}", info.version);
            println!("target: {}", info.target);
            println!("backend: {}", info.backend);
            println!("namespace: {}", info.namespace);
            match info.transact_timeout_ms {
                Some(ms) => println!("transact_timeout: {ms}ms"),
                None => println!("transact_timeout: none"),
            }
        }
    }

    Ok(SUCCESS)
}
