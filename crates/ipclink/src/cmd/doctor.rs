use std::path::PathBuf;

use ipclink_transport::{backend_name, Client, Server};
use serde::Serialize;

use crate::cmd::{Context, DoctorArgs};
use crate::exit::{CliResult, HEALTH_CHECK_FAILED, SUCCESS};
use crate::output::OutputFormat;

const UNSUPPORTED_BACKEND: &str = "unsupported";

#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Pass,
    Fail,
    Info,
    Skip,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    name: String,
    status: CheckStatus,
    detail: String,
}

impl CheckResult {
    fn new(name: &str, status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct DoctorOutput {
    kind: &'static str,
    backend: &'static str,
    checks: Vec<CheckResult>,
    overall: &'static str,
}

pub fn run(_args: DoctorArgs, ctx: &Context) -> CliResult<i32> {
    let checks = vec![
        platform_transport_check(),
        socket_dir_check(ctx),
        loopback_check(ctx),
        compiled_features_check(),
    ];

    let has_fail = checks.iter().any(|c| matches!(c.status, CheckStatus::Fail));
    let output = DoctorOutput {
        kind: "doctor-report",
        backend: backend_name(),
        checks,
        overall: if has_fail { "fail" } else { "pass" },
    };

    print_doctor(&output, ctx.format);

    if has_fail {
        Ok(HEALTH_CHECK_FAILED)
    } else {
        Ok(SUCCESS)
    }
}

fn print_doctor(output: &DoctorOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(output).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("ipclink doctor ({} backend)\n", output.backend);
            for c in &output.checks {
                println!(
                    "  [{:>4}] {:<20} {}",
                    status_text(c.status),
                    c.name,
                    c.detail
                );
            }
            if output.overall == "pass" {
                println!("\n  Result: all checks passed");
            } else {
                println!("\n  Result: one or more checks failed");
            }
        }
        OutputFormat::Raw => {
            println!("{}", output.overall);
        }
    }
}

fn status_text(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Pass => "PASS",
        CheckStatus::Fail => "FAIL",
        CheckStatus::Info => "INFO",
        CheckStatus::Skip => "SKIP",
    }
}

fn platform_transport_check() -> CheckResult {
    match backend_name() {
        UNSUPPORTED_BACKEND => CheckResult::new(
            "platform_transport",
            CheckStatus::Fail,
            "no IPC backend for this platform; every operation fails",
        ),
        name => CheckResult::new(
            "platform_transport",
            CheckStatus::Pass,
            format!("{name} available"),
        ),
    }
}

fn socket_dir_check(ctx: &Context) -> CheckResult {
    if !cfg!(any(target_os = "linux", target_os = "android")) {
        return CheckResult::new(
            "socket_dir",
            CheckStatus::Skip,
            "socket directory not used by this backend",
        );
    }

    let dir: PathBuf = ctx.server_config().namespace.socket_dir;
    if !dir.exists() {
        return CheckResult::new(
            "socket_dir",
            CheckStatus::Fail,
            format!("{} does not exist", dir.display()),
        );
    }
    if !dir.is_dir() {
        return CheckResult::new(
            "socket_dir",
            CheckStatus::Fail,
            format!("{} is not a directory", dir.display()),
        );
    }
    CheckResult::new("socket_dir", CheckStatus::Pass, dir.display().to_string())
}

/// Bind a throwaway channel, connect to it once, then release it.
fn loopback_check(ctx: &Context) -> CheckResult {
    if backend_name() == UNSUPPORTED_BACKEND {
        return CheckResult::new("loopback", CheckStatus::Skip, "no backend to exercise");
    }

    let name = format!(
        "ipclink-doctor-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default()
    );

    let server = match Server::bind_with_config(&name, ctx.server_config()) {
        Ok(server) => server,
        Err(err) => {
            return CheckResult::new("loopback", CheckStatus::Fail, format!("bind failed: {err}"))
        }
    };

    let connected = Client::with_config(&name, ctx.client_config())
        .and_then(|client| client.try_connect());
    drop(server);

    match connected {
        Ok(_) => CheckResult::new("loopback", CheckStatus::Pass, "bind and connect succeeded"),
        Err(err) => CheckResult::new(
            "loopback",
            CheckStatus::Fail,
            format!("connect failed: {err}"),
        ),
    }
}

fn compiled_features_check() -> CheckResult {
    let mut features = vec![backend_name()];
    if cfg!(feature = "cli") {
        features.push("cli");
    }

    CheckResult::new("compiled_features", CheckStatus::Info, features.join(", "))
}
