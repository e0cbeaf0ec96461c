use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    kind: &'static str,
    channel: &'a str,
    peer: &'a str,
    size: usize,
    payload: String,
    timestamp: String,
}

/// Print one received message. `peer` labels where it came from.
pub fn print_message(payload: &[u8], channel: &str, peer: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                kind: "message",
                channel,
                peer,
                size: payload.len(),
                payload: payload_preview(payload),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["CHANNEL", "PEER", "SIZE", "PAYLOAD"])
                .add_row(vec![
                    channel.to_string(),
                    peer.to_string(),
                    payload.len().to_string(),
                    payload_preview(payload),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "channel={} peer={} size={} payload={}",
                channel,
                peer,
                payload.len(),
                payload_preview(payload)
            );
        }
        OutputFormat::Raw => {
            print_raw(payload);
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn payload_preview(payload: &[u8]) -> String {
    // C peers commonly include the terminating NUL in the message.
    let text = payload.strip_suffix(&[0]).unwrap_or(payload);
    match std::str::from_utf8(text) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_strips_trailing_nul() {
        assert_eq!(payload_preview(b"Hello server\0"), "Hello server");
        assert_eq!(payload_preview(b"plain"), "plain");
    }

    #[test]
    fn preview_labels_binary() {
        assert_eq!(payload_preview(&[0xff, 0xfe, 0x00]), "<binary 3 bytes>");
    }

    #[test]
    fn message_output_serializes_size() {
        let out = MessageOutput {
            kind: "message",
            channel: "IpcTest",
            peer: "pid:1",
            size: 5,
            payload: "hello".to_string(),
            timestamp: "0".to_string(),
        };
        let json = serde_json::to_string(&out).expect("message output should serialize");
        assert!(json.contains("\"size\":5"));
        assert!(json.contains("\"channel\":\"IpcTest\""));
    }
}
