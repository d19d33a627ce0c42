//! JSON envelope written to stdout for every command.

use std::io::Write;

use serde::Serialize;
use serde_json::Value;
use stockfeed_core::UtcDateTime;
use uuid::Uuid;

use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct Envelope {
    pub meta: Meta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Serialize)]
pub struct Meta {
    pub request_id: Uuid,
    pub command: &'static str,
    pub generated_at: UtcDateTime,
    pub latency_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

impl Envelope {
    pub fn ok(meta: Meta, data: Value) -> Self {
        Self {
            meta,
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(meta: Meta, error: &CliError) -> Self {
        Self {
            meta,
            data: None,
            error: Some(ErrorBody {
                code: error.code(),
                message: error.to_string(),
            }),
        }
    }
}

pub fn render(envelope: &Envelope, pretty: bool) -> Result<(), CliError> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    if pretty {
        serde_json::to_writer_pretty(&mut handle, envelope)?;
    } else {
        serde_json::to_writer(&mut handle, envelope)?;
    }
    handle.write_all(b"\n")?;
    handle.flush()?;
    Ok(())
}
