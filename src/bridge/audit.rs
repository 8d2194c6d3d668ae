//! Audit log interceptor
//!
//! Appends one JSON line per call start and completion. Key material,
//! passwords and keystores are redacted from params and results before
//! anything touches the file.

use super::{operations, CallContext, CallInterceptor};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

const REDACTED: &str = "[redacted]";

/// Field names whose values never reach the log
const SENSITIVE_FIELDS: &[&str] = &[
    "privateKey",
    "password",
    "mnemonic",
    "json",
    "keystore",
    "encrypedPassword",
    "decryptPassword",
];

/// Operations whose whole result is secret
const SECRET_RESULTS: &[&str] = &[operations::PRIVATE_KEY_TO_KEYSTORE];

/// Entry in the audit log
#[derive(Debug, Serialize)]
struct AuditEntry<'a> {
    timestamp: DateTime<Utc>,
    entry_type: &'static str,
    operation: &'a str,
    params: Value,
    result: Option<Value>,
    error: Option<String>,
    duration_ms: u64,
    status: &'static str,
}

/// Writer for audit log entries
struct AuditLogWriter {
    path: PathBuf,
}

impl AuditLogWriter {
    fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn write(&self, entry: &AuditEntry<'_>) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let json = serde_json::to_string(entry)?;
        writeln!(file, "{}", json)?;
        Ok(())
    }
}

/// Interceptor that logs every dispatched call to a JSONL file
pub struct AuditLogInterceptor {
    writer: Arc<Mutex<AuditLogWriter>>,
}

impl AuditLogInterceptor {
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self {
            writer: Arc::new(Mutex::new(AuditLogWriter::new(log_path.into()))),
        }
    }

    async fn append(&self, entry: &AuditEntry<'_>) {
        let writer = self.writer.lock().await;
        if let Err(e) = writer.write(entry) {
            tracing::warn!(error = %e, "Failed to write audit log entry");
        }
    }
}

#[async_trait]
impl CallInterceptor for AuditLogInterceptor {
    async fn before_call(&self, context: &CallContext) {
        let entry = AuditEntry {
            timestamp: Utc::now(),
            entry_type: "call_start",
            operation: &context.operation,
            params: redact(&context.params),
            result: None,
            error: None,
            duration_ms: 0,
            status: "pending",
        };
        self.append(&entry).await;
    }

    async fn after_call(&self, context: &CallContext, result: &Result<Value>, duration_ms: u64) {
        let (result, error, status) = match result {
            Ok(_) if SECRET_RESULTS.contains(&context.operation.as_str()) => {
                (Some(Value::String(REDACTED.to_string())), None, "success")
            }
            Ok(v) => (Some(redact(v)), None, "success"),
            Err(e) => (None, Some(e.to_string()), "error"),
        };

        let entry = AuditEntry {
            timestamp: Utc::now(),
            entry_type: "call_complete",
            operation: &context.operation,
            params: redact(&context.params),
            result,
            error,
            duration_ms,
            status,
        };
        self.append(&entry).await;
    }
}

/// Copy of `value` with sensitive fields replaced, at any depth
fn redact(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, v)| {
                    let v = if SENSITIVE_FIELDS.contains(&key.as_str()) {
                        Value::String(REDACTED.to_string())
                    } else {
                        redact(v)
                    };
                    (key.clone(), v)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact).collect()),
        other => other.clone(),
    }
}
