//! Audit event type and sinks.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::BoxError;

/// Severity of an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditLevel {
    Info,
    Notice,
    Warning,
    Critical,
}

/// A structured runtime security event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityEvent {
    pub id: Uuid,
    pub event_type: String,
    pub level: AuditLevel,
    pub occurred_at_ms: u64,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl SecurityEvent {
    pub fn new(event_type: impl Into<String>, level: AuditLevel) -> Self {
        let occurred_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        Self {
            id: Uuid::new_v4(),
            event_type: event_type.into(),
            level,
            occurred_at_ms,
            attributes: Map::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Destination for security audit events.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: &SecurityEvent) -> Result<(), BoxError>;
}

/// Emits audit events as structured log lines.
#[derive(Debug, Default, Clone)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: &SecurityEvent) -> Result<(), BoxError> {
        let attributes = serde_json::to_string(&event.attributes)?;
        match event.level {
            AuditLevel::Info | AuditLevel::Notice => tracing::info!(
                target: "security_audit",
                event_id = %event.id,
                event_type = %event.event_type,
                level = ?event.level,
                attributes = %attributes,
                "Runtime security event"
            ),
            AuditLevel::Warning | AuditLevel::Critical => tracing::warn!(
                target: "security_audit",
                event_id = %event.id,
                event_type = %event.event_type,
                level = ?event.level,
                attributes = %attributes,
                "Runtime security event"
            ),
        }
        Ok(())
    }
}

/// Appends audit events to a file, one JSON document per line.
pub struct JsonLinesAuditSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonLinesAuditSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl AuditSink for JsonLinesAuditSink {
    async fn record(&self, event: &SecurityEvent) -> Result<(), BoxError> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}
