//! Authentication audit trail.
//!
//! Every login outcome, logout and password-reset request is appended here.
//! Sinks are write-only; a failed write is logged and dropped by [`record_quietly`]
//! so it can never change what the caller of the primary operation sees.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{types::Json, PgPool};
use std::fmt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    LoginSuccess,
    LoginFailed,
    Logout,
    PasswordResetRequested,
}

impl AuditAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LoginSuccess => "LOGIN_SUCCESS",
            Self::LoginFailed => "LOGIN_FAILED",
            Self::Logout => "LOGOUT",
            Self::PasswordResetRequested => "PASSWORD_RESET_REQUESTED",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub action: AuditAction,
    /// Absent when the attempt named an unknown email.
    pub account_id: Option<Uuid>,
    pub details: Value,
    pub source_address: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    #[must_use]
    pub fn new(action: AuditAction, timestamp: DateTime<Utc>) -> Self {
        Self {
            action,
            account_id: None,
            details: Value::Object(serde_json::Map::new()),
            source_address: None,
            timestamp,
        }
    }

    #[must_use]
    pub fn account(mut self, account_id: Uuid) -> Self {
        self.account_id = Some(account_id);
        self
    }

    #[must_use]
    pub fn details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    #[must_use]
    pub fn source(mut self, source_address: Option<&str>) -> Self {
        self.source_address = source_address.map(str::to_string);
        self
    }
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    /// # Errors
    /// Returns an error if the event could not be persisted.
    async fn record(&self, event: &AuditEvent) -> anyhow::Result<()>;
}

/// Append `event`, logging instead of returning any failure.
pub async fn record_quietly(sink: &dyn AuditSink, event: AuditEvent) {
    if let Err(err) = sink.record(&event).await {
        warn!(action = %event.action, "Failed to write audit event: {err:#}");
    }
}

/// Emits audit events as structured log lines under the `audit` target.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: &AuditEvent) -> anyhow::Result<()> {
        info!(
            target: "audit",
            action = %event.action,
            account_id = ?event.account_id,
            source_address = ?event.source_address,
            details = %event.details,
            timestamp = %event.timestamp,
            "audit event"
        );
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct PgAuditSink {
    pool: PgPool,
}

impl PgAuditSink {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn record(&self, event: &AuditEvent) -> anyhow::Result<()> {
        let query = r"
            INSERT INTO audit_events (id, action, account_id, details, source_address, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(Uuid::now_v7())
            .bind(event.action.as_str())
            .bind(event.account_id)
            .bind(Json(&event.details))
            .bind(&event.source_address)
            .bind(event.timestamp)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to insert audit event")?;
        debug!(action = %event.action, "Audit event stored");
        Ok(())
    }
}

/// Keeps events in memory; used by tests to assert on the trail.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
    failing: bool,
}

impl MemoryAuditSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every write fails.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            failing: true,
        }
    }

    pub async fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().await.clone()
    }

    pub async fn actions(&self) -> Vec<AuditAction> {
        self.events.lock().await.iter().map(|e| e.action).collect()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, event: &AuditEvent) -> anyhow::Result<()> {
        if self.failing {
            anyhow::bail!("audit storage unavailable");
        }
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}
