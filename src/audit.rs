// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Campus Portal

//! Security-event audit logging.
//!
//! Append-only and best-effort: a logging failure must never fail the
//! operation being logged. The log layer retries a failed append once and
//! then drops the event with a `tracing` warning.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::Role;
use crate::storage::database::{AuthDatabase, SECURITY_EVENTS};
use crate::storage::StoreResult;

/// Types of auditable security events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventType {
    LoginSuccess,
    LoginFailure,
    TokenRefresh,
    TokenReuseDetected,
    PasswordResetRequested,
    SuspiciousActivity,
    RateLimited,
    LoggedOut,
    SessionsRevoked,
}

impl SecurityEventType {
    /// Default severity. Theft signals always log high.
    fn severity(&self) -> Severity {
        match self {
            SecurityEventType::TokenReuseDetected | SecurityEventType::SuspiciousActivity => {
                Severity::High
            }
            _ => Severity::Normal,
        }
    }
}

/// Event severity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Normal,
    High,
}

/// A security audit event. Never mutated or deleted once appended.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SecurityEvent {
    /// Unique event ID.
    pub event_id: String,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Type of event.
    pub event_type: SecurityEventType,
    /// Severity at which the event was recorded.
    pub severity: Severity,
    /// User involved (if resolved).
    pub user_id: Option<String>,
    /// Role involved (if resolved).
    pub role: Option<Role>,
    /// Client IP of the triggering request.
    pub client_ip: String,
    /// Client user agent, when available.
    pub user_agent: Option<String>,
    /// Free-form detail.
    pub detail: Option<String>,
}

impl SecurityEvent {
    /// Create a new event with the type's default severity.
    pub fn new(event_type: SecurityEventType, client_ip: impl Into<String>) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            severity: event_type.severity(),
            user_id: None,
            role: None,
            client_ip: client_ip.into(),
            user_agent: None,
            detail: None,
        }
    }

    /// Attach the resolved user.
    pub fn with_user(mut self, user_id: impl Into<String>, role: Role) -> Self {
        self.user_id = Some(user_id.into());
        self.role = Some(role);
        self
    }

    /// Attach the client user agent.
    pub fn with_agent(mut self, user_agent: Option<String>) -> Self {
        self.user_agent = user_agent;
        self
    }

    /// Add free-form detail.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Append-only store for security events.
#[derive(Clone)]
pub struct SecurityLog {
    db: Arc<AuthDatabase>,
}

impl SecurityLog {
    pub fn new(db: Arc<AuthDatabase>) -> Self {
        Self { db }
    }

    /// Append an event, best-effort.
    ///
    /// One retry on store failure, then the event is dropped with a
    /// warning. High-severity events are additionally emitted through
    /// `tracing` so they reach operators even if the store is down.
    pub fn log(&self, event: &SecurityEvent) {
        if event.severity == Severity::High {
            tracing::warn!(
                event_type = ?event.event_type,
                user_id = ?event.user_id,
                client_ip = %event.client_ip,
                detail = ?event.detail,
                "High-severity security event"
            );
        }

        if let Err(first) = self.append(event) {
            if let Err(second) = self.append(event) {
                tracing::warn!(
                    event_type = ?event.event_type,
                    first_error = %first,
                    error = %second,
                    "Dropping security event after retry"
                );
            }
        }
    }

    fn append(&self, event: &SecurityEvent) -> StoreResult<()> {
        let json = serde_json::to_vec(event)?;
        // Time-ordered key so `recent` is a single reverse range scan.
        let key = format!("{:020}|{}", event.timestamp.timestamp_millis(), event.event_id);

        let write_txn = self.db.raw().begin_write()?;
        {
            let mut table = write_txn.open_table(SECURITY_EVENTS)?;
            table.insert(key.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Most recent events, newest first.
    pub fn recent(&self, limit: usize) -> StoreResult<Vec<SecurityEvent>> {
        let read_txn = self.db.raw().begin_read()?;
        let table = read_txn.open_table(SECURITY_EVENTS)?;

        let mut events = Vec::with_capacity(limit);
        for entry in table.iter()?.rev().take(limit) {
            let entry = entry?;
            let event: SecurityEvent = serde_json::from_slice(entry.1.value())?;
            events.push(event);
        }
        Ok(events)
    }
}
