//! Raw row shapes mapped out of queries.
//!
//! Keep these structs focused on what the SQL returns. Domain entities
//! live in `crate::model`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use crate::model::ScheduledMessage;

/// A `schedules` row as stored: recipient ids still JSON-encoded.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScheduleRow {
    pub id: String,
    pub client_ids: String,
    pub message: String,
    pub send_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ScheduleRow {
    pub fn into_schedule(self) -> Result<ScheduledMessage> {
        let client_ids: Vec<String> = serde_json::from_str(&self.client_ids)
            .with_context(|| format!("corrupt recipient list on schedule {}", self.id))?;
        Ok(ScheduledMessage {
            id: self.id,
            client_ids,
            message: self.message,
            send_at: self.send_at,
            sent_at: self.sent_at,
            created_at: self.created_at,
        })
    }
}
