//! Periodic sweep that feeds due schedules into the dispatch loop.
//!
//! One schedule is processed per call, oldest due first. A schedule is
//! marked sent exactly once, even on partial delivery failure; there is
//! no retry. Pre-flight failures (an unconfigured gateway, for instance)
//! leave the schedule due so a later sweep picks it up again.
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use crate::db;
use crate::dispatch::{self, CorrelationIds, DispatchRequest, Origin, Recipient};
use crate::gateway::{GatewayTarget, MessageGateway};
use crate::phone;

/// Process the next due schedule, if any. Returns whether one was handled.
#[instrument(skip_all)]
pub async fn process_next_schedule(
    pool: &db::Pool,
    gateway: &dyn MessageGateway,
    ids: &dyn CorrelationIds,
    target: &GatewayTarget,
    origin: Origin,
    now: DateTime<Utc>,
) -> Result<bool> {
    let schedule = match db::next_due_schedule(pool, now).await? {
        Some(s) => s,
        None => return Ok(false),
    };

    let mut recipients = Vec::new();
    for client_id in &schedule.client_ids {
        match db::find_client(pool, client_id).await? {
            Some(client) => {
                if phone::digits_only(&client.phone).is_empty() {
                    warn!(schedule = %schedule.id, client = %client.name, "client has no usable phone; skipping");
                    continue;
                }
                recipients.push(Recipient {
                    id: client.id,
                    name: client.name,
                    phone: client.phone,
                });
            }
            None => {
                // Deleted since the schedule was created.
                warn!(schedule = %schedule.id, client_id, "schedule references unknown client; skipping");
            }
        }
    }

    if recipients.is_empty() {
        warn!(schedule = %schedule.id, "no deliverable recipients left; marking sent");
        db::mark_schedule_sent(pool, &schedule.id, now).await?;
        return Ok(true);
    }

    let request = DispatchRequest {
        recipients,
        body: schedule.message.clone(),
        target: target.clone(),
        origin,
    };
    let report = dispatch::run(gateway, ids, &request)
        .await
        .with_context(|| format!("dispatch refused for schedule {}", schedule.id))?;

    db::mark_schedule_sent(pool, &schedule.id, now).await?;
    if report.failed.is_empty() {
        info!(schedule = %schedule.id, sent = report.succeeded, "schedule dispatched");
    } else {
        warn!(
            schedule = %schedule.id,
            sent = report.succeeded,
            failed = ?report.failed,
            "schedule dispatched with failures"
        );
    }
    Ok(true)
}
