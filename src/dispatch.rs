//! Bulk message dispatch.
//!
//! One invocation sends a single message body to a fixed, caller-owned
//! recipient list through the configured gateway, strictly sequentially
//! and in input order. Per-recipient failures are collected, never
//! escalated; pre-flight failures abort before any network activity.
use anyhow::Result;
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::gateway::{GatewayTarget, MessageGateway, OutboundMessage};
use crate::phone;

/// How the surface that triggered the dispatch was itself reached. A
/// secure surface must not call out to a plain-http gateway: the hosting
/// environment's network policy would silently block the call mid-batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Secure,
    Plain,
}

impl Origin {
    pub fn from_require_tls(require_tls: bool) -> Self {
        if require_tls {
            Origin::Secure
        } else {
            Origin::Plain
        }
    }
}

/// Pre-flight failures. All of these are reported before the first
/// gateway call and are terminal for the whole batch.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("no recipients selected")]
    EmptySelection,
    #[error("message body is empty")]
    EmptyMessage,
    #[error("messaging gateway URL is not configured")]
    Configuration,
    #[error("gateway URL '{0}' uses plain http but the calling surface is secure")]
    InsecureTransport(String),
}

/// One selected recipient. The phone is free text; it is normalized to
/// digits only when the message is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub id: String,
    pub name: String,
    pub phone: String,
}

/// An immutable dispatch request, built by the caller at invocation time.
/// The loop never reads mutable caller state, so edits made while a batch
/// is running cannot leak into it.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub recipients: Vec<Recipient>,
    pub body: String,
    pub target: GatewayTarget,
    pub origin: Origin,
}

/// Aggregate outcome of one dispatch invocation. `failed` holds the
/// display names of failed recipients in attempt order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: Vec<String>,
}

/// Correlation identifier source. The gateway uses these for its own
/// deduplication; they are never retained here. Injectable so tests can
/// assert on generated ids deterministically.
pub trait CorrelationIds: Send + Sync {
    fn next(&self) -> String;
}

/// Production id source: random UUIDv4 per call.
#[derive(Debug, Clone, Default)]
pub struct UuidIds;

impl CorrelationIds for UuidIds {
    fn next(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

fn preflight(req: &DispatchRequest) -> Result<(), DispatchError> {
    if req.recipients.is_empty() {
        return Err(DispatchError::EmptySelection);
    }
    if req.body.trim().is_empty() {
        return Err(DispatchError::EmptyMessage);
    }
    if req.target.url.trim().is_empty() {
        return Err(DispatchError::Configuration);
    }
    if req.origin == Origin::Secure
        && req.target.url.trim().to_ascii_lowercase().starts_with("http://")
    {
        return Err(DispatchError::InsecureTransport(req.target.url.clone()));
    }
    Ok(())
}

/// Run one dispatch over a fixed recipient list. Recipients are processed
/// one at a time, in input order; a failed call marks that recipient as
/// failed and the loop moves on. Once started the batch runs to
/// completion.
#[instrument(skip_all, fields(recipients = req.recipients.len()))]
pub async fn run(
    gateway: &dyn MessageGateway,
    ids: &dyn CorrelationIds,
    req: &DispatchRequest,
) -> Result<DispatchReport, DispatchError> {
    preflight(req)?;

    let total = req.recipients.len();
    let mut report = DispatchReport {
        attempted: total,
        ..Default::default()
    };
    for (i, recipient) in req.recipients.iter().enumerate() {
        info!("sending {}/{} to {}", i + 1, total, recipient.name);
        let msg = OutboundMessage {
            phone: phone::digits_only(&recipient.phone),
            body: req.body.clone(),
            correlation_id: ids.next(),
        };
        match gateway.send_text(&req.target, &msg).await {
            Ok(()) => report.succeeded += 1,
            Err(err) => {
                warn!(?err, client = %recipient.name, "delivery failed");
                report.failed.push(recipient.name.clone());
            }
        }
    }
    info!(
        succeeded = report.succeeded,
        failed = report.failed.len(),
        "dispatch finished"
    );
    Ok(report)
}
