//! HTTP client for the third-party messaging gateway.
//!
//! The gateway performs the actual message delivery; this module only
//! issues one `POST` per outbound message and classifies the response.
//! Callers depend on the [`MessageGateway`] trait so the dispatch loop can
//! be exercised against a recording double in tests.
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;
use tracing::{info, warn};

/// Presence window, in milliseconds, advertised with every message.
const PRESENCE_MS: i64 = 3000;
/// Message lifetime, in seconds, advertised with every message.
const DURATION_SECS: i64 = 86400;

/// Where to deliver: the configured gateway endpoint plus its optional
/// access token. Read fresh from settings before every dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayTarget {
    pub url: String,
    pub token: Option<String>,
}

impl GatewayTarget {
    pub fn new(url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            url: url.into(),
            // An empty token means "no token configured".
            token: token.filter(|t| !t.trim().is_empty()),
        }
    }
}

/// One outbound message: a digits-only phone, the verbatim body and the
/// per-call correlation identifier the gateway uses for deduplication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub phone: String,
    pub body: String,
    pub correlation_id: String,
}

#[async_trait]
pub trait MessageGateway: Send + Sync {
    /// Deliver one message. `Ok` means the gateway answered 2xx; any
    /// non-success status, network failure or timeout is an `Err`.
    async fn send_text(&self, target: &GatewayTarget, msg: &OutboundMessage) -> Result<()>;
}

/// Production gateway client over `reqwest`.
#[derive(Clone)]
pub struct HttpGateway {
    http: Client,
    timeout: Duration,
}

impl fmt::Debug for HttpGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpGateway")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl HttpGateway {
    pub fn new(timeout: Duration) -> Self {
        let http = Client::builder()
            .user_agent("canil-console/0.1")
            .no_proxy()
            .build()
            .expect("reqwest client");
        Self { http, timeout }
    }

    /// Build the gateway request without sending it.
    pub fn build_send_request(
        &self,
        target: &GatewayTarget,
        msg: &OutboundMessage,
    ) -> Result<reqwest::Request> {
        let endpoint = Url::parse(&target.url)
            .with_context(|| format!("invalid gateway URL: {}", target.url))?;
        let mut req = self
            .http
            .post(endpoint)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .timeout(self.timeout);
        if let Some(token) = target.token.as_deref() {
            req = req.header("token", token);
        }
        req.json(&send_payload(msg))
            .build()
            .context("failed to build gateway request")
    }
}

/// JSON body of a send call, as the gateway expects it.
pub fn send_payload(msg: &OutboundMessage) -> Value {
    json!({
        "Phone": msg.phone,
        "Body": msg.body,
        "Id": msg.correlation_id,
        "Presence": PRESENCE_MS,
        "Duration": DURATION_SECS,
        "LinkPreview": true,
        "NumberCheck": true,
    })
}

#[async_trait]
impl MessageGateway for HttpGateway {
    async fn send_text(&self, target: &GatewayTarget, msg: &OutboundMessage) -> Result<()> {
        let request = self.build_send_request(target, msg)?;
        info!(url = %request.url(), id = %msg.correlation_id, "gateway send");

        let res = self
            .http
            .execute(request)
            .await
            .context("failed to reach messaging gateway")?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            warn!(%status, body, "gateway rejected message");
            return Err(anyhow!("gateway error {}: {}", status, body));
        }
        Ok(())
    }
}
