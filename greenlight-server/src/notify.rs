//! Delivery channel for handing decision tokens to approvers.
//!
//! The coordinator only needs a fire-and-forget notify capability: the
//! channel owns transport, retry, and the human interface. Delivery
//! failure never fails request creation, and the gateway's
//! decided-notification is equally best-effort.

use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

use greenlight_core::{Decision, DecisionToken, RequestId};

/// Everything the approver needs to act on a pending request.
#[derive(Debug, Clone)]
pub struct PendingNotification {
    pub request_id: RequestId,
    pub decision_token: DecisionToken,
    pub name: String,
    pub course: String,
    pub cost: f64,
    /// Ready-made approval link, when `APPROVAL_BASE_URL` is configured.
    pub approval_url: Option<String>,
}

/// Out-of-band transport that hands the decision token to the approver.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    /// Notify the approver that a request awaits their decision.
    async fn notify_pending(&self, notification: &PendingNotification);

    /// Signal that a decision landed and the parked workflow may resume.
    async fn notify_decided(&self, request_id: &RequestId, decision: Decision);
}

/// Delivery channel that writes the token to the service log.
///
/// Suitable for demos and manual operation: the approver copies the
/// token out of the log, as the original deployment did from its
/// notification logs.
pub struct LogChannel;

#[async_trait]
impl DeliveryChannel for LogChannel {
    async fn notify_pending(&self, notification: &PendingNotification) {
        info!(
            "--- ACTION REQUIRED ---\n\
             Request ID: {}\n\
             Employee: {}\n\
             Course: {}\n\
             Cost: ${}\n\
             APPROVAL TOKEN: {}\n\
             --- Copy the above token to approve/reject the request ---",
            notification.request_id,
            notification.name,
            notification.course,
            notification.cost,
            notification.decision_token.0,
        );
        if let Some(url) = &notification.approval_url {
            info!("Approval link: {}", url);
        }
    }

    async fn notify_decided(&self, request_id: &RequestId, decision: Decision) {
        info!("Request {} decided: {}", request_id, decision);
    }
}

/// Delivery channel that POSTs notifications to a configured webhook.
///
/// One attempt per notification; failures are logged, not propagated.
/// Retry is the receiving system's concern.
pub struct WebhookChannel {
    client: reqwest::Client,
    url: String,
}

impl WebhookChannel {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    async fn post(&self, body: serde_json::Value) {
        match self.client.post(&self.url).json(&body).send().await {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => {
                warn!(
                    "Delivery webhook returned {} for event {}",
                    response.status(),
                    body.get("event")
                        .and_then(|e| e.as_str())
                        .unwrap_or("unknown"),
                );
            }
            Err(e) => {
                warn!("Failed to deliver notification webhook: {}", e);
            }
        }
    }
}

#[async_trait]
impl DeliveryChannel for WebhookChannel {
    async fn notify_pending(&self, notification: &PendingNotification) {
        self.post(json!({
            "event": "approval_required",
            "requestId": notification.request_id.0,
            "taskToken": notification.decision_token.0,
            "name": notification.name,
            "course": notification.course,
            "cost": notification.cost,
            "approvalUrl": notification.approval_url,
        }))
        .await;
    }

    async fn notify_decided(&self, request_id: &RequestId, decision: Decision) {
        self.post(json!({
            "event": "decision",
            "requestId": request_id.0,
            "decision": decision.as_str(),
        }))
        .await;
    }
}
