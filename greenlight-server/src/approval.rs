//! Approval gateway: the single atomic check-and-transition.
//!
//! `submit_decision` is the only mutation after creation. The repository
//! performs the status check, the token check, and the terminal write as
//! one indivisible conditional operation, so two concurrent submissions
//! for the same request can never both win and never leave a merged
//! state. The loser gets `AlreadyDecided`, not a fault.

use chrono::Utc;
use tracing::{info, warn};

use greenlight_core::{Decision, DecisionToken, Request, RequestId};

use crate::error::WorkflowError;
use crate::repository::{bounded, DecideOutcome};
use crate::AppState;

/// Resolve a pending request with the presented token.
///
/// On success the token is implicitly consumed (the request is no longer
/// `PENDING`, so no later presentation can match), and a fire-and-forget
/// decided-notification signals the parked workflow to resume.
pub async fn submit_decision(
    state: &AppState,
    id: &RequestId,
    token: &DecisionToken,
    decision: Decision,
) -> Result<Request, WorkflowError> {
    let outcome = bounded(
        state.store_timeout,
        "decide",
        state.repository.decide(id, token, decision, Utc::now()),
    )
    .await?;

    match outcome {
        DecideOutcome::Applied(request) => {
            info!("Request {} transitioned to {}", request.id, request.status);

            let delivery = state.delivery.clone();
            let request_id = request.id.clone();
            tokio::spawn(async move {
                delivery.notify_decided(&request_id, decision).await;
            });

            Ok(request)
        }
        DecideOutcome::NotFound => Err(WorkflowError::NotFound),
        DecideOutcome::AlreadyDecided(status) => Err(WorkflowError::AlreadyDecided(status)),
        DecideOutcome::TokenMismatch => {
            warn!("Rejected decision for request {}: token mismatch", id);
            Err(WorkflowError::Authorization)
        }
    }
}
