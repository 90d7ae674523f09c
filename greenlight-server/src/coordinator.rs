//! Workflow coordinator: request creation and status queries.
//!
//! The coordinator validates input, generates the identifier and the
//! single-use decision token, persists the `PENDING` record, and hands
//! the token to the delivery channel. The token never travels back to
//! the requester; `get_status` and `list_requests` are pure reads.

use tracing::info;

use greenlight_core::{Request, RequestId, RequestSubmission};

use crate::error::WorkflowError;
use crate::notify::PendingNotification;
use crate::repository::bounded;
use crate::AppState;

/// Validate and persist a new reimbursement request, then notify the
/// delivery channel asynchronously.
///
/// Returns the identifier only. Delivery is fire-and-forget: a failing
/// or slow channel never fails creation.
pub async fn create_request(
    state: &AppState,
    name: &str,
    course: &str,
    cost: f64,
) -> Result<RequestId, WorkflowError> {
    let submission = RequestSubmission::new(name, course, cost)?;
    let request = Request::create(submission);

    bounded(
        state.store_timeout,
        "insert",
        state.repository.insert(&request),
    )
    .await?;

    info!(
        "Created request {} for '{}' ({}, ${})",
        request.id, request.name, request.course, request.cost
    );

    let notification = PendingNotification {
        request_id: request.id.clone(),
        decision_token: request.decision_token.clone(),
        name: request.name.clone(),
        course: request.course.clone(),
        cost: request.cost,
        approval_url: approval_url(state.approval_base_url.as_deref(), &request),
    };
    let delivery = state.delivery.clone();
    tokio::spawn(async move {
        delivery.notify_pending(&notification).await;
    });

    Ok(request.id)
}

/// Look up a request by identifier. Pure read, safe to poll.
pub async fn get_status(state: &AppState, id: &RequestId) -> Result<Request, WorkflowError> {
    let request = bounded(state.store_timeout, "get", state.repository.get(id)).await?;
    request.ok_or(WorkflowError::NotFound)
}

/// All requests, newest first. Callers must strip the token before
/// exposing these records.
pub async fn list_requests(state: &AppState) -> Result<Vec<Request>, WorkflowError> {
    let requests = bounded(state.store_timeout, "list", state.repository.list()).await?;
    Ok(requests)
}

/// Build the ready-made approval link carried in pending-notifications,
/// when a base URL is configured.
fn approval_url(base_url: Option<&str>, request: &Request) -> Option<String> {
    base_url.map(|base| {
        format!(
            "{}/approval?requestId={}&taskToken={}",
            base.trim_end_matches('/'),
            request.id,
            request.decision_token.0,
        )
    })
}
