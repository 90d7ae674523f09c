//! HTTP surface for the coordinator and the approval gateway.
//!
//! Three operations: `POST /request`, `GET /request/{id}`,
//! `POST /approval`, plus a token-free operational listing at
//! `GET /requests`. Every failure is `{"error": "..."}` with the status
//! code fixed by the error taxonomy; no response ever carries the
//! decision token.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::error;

use greenlight_core::{Decision, DecisionToken, Request, RequestId, RequestStatus};

use crate::error::WorkflowError;
use crate::{approval, coordinator, AppState};

impl IntoResponse for WorkflowError {
    fn into_response(self) -> Response {
        let status = match &self {
            WorkflowError::Validation(_) => StatusCode::BAD_REQUEST,
            WorkflowError::NotFound => StatusCode::NOT_FOUND,
            WorkflowError::Authorization => StatusCode::FORBIDDEN,
            WorkflowError::AlreadyDecided(_) => StatusCode::CONFLICT,
            WorkflowError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {}", self);
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct CreateRequestPayload {
    name: String,
    course: String,
    cost: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DecisionPayload {
    request_id: String,
    task_token: String,
    decision: String,
}

/// Read model for a request. Deliberately has no token field, so the
/// token cannot leak through any read endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestView {
    pub request_id: String,
    pub name: String,
    pub course: String,
    pub cost: f64,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,
}

impl From<&Request> for RequestView {
    fn from(request: &Request) -> Self {
        Self {
            request_id: request.id.0.clone(),
            name: request.name.clone(),
            course: request.course.clone(),
            cost: request.cost,
            status: request.status,
            created_at: request.created_at,
            decided_at: request.decided_at,
        }
    }
}

/// Parse a JSON body, mapping malformed input to a 400 with the
/// structured error shape (axum's own rejection would answer in plain
/// text).
fn parse_body<T: serde::de::DeserializeOwned>(body: &Bytes) -> Result<T, WorkflowError> {
    serde_json::from_slice(body)
        .map_err(|e| WorkflowError::Validation(format!("Invalid request body: {}", e)))
}

async fn create_request_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, WorkflowError> {
    let payload: CreateRequestPayload = parse_body(&body)?;

    let id = coordinator::create_request(&state, &payload.name, &payload.course, payload.cost)
        .await?;

    Ok(Json(json!({
        "message": "Request submitted successfully",
        "requestId": id.0,
    })))
}

async fn get_status_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<RequestView>, WorkflowError> {
    let request = coordinator::get_status(&state, &RequestId::from(id)).await?;
    Ok(Json(RequestView::from(&request)))
}

async fn submit_decision_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, WorkflowError> {
    let payload: DecisionPayload = parse_body(&body)?;
    let decision: Decision = payload.decision.parse()?;

    let request = approval::submit_decision(
        &state,
        &RequestId::from(payload.request_id),
        &DecisionToken::from(payload.task_token),
        decision,
    )
    .await?;

    Ok(Json(json!({
        "message": format!("Request {} successfully", decision),
        "requestId": request.id.0,
        "status": request.status,
    })))
}

async fn list_requests_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, WorkflowError> {
    let requests = coordinator::list_requests(&state).await?;
    let views: Vec<RequestView> = requests.iter().map(RequestView::from).collect();
    Ok(Json(json!({ "requests": views })))
}

pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/request", post(create_request_handler))
        .route("/request/{id}", get(get_status_handler))
        .route("/approval", post(submit_decision_handler))
        .route("/requests", get(list_requests_handler))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{header, Request as HttpRequest};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;
    use crate::notify::testing::CapturingChannel;
    use crate::repository::InMemoryRepository;

    fn test_app() -> (Router, Arc<AppState>) {
        let state = Arc::new(AppState {
            repository: Arc::new(InMemoryRepository::new()),
            delivery: Arc::new(CapturingChannel::default()),
            store_timeout: Duration::from_secs(5),
            approval_base_url: None,
        });
        (api_router().with_state(state.clone()), state)
    }

    fn post_json(uri: &str, body: serde_json::Value) -> HttpRequest<Body> {
        HttpRequest::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> HttpRequest<Body> {
        HttpRequest::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn create(app: &Router) -> String {
        let response = app
            .clone()
            .oneshot(post_json(
                "/request",
                json!({"name": "Alice", "course": "AWS Certified Developer", "cost": 150}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        body["requestId"].as_str().unwrap().to_string()
    }

    async fn stored_token(state: &AppState, id: &str) -> String {
        state
            .repository
            .get(&RequestId::from(id))
            .await
            .unwrap()
            .unwrap()
            .decision_token
            .0
    }

    #[tokio::test]
    async fn test_create_returns_request_id_without_token() {
        let (app, state) = test_app();

        let response = app
            .oneshot(post_json(
                "/request",
                json!({"name": "Alice", "course": "AWS", "cost": 150}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["message"], "Request submitted successfully");
        let id = body["requestId"].as_str().unwrap();

        // The token exists server-side but is not in the response.
        let token = stored_token(&state, id).await;
        assert!(!body.to_string().contains(&token));
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_input() {
        let (app, _state) = test_app();

        for payload in [
            json!({"name": "", "course": "X", "cost": 10}),
            json!({"name": "A", "course": "X", "cost": -5}),
            json!({"name": "A", "course": "X"}),
        ] {
            let response = app.clone().oneshot(post_json("/request", payload)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let body = body_json(response).await;
            assert!(body["error"].is_string());
            assert!(body.get("requestId").is_none());
        }
    }

    #[tokio::test]
    async fn test_create_rejects_malformed_body() {
        let (app, _state) = test_app();

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/request")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_status_reflects_creation_and_hides_token() {
        let (app, state) = test_app();
        let id = create(&app).await;

        let response = app
            .oneshot(get_request(&format!("/request/{}", id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["requestId"], id.as_str());
        assert_eq!(body["name"], "Alice");
        assert_eq!(body["course"], "AWS Certified Developer");
        assert_eq!(body["cost"], 150.0);
        assert_eq!(body["status"], "PENDING");

        let token = stored_token(&state, &id).await;
        assert!(!body.to_string().contains(&token));
    }

    #[tokio::test]
    async fn test_status_unknown_id_is_404() {
        let (app, _state) = test_app();
        let response = app
            .oneshot(get_request("/request/does-not-exist"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_approval_flow_with_replay_conflict() {
        let (app, state) = test_app();
        let id = create(&app).await;
        let token = stored_token(&state, &id).await;

        let response = app
            .clone()
            .oneshot(post_json(
                "/approval",
                json!({"requestId": id, "taskToken": token, "decision": "APPROVED"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "APPROVED");

        // Replaying the consumed token is a conflict, not an auth error.
        let response = app
            .clone()
            .oneshot(post_json(
                "/approval",
                json!({"requestId": id, "taskToken": token, "decision": "REJECTED"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = app
            .oneshot(get_request(&format!("/request/{}", id)))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["status"], "APPROVED");
    }

    #[tokio::test]
    async fn test_approval_wrong_token_is_403() {
        let (app, _state) = test_app();
        let id = create(&app).await;

        let response = app
            .clone()
            .oneshot(post_json(
                "/approval",
                json!({"requestId": id, "taskToken": "wrong", "decision": "APPROVED"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .oneshot(get_request(&format!("/request/{}", id)))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["status"], "PENDING");
    }

    #[tokio::test]
    async fn test_approval_unknown_id_is_404() {
        let (app, _state) = test_app();
        let response = app
            .oneshot(post_json(
                "/approval",
                json!({"requestId": "does-not-exist", "taskToken": "any", "decision": "APPROVED"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_approval_rejects_unknown_decision_literal() {
        let (app, state) = test_app();
        let id = create(&app).await;
        let token = stored_token(&state, &id).await;

        for decision in ["MAYBE", "approved", ""] {
            let response = app
                .clone()
                .oneshot(post_json(
                    "/approval",
                    json!({"requestId": id, "taskToken": token, "decision": decision}),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }

        // Nothing transitioned.
        let response = app
            .oneshot(get_request(&format!("/request/{}", id)))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["status"], "PENDING");
    }

    #[tokio::test]
    async fn test_list_hides_tokens() {
        let (app, state) = test_app();
        let first = create(&app).await;
        let second = create(&app).await;

        let response = app.oneshot(get_request("/requests")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;

        let requests = body["requests"].as_array().unwrap();
        assert_eq!(requests.len(), 2);

        let serialized = body.to_string();
        for id in [&first, &second] {
            let token = stored_token(&state, id).await;
            assert!(!serialized.contains(&token));
        }
    }
}
