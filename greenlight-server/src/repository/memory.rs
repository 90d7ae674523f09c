//! In-memory implementation of `RequestRepository`.
//!
//! All state is held in memory and lost on restart. The
//! check-and-transition runs under a single write lock, which gives the
//! same atomicity as the SQLite backend's conditional write as long as
//! only one process is running.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use greenlight_core::{Decision, DecisionToken, Request, RequestId, RequestStatus};

use super::{DecideOutcome, RepositoryError, RequestRepository};

/// In-memory request repository.
pub struct InMemoryRepository {
    requests: RwLock<HashMap<RequestId, Request>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self {
            requests: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RequestRepository for InMemoryRepository {
    async fn insert(&self, request: &Request) -> Result<(), RepositoryError> {
        let mut requests = self.requests.write().await;
        if requests.contains_key(&request.id) {
            return Err(RepositoryError::storage(
                "insert",
                format!("duplicate request id {}", request.id),
            ));
        }
        requests.insert(request.id.clone(), request.clone());
        Ok(())
    }

    async fn get(&self, id: &RequestId) -> Result<Option<Request>, RepositoryError> {
        let requests = self.requests.read().await;
        Ok(requests.get(id).cloned())
    }

    async fn decide(
        &self,
        id: &RequestId,
        token: &DecisionToken,
        decision: Decision,
        decided_at: DateTime<Utc>,
    ) -> Result<DecideOutcome, RepositoryError> {
        // Check and transition under one write lock so that no second
        // caller can interleave between the status check and the write.
        let mut requests = self.requests.write().await;

        let request = match requests.get_mut(id) {
            Some(request) => request,
            None => return Ok(DecideOutcome::NotFound),
        };

        if request.status != RequestStatus::Pending {
            return Ok(DecideOutcome::AlreadyDecided(request.status));
        }

        if request.decision_token != *token {
            return Ok(DecideOutcome::TokenMismatch);
        }

        request.status = decision.terminal_status();
        request.decided_at = Some(decided_at);

        Ok(DecideOutcome::Applied(request.clone()))
    }

    async fn list(&self) -> Result<Vec<Request>, RepositoryError> {
        let requests = self.requests.read().await;
        let mut all: Vec<Request> = requests.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use greenlight_core::RequestSubmission;

    fn pending_request() -> Request {
        let submission = RequestSubmission::new("Alice", "AWS Certified Developer", 150.0)
            .expect("valid submission");
        Request::create(submission)
    }

    #[tokio::test]
    async fn test_insert_and_get_roundtrip() {
        let repo = InMemoryRepository::new();
        let request = pending_request();
        repo.insert(&request).await.unwrap();

        let fetched = repo.get(&request.id).await.unwrap();
        assert_eq!(fetched, Some(request));
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_id() {
        let repo = InMemoryRepository::new();
        let request = pending_request();
        repo.insert(&request).await.unwrap();
        assert!(repo.insert(&request).await.is_err());
    }

    #[tokio::test]
    async fn test_get_unknown_id_is_none() {
        let repo = InMemoryRepository::new();
        let fetched = repo.get(&RequestId::from("does-not-exist")).await.unwrap();
        assert_eq!(fetched, None);
    }

    #[tokio::test]
    async fn test_decide_applies_once() {
        let repo = InMemoryRepository::new();
        let request = pending_request();
        let token = request.decision_token.clone();
        repo.insert(&request).await.unwrap();

        let outcome = repo
            .decide(&request.id, &token, Decision::Approved, Utc::now())
            .await
            .unwrap();
        match outcome {
            DecideOutcome::Applied(decided) => {
                assert_eq!(decided.status, RequestStatus::Approved);
                assert!(decided.decided_at.is_some());
            }
            other => panic!("expected Applied, got {:?}", other),
        }

        // Same token again: the request is terminal, so the token no
        // longer authorizes anything.
        let outcome = repo
            .decide(&request.id, &token, Decision::Rejected, Utc::now())
            .await
            .unwrap();
        assert_eq!(
            outcome,
            DecideOutcome::AlreadyDecided(RequestStatus::Approved)
        );

        let stored = repo.get(&request.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::Approved);
    }

    #[tokio::test]
    async fn test_decide_wrong_token_leaves_request_pending() {
        let repo = InMemoryRepository::new();
        let request = pending_request();
        repo.insert(&request).await.unwrap();

        let outcome = repo
            .decide(
                &request.id,
                &DecisionToken::from("wrong-token".to_string()),
                Decision::Approved,
                Utc::now(),
            )
            .await
            .unwrap();
        assert_eq!(outcome, DecideOutcome::TokenMismatch);

        let stored = repo.get(&request.id).await.unwrap().unwrap();
        assert_eq!(stored.status, RequestStatus::Pending);
        assert!(stored.decided_at.is_none());
    }

    #[tokio::test]
    async fn test_decide_unknown_id() {
        let repo = InMemoryRepository::new();
        let outcome = repo
            .decide(
                &RequestId::from("does-not-exist"),
                &DecisionToken::from("any".to_string()),
                Decision::Approved,
                Utc::now(),
            )
            .await
            .unwrap();
        assert_eq!(outcome, DecideOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_concurrent_decides_have_one_winner() {
        let repo = std::sync::Arc::new(InMemoryRepository::new());
        let request = pending_request();
        let token = request.decision_token.clone();
        repo.insert(&request).await.unwrap();

        let approve = {
            let repo = repo.clone();
            let id = request.id.clone();
            let token = token.clone();
            tokio::spawn(
                async move { repo.decide(&id, &token, Decision::Approved, Utc::now()).await },
            )
        };
        let reject = {
            let repo = repo.clone();
            let id = request.id.clone();
            tokio::spawn(
                async move { repo.decide(&id, &token, Decision::Rejected, Utc::now()).await },
            )
        };

        let a = approve.await.unwrap().unwrap();
        let b = reject.await.unwrap().unwrap();

        // Exactly one must win; the loser observes the winner's terminal
        // status, never a merged or intermediate state.
        let winner = match (a, b) {
            (DecideOutcome::Applied(w), DecideOutcome::AlreadyDecided(s)) => {
                assert_eq!(s, w.status);
                w
            }
            (DecideOutcome::AlreadyDecided(s), DecideOutcome::Applied(w)) => {
                assert_eq!(s, w.status);
                w
            }
            other => panic!("expected exactly one winner, got {:?}", other),
        };

        let stored = repo.get(&request.id).await.unwrap().unwrap();
        assert_eq!(stored.status, winner.status);
        assert!(stored.status.is_terminal());
    }

    #[tokio::test]
    async fn test_list_is_newest_first_and_complete() {
        let repo = InMemoryRepository::new();
        let first = pending_request();
        repo.insert(&first).await.unwrap();
        let second = pending_request();
        repo.insert(&second).await.unwrap();

        let all = repo.list().await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[0].created_at >= all[1].created_at);
    }
}
