pub mod api;
pub mod approval;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod notify;
pub mod repository;

use std::sync::Arc;
use std::time::Duration;

pub use error::WorkflowError;
pub use notify::{DeliveryChannel, LogChannel, PendingNotification, WebhookChannel};
pub use repository::{InMemoryRepository, RequestRepository, SqliteRepository};

/// Shared state for all handlers.
///
/// The repository is the only shared mutable resource; everything else
/// is configuration fixed at startup.
pub struct AppState {
    pub repository: Arc<dyn RequestRepository>,
    pub delivery: Arc<dyn DeliveryChannel>,
    pub store_timeout: Duration,
    pub approval_base_url: Option<String>,
}
