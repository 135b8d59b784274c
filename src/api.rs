//! HTTP API for the interview coach

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;

use crate::llm::CompletionClient;
use crate::runtime::SessionManager;
use std::sync::Arc;
use std::time::Duration;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
}

impl AppState {
    pub fn new(client: Option<Arc<dyn CompletionClient>>, request_timeout: Duration) -> Self {
        Self {
            sessions: Arc::new(SessionManager::new(client, request_timeout)),
        }
    }
}
