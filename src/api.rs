//! HTTP API for coder-chat

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;
pub use types::*;

use crate::runtime::DynChatService;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DynChatService>,
}

impl AppState {
    pub fn new(service: Arc<DynChatService>) -> Self {
        Self { service }
    }
}
