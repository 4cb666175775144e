use crate::session::{CallConfig, CallSessionController};
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// The single call controller this service drives
    pub controller: Arc<CallSessionController>,

    /// Config used for `POST /call/start` before request overrides
    pub default_call: CallConfig,
}

impl AppState {
    pub fn new(controller: Arc<CallSessionController>, default_call: CallConfig) -> Self {
        Self {
            controller,
            default_call,
        }
    }
}
