//! HTTP API for driving the call controller
//!
//! - POST /call/start - Start a call (optional `assistant_id`, `voice`)
//! - POST /call/end - End the current call
//! - POST /call/reset - Acknowledge a failed call
//! - POST /call/mute - Mute or unmute the caller
//! - GET /call/status - Call statistics
//! - GET /call/session - Raw session snapshot
//! - GET /call/transcript - Reconciled transcript
//! - GET /call/signals - Emotion and latency signals
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
