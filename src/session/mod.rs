//! Voice call session management
//!
//! This module provides the `CallSessionController` that manages:
//! - Microphone acquisition and release
//! - Transport connect with retry/backoff and voice fallback
//! - Transcript reconciliation and live signals while the call is active
//! - Teardown from every state, cancelling stale continuations by epoch

mod config;
mod controller;
mod state;
mod stats;

pub use config::{CallConfig, ControllerOptions, RetryPolicy};
pub use controller::CallSessionController;
pub use state::{CallSession, CallState};
pub use stats::CallStats;
