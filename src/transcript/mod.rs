//! Live transcript reconciliation
//!
//! Merges interim and final fragments from the caller and the agent into an
//! append-only history where each speaker has at most one provisional entry.

mod entry;
mod reconciler;

pub use entry::{Speaker, TranscriptEntry};
pub use reconciler::{AppliedFragment, FragmentKind, TranscriptReconciler};
