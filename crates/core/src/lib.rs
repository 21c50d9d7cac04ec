//! # timegap core
//!
//! Domain types, collaborator traits, and error definitions for timegap.
//! This crate has **no I/O of its own**. It defines the model that the
//! reconciliation algorithms, the HTTP clients, and the interactive session
//! all agree on.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (activity capture, time tracking,
//! consolidation) is a trait here. Implementations live in their
//! respective crates. This enables:
//! - Swapping backends via configuration
//! - Testing the control loop with scripted collaborators
//! - Clean dependency graph (all crates depend inward on core)

pub mod activity;
pub mod consolidation;
pub mod error;
pub mod event;
pub mod tracking;
pub mod window;

// Re-export key types at crate root for ergonomics
pub use activity::{ActivitySource, Bucket, CapturedEvent, RawActivitySample};
pub use consolidation::{
    ConsolidatedBlock, ConsolidationRequest, Consolidator, RawConsolidation, TimeEntryRecord,
};
pub use error::{Error, MalformedResult, NormalizationError, ProviderError, Result, SourceError};
pub use event::{EventBus, GapState, SessionEvent};
pub use tracking::{TrackedEntry, TrackingSource};
pub use window::{Gap, TimeWindow};
