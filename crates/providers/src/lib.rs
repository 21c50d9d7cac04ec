//! HTTP clients for timegap's external collaborators.
//!
//! - [`ActivityWatchClient`] implements `ActivitySource` (capture)
//! - [`TogglClient`] implements `TrackingSource` (read-only tracking)
//! - [`OpenAiCompatProvider`] implements `Consolidator`
//!
//! Every client carries a request timeout from the network config.

pub mod activitywatch;
mod http;
pub mod openai_compat;
pub mod toggl;

pub use activitywatch::ActivityWatchClient;
pub use openai_compat::OpenAiCompatProvider;
pub use toggl::TogglClient;
