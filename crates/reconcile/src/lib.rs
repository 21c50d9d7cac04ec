//! Reconciliation of tracked time against captured activity.
//!
//! Everything here is a pure transform over the core types:
//!
//! 1. **Normalize** raw capture events into ordered, non-AFK samples
//! 2. **Detect gaps**: the parts of the window no tracked entry covers
//! 3. **Assemble** one bounded consolidation request per gap
//! 4. **Estimate** its token cost while the user edits context
//! 5. **Validate** what the consolidation service sends back
//!
//! No I/O happens in this crate apart from reading a prompt file.

pub mod gaps;
pub mod normalize;
pub mod payload;
pub mod pricing;
pub mod prompt;
pub mod token;
pub mod validate;

pub use gaps::GapDetector;
pub use normalize::{NormalizedSamples, normalize, parse_event};
pub use payload::PayloadAssembler;
pub use pricing::{ModelPricing, PricingTable};
pub use prompt::PromptTemplate;
pub use token::{TokenEstimate, estimate_tokens};
pub use validate::ResultValidator;
