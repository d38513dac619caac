//! Resume analysis: the cache-first orchestrator, the validation gate in front of the cache,
//! and the HTTP handlers that feed it.

pub mod extract;
pub mod handlers;
pub mod inflight;
pub mod orchestrator;
pub mod retry;
pub mod schema;
pub mod usage;
pub mod validation;

pub use orchestrator::AnalysisOrchestrator;
pub use retry::RetryPolicy;
pub use usage::Pricing;
