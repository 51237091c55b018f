//! AI Analysis Module
//!
//! Memecoin analysis over the Cortensor completion backend: prompt
//! construction, layered response parsing, and the per-token retry engine
//! that turns raw model output into scored analysis records.

pub mod engine;
pub mod prompts;
pub mod schema;

// Re-exports
pub use engine::{AnalysisEngine, AnalysisVerdict, SkipReason};
pub use schema::TokenVerdict;
