//! Check engine module.
//!
//! Provides the per-run context, the claims log, check orchestration and
//! result aggregation.

pub mod claims;
pub mod context;
pub mod orchestrator;
pub mod result;
