//! Pipeline coordination for reelsmith.
//!
//! Glues the in-memory job ledger to the provider orchestrator: stage jobs
//! are created and sequenced here, and the render stage is driven through
//! the generate → poll → download protocol.

pub mod coordinator;
pub mod status;

pub use coordinator::{PipelineCoordinator, PipelineError};
pub use status::PipelineStatus;
