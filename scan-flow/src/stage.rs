use async_trait::async_trait;

use crate::error::Result;

/// Defines what should happen after a stage completes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageAction {
    /// Continue to the next stage in order
    Continue,
    /// Skip ahead to a specific stage by ID
    Jump(String),
    /// Stop the pipeline here
    Halt,
}

/// Core trait that all pipeline stages must implement.
///
/// A stage reads and mutates the typed pipeline state `S` directly; there is
/// no loosely-typed context map, so the fields a stage may touch are visible
/// in the state struct itself.
#[async_trait]
pub trait Stage<S: Send>: Send + Sync {
    /// Unique identifier for this stage
    fn id(&self) -> &str;

    /// Execute the stage against the shared pipeline state
    async fn run(&self, state: &mut S) -> Result<StageAction>;
}
