use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::{
    error::{FlowError, Result},
    stage::{Stage, StageAction},
};

/// Outcome of a full pipeline run
#[derive(Debug, Clone)]
pub struct PipelineRun {
    /// IDs of the stages that executed, in execution order
    pub executed: Vec<String>,
}

/// An ordered sequence of stages executed against a shared typed state.
///
/// Unlike a step-per-request workflow, a pipeline always runs to completion
/// in a single call: stages execute in order, and a stage may jump forward
/// past stages that do not apply (e.g. skipping localization for a normal
/// scan) or halt the run entirely.
pub struct Pipeline<S: Send> {
    name: String,
    stages: Vec<Arc<dyn Stage<S>>>,
    index: HashMap<String, usize>,
}

impl<S: Send> Pipeline<S> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Execute every applicable stage in order, honoring jumps and halts.
    pub async fn run(&self, state: &mut S) -> Result<PipelineRun> {
        let mut position = 0;
        let mut executed = Vec::with_capacity(self.stages.len());

        while position < self.stages.len() {
            let stage = &self.stages[position];
            debug!(pipeline = %self.name, stage = stage.id(), "running stage");

            let action = stage.run(state).await?;
            executed.push(stage.id().to_string());

            match action {
                StageAction::Continue => position += 1,
                StageAction::Jump(target) => {
                    position = *self
                        .index
                        .get(&target)
                        .ok_or_else(|| FlowError::StageNotFound(target.clone()))?;
                }
                StageAction::Halt => break,
            }
        }

        Ok(PipelineRun { executed })
    }
}

/// Builder for constructing pipelines
pub struct PipelineBuilder<S: Send> {
    name: String,
    stages: Vec<Arc<dyn Stage<S>>>,
}

impl<S: Send> PipelineBuilder<S> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
        }
    }

    pub fn add_stage(mut self, stage: Arc<dyn Stage<S>>) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn build(self) -> Pipeline<S> {
        let index = self
            .stages
            .iter()
            .enumerate()
            .map(|(i, stage)| (stage.id().to_string(), i))
            .collect();

        Pipeline {
            name: self.name,
            stages: self.stages,
            index,
        }
    }
}
