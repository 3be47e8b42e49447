use std::sync::Arc;

use async_trait::async_trait;
use scan_flow::{FlowError, Result, Stage, StageAction};
use tracing::info;

use super::{AnalysisContext, CLASSIFY_STAGE, REPORT_STAGE};
use crate::inference::Classifier;

/// First pipeline stage: classify the uploaded scan. Normal scans skip
/// straight to the report stage; abnormal ones continue into localization.
pub struct ClassifyStage {
    classifier: Arc<dyn Classifier>,
}

impl ClassifyStage {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self { classifier }
    }
}

#[async_trait]
impl Stage<AnalysisContext> for ClassifyStage {
    fn id(&self) -> &str {
        CLASSIFY_STAGE
    }

    async fn run(&self, state: &mut AnalysisContext) -> Result<StageAction> {
        let classifier = self.classifier.clone();
        let image = state.image.clone();

        let label = tokio::task::spawn_blocking(move || classifier.classify(&image))
            .await
            .map_err(|err| FlowError::StageFailed(format!("classification task panicked: {err}")))?
            .map_err(|err| FlowError::StageFailed(format!("classification failed: {err}")))?;

        info!("Image classified as {label}");
        state.label = Some(label);

        if label.is_abnormal() {
            Ok(StageAction::Continue)
        } else {
            Ok(StageAction::Jump(REPORT_STAGE.to_string()))
        }
    }
}
