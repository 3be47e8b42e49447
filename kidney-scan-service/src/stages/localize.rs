use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use scan_flow::{FlowError, Result, Stage, StageAction};
use tokio::fs;
use tracing::info;

use super::{AnalysisContext, LOCALIZE_STAGE};
use crate::inference::{Localizer, annotate};
use crate::uploads;

/// Fixed detector confidence threshold
pub const CONFIDENCE_THRESHOLD: f32 = 0.15;

/// Runs the detector on abnormal scans, persists the annotated image, and
/// records the boxes. Previously persisted annotated images are purged
/// first (best-effort; the directory is shared).
pub struct LocalizeStage {
    localizer: Arc<dyn Localizer>,
    localized_dir: PathBuf,
}

impl LocalizeStage {
    pub fn new(localizer: Arc<dyn Localizer>, localized_dir: PathBuf) -> Self {
        Self {
            localizer,
            localized_dir,
        }
    }
}

#[async_trait]
impl Stage<AnalysisContext> for LocalizeStage {
    fn id(&self) -> &str {
        LOCALIZE_STAGE
    }

    async fn run(&self, state: &mut AnalysisContext) -> Result<StageAction> {
        uploads::purge_localized(&self.localized_dir).await;

        let localizer = self.localizer.clone();
        let image = state.image.clone();

        let detections =
            tokio::task::spawn_blocking(move || localizer.detect(&image, CONFIDENCE_THRESHOLD))
                .await
                .map_err(|err| {
                    FlowError::StageFailed(format!("localization task panicked: {err}"))
                })?
                .map_err(|err| FlowError::StageFailed(format!("localization failed: {err}")))?;

        if detections.is_empty() {
            info!("Detector returned no regions above threshold");
            return Ok(StageAction::Continue);
        }

        state.boxes = detections.iter().map(|d| d.bbox).collect();

        fs::create_dir_all(&self.localized_dir)
            .await
            .map_err(|err| FlowError::StageFailed(format!("localized dir unavailable: {err}")))?;

        let filename = uploads::localized_filename(&state.safe_name, uploads::unix_timestamp());
        let path = self.localized_dir.join(&filename);

        let image = state.image.clone();
        let boxes = state.boxes.clone();
        tokio::task::spawn_blocking(move || annotate(&image, &boxes).save(&path))
            .await
            .map_err(|err| FlowError::StageFailed(format!("annotation task panicked: {err}")))?
            .map_err(|err| {
                FlowError::StageFailed(format!("failed to save annotated image: {err}"))
            })?;

        info!("Annotated image saved as {filename}");
        state.localized_image_url = Some(format!("localized/{filename}"));

        Ok(StageAction::Continue)
    }
}
