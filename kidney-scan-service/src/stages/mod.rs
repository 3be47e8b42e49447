mod classify;
mod localize;
mod regions;
mod report;

pub use classify::ClassifyStage;
pub use localize::{CONFIDENCE_THRESHOLD, LocalizeStage};
pub use regions::{RegionStage, map_boxes_to_regions};
pub use report::{ReportStage, generate_medical_report};

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use image::DynamicImage;
use scan_flow::{Pipeline, PipelineBuilder};

use crate::inference::{Classifier, Localizer};
use crate::models::{AnalysisOutcome, BoundingBox, KidneyClass, Localization};

pub const CLASSIFY_STAGE: &str = "classify";
pub const LOCALIZE_STAGE: &str = "localize";
pub const REGIONS_STAGE: &str = "regions";
pub const REPORT_STAGE: &str = "report";

/// Mutable state threaded through one analysis run. Filled in stage order;
/// converted into an immutable [`AnalysisOutcome`] once the pipeline
/// completes.
pub struct AnalysisContext {
    pub image: DynamicImage,
    pub safe_name: String,
    pub label: Option<KidneyClass>,
    pub boxes: Vec<BoundingBox>,
    pub regions: Vec<String>,
    pub localized_image_url: Option<String>,
    pub report: Option<String>,
}

impl AnalysisContext {
    pub fn new(image: DynamicImage, safe_name: String) -> Self {
        Self {
            image,
            safe_name,
            label: None,
            boxes: Vec::new(),
            regions: Vec::new(),
            localized_image_url: None,
            report: None,
        }
    }

    /// Collapse the finished run into the session-held outcome. Boxes and the
    /// annotated-image URL become a single optional pair, so a partially
    /// localized result cannot be represented.
    pub fn into_outcome(self) -> anyhow::Result<AnalysisOutcome> {
        let label = self.label.ok_or_else(|| anyhow!("pipeline produced no label"))?;
        let report = self
            .report
            .ok_or_else(|| anyhow!("pipeline produced no report"))?;

        let localization = match self.localized_image_url {
            Some(image_url) if !self.boxes.is_empty() => Some(Localization {
                boxes: self.boxes,
                regions: self.regions,
                image_url,
            }),
            Some(_) => return Err(anyhow!("annotated image persisted without boxes")),
            None => None,
        };

        Ok(AnalysisOutcome {
            label,
            report,
            localization,
        })
    }
}

/// Assemble the upload-analysis pipeline:
/// classify -> localize -> regions -> report, with normal scans jumping from
/// classification straight to the report.
pub fn build_analysis_pipeline(
    classifier: Arc<dyn Classifier>,
    localizer: Arc<dyn Localizer>,
    localized_dir: PathBuf,
) -> Pipeline<AnalysisContext> {
    PipelineBuilder::new("scan_analysis")
        .add_stage(Arc::new(ClassifyStage::new(classifier)))
        .add_stage(Arc::new(LocalizeStage::new(localizer, localized_dir)))
        .add_stage(Arc::new(RegionStage))
        .add_stage(Arc::new(ReportStage))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Detection;

    struct FixedClassifier(KidneyClass);

    impl Classifier for FixedClassifier {
        fn classify(&self, _image: &DynamicImage) -> anyhow::Result<KidneyClass> {
            Ok(self.0)
        }
    }

    struct FixedLocalizer(Vec<Detection>);

    impl Localizer for FixedLocalizer {
        fn detect(
            &self,
            _image: &DynamicImage,
            confidence: f32,
        ) -> anyhow::Result<Vec<Detection>> {
            Ok(self
                .0
                .iter()
                .copied()
                .filter(|d| d.confidence >= confidence)
                .collect())
        }
    }

    fn test_image() -> DynamicImage {
        DynamicImage::new_rgb8(64, 64)
    }

    fn detection(x: f32, y: f32, confidence: f32) -> Detection {
        Detection {
            bbox: BoundingBox::new(x, y, x + 20.0, y + 20.0),
            confidence,
        }
    }

    #[tokio::test]
    async fn normal_scan_skips_localization_entirely() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = build_analysis_pipeline(
            Arc::new(FixedClassifier(KidneyClass::Normal)),
            Arc::new(FixedLocalizer(vec![detection(10.0, 10.0, 0.9)])),
            dir.path().to_path_buf(),
        );

        let mut ctx = AnalysisContext::new(test_image(), "scan.png".to_string());
        let run = pipeline.run(&mut ctx).await.unwrap();

        assert_eq!(run.executed, vec![CLASSIFY_STAGE, REPORT_STAGE]);

        let outcome = ctx.into_outcome().unwrap();
        assert_eq!(outcome.label, KidneyClass::Normal);
        assert!(outcome.localization.is_none());
        assert!(outcome.report.contains("No abnormalities detected"));
        // nothing was written to the localized-image directory
        assert_eq!(std::fs::read_dir(dir.path()).map(|d| d.count()).unwrap_or(0), 0);
    }

    #[tokio::test]
    async fn abnormal_scan_localizes_maps_and_reports() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = build_analysis_pipeline(
            Arc::new(FixedClassifier(KidneyClass::Stone)),
            Arc::new(FixedLocalizer(vec![
                detection(20.0, 20.0, 0.8),
                detection(400.0, 400.0, 0.5),
            ])),
            dir.path().to_path_buf(),
        );

        let mut ctx = AnalysisContext::new(test_image(), "scan.png".to_string());
        let run = pipeline.run(&mut ctx).await.unwrap();
        assert_eq!(
            run.executed,
            vec![CLASSIFY_STAGE, LOCALIZE_STAGE, REGIONS_STAGE, REPORT_STAGE]
        );

        let outcome = ctx.into_outcome().unwrap();
        let localization = outcome.localization.expect("abnormal scan localizes");
        assert_eq!(localization.boxes.len(), 2);
        assert_eq!(
            localization.regions,
            vec!["Top Left".to_string(), "Bottom Right".to_string()]
        );
        assert!(localization.image_url.starts_with("localized/scan.png_"));
        assert!(localization.image_url.ends_with("_localized.png"));
        assert!(outcome.report.contains("Abnormal Regions Detected: 2"));

        // the annotated image landed in the shared directory
        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(names[0].ends_with("_localized.png"));
    }

    #[tokio::test]
    async fn detections_below_threshold_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = build_analysis_pipeline(
            Arc::new(FixedClassifier(KidneyClass::Cyst)),
            Arc::new(FixedLocalizer(vec![detection(20.0, 20.0, 0.05)])),
            dir.path().to_path_buf(),
        );

        let mut ctx = AnalysisContext::new(test_image(), "scan.png".to_string());
        pipeline.run(&mut ctx).await.unwrap();

        let outcome = ctx.into_outcome().unwrap();
        assert_eq!(outcome.label, KidneyClass::Cyst);
        // zero surviving detections: no boxes, no URL, count 0 in the report
        assert!(outcome.localization.is_none());
        assert!(outcome.report.contains("Abnormal Regions Detected: 0"));
    }

    #[tokio::test]
    async fn stale_localized_images_are_purged_on_new_detection() {
        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join("old.png_1_localized.png");
        std::fs::write(&stale, b"x").unwrap();

        let pipeline = build_analysis_pipeline(
            Arc::new(FixedClassifier(KidneyClass::Tumor)),
            Arc::new(FixedLocalizer(vec![detection(30.0, 30.0, 0.9)])),
            dir.path().to_path_buf(),
        );

        let mut ctx = AnalysisContext::new(test_image(), "fresh.png".to_string());
        pipeline.run(&mut ctx).await.unwrap();

        assert!(!stale.exists());
        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(names[0].starts_with("fresh.png_"));
    }
}
