mod classifier;
mod localizer;

pub use classifier::OnnxClassifier;
pub use localizer::{OnnxLocalizer, annotate};

use image::DynamicImage;

use crate::models::{Detection, KidneyClass};

/// Maps a decoded scan image to one of the four disease labels.
///
/// Implementations are immutable after construction and safe for concurrent
/// reads; handlers receive them as trait objects so tests can substitute
/// fakes.
pub trait Classifier: Send + Sync {
    fn classify(&self, image: &DynamicImage) -> anyhow::Result<KidneyClass>;
}

/// Finds abnormal regions in a scan image.
pub trait Localizer: Send + Sync {
    /// Returns all detections with confidence at or above `confidence`,
    /// in image pixel coordinates.
    fn detect(&self, image: &DynamicImage, confidence: f32) -> anyhow::Result<Vec<Detection>>;
}
