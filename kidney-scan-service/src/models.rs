use serde::{Deserialize, Serialize};
use std::fmt;

/// Classifier output labels, in model output-score order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KidneyClass {
    Cyst,
    Normal,
    Stone,
    Tumor,
}

impl KidneyClass {
    pub const ALL: [KidneyClass; 4] = [
        KidneyClass::Cyst,
        KidneyClass::Normal,
        KidneyClass::Stone,
        KidneyClass::Tumor,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            KidneyClass::Cyst => "cyst",
            KidneyClass::Normal => "normal",
            KidneyClass::Stone => "stone",
            KidneyClass::Tumor => "tumor",
        }
    }

    pub fn is_abnormal(&self) -> bool {
        !matches!(self, KidneyClass::Normal)
    }
}

impl fmt::Display for KidneyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Axis-aligned detection rectangle in image pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

impl BoundingBox {
    pub fn new(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    pub fn center(&self) -> (f32, f32) {
        (
            (self.x_min + self.x_max) / 2.0,
            (self.y_min + self.y_max) / 2.0,
        )
    }
}

/// A detection produced by the localizer. The confidence is consumed for
/// thresholding only and is never surfaced downstream.
#[derive(Debug, Clone, Copy)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub confidence: f32,
}

/// Localization results for an abnormal scan. Boxes, region names and the
/// annotated-image URL always travel together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Localization {
    pub boxes: Vec<BoundingBox>,
    pub regions: Vec<String>,
    pub image_url: String,
}

/// Completed analysis for one upload, stored in the user's session.
///
/// `localization` is `Some` only when the label is abnormal and the detector
/// returned at least one box, which makes the boxes/URL pairing impossible
/// to violate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub label: KidneyClass,
    pub report: String,
    pub localization: Option<Localization>,
}

impl AnalysisOutcome {
    pub fn boxes(&self) -> &[BoundingBox] {
        self.localization
            .as_ref()
            .map(|l| l.boxes.as_slice())
            .unwrap_or(&[])
    }

    pub fn regions(&self) -> &[String] {
        self.localization
            .as_ref()
            .map(|l| l.regions.as_slice())
            .unwrap_or(&[])
    }

    pub fn localized_image_url(&self) -> Option<&str> {
        self.localization.as_ref().map(|l| l.image_url.as_str())
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub text: String,
}

/// Raw risk-quiz form fields; validation happens in `risk`
#[derive(Debug, Default, Deserialize)]
pub struct RiskQuizForm {
    pub gravity: Option<String>,
    pub ph: Option<String>,
    pub osmo: Option<String>,
    pub cond: Option<String>,
    pub urea: Option<String>,
    pub calc: Option<String>,
}

impl RiskQuizForm {
    pub fn field(&self, key: &str) -> Option<&str> {
        match key {
            "gravity" => self.gravity.as_deref(),
            "ph" => self.ph.as_deref(),
            "osmo" => self.osmo.as_deref(),
            "cond" => self.cond.as_deref(),
            "urea" => self.urea.as_deref(),
            "calc" => self.calc.as_deref(),
            _ => None,
        }
    }
}

/// Risk-quiz outcome, ephemeral per call
#[derive(Debug, Clone, Serialize)]
pub struct RiskAssessment {
    pub prediction: String,
    pub explanation: Vec<String>,
}
