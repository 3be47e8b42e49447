use std::path::Path;

use linfa::prelude::*;
use linfa_logistic::FittedLogisticRegression;
use ndarray::Array2;
use serde::Deserialize;
use thiserror::Error;

use crate::models::{RiskAssessment, RiskQuizForm};

pub const FEATURE_COUNT: usize = 6;

struct FieldSpec {
    key: &'static str,
    alias: &'static str,
    min: f64,
    max: f64,
}

/// Validation runs in this order and stops at the first failing field.
const FIELDS: [FieldSpec; FEATURE_COUNT] = [
    FieldSpec {
        key: "gravity",
        alias: "Urine Density",
        min: 1.005,
        max: 1.030,
    },
    FieldSpec {
        key: "ph",
        alias: "Urine Acidity",
        min: 4.5,
        max: 8.0,
    },
    FieldSpec {
        key: "osmo",
        alias: "Urine Concentration",
        min: 200.0,
        max: 1200.0,
    },
    FieldSpec {
        key: "cond",
        alias: "Urine Conductivity",
        min: 5.0,
        max: 40.0,
    },
    FieldSpec {
        key: "urea",
        alias: "Urea Level",
        min: 50.0,
        max: 500.0,
    },
    FieldSpec {
        key: "calc",
        alias: "Calcium Level",
        min: 1.0,
        max: 10.0,
    },
];

#[derive(Debug, Error)]
pub enum RiskError {
    #[error("{0}")]
    Validation(String),

    #[error("risk model failure: {0}")]
    Model(String),
}

/// Per-feature affine transform exported alongside the model
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl FeatureScaler {
    /// Identity transform, mostly useful in tests
    pub fn identity() -> Self {
        Self {
            mean: vec![0.0; FEATURE_COUNT],
            scale: vec![1.0; FEATURE_COUNT],
        }
    }

    fn transform(&self, values: &[f64; FEATURE_COUNT]) -> Array2<f64> {
        let scaled: Vec<f64> = values
            .iter()
            .enumerate()
            .map(|(i, v)| (v - self.mean[i]) / self.scale[i])
            .collect();
        Array2::from_shape_vec((1, FEATURE_COUNT), scaled)
            .expect("row vector shape is statically correct")
    }
}

/// Validate the six raw form fields in fixed order. The first violation wins
/// and its message names the field alias and expected range.
pub fn validate(form: &RiskQuizForm) -> Result<[f64; FEATURE_COUNT], RiskError> {
    let mut values = [0.0; FEATURE_COUNT];

    for (index, field) in FIELDS.iter().enumerate() {
        let raw = form.field(field.key).unwrap_or("");
        if raw.is_empty() {
            return Err(RiskError::Validation(format!(
                "Please enter a value for {}",
                field.alias
            )));
        }

        let value: f64 = raw.parse().map_err(|_| {
            RiskError::Validation(format!("{} must be a number", field.alias))
        })?;

        if value < field.min || value > field.max {
            return Err(RiskError::Validation(format!(
                "{} should be between {} and {}",
                field.alias, field.min, field.max
            )));
        }

        values[index] = value;
    }

    Ok(values)
}

/// Explanation heuristics layered on top of the model output. The advisory
/// lines fire on fixed thresholds, in fixed order.
pub fn explain(positive: bool, values: &[f64; FEATURE_COUNT]) -> Vec<String> {
    let mut explanation = Vec::new();

    if positive {
        explanation.push("The urine test suggests you may have a kidney stone.".to_string());
        explanation.push("Possible reasons (common in India):".to_string());
        if values[0] > 1.020 {
            explanation.push("- Low water intake, especially in hot weather".to_string());
        }
        if values[1] < 6.0 {
            explanation.push("- Diet high in acidic foods (e.g., tea, spinach)".to_string());
        }
        if values[5] > 5.0 {
            explanation.push("- High intake of oxalate-rich foods (e.g., nuts, tea)".to_string());
        }
        explanation.push(
            "Please see a doctor for tests and advice (e.g., drink more water, reduce oxalate foods)."
                .to_string(),
        );
    } else {
        explanation
            .push("The urine test suggests you are unlikely to have a kidney stone.".to_string());
        explanation
            .push("To stay safe, drink plenty of water and eat a balanced diet.".to_string());
    }

    explanation
}

/// Pretrained urine-analysis classifier plus its feature scaler, both loaded
/// once at startup from JSON artifacts and read-only afterwards.
pub struct RiskPredictor {
    scaler: FeatureScaler,
    model: FittedLogisticRegression<f64, i32>,
}

impl RiskPredictor {
    pub fn load(model_path: &Path, scaler_path: &Path) -> anyhow::Result<Self> {
        let model: FittedLogisticRegression<f64, i32> =
            serde_json::from_str(&std::fs::read_to_string(model_path)?)?;
        let scaler: FeatureScaler = serde_json::from_str(&std::fs::read_to_string(scaler_path)?)?;

        anyhow::ensure!(
            scaler.mean.len() == FEATURE_COUNT && scaler.scale.len() == FEATURE_COUNT,
            "scaler must carry exactly {FEATURE_COUNT} feature parameters"
        );

        Ok(Self { scaler, model })
    }

    pub fn new(model: FittedLogisticRegression<f64, i32>, scaler: FeatureScaler) -> Self {
        Self { scaler, model }
    }

    /// Validate, scale, predict, explain. Ephemeral; nothing is persisted.
    pub fn assess(&self, form: &RiskQuizForm) -> Result<RiskAssessment, RiskError> {
        let values = validate(form)?;
        let scaled = self.scaler.transform(&values);

        let predicted = self.model.predict(&scaled);
        let positive = predicted
            .first()
            .map(|&class| class == 1)
            .ok_or_else(|| RiskError::Model("classifier returned no prediction".to_string()))?;

        let prediction = if positive {
            "Kidney Stone"
        } else {
            "No Kidney Stone"
        };

        Ok(RiskAssessment {
            prediction: prediction.to_string(),
            explanation: explain(positive, &values),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linfa::dataset::DatasetBase;
    use linfa_logistic::LogisticRegression;
    use ndarray::Array1;

    fn form(values: [&str; FEATURE_COUNT]) -> RiskQuizForm {
        RiskQuizForm {
            gravity: Some(values[0].to_string()),
            ph: Some(values[1].to_string()),
            osmo: Some(values[2].to_string()),
            cond: Some(values[3].to_string()),
            urea: Some(values[4].to_string()),
            calc: Some(values[5].to_string()),
        }
    }

    fn nominal_form() -> RiskQuizForm {
        form(["1.015", "6.0", "600", "20", "200", "3"])
    }

    /// Fit a deliberately easy model: the calcium feature alone decides the
    /// class, with a wide margin.
    fn calcium_driven_model() -> FittedLogisticRegression<f64, i32> {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..20 {
            let calc = if i < 10 { -10.0 } else { 10.0 };
            rows.extend_from_slice(&[0.0, 0.0, 0.0, 0.0, 0.0, calc]);
            labels.push(if i < 10 { 0 } else { 1 });
        }
        let x = Array2::from_shape_vec((20, FEATURE_COUNT), rows).unwrap();
        let y = Array1::from(labels);
        let dataset = DatasetBase::new(x, y);

        LogisticRegression::default()
            .max_iterations(200)
            .fit(&dataset)
            .unwrap()
    }

    #[test]
    fn out_of_range_gravity_names_field_and_range() {
        let mut quiz = nominal_form();
        quiz.gravity = Some("1.000".to_string());

        let err = validate(&quiz).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Urine Density"));
        assert!(message.contains("1.005 and 1.03"));
    }

    #[test]
    fn missing_field_is_reported_before_later_violations() {
        let mut quiz = nominal_form();
        quiz.ph = None;
        quiz.calc = Some("999".to_string());

        let err = validate(&quiz).unwrap_err();
        assert_eq!(err.to_string(), "Please enter a value for Urine Acidity");
    }

    #[test]
    fn non_numeric_input_is_rejected() {
        let mut quiz = nominal_form();
        quiz.urea = Some("lots".to_string());

        let err = validate(&quiz).unwrap_err();
        assert_eq!(err.to_string(), "Urea Level must be a number");
    }

    #[test]
    fn nominal_vector_passes_validation() {
        let values = validate(&nominal_form()).unwrap();
        assert_eq!(values, [1.015, 6.0, 600.0, 20.0, 200.0, 3.0]);
    }

    #[test]
    fn positive_explanation_lists_triggered_thresholds_in_order() {
        let lines = explain(true, &[1.025, 5.5, 600.0, 20.0, 200.0, 7.0]);
        assert_eq!(
            lines,
            vec![
                "The urine test suggests you may have a kidney stone.".to_string(),
                "Possible reasons (common in India):".to_string(),
                "- Low water intake, especially in hot weather".to_string(),
                "- Diet high in acidic foods (e.g., tea, spinach)".to_string(),
                "- High intake of oxalate-rich foods (e.g., nuts, tea)".to_string(),
                "Please see a doctor for tests and advice (e.g., drink more water, reduce oxalate foods).".to_string(),
            ]
        );
    }

    #[test]
    fn negative_explanation_is_two_fixed_lines() {
        let lines = explain(false, &[1.015, 6.5, 600.0, 20.0, 200.0, 3.0]);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("unlikely to have a kidney stone"));
    }

    #[test]
    fn assess_runs_the_full_path_on_valid_input() {
        // scaler centers calcium so the nominal value (3) lands far on the
        // negative side of the fitted boundary
        let scaler = FeatureScaler {
            mean: vec![1.015, 6.0, 600.0, 20.0, 200.0, 5.5],
            scale: vec![1.0, 1.0, 1.0, 1.0, 1.0, 0.5],
        };
        let predictor = RiskPredictor::new(calcium_driven_model(), scaler);

        let assessment = predictor.assess(&nominal_form()).unwrap();
        assert_eq!(assessment.prediction, "No Kidney Stone");
        assert_eq!(assessment.explanation.len(), 2);
    }

    #[test]
    fn assess_detects_high_calcium_profile() {
        let scaler = FeatureScaler {
            mean: vec![1.015, 6.0, 600.0, 20.0, 200.0, 5.5],
            scale: vec![1.0, 1.0, 1.0, 1.0, 1.0, 0.5],
        };
        let predictor = RiskPredictor::new(calcium_driven_model(), scaler);

        let quiz = form(["1.025", "5.0", "700", "25", "300", "9"]);
        let assessment = predictor.assess(&quiz).unwrap();
        assert_eq!(assessment.prediction, "Kidney Stone");
        assert!(assessment
            .explanation
            .iter()
            .any(|line| line.contains("oxalate-rich")));
    }

    #[test]
    fn assess_propagates_validation_errors() {
        let predictor = RiskPredictor::new(calcium_driven_model(), FeatureScaler::identity());
        let mut quiz = nominal_form();
        quiz.cond = Some("4".to_string());

        let err = predictor.assess(&quiz).unwrap_err();
        assert!(matches!(err, RiskError::Validation(_)));
        assert!(err.to_string().contains("Urine Conductivity"));
    }
}
