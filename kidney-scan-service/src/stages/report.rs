use async_trait::async_trait;
use chrono::Local;
use scan_flow::{FlowError, Result, Stage, StageAction};

use super::{AnalysisContext, REPORT_STAGE};
use crate::models::KidneyClass;

fn treatment_text(label: KidneyClass) -> &'static str {
    match label {
        KidneyClass::Cyst => {
            "- Usually observation unless painful or large\n- Aspiration or surgery if needed"
        }
        KidneyClass::Stone => {
            "- Hydration and pain control\n- Shock wave lithotripsy or ureteroscopy"
        }
        KidneyClass::Tumor => "- Biopsy and staging\n- Surgery, ablation or targeted therapy",
        KidneyClass::Normal => "✅ No abnormalities detected.",
    }
}

/// Format the templated diagnostic report for a classified scan.
pub fn generate_medical_report(label: KidneyClass, num_boxes: usize) -> String {
    let today = Local::now().format("%Y-%m-%d");
    let treatment = treatment_text(label);
    let label_upper = label.as_str().to_uppercase();

    format!(
        "\n🩺 Nephrology Diagnostic Report – {today}\n\
         -----------------------------------------\n\
         🔹 Classification Result: {label_upper}\n\
         🔹 Abnormal Regions Detected: {num_boxes}\n\
         \n\
         📄 Recommended Actions:\n\
         {treatment}\n\
         \n\
         📍 Note: Kindly follow up with a certified nephrologist.\n"
    )
}

/// Final pipeline stage; every run passes through here, normal or not.
pub struct ReportStage;

#[async_trait]
impl Stage<AnalysisContext> for ReportStage {
    fn id(&self) -> &str {
        REPORT_STAGE
    }

    async fn run(&self, state: &mut AnalysisContext) -> Result<StageAction> {
        let label = state
            .label
            .ok_or_else(|| FlowError::StageFailed("no classification before report".to_string()))?;

        state.report = Some(generate_medical_report(label, state.boxes.len()));
        Ok(StageAction::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_report_shows_no_abnormalities() {
        let report = generate_medical_report(KidneyClass::Normal, 0);
        assert!(report.contains("✅ No abnormalities detected."));
        assert!(report.contains("Classification Result: NORMAL"));
        assert!(report.contains("Abnormal Regions Detected: 0"));
    }

    #[test]
    fn label_is_uppercased_in_output() {
        for label in KidneyClass::ALL {
            let report = generate_medical_report(label, 1);
            assert!(report.contains(&label.as_str().to_uppercase()));
        }
    }

    #[test]
    fn stone_report_includes_treatment_and_count() {
        let report = generate_medical_report(KidneyClass::Stone, 2);
        assert!(report.contains("Abnormal Regions Detected: 2"));
        assert!(report.contains("Shock wave lithotripsy or ureteroscopy"));
        assert!(report.contains("Kindly follow up with a certified nephrologist."));
    }
}
