//! Minimal inline HTML for the browser-facing views. Real templating is out
//! of scope; these pages only carry the pipeline's outputs.

use crate::models::{AnalysisOutcome, RiskAssessment};

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>{title}</title></head>\
         <body>{body}</body></html>"
    )
}

pub fn upload_form(last_label: Option<&str>, error: Option<&str>) -> String {
    let mut body = String::from("<h1>Kidney Scan Analysis</h1>");

    if let Some(error) = error {
        body.push_str(&format!("<p class=\"error\">{}</p>", escape(error)));
    }
    if let Some(label) = last_label {
        body.push_str(&format!(
            "<p>Last classification: <strong>{}</strong> — <a href=\"/results\">view results</a></p>",
            escape(label)
        ));
    }

    body.push_str(
        "<form method=\"post\" action=\"/\" enctype=\"multipart/form-data\">\
         <input type=\"file\" name=\"image\" accept=\"image/*\">\
         <button type=\"submit\">Analyze</button>\
         </form>\
         <p><a href=\"/risk-quiz\">Kidney stone risk quiz</a></p>",
    );

    page("Kidney Scan Analysis", &body)
}

fn outcome_body(outcome: &AnalysisOutcome, current_time: &str) -> String {
    let mut body = format!(
        "<p>Classification: <strong>{}</strong></p><pre>{}</pre>",
        escape(outcome.label.as_str()),
        escape(&outcome.report)
    );

    let regions = outcome.regions();
    if !regions.is_empty() {
        body.push_str("<h2>Affected regions</h2><ul>");
        for region in regions {
            body.push_str(&format!("<li>{}</li>", escape(region)));
        }
        body.push_str("</ul>");
    }

    if let Some(url) = outcome.localized_image_url() {
        body.push_str(&format!(
            "<img src=\"/static/{}\" alt=\"localized regions\">",
            escape(url)
        ));
    }

    body.push_str(&format!("<p>Generated at {}</p>", escape(current_time)));
    body
}

pub fn results(outcome: &AnalysisOutcome, current_time: &str) -> String {
    let mut body = String::from("<h1>Diagnostic Results</h1>");
    body.push_str(&outcome_body(outcome, current_time));
    body.push_str(
        "<p><a href=\"/pdf_preview\">Report preview</a> | <a href=\"/\">New scan</a></p>",
    );
    page("Diagnostic Results", &body)
}

pub fn pdf_preview(outcome: &AnalysisOutcome, current_time: &str) -> String {
    let mut body = String::from("<h1>Nephrology Diagnostic Report</h1>");
    body.push_str(&outcome_body(outcome, current_time));
    page("Report Preview", &body)
}

pub fn risk_quiz(assessment: Option<&RiskAssessment>, error: Option<&str>) -> String {
    let mut body = String::from("<h1>Kidney Stone Risk Quiz</h1>");

    if let Some(error) = error {
        body.push_str(&format!("<p class=\"error\">{}</p>", escape(error)));
    }
    if let Some(assessment) = assessment {
        body.push_str(&format!(
            "<p>Prediction: <strong>{}</strong></p><ul>",
            escape(&assessment.prediction)
        ));
        for line in &assessment.explanation {
            body.push_str(&format!("<li>{}</li>", escape(line)));
        }
        body.push_str("</ul>");
    }

    body.push_str(
        "<form method=\"post\" action=\"/risk-quiz\">\
         <label>Urine density (gravity) <input name=\"gravity\"></label><br>\
         <label>Urine acidity (pH) <input name=\"ph\"></label><br>\
         <label>Osmolarity <input name=\"osmo\"></label><br>\
         <label>Conductivity <input name=\"cond\"></label><br>\
         <label>Urea <input name=\"urea\"></label><br>\
         <label>Calcium <input name=\"calc\"></label><br>\
         <button type=\"submit\">Predict</button>\
         </form>\
         <p><a href=\"/\">Back to scan upload</a></p>",
    );

    page("Kidney Stone Risk Quiz", &body)
}
