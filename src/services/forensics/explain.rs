// Explanation Generator
// Renders a final probability and its findings as one human-readable line.

use crate::models::{round2, Finding};

pub fn generate_explanation(findings: &[Finding], final_ai_probability: f64) -> String {
    let probability = round2(final_ai_probability);
    if findings.is_empty() {
        return format!(
            "Deepfake probability {}%. No strong manipulation indicators were detected.",
            probability
        );
    }
    let reasons: Vec<&str> = findings.iter().map(|f| f.message.as_str()).collect();
    format!("Deepfake probability {}% based on: {}", probability, reasons.join("; "))
}
