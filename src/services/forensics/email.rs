// Email Forensics
// Phishing vocabulary, links and credential requests on top of the text scorer.

use regex::Regex;
use std::sync::OnceLock;
use tracing::info;

use crate::models::{CategoryResult, CategoryScores};
use crate::services::reasoning::ReasoningAdapter;

use super::rules::RuleOutcome;
use super::text::analyze_text;

pub const EMAIL_BASELINE: f64 = 25.0;
/// Share of the text scorer's probability carried into the email score.
pub const TEXT_WEIGHT: f64 = 0.3;
const NO_INDICATORS: &str = "No strong phishing indicators detected";

pub const PHISHING_KEYWORDS: &[&str] = &[
    "urgent",
    "immediately",
    "verify",
    "suspended",
    "restricted",
    "action required",
    "confirm your account",
    "reset password",
    "security alert",
    "unusual activity",
    "click below",
];

fn link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"https?://\S+").expect("link regex"))
}

fn credential_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(?:passwords?|otp|pins?|logins?|credentials?)\b").expect("credential regex"))
}

/// Pure scoring step over the raw email body and its text-scorer result.
pub fn score_email(body: &str, text: &CategoryResult) -> CategoryResult {
    let lowered = body.to_lowercase();
    let mut outcome = RuleOutcome::new(EMAIL_BASELINE);

    let mut keyword_hits = 0usize;
    for keyword in PHISHING_KEYWORDS {
        if lowered.contains(keyword) {
            keyword_hits += 1;
            outcome.trigger(
                "phishing_keywords",
                8.0,
                format!("Urgency or phishing keyword detected: '{}'", keyword),
            );
        }
    }

    let links = link_re().find_iter(body).count();
    if links > 0 {
        outcome.trigger("external_links", 15.0, "External links detected in email body");
    }

    if credential_re().is_match(&lowered) {
        outcome.trigger("credential_request", 20.0, "Credential-related request detected");
    }

    outcome.absorb((text.ai_probability * TEXT_WEIGHT).trunc(), &text.findings);

    let mut scores = CategoryScores::new();
    scores.insert("phishing_keywords".into(), keyword_hits.into());
    scores.insert("external_links".into(), links.into());
    scores.insert("text_ai_risk".into(), text.ai_probability.into());

    let mut result = outcome.finish(scores, NO_INDICATORS);
    result.forensic_notes = text.forensic_notes.clone();
    result
}

pub async fn analyze_email(body: &str, reasoning: &ReasoningAdapter) -> CategoryResult {
    let text = analyze_text(body, reasoning).await;
    let result = score_email(body, &text);
    info!(
        "[EMAIL_FORENSICS] ai_probability={} text_ai={} findings={}",
        result.ai_probability,
        text.ai_probability,
        result.findings.len()
    );
    result
}
