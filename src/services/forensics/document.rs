// Document Forensics
// Authoring metadata, paragraph layout and the text scorer as a weighted sub-signal.

use std::path::Path;
use tracing::info;

use crate::models::{round2, CategoryResult, CategoryScores, SignalValue};
use crate::services::document_extractor::{extract_document, DocumentKind, ExtractError, ExtractedDocument};
use crate::services::reasoning::ReasoningAdapter;

use super::error::{ForensicsError, ForensicsResult};
use super::rules::RuleOutcome;
use super::text::analyze_text;

pub const DOCUMENT_BASELINE: f64 = 30.0;
/// Share of the text scorer's probability carried into the document score.
pub const TEXT_WEIGHT: f64 = 0.4;
/// Trimmed text must be longer than this before the text scorer runs.
pub const MIN_TEXT_CHARS: usize = 200;

const NO_INDICATORS: &str = "No strong indicators of AI-generated or manipulated document";

const AI_TOOL_MARKERS: &[&str] = &["chatgpt", "openai", "generator"];

/// Creator string as reported by the PDF info dictionary or DOCX core properties.
fn creator(doc: &ExtractedDocument) -> String {
    doc.metadata
        .get("/Creator")
        .or_else(|| doc.metadata.get("author"))
        .map(|s| s.to_lowercase())
        .unwrap_or_default()
}

/// "ai" only counts as a standalone word; the other markers match anywhere.
fn names_ai_tool(creator: &str) -> bool {
    if AI_TOOL_MARKERS.iter().any(|m| creator.contains(m)) {
        return true;
    }
    creator
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| word == "ai")
}

/// Mean character length of lines holding more than 30 non-blank characters.
pub fn average_paragraph_length(text: &str) -> f64 {
    let lengths: Vec<usize> = text
        .split('\n')
        .filter(|p| p.trim().chars().count() > 30)
        .map(|p| p.chars().count())
        .collect();
    if lengths.is_empty() {
        return 0.0;
    }
    lengths.iter().sum::<usize>() as f64 / lengths.len() as f64
}

/// Whether the extracted text is long enough to be worth a text analysis.
pub fn has_enough_text(doc: &ExtractedDocument) -> bool {
    doc.text.trim().chars().count() > MIN_TEXT_CHARS
}

/// Pure scoring step. `text` is the text scorer's result when the document had enough text.
pub fn score_document(doc: &ExtractedDocument, text: Option<&CategoryResult>) -> CategoryResult {
    let mut outcome = RuleOutcome::new(DOCUMENT_BASELINE);

    if names_ai_tool(&creator(doc)) {
        outcome.trigger("authoring_tool", 30.0, "AI-related authoring tool detected in metadata");
    }
    if doc.metadata.is_empty() {
        outcome.trigger("metadata_present", 15.0, "Missing or stripped document metadata");
    }

    match text {
        Some(text) => {
            outcome.absorb((text.ai_probability * TEXT_WEIGHT).trunc(), &text.findings);
        }
        None => {
            outcome.note("Insufficient text for deep semantic analysis");
        }
    }

    let avg_len = average_paragraph_length(&doc.text);
    if avg_len > 300.0 {
        outcome.trigger("structure_uniformity", 10.0, "Unusually uniform paragraph structure detected");
    }

    let mut scores = CategoryScores::new();
    scores.insert("metadata_present".into(), (!doc.metadata.is_empty()).into());
    scores.insert(
        "semantic_ai_risk".into(),
        text.map(|t| t.ai_probability).unwrap_or(0.0).into(),
    );
    scores.insert("structure_uniformity".into(), round2(avg_len).into());
    scores.insert(
        "document_hash".into(),
        SignalValue::Label(doc.document_hash.clone()),
    );

    let mut result = outcome.finish(scores, NO_INDICATORS);
    result.forensic_notes = text.and_then(|t| t.forensic_notes.clone());
    result
}

fn extraction_failure(path: &Path, err: ExtractError) -> ForensicsError {
    match err {
        ExtractError::Unsupported(ext) => ForensicsError::UnsupportedFormat {
            modality: "document".to_string(),
            detail: ext,
        },
        other => ForensicsError::unreadable(path, other),
    }
}

/// Extract, run the text scorer when there is enough text, then score.
pub async fn analyze_document(
    path: &Path,
    kind: Option<DocumentKind>,
    reasoning: &ReasoningAdapter,
) -> ForensicsResult<CategoryResult> {
    let kind = match kind {
        Some(kind) => kind,
        None => DocumentKind::from_path(path).map_err(|e| extraction_failure(path, e))?,
    };
    let doc = extract_document(path, kind).map_err(|e| extraction_failure(path, e))?;

    let text_result = if has_enough_text(&doc) {
        Some(analyze_text(&doc.text, reasoning).await)
    } else {
        None
    };

    let result = score_document(&doc, text_result.as_ref());
    info!(
        "[DOCUMENT_FORENSICS] kind={:?} chars={} metadata_keys={} ai_probability={}",
        kind,
        doc.text.chars().count(),
        doc.metadata.len(),
        result.ai_probability
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Finding;
    use crate::services::document_extractor::tests::build_docx;
    use std::collections::BTreeMap;

    fn doc(text: &str, metadata: &[(&str, &str)]) -> ExtractedDocument {
        ExtractedDocument {
            text: text.to_string(),
            metadata: metadata
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
            document_hash: "00".to_string(),
        }
    }

    fn text_result(ai: f64) -> CategoryResult {
        CategoryResult {
            ai_probability: ai,
            category_scores: CategoryScores::new(),
            findings: vec![Finding::triggered("repetition", "Repetitive phrasing patterns detected")],
            forensic_notes: None,
        }
    }

    #[test]
    fn test_ai_creator_and_short_text() {
        let result = score_document(&doc("Short.", &[("/Creator", "ChatGPT PDF Export")]), None);
        assert_eq!(result.ai_probability, 60.0);
        assert_eq!(result.findings[0].message, "AI-related authoring tool detected in metadata");
        assert_eq!(result.findings[1].message, "Insufficient text for deep semantic analysis");
    }

    #[test]
    fn test_ai_marker_must_be_a_word() {
        assert!(names_ai_tool("acme ai writer"));
        assert!(!names_ai_tool("adobe acrobat maintenance"));
        assert!(names_ai_tool("openai"));
    }

    #[test]
    fn test_stripped_metadata_and_text_contribution() {
        let result = score_document(&doc("x", &[]), Some(&text_result(55.0)));
        // 30 + 15 + trunc(55 * 0.4)
        assert_eq!(result.ai_probability, 67.0);
        assert_eq!(result.category_scores["metadata_present"], SignalValue::Flag(false));
        assert_eq!(result.category_scores["semantic_ai_risk"], SignalValue::Number(55.0));
        assert!(result
            .findings
            .iter()
            .any(|f| f.message == "Repetitive phrasing patterns detected"));
    }

    #[test]
    fn test_long_uniform_paragraphs() {
        let paragraph = "a".repeat(320);
        let text = format!("{}\n{}\nshort", paragraph, paragraph);
        let result = score_document(&doc(&text, &[("author", "Jane")]), None);
        assert_eq!(result.ai_probability, 40.0);
        assert_eq!(result.category_scores["structure_uniformity"], SignalValue::Number(320.0));
    }

    #[test]
    fn test_average_paragraph_length_ignores_short_lines() {
        assert_eq!(average_paragraph_length(""), 0.0);
        assert_eq!(average_paragraph_length("tiny\nalso tiny"), 0.0);
        let line = "b".repeat(40);
        assert_eq!(average_paragraph_length(&format!("{}\nhi", line)), 40.0);
    }

    #[tokio::test]
    async fn test_analyze_docx_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memo.docx");
        std::fs::write(&path, build_docx(&["Quarterly memo."], Some("Jane Doe"))).unwrap();

        let result = analyze_document(&path, None, &ReasoningAdapter::offline()).await.unwrap();
        assert_eq!(result.ai_probability, DOCUMENT_BASELINE);
        assert_eq!(result.findings.len(), 1);
        assert!(matches!(result.category_scores.get("document_hash"), Some(SignalValue::Label(h)) if h.len() == 64));
    }

    #[test]
    fn test_text_gate_needs_more_than_200_trimmed_chars() {
        let at_limit = format!("  {}\n ", "a".repeat(MIN_TEXT_CHARS));
        assert!(!has_enough_text(&doc(&at_limit, &[])));
        let over_limit = format!("  {}\n ", "a".repeat(MIN_TEXT_CHARS + 1));
        assert!(has_enough_text(&doc(&over_limit, &[])));
    }

    #[test]
    fn test_text_benign_note_is_not_carried() {
        let quiet = CategoryResult {
            findings: vec![Finding::note("No strong textual indicators of AI generation")],
            ..text_result(30.0)
        };
        let result = score_document(&doc("x", &[("author", "Jane")]), Some(&quiet));
        assert_eq!(result.ai_probability, 42.0);
        assert_eq!(result.findings, vec![Finding::note(NO_INDICATORS)]);
    }

    #[tokio::test]
    async fn test_long_docx_runs_text_scorer() {
        let paragraphs = [
            "The committee met on Tuesday to review the budget for the coming season.",
            "Several members raised concerns about rising costs at the community garden.",
            "After a long discussion the group agreed to postpone the vote until March.",
            "Minutes were approved without changes and the meeting closed at nine.",
        ];
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("minutes.docx");
        std::fs::write(&path, build_docx(&paragraphs, Some("Jane Doe"))).unwrap();

        let reasoning = ReasoningAdapter::offline();
        let result = analyze_document(&path, None, &reasoning).await.unwrap();

        let extracted = extract_document(&path, DocumentKind::Docx).unwrap();
        assert!(has_enough_text(&extracted));
        let text = analyze_text(&extracted.text, &reasoning).await;
        assert_eq!(
            result.ai_probability,
            DOCUMENT_BASELINE + (text.ai_probability * TEXT_WEIGHT).trunc()
        );
        assert_eq!(
            result.category_scores["semantic_ai_risk"],
            SignalValue::Number(text.ai_probability)
        );
        assert!(!result
            .findings
            .iter()
            .any(|f| f.message == "Insufficient text for deep semantic analysis"));
    }

    #[tokio::test]
    async fn test_missing_file_is_fatal() {
        let err = analyze_document(Path::new("/nonexistent/file.pdf"), None, &ReasoningAdapter::offline())
            .await
            .unwrap_err();
        assert!(matches!(err, ForensicsError::Unreadable { .. }));
    }

    #[tokio::test]
    async fn test_unknown_extension_is_unsupported() {
        let err = analyze_document(Path::new("notes.odt"), None, &ReasoningAdapter::offline())
            .await
            .unwrap_err();
        assert!(matches!(err, ForensicsError::UnsupportedFormat { .. }));
    }
}
