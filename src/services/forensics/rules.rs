// Evidence Rules
// Declarative rule tables and the accumulator that evaluates them in order.

use crate::models::{clamp_probability, CategoryResult, CategoryScores, Finding};

/// One scoring rule: when `predicate` holds on the signals, add `delta` and record `finding`.
pub struct EvidenceRule<S> {
    pub signal: &'static str,
    pub predicate: fn(&S) -> bool,
    pub delta: i32,
    pub finding: &'static str,
}

/// Running score for one analysis call. The total is only clamped by [`RuleOutcome::finish`].
#[derive(Debug, Clone)]
pub struct RuleOutcome {
    score: f64,
    findings: Vec<Finding>,
}

impl RuleOutcome {
    pub fn new(baseline: f64) -> Self {
        Self {
            score: baseline,
            findings: Vec::new(),
        }
    }

    /// Evaluate every rule independently, in table order.
    pub fn apply<S>(&mut self, rules: &[EvidenceRule<S>], signals: &S) -> &mut Self {
        for rule in rules {
            if (rule.predicate)(signals) {
                self.trigger(rule.signal, rule.delta as f64, rule.finding);
            }
        }
        self
    }

    pub fn trigger(&mut self, signal: &str, delta: f64, message: impl Into<String>) -> &mut Self {
        self.score += delta;
        self.findings.push(Finding::triggered(signal, message));
        self
    }

    /// Score contribution from a sub-analysis. Only its triggered findings are carried;
    /// its informational notes stay with the sub-result.
    pub fn absorb<'a>(&mut self, delta: f64, findings: impl IntoIterator<Item = &'a Finding>) -> &mut Self {
        self.score += delta;
        self.findings
            .extend(findings.into_iter().filter(|f| f.is_triggered()).cloned());
        self
    }

    /// Informational finding with no score effect.
    pub fn note(&mut self, message: impl Into<String>) -> &mut Self {
        self.findings.push(Finding::note(message));
        self
    }

    pub fn raw_score(&self) -> f64 {
        self.score
    }

    pub fn finish(self, category_scores: CategoryScores, benign: &str) -> CategoryResult {
        let mut findings = self.findings;
        if findings.is_empty() {
            findings.push(Finding::note(benign));
        }
        CategoryResult {
            ai_probability: clamp_probability(self.score),
            category_scores,
            findings,
            forensic_notes: None,
        }
    }
}
