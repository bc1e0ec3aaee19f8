//! Citation validation and usage statistics.

use super::scanner::{marker_count, references};
use super::Citation;
use crate::text::word_count;
use crate::types::Modality;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// Counts plus human-readable issues. A citation with content counts as
/// valid even when it has metadata issues.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CitationValidation {
    pub valid: usize,
    pub invalid: usize,
    pub missing_content: usize,
    pub issues: Vec<String>,
}

pub fn validate(answer: &str, citations: &[Citation]) -> CitationValidation {
    let mut report = CitationValidation::default();
    let mut seen = HashSet::new();

    for citation in citations {
        let number = citation.number;

        if !seen.insert(number) {
            report.invalid += 1;
            report
                .issues
                .push(format!("Citation [{}] is numbered more than once", number));
            continue;
        }

        if citation.content.trim().is_empty() {
            report.missing_content += 1;
            report
                .issues
                .push(format!("Citation [{}] has no content", number));
            continue;
        }

        if !references(answer, number) {
            report
                .issues
                .push(format!("Citation [{}] not referenced in text", number));
        }

        match citation.modality {
            Modality::Document if citation.page_number.is_none() => {
                report
                    .issues
                    .push(format!("Citation [{}] missing page number", number));
            }
            Modality::Audio if citation.timestamp().is_none() => {
                report
                    .issues
                    .push(format!("Citation [{}] missing timestamp", number));
            }
            _ => {}
        }

        report.valid += 1;
    }

    report
}

/// How densely an answer leans on its citations.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CitationUsage {
    pub total_citations: usize,
    pub modality_breakdown: BTreeMap<Modality, usize>,
    /// Citations per 100 words of answer.
    pub citation_density: f64,
    /// Markers per sentence as a percentage, capped at 100.
    pub coverage_score: f64,
}

pub fn usage_stats(answer: &str, citations: &[Citation]) -> CitationUsage {
    let mut usage = CitationUsage {
        total_citations: citations.len(),
        ..Default::default()
    };

    for citation in citations {
        *usage.modality_breakdown.entry(citation.modality).or_insert(0) += 1;
    }

    let words = word_count(answer);
    if words > 0 {
        usage.citation_density = citations.len() as f64 / words as f64 * 100.0;
    }

    let sentences = answer
        .split(['.', '!', '?'])
        .filter(|sentence| !sentence.trim().is_empty())
        .count();
    if sentences > 0 {
        usage.coverage_score = (marker_count(answer) as f64 / sentences as f64 * 100.0).min(100.0);
    }

    usage
}
