use log::debug;
use serde::{Deserialize, Serialize};

/// Keywords whose presence marks a question as needing the whole dataset.
///
/// Deliberately over-inclusive: treating a narrow question as broad only costs
/// context tokens, while treating a broad question as narrow risks a wrong
/// aggregate. Matched as case-insensitive substrings, no stemming.
const BROAD_KEYWORDS: &[&str] = &[
    "total",
    "sum",
    "all",
    "average",
    "mean",
    "count",
    "how many",
    "overall",
    "entire",
    "everything",
    "story",
    "summary",
    "summarize",
    "overview",
    "pattern",
    "trend",
    "top",
    "biggest",
    "largest",
    "highest",
    "most expensive",
];

/// Keywords marking narrative intent, which suppresses the evidence table:
/// the documents behind a narrative answer are the whole dataset, so a
/// "relevant transactions" table would be meaningless.
const NARRATIVE_KEYWORDS: &[&str] = &["story", "tell me", "narrative", "describe"];

/// Routing decision for a single question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryIntent {
    /// Whether the answer needs the full transaction set rather than a
    /// similarity-searched subset.
    pub is_broad: bool,
    /// Whether a supporting-evidence table should accompany the answer.
    pub show_table: bool,
}

/// Classify a free-text question by fixed keyword-set membership.
pub fn classify(question: &str) -> QueryIntent {
    let lowered = question.to_lowercase();

    let is_broad = BROAD_KEYWORDS.iter().any(|k| lowered.contains(k));
    let narrative = NARRATIVE_KEYWORDS.iter().any(|k| lowered.contains(k));

    let intent = QueryIntent {
        is_broad,
        show_table: !narrative,
    };
    debug!("Classified question {:?} as {:?}", question, intent);
    intent
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregation_question_is_broad() {
        let intent = classify("What's my total spending?");
        assert!(intent.is_broad);
        assert!(intent.show_table);
    }

    #[test]
    fn test_merchant_question_is_narrow() {
        let intent = classify("How much at Starbucks?");
        assert!(!intent.is_broad);
        assert!(intent.show_table);
    }

    #[test]
    fn test_narrative_question_hides_table() {
        let intent = classify("Tell me the story of my spending");
        assert!(intent.is_broad);
        assert!(!intent.show_table);
    }

    #[test]
    fn test_describe_hides_table_even_when_narrow() {
        let intent = classify("Describe my coffee purchases");
        assert!(!intent.show_table);
    }

    #[test]
    fn test_matching_is_case_insensitive_substring() {
        assert!(classify("SUMMARIZE my month").is_broad);
        assert!(classify("how many refunds did I get").is_broad);
    }
}
