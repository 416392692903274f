use crate::classify::{classify, QueryIntent};
use crate::error::Result;
use crate::index::{amount_value, document_metadata, IndexedDocument, TransactionIndex};
use crate::normalize::{Transaction, UNKNOWN_MERCHANT};
use crate::summary::Summary;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Merchant sentinel marking the synthetic summary document.
pub const SUMMARY_MERCHANT: &str = "SUMMARY";

/// Keywords that make a broad question show the full transaction table.
const WHOLE_DATASET_KEYWORDS: &[&str] = &["all", "total", "entire", "overall", "everything"];

/// Merchant names shorter than this are ignored by the question filter;
/// two-letter names match far too much English.
const MIN_MERCHANT_MATCH_LEN: usize = 3;

/// One row of the supporting-evidence table shown next to an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub date: String,
    pub merchant: String,
    pub amount: f64,
}

impl TableRow {
    fn from_transaction(transaction: &Transaction) -> Self {
        Self {
            date: transaction.date.format("%Y-%m-%d").to_string(),
            merchant: transaction.merchant.clone(),
            amount: transaction.amount,
        }
    }

    fn from_document(document: &IndexedDocument) -> Self {
        let str_field = |key: &str| {
            document
                .metadata
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        Self {
            date: str_field("date"),
            merchant: str_field("merchant"),
            amount: document
                .metadata
                .get("amount")
                .and_then(Value::as_f64)
                .unwrap_or(0.0),
        }
    }
}

/// What the router hands back for one question: the documents for the
/// answering capability (summary record first on the broad path) and a
/// possibly-empty display table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub intent: QueryIntent,
    pub documents: Vec<IndexedDocument>,
    pub display_table: Vec<TableRow>,
}

/// Route a question to full-dataset materialization or similarity search.
///
/// Broad questions get every transaction as a document, built directly from
/// the in-memory table rather than the index, with one synthetic summary
/// document prepended. Narrow questions delegate to the index with fan-out
/// `k`; searching a never-built index fails with `IndexNotInitialized` so an
/// empty result can never masquerade as "no matching transactions".
pub fn retrieve(
    transactions: &[Transaction],
    summary: &Summary,
    index: &dyn TransactionIndex,
    question: &str,
    k: usize,
) -> Result<RetrievalResult> {
    let intent = classify(question);

    if intent.is_broad {
        debug!("Routing broad question to full-dataset materialization");
        let documents = broad_documents(transactions, summary);
        let display_table = if intent.show_table {
            broad_display_table(transactions, question)
        } else {
            Vec::new()
        };
        return Ok(RetrievalResult {
            intent,
            documents,
            display_table,
        });
    }

    debug!("Routing narrow question to similarity search (k={})", k);
    let documents: Vec<IndexedDocument> = index
        .search(question, k)?
        .into_iter()
        .map(ensure_metadata_shape)
        .collect();

    let display_table = if intent.show_table {
        documents.iter().map(TableRow::from_document).collect()
    } else {
        Vec::new()
    };

    Ok(RetrievalResult {
        intent,
        documents,
        display_table,
    })
}

fn broad_documents(transactions: &[Transaction], summary: &Summary) -> Vec<IndexedDocument> {
    let mut documents = Vec::with_capacity(transactions.len() + 1);
    documents.push(summary_document(summary));

    for transaction in transactions {
        let mut text = format!(
            "{} - ${:.2} on {}",
            transaction.merchant,
            transaction.amount,
            transaction.date.format("%Y-%m-%d")
        );
        if let Some(reference) = reference_value(transaction) {
            text = format!("[{}] {}", reference, text);
        }
        documents.push(IndexedDocument {
            text,
            metadata: document_metadata(transaction),
        });
    }

    documents
}

fn summary_document(summary: &Summary) -> IndexedDocument {
    let span = |d: Option<chrono::NaiveDate>| {
        d.map_or_else(|| "n/a".to_string(), |d| d.format("%Y-%m-%d").to_string())
    };
    let text = format!(
        "Summary: {} transactions totaling ${:.2}, averaging ${:.2} per transaction, from {} to {}",
        summary.total_transactions,
        summary.total_amount,
        summary.avg_amount,
        span(summary.date_range.start),
        span(summary.date_range.end),
    );

    let mut metadata = serde_json::Map::new();
    metadata.insert("merchant".to_string(), json!(SUMMARY_MERCHANT));
    metadata.insert("amount".to_string(), amount_value(summary.total_amount));
    metadata.insert("date".to_string(), json!(span(summary.date_range.start)));

    IndexedDocument { text, metadata }
}

/// A reference-like pass-through value, if the statement carried one.
fn reference_value(transaction: &Transaction) -> Option<String> {
    transaction
        .extra
        .iter()
        .find(|(key, _)| key.contains("ref"))
        .and_then(|(_, value)| crate::table::cell_to_string(value))
}

/// Display-table policy for broad questions, checked in precedence order:
/// a named merchant filters the table, a whole-dataset keyword shows all of
/// it, anything else shows nothing.
fn broad_display_table(transactions: &[Transaction], question: &str) -> Vec<TableRow> {
    let lowered = question.to_lowercase();

    let named: Vec<&str> = transactions
        .iter()
        .map(|t| t.merchant.as_str())
        .filter(|m| m.len() >= MIN_MERCHANT_MATCH_LEN && *m != UNKNOWN_MERCHANT)
        .filter(|m| lowered.contains(*m))
        .collect();

    if !named.is_empty() {
        return transactions
            .iter()
            .filter(|t| named.iter().any(|m| t.merchant.contains(m)))
            .map(TableRow::from_transaction)
            .collect();
    }

    if WHOLE_DATASET_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
        return transactions.iter().map(TableRow::from_transaction).collect();
    }

    Vec::new()
}

/// Guarantee the answering capability's metadata contract: `amount`, `date`
/// and `merchant` are always present, with safe defaults when the underlying
/// index returned partial metadata.
fn ensure_metadata_shape(mut document: IndexedDocument) -> IndexedDocument {
    document
        .metadata
        .entry("amount".to_string())
        .or_insert_with(|| json!(0.0));
    document
        .metadata
        .entry("date".to_string())
        .or_insert_with(|| json!(""));
    document
        .metadata
        .entry("merchant".to_string())
        .or_insert_with(|| json!(""));
    document
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StatementError;
    use crate::summary::build_summary;
    use std::collections::BTreeMap;
    use std::path::Path;

    fn tx(date: &str, merchant: &str, amount: f64) -> Transaction {
        Transaction {
            date: date.parse().unwrap(),
            merchant: merchant.to_string(),
            amount,
            is_suspicious: amount < 0.0,
            extra: BTreeMap::new(),
        }
    }

    fn dataset() -> (Vec<Transaction>, Summary) {
        let transactions = vec![
            tx("2023-01-01", "starbucks", -4.5),
            tx("2023-01-02", "whole foods", -80.0),
            tx("2023-01-03", "starbucks reserve", -6.0),
        ];
        let summary = build_summary(3, &transactions);
        (transactions, summary)
    }

    /// Index stub for routing tests; canned responses, no embeddings.
    struct StubIndex {
        ready: bool,
        results: Vec<IndexedDocument>,
    }

    impl TransactionIndex for StubIndex {
        fn build_index(&mut self, _: &[Transaction], _: usize) -> Result<()> {
            self.ready = true;
            Ok(())
        }

        fn search(&self, _: &str, k: usize) -> Result<Vec<IndexedDocument>> {
            if !self.ready {
                return Err(StatementError::IndexNotInitialized);
            }
            Ok(self.results.iter().take(k).cloned().collect())
        }

        fn is_ready(&self) -> bool {
            self.ready
        }

        fn persist(&self, _: &Path) -> Result<()> {
            Ok(())
        }

        fn load(&mut self, _: &Path) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_broad_query_puts_summary_document_first() {
        let (transactions, summary) = dataset();
        let index = StubIndex {
            ready: true,
            results: vec![],
        };

        let result = retrieve(&transactions, &summary, &index, "what is my total?", 5).unwrap();

        assert!(result.intent.is_broad);
        assert_eq!(result.documents.len(), 4);
        let sentinels = result
            .documents
            .iter()
            .filter(|d| d.metadata.get("merchant") == Some(&json!(SUMMARY_MERCHANT)))
            .count();
        assert_eq!(sentinels, 1);
        assert_eq!(
            result.documents[0].metadata.get("merchant").unwrap(),
            SUMMARY_MERCHANT
        );
        assert!(result.documents[0].text.starts_with("Summary:"));
        // Total formatted to two decimals.
        assert!(result.documents[0].text.contains("$-90.50"));
    }

    #[test]
    fn test_merchant_filter_beats_whole_dataset_keyword() {
        let (transactions, summary) = dataset();
        let index = StubIndex {
            ready: true,
            results: vec![],
        };

        // "total" is a whole-dataset keyword, but the named merchant wins.
        let result = retrieve(
            &transactions,
            &summary,
            &index,
            "What is my total at starbucks?",
            5,
        )
        .unwrap();

        assert!(!result.display_table.is_empty());
        assert!(result
            .display_table
            .iter()
            .all(|row| row.merchant.contains("starbucks")));
        assert_eq!(result.display_table.len(), 2);
    }

    #[test]
    fn test_whole_dataset_keyword_shows_full_table() {
        let (transactions, summary) = dataset();
        let index = StubIndex {
            ready: true,
            results: vec![],
        };

        let result = retrieve(&transactions, &summary, &index, "sum of everything", 5).unwrap();
        assert_eq!(result.display_table.len(), transactions.len());
    }

    #[test]
    fn test_broad_without_merchant_or_dataset_keyword_shows_nothing() {
        let (transactions, summary) = dataset();
        let index = StubIndex {
            ready: true,
            results: vec![],
        };

        let result = retrieve(&transactions, &summary, &index, "any spending patterns?", 5).unwrap();
        assert!(result.intent.is_broad);
        assert!(result.display_table.is_empty());
    }

    #[test]
    fn test_narrative_question_suppresses_table() {
        let (transactions, summary) = dataset();
        let index = StubIndex {
            ready: true,
            results: vec![],
        };

        let result = retrieve(
            &transactions,
            &summary,
            &index,
            "tell me the story of all my spending",
            5,
        )
        .unwrap();
        assert!(result.intent.is_broad);
        assert!(result.display_table.is_empty());
        assert!(!result.documents.is_empty());
    }

    #[test]
    fn test_narrow_query_uses_index_and_guards_metadata() {
        let (transactions, summary) = dataset();
        let mut partial = serde_json::Map::new();
        partial.insert("merchant".to_string(), json!("starbucks"));
        let index = StubIndex {
            ready: true,
            results: vec![IndexedDocument {
                text: "starbucks".to_string(),
                metadata: partial,
            }],
        };

        let result = retrieve(&transactions, &summary, &index, "coffee at starbucks", 5).unwrap();

        assert!(!result.intent.is_broad);
        assert_eq!(result.documents.len(), 1);
        let metadata = &result.documents[0].metadata;
        assert_eq!(metadata.get("amount").unwrap(), &json!(0.0));
        assert_eq!(metadata.get("date").unwrap(), "");
        assert_eq!(metadata.get("merchant").unwrap(), "starbucks");

        // Display table mirrors retrieval order, not re-sorted.
        assert_eq!(result.display_table.len(), 1);
        assert_eq!(result.display_table[0].merchant, "starbucks");
    }

    #[test]
    fn test_narrow_query_on_unbuilt_index_fails_fast() {
        let (transactions, summary) = dataset();
        let index = StubIndex {
            ready: false,
            results: vec![],
        };

        let err = retrieve(&transactions, &summary, &index, "coffee at starbucks", 5).unwrap_err();
        assert!(matches!(err, StatementError::IndexNotInitialized));
    }
}
