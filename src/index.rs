use crate::error::{Result, StatementError};
use crate::normalize::Transaction;
use log::{info, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fs;
use std::path::Path;

/// Extra columns that read like free text and are folded into the
/// embeddable text alongside the merchant.
const DESCRIPTION_KEYS: &[&str] = &["description", "desc", "narration", "details", "memo"];

/// The unit of semantic search: short text plus structured metadata, derived
/// one-to-one from a [`Transaction`] at index-build time. The index is a
/// rebuildable artifact; the normalized table stays the source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct IndexedDocument {
    pub text: String,
    pub metadata: Map<String, Value>,
}

/// Turns text into fixed-length vectors. The query-side embedding defaults to
/// the document-side one; providers with distinct task types override it.
pub trait Embedder {
    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_documents(std::slice::from_ref(&text.to_string()))?;
        vectors.pop().ok_or_else(|| {
            StatementError::EmbeddingFailed("embedder returned no vector for query".to_string())
        })
    }
}

/// Durable nearest-neighbor index over transaction records.
///
/// The lifecycle is two-state: Uninitialized until `build_index` or `load`
/// succeeds, then Ready. Searching an Uninitialized index is a contract
/// violation surfaced as [`StatementError::IndexNotInitialized`], never a
/// silent empty result.
pub trait TransactionIndex {
    /// Embed and store the records. Incremental: calling again grows the
    /// existing index rather than replacing it.
    fn build_index(&mut self, transactions: &[Transaction], batch_size: usize) -> Result<()>;

    /// The `k` stored documents most similar to the query text, best first.
    fn search(&self, query: &str, k: usize) -> Result<Vec<IndexedDocument>>;

    fn is_ready(&self) -> bool;

    fn persist(&self, path: &Path) -> Result<()>;

    fn load(&mut self, path: &Path) -> Result<()>;
}

/// Text a transaction is embedded under: merchant plus any description-like
/// pass-through column, falling back to `"unknown"` for blank rows.
pub fn embedding_text(transaction: &Transaction) -> String {
    let mut parts = vec![transaction.merchant.clone()];
    for key in DESCRIPTION_KEYS {
        if let Some(value) = transaction.extra.get(*key).and_then(Value::as_str) {
            parts.push(value.to_string());
        }
    }
    let text = parts.join(" ").trim().to_string();
    if text.is_empty() {
        "unknown".to_string()
    } else {
        text
    }
}

/// Metadata stored with each document: the three mandatory fields plus every
/// pass-through column. Dates serialize ISO-8601; whole-number amounts stay
/// integral for readability.
pub fn document_metadata(transaction: &Transaction) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert(
        "date".to_string(),
        json!(transaction.date.format("%Y-%m-%d").to_string()),
    );
    metadata.insert("merchant".to_string(), json!(transaction.merchant));
    metadata.insert("amount".to_string(), amount_value(transaction.amount));
    for (key, value) in &transaction.extra {
        metadata.entry(key.clone()).or_insert_with(|| value.clone());
    }
    metadata
}

pub(crate) fn amount_value(amount: f64) -> Value {
    if amount.fract() == 0.0 && amount.abs() < i64::MAX as f64 {
        json!(amount as i64)
    } else {
        json!(amount)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    text: String,
    metadata: Map<String, Value>,
    vector: Vec<f32>,
}

/// In-memory cosine-similarity store over an [`Embedder`], persisted as a
/// single JSON file. `None` entries means Uninitialized.
#[derive(Debug)]
pub struct VectorStore<E> {
    embedder: E,
    entries: Option<Vec<IndexEntry>>,
}

impl<E: Embedder> VectorStore<E> {
    pub fn new(embedder: E) -> Self {
        Self {
            embedder,
            entries: None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E: Embedder> TransactionIndex for VectorStore<E> {
    fn build_index(&mut self, transactions: &[Transaction], batch_size: usize) -> Result<()> {
        if transactions.is_empty() {
            warn!("No transactions to index; store left as-is");
            return Ok(());
        }

        let batch_size = batch_size.max(1);
        let batches = transactions.len().div_ceil(batch_size);

        for (batch_idx, batch) in transactions.chunks(batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(embedding_text).collect();
            let vectors = self.embedder.embed_documents(&texts)?;
            if vectors.len() != texts.len() {
                return Err(StatementError::EmbeddingFailed(format!(
                    "embedder returned {} vectors for {} texts",
                    vectors.len(),
                    texts.len()
                )));
            }

            let entries = self.entries.get_or_insert_with(Vec::new);
            for ((transaction, text), vector) in batch.iter().zip(texts).zip(vectors) {
                entries.push(IndexEntry {
                    text,
                    metadata: document_metadata(transaction),
                    vector,
                });
            }

            info!(
                "Indexed batch {}/{} ({} records total)",
                batch_idx + 1,
                batches,
                self.len()
            );
        }

        Ok(())
    }

    fn search(&self, query: &str, k: usize) -> Result<Vec<IndexedDocument>> {
        let entries = self
            .entries
            .as_ref()
            .ok_or(StatementError::IndexNotInitialized)?;

        let query_vector = self.embedder.embed_query(query)?;

        let mut scored: Vec<(f32, &IndexEntry)> = entries
            .iter()
            .map(|entry| (cosine_similarity(&query_vector, &entry.vector), entry))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(_, entry)| IndexedDocument {
                text: entry.text.clone(),
                metadata: entry.metadata.clone(),
            })
            .collect())
    }

    fn is_ready(&self) -> bool {
        self.entries.is_some()
    }

    fn persist(&self, path: &Path) -> Result<()> {
        let entries = self
            .entries
            .as_ref()
            .ok_or(StatementError::IndexNotInitialized)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| persistence_error("save", path, &e))?;
        }

        // Write to a sibling temp file, then rename over the canonical path,
        // so a failed save never leaves a corrupt index visible there.
        let tmp = path.with_extension("tmp");
        let result = (|| -> Result<()> {
            let file = fs::File::create(&tmp).map_err(|e| persistence_error("save", path, &e))?;
            serde_json::to_writer(file, entries).map_err(|e| persistence_error("save", path, &e))?;
            fs::rename(&tmp, path).map_err(|e| persistence_error("save", path, &e))?;
            Ok(())
        })();

        if result.is_err() && tmp.exists() {
            let _ = fs::remove_file(&tmp);
        }
        result?;

        info!("Persisted vector index ({} records) to {}", entries.len(), path.display());
        Ok(())
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(StatementError::PersistenceError {
                operation: "load",
                path: path.display().to_string(),
                details: "no index file found at this path".to_string(),
            });
        }

        let raw = fs::read_to_string(path).map_err(|e| persistence_error("load", path, &e))?;
        if raw.trim().is_empty() {
            return Err(StatementError::PersistenceError {
                operation: "load",
                path: path.display().to_string(),
                details: "index file is empty or corrupted".to_string(),
            });
        }

        let entries: Vec<IndexEntry> =
            serde_json::from_str(&raw).map_err(|e| persistence_error("load", path, &e))?;
        info!("Loaded vector index ({} records) from {}", entries.len(), path.display());
        self.entries = Some(entries);
        Ok(())
    }
}

fn persistence_error(
    operation: &'static str,
    path: &Path,
    cause: &dyn std::fmt::Display,
) -> StatementError {
    StatementError::PersistenceError {
        operation,
        path: path.display().to_string(),
        details: cause.to_string(),
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    /// Deterministic letter-frequency embedder; close enough to rank
    /// lexically similar texts together.
    pub struct CountingEmbedder;

    impl Embedder for CountingEmbedder {
        fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|text| {
                    let mut v = vec![0.0f32; 26];
                    for c in text.to_lowercase().chars() {
                        if c.is_ascii_lowercase() {
                            v[(c as u8 - b'a') as usize] += 1.0;
                        }
                    }
                    v
                })
                .collect())
        }
    }

    fn tx(date: &str, merchant: &str, amount: f64) -> Transaction {
        Transaction {
            date: date.parse().unwrap(),
            merchant: merchant.to_string(),
            amount,
            is_suspicious: amount < 0.0,
            extra: BTreeMap::new(),
        }
    }

    fn sample() -> Vec<Transaction> {
        vec![
            tx("2023-01-01", "starbucks", -4.5),
            tx("2023-01-02", "whole foods market", -80.0),
            tx("2023-01-03", "starbucks reserve", -6.0),
            tx("2023-01-04", "shell gas", -40.0),
        ]
    }

    #[test]
    fn test_search_before_build_fails() {
        let store = VectorStore::new(CountingEmbedder);
        assert!(matches!(
            store.search("coffee", 3),
            Err(StatementError::IndexNotInitialized)
        ));
    }

    #[test]
    fn test_build_and_search() {
        let mut store = VectorStore::new(CountingEmbedder);
        store.build_index(&sample(), 2).unwrap();
        assert!(store.is_ready());
        assert_eq!(store.len(), 4);

        let hits = store.search("starbucks", 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].text.contains("starbucks"));
        assert_eq!(hits[0].metadata.get("merchant").unwrap(), "starbucks");
    }

    #[test]
    fn test_incremental_build_grows_index() {
        let mut store = VectorStore::new(CountingEmbedder);
        let all = sample();
        store.build_index(&all[..2], 10).unwrap();
        store.build_index(&all[2..], 10).unwrap();
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn test_empty_build_leaves_store_uninitialized() {
        let mut store = VectorStore::new(CountingEmbedder);
        store.build_index(&[], 10).unwrap();
        assert!(!store.is_ready());
    }

    #[test]
    fn test_persist_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");

        let mut store = VectorStore::new(CountingEmbedder);
        store.build_index(&sample(), 100).unwrap();
        let expected = store.search("starbucks", 3).unwrap();
        store.persist(&path).unwrap();

        let mut reloaded = VectorStore::new(CountingEmbedder);
        reloaded.load(&path).unwrap();
        assert_eq!(reloaded.search("starbucks", 3).unwrap(), expected);
    }

    #[test]
    fn test_persist_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");

        let mut store = VectorStore::new(CountingEmbedder);
        store.build_index(&sample(), 100).unwrap();
        store.persist(&path).unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_load_missing_file_reports_path() {
        let mut store = VectorStore::new(CountingEmbedder);
        let err = store.load(Path::new("/nonexistent/index.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/index.json"));
    }

    #[test]
    fn test_load_empty_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        std::fs::write(&path, "").unwrap();

        let mut store = VectorStore::new(CountingEmbedder);
        let err = store.load(&path).unwrap_err();
        assert!(err.to_string().contains("empty or corrupted"));
    }

    #[test]
    fn test_embedding_text_fallback() {
        let mut t = tx("2023-01-01", "", 1.0);
        t.merchant = "".to_string();
        assert_eq!(embedding_text(&t), "unknown");

        let mut with_desc = tx("2023-01-01", "starbucks", 1.0);
        with_desc
            .extra
            .insert("description".to_string(), serde_json::json!("latte"));
        assert_eq!(embedding_text(&with_desc), "starbucks latte");
    }

    #[test]
    fn test_metadata_shape() {
        let mut t = tx("2023-01-05", "shop", 12.0);
        t.extra
            .insert("ref_no".to_string(), serde_json::json!("TX-9"));
        let metadata = document_metadata(&t);
        assert_eq!(metadata.get("date").unwrap(), "2023-01-05");
        assert_eq!(metadata.get("merchant").unwrap(), "shop");
        // Whole amounts serialize as integers.
        assert_eq!(metadata.get("amount").unwrap(), &serde_json::json!(12));
        assert_eq!(metadata.get("ref_no").unwrap(), "TX-9");
    }
}
