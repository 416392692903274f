//! # FinSense
//!
//! A library for turning messy bank-statement exports into something you can
//! ask questions about. The pipeline cleans and profiles an arbitrary tabular
//! export, builds a semantic index over the transactions, and routes each
//! free-text question either to the full dataset (aggregation, narrative) or
//! to a similarity-searched subset (targeted lookups).
//!
//! ## Core Concepts
//!
//! - **Column Resolver**: maps unknown input headers to the canonical
//!   date/amount/merchant roles via alias tables and content sniffing
//! - **Transaction Normalizer**: parses dates and currency-formatted amounts,
//!   drops unparsable rows, flags negative amounts as suspicious
//! - **Query Classifier**: decides per question whether the answer needs the
//!   whole dataset or a retrieved subset, and whether to show evidence
//! - **Retrieval Router**: produces the document set for the answering
//!   capability and the supporting-evidence table
//! - **Index Provider / Answerer**: external capabilities behind the
//!   [`TransactionIndex`] and [`Answerer`] traits (a Gemini-backed pair ships
//!   behind the `gemini` feature)
//!
//! ## Example
//!
//! ```rust,ignore
//! use finsense::*;
//!
//! let table = RawTable::new(headers, rows); // from your CSV layer
//! let index = VectorStore::new(my_embedder);
//! let session = Session::ingest(index, &table)?;
//!
//! println!("{} transactions", session.summary().total_transactions);
//!
//! let outcome = session.ask(&my_answerer, "What's my total spending?")?;
//! println!("{}", outcome.answer);
//! ```

pub mod classify;
pub mod columns;
pub mod currency;
pub mod error;
pub mod index;
pub mod normalize;
pub mod retrieval;
pub mod summary;
pub mod table;
pub mod validate;

#[cfg(feature = "gemini")]
pub mod llm;

pub use classify::{classify, QueryIntent};
pub use columns::{resolve, AmountSource, ColumnMapping};
pub use currency::{choose_currency, format_amount};
pub use error::{Result, StatementError};
pub use index::{Embedder, IndexedDocument, TransactionIndex, VectorStore};
pub use normalize::{normalize, Transaction, UNKNOWN_MERCHANT};
pub use retrieval::{retrieve, RetrievalResult, TableRow, SUMMARY_MERCHANT};
pub use summary::{DateRange, Summary};
pub use table::RawTable;
pub use validate::validate;

use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// External capability that turns a document set and a question into prose.
///
/// The router guarantees every document's metadata carries at least
/// `merchant`, `amount` and `date` before this is called. Failures propagate
/// to the caller as-is; retry policy is a caller concern.
pub trait Answerer {
    fn answer(&self, documents: &[IndexedDocument], question: &str) -> Result<String>;
}

/// Tunables for one session. Defaults match the original deployment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Fan-out for narrow-query similarity search.
    pub search_k: usize,
    /// Records embedded per index batch.
    pub embed_batch_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            search_k: 5,
            embed_batch_size: 200,
        }
    }
}

/// Everything the answering capability receives plus what it produced.
#[derive(Debug, Clone)]
pub struct SessionAnswer {
    pub answer: String,
    pub retrieval: RetrievalResult,
}

/// One uploaded statement's worth of state: the normalized table, its
/// summary, and the index built over it.
///
/// Owned by the caller and read-only after ingestion; a new upload means a
/// new session rather than patching this one in place.
#[derive(Debug)]
pub struct Session<I: TransactionIndex> {
    config: SessionConfig,
    index: I,
    transactions: Vec<Transaction>,
    summary: Summary,
}

impl<I: TransactionIndex> Session<I> {
    /// Run the full ingestion pipeline with default tunables.
    pub fn ingest(index: I, table: &RawTable) -> Result<Self> {
        Self::ingest_with_config(index, table, SessionConfig::default())
    }

    /// Validate, resolve columns, normalize, summarize, and index.
    ///
    /// If the supplied index is already Ready (loaded from a persisted copy),
    /// the embedding step is skipped and the index is used as-is.
    pub fn ingest_with_config(index: I, table: &RawTable, config: SessionConfig) -> Result<Self> {
        validate::validate(table)?;
        let mapping = columns::resolve(table);
        let (transactions, summary) = normalize::normalize(table, &mapping)?;

        let mut index = index;
        if index.is_ready() {
            info!("Index already initialized; skipping embedding step");
        } else {
            index.build_index(&transactions, config.embed_batch_size)?;
        }

        info!(
            "Session ready: {} transactions from {} input rows",
            summary.total_transactions, summary.total_rows
        );

        Ok(Self {
            config,
            index,
            transactions,
            summary,
        })
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    /// Route a question and produce the document set plus display table.
    pub fn retrieve(&self, question: &str) -> Result<RetrievalResult> {
        retrieval::retrieve(
            &self.transactions,
            &self.summary,
            &self.index,
            question,
            self.config.search_k,
        )
    }

    /// Retrieve, then hand the documents to the answering capability.
    pub fn ask<A: Answerer>(&self, answerer: &A, question: &str) -> Result<SessionAnswer> {
        let retrieval = self.retrieve(question)?;
        let answer = answerer.answer(&retrieval.documents, question)?;
        Ok(SessionAnswer { answer, retrieval })
    }

    /// Save the index durably. Atomic: a failed save never leaves a corrupt
    /// index at the canonical path.
    pub fn persist_index(&self, path: &Path) -> Result<()> {
        self.index.persist(path)
    }
}
