//! Interactive demo: ingest a small statement and answer questions with
//! Gemini-backed embeddings and chat.
//!
//! ```bash
//! GOOGLE_API_KEY=... cargo run --example chat_with_statement --features gemini
//! ```

use finsense::llm::{GeminiAnswerer, GeminiClient, GeminiEmbedder};
use finsense::{RawTable, Session, VectorStore};
use serde_json::json;

fn main() -> anyhow::Result<()> {
    let api_key = std::env::var("GOOGLE_API_KEY")
        .expect("GOOGLE_API_KEY environment variable must be set");

    let table = RawTable::new(
        vec![
            "Txn Date".to_string(),
            "Desc".to_string(),
            "Debit".to_string(),
            "Credit".to_string(),
        ],
        vec![
            vec![json!("2023-01-02"), json!("Payroll Inc"), json!(""), json!("2,000.00")],
            vec![json!("2023-01-05"), json!("Starbucks"), json!("4.50"), json!("")],
            vec![json!("2023-01-07"), json!("Whole Foods Market"), json!("82.10"), json!("")],
            vec![json!("2023-01-09"), json!("Shell Gas"), json!("40.00"), json!("")],
            vec![json!("2023-01-15"), json!("Starbucks"), json!("5.25"), json!("")],
        ],
    );

    let client = GeminiClient::new(api_key);
    let index = VectorStore::new(GeminiEmbedder::new(client.clone()));
    let session = Session::ingest(index, &table)?;

    let summary = session.summary();
    println!(
        "Ingested {} transactions totaling {:.2} ({} suspicious)",
        summary.total_transactions, summary.total_amount, summary.suspicious_count
    );

    let answerer = GeminiAnswerer::new(client);
    for question in ["What's my total spending?", "How much did I spend at Starbucks?"] {
        println!("\nQ: {question}");
        let outcome = session.ask(&answerer, question)?;
        println!("A: {}", outcome.answer);
        if !outcome.retrieval.display_table.is_empty() {
            println!("   ({} supporting transactions)", outcome.retrieval.display_table.len());
        }
    }

    Ok(())
}
