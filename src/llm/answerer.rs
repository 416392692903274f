use crate::error::{Result, StatementError};
use crate::index::IndexedDocument;
use crate::llm::client::{GeminiClient, CHAT_MODEL};
use crate::llm::types::{AnswerResponse, Content};
use crate::Answerer;
use schemars::schema_for;

const SYSTEM_PROMPT: &str = "You are a financial assistant. Use the transaction data \
context to answer user questions clearly and accurately.";

/// [`Answerer`] backed by the Gemini chat API with a structured JSON
/// response schema.
pub struct GeminiAnswerer {
    client: GeminiClient,
    model: String,
}

impl GeminiAnswerer {
    pub fn new(client: GeminiClient) -> Self {
        Self {
            client,
            model: CHAT_MODEL.to_string(),
        }
    }

    pub fn with_model(client: GeminiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

impl Answerer for GeminiAnswerer {
    fn answer(&self, documents: &[IndexedDocument], question: &str) -> Result<String> {
        let context = documents
            .iter()
            .map(|d| format!("- {}", d.text))
            .collect::<Vec<_>>()
            .join("\n");

        let user = format!(
            "Here are the transactions:\n{}\n\nQuestion:\n{}",
            context, question
        );

        let schema = serde_json::to_value(schema_for!(AnswerResponse))?;
        let raw = self.client.generate_content(
            &self.model,
            SYSTEM_PROMPT,
            vec![Content::user(user)],
            Some(schema),
        )?;

        let parsed: AnswerResponse = serde_json::from_str(&raw)
            .map_err(|e| StatementError::AnswerFailed(format!("Malformed model response: {}", e)))?;
        Ok(parsed.answer)
    }
}
