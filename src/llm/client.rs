use crate::error::{Result, StatementError};
use crate::llm::types::{Content, GenerateContentRequest, GenerationConfig};
use reqwest::blocking::Client;
use serde_json::{json, Value};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Embedding model used for both document and query vectors.
pub const EMBEDDING_MODEL: &str = "models/gemini-embedding-001";
/// Chat model used by the answering capability.
pub const CHAT_MODEL: &str = "gemini-2.5-flash";

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: GEMINI_BASE_URL.to_string(),
        }
    }

    pub(crate) fn batch_embed(
        &self,
        model: &str,
        texts: &[String],
        task_type: &str,
    ) -> Result<Vec<Vec<f32>>> {
        let url = format!(
            "{}/{}:batchEmbedContents?key={}",
            self.base_url, model, self.api_key
        );

        let requests: Vec<Value> = texts
            .iter()
            .map(|text| {
                json!({
                    "model": model,
                    "content": { "parts": [{ "text": text }] },
                    "taskType": task_type,
                })
            })
            .collect();

        let res = self
            .client
            .post(&url)
            .json(&json!({ "requests": requests }))
            .send()
            .map_err(|e| StatementError::EmbeddingFailed(e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            let err_text = res
                .text()
                .map_err(|e| StatementError::EmbeddingFailed(e.to_string()))?;
            return Err(StatementError::EmbeddingFailed(format!(
                "Gemini API Error (status {}): {}",
                status, err_text
            )));
        }

        let body: Value = res
            .json()
            .map_err(|e| StatementError::EmbeddingFailed(e.to_string()))?;

        let embeddings = body
            .get("embeddings")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                StatementError::EmbeddingFailed("Response missing 'embeddings'".to_string())
            })?;

        embeddings
            .iter()
            .map(|embedding| {
                embedding
                    .get("values")
                    .and_then(Value::as_array)
                    .map(|values| {
                        values
                            .iter()
                            .filter_map(Value::as_f64)
                            .map(|v| v as f32)
                            .collect()
                    })
                    .ok_or_else(|| {
                        StatementError::EmbeddingFailed(
                            "Embedding entry missing 'values'".to_string(),
                        )
                    })
            })
            .collect()
    }

    pub(crate) fn generate_content(
        &self,
        model: &str,
        system_prompt: &str,
        messages: Vec<Content>,
        response_schema: Option<Value>,
    ) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, model, self.api_key
        );

        let payload = GenerateContentRequest {
            contents: messages,
            system_instruction: Some(Content::user(system_prompt)),
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema,
            },
        };

        let res = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .map_err(|e| StatementError::AnswerFailed(e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            let err_text = res
                .text()
                .map_err(|e| StatementError::AnswerFailed(e.to_string()))?;
            return Err(StatementError::AnswerFailed(format!(
                "Gemini API Error (status {}): {}",
                status, err_text
            )));
        }

        let body: crate::llm::types::GenerateContentResponse = res
            .json()
            .map_err(|e| StatementError::AnswerFailed(e.to_string()))?;

        let text = body
            .candidates
            .ok_or_else(|| StatementError::AnswerFailed("No candidates returned".to_string()))?
            .first()
            .ok_or_else(|| StatementError::AnswerFailed("Empty candidates list".to_string()))?
            .content
            .parts
            .first()
            .ok_or_else(|| StatementError::AnswerFailed("No parts in content".to_string()))?
            .text
            .clone();

        Ok(text)
    }
}
