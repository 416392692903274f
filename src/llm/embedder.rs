use crate::error::Result;
use crate::index::Embedder;
use crate::llm::client::{GeminiClient, EMBEDDING_MODEL};

/// [`Embedder`] backed by the Gemini embedding API, using the retrieval
/// document/query task types on the respective sides.
pub struct GeminiEmbedder {
    client: GeminiClient,
    model: String,
}

impl GeminiEmbedder {
    pub fn new(client: GeminiClient) -> Self {
        Self {
            client,
            model: EMBEDDING_MODEL.to_string(),
        }
    }

    pub fn with_model(client: GeminiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

impl Embedder for GeminiEmbedder {
    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.client
            .batch_embed(&self.model, texts, "RETRIEVAL_DOCUMENT")
    }

    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors =
            self.client
                .batch_embed(&self.model, &[text.to_string()], "RETRIEVAL_QUERY")?;
        vectors.pop().ok_or_else(|| {
            crate::error::StatementError::EmbeddingFailed(
                "no embedding returned for query".to_string(),
            )
        })
    }
}
