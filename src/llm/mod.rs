//! Gemini-backed implementations of the external capabilities: an
//! [`crate::Embedder`] for the vector store and an [`crate::Answerer`] for
//! question answering. Only compiled with the `gemini` feature.

pub mod answerer;
pub mod client;
pub mod embedder;
pub mod types;

pub use answerer::*;
pub use client::*;
pub use embedder::*;
pub use types::*;
