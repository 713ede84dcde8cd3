//! Embedding collaborator interface
//!
//! The engine never embeds text itself. It calls an injected `Embedder`
//! once per query and once per new candidate, and checks the output
//! dimension against the corpus configuration.

mod hash;

pub use hash::HashEmbedder;

use crate::error::{Error, Result};
use async_trait::async_trait;

/// Text embedding provider
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Output dimension; constant within one configuration
    fn dimension(&self) -> usize;

    /// Provider name used in logs
    fn name(&self) -> &str;
}

/// Embed `text` and verify the vector has `expected` dimensions.
pub async fn embed_checked(embedder: &dyn Embedder, text: &str, expected: usize) -> Result<Vec<f32>> {
    let vector = embedder.embed(text).await?;
    if vector.len() != expected {
        return Err(Error::Embedding(format!(
            "{} returned {} dimensions, corpus expects {expected}",
            embedder.name(),
            vector.len()
        )));
    }
    Ok(vector)
}
