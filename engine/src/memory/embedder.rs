//! Embedder trait. Used to produce vectors from text for `InMemoryVectorStore::put`/`search`.

use async_trait::async_trait;

use crate::memory::store::StoreError;

/// Produces fixed-size float vectors from text, for vector-similarity retrieval of
/// `GraphState.memories.ltm` (§4.5). Implementations must be `Send + Sync`.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embeds each text into a vector of dimension [`Embedder::dimension`], one per input,
    /// in the same order.
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, StoreError>;

    /// Vector dimension returned by [`Embedder::embed`].
    fn dimension(&self) -> usize;
}
