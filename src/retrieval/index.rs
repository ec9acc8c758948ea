//! In-memory embedding index.

use super::{dot_product, top_k, Document, RetrievalHit};
use crate::embedding::Embedder;
use crate::error::{KallError, RemoteError, Result};
use crate::retry::RetryPolicy;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Fixed collection of documents and their embeddings.
///
/// Built wholesale from a document set; there is no incremental update.
/// Queries take `&self`, so one index can be shared behind an `Arc`.
pub struct EmbeddingIndex {
    entries: Vec<(Document, Vec<f32>)>,
    dimensions: usize,
    embedder: Arc<dyn Embedder>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for EmbeddingIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingIndex")
            .field("documents", &self.entries.len())
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

impl EmbeddingIndex {
    /// Embed every document and build the index.
    ///
    /// Either every document gets a vector or the build fails as a whole.
    #[instrument(skip_all, fields(count = documents.len()))]
    pub async fn build(
        documents: Vec<Document>,
        embedder: Arc<dyn Embedder>,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let texts: Vec<String> = documents.iter().map(|d| d.content.clone()).collect();

        let vectors = retry
            .run("corpus embedding", || embedder.embed_batch(&texts))
            .await?;

        if vectors.len() != documents.len() {
            return Err(RemoteError::MalformedResponse(format!(
                "Expected {} embeddings, got {}",
                documents.len(),
                vectors.len()
            ))
            .into());
        }

        let dimensions = vectors.first().map(Vec::len).unwrap_or(0);
        if let Some(bad) = vectors.iter().position(|v| v.len() != dimensions) {
            return Err(RemoteError::MalformedResponse(format!(
                "Embedding {} has {} dimensions, expected {}",
                bad,
                vectors[bad].len(),
                dimensions
            ))
            .into());
        }

        info!("Indexed {} documents ({} dimensions)", documents.len(), dimensions);

        Ok(Self {
            entries: documents.into_iter().zip(vectors).collect(),
            dimensions,
            embedder,
            retry,
        })
    }

    /// Return the `k` documents most similar to `text`, best first.
    ///
    /// When `k` exceeds the corpus size the whole corpus is returned.
    #[instrument(skip(self, text))]
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<RetrievalHit>> {
        if k == 0 {
            return Err(KallError::InvalidInput("k must be at least 1".to_string()));
        }

        let embedding = self
            .retry
            .run("query embedding", || self.embedder.embed(text))
            .await?;

        if !self.entries.is_empty() && embedding.len() != self.dimensions {
            return Err(RemoteError::MalformedResponse(format!(
                "Query embedding has {} dimensions, index has {}",
                embedding.len(),
                self.dimensions
            ))
            .into());
        }

        Ok(self.rank(&embedding, k))
    }

    /// Rank stored documents against an already computed query vector.
    pub fn rank(&self, query_embedding: &[f32], k: usize) -> Vec<RetrievalHit> {
        let scores: Vec<f32> = self
            .entries
            .iter()
            .map(|(_, vector)| dot_product(query_embedding, vector))
            .collect();

        let hits: Vec<RetrievalHit> = top_k(&scores, k)
            .into_iter()
            .map(|i| RetrievalHit {
                document: self.entries[i].0.clone(),
                score: scores[i],
            })
            .collect();

        debug!("Ranked {} documents, returning {}", scores.len(), hits.len());
        hits
    }

    /// Number of indexed documents.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds no documents.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Embedding dimensions of the stored vectors.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Indexed documents in insertion order.
    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.entries.iter().map(|(doc, _)| doc)
    }
}
