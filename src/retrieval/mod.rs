//! Brute-force vector retrieval over a fixed document set.
//!
//! Documents are embedded once when the index is built; each query is
//! embedded and scored against every stored vector by dot product.

pub mod corpus;
mod index;

pub use index::EmbeddingIndex;

use serde::{Deserialize, Serialize};

/// A document held by the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Section heading, if the source had one.
    pub title: Option<String>,
    /// Page content that gets embedded and returned to tools.
    pub content: String,
}

impl Document {
    /// Create a document from its content, taking the title from a leading
    /// markdown heading when present.
    pub fn new(content: impl Into<String>) -> Self {
        let content = content.into();
        let title = content
            .trim_start()
            .lines()
            .next()
            .filter(|line| line.starts_with('#'))
            .map(|line| line.trim_start_matches('#').trim().to_string())
            .filter(|t| !t.is_empty());

        Self { title, content }
    }
}

/// A document matched by a query, with its similarity score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalHit {
    /// The matched document.
    pub document: Document,
    /// Dot product between query and document embeddings (higher is better).
    pub score: f32,
}

/// Dot product of two equally sized vectors.
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Indices of the `k` highest-scoring entries, best first.
///
/// Equal scores keep their original relative order.
pub fn top_k(scores: &[f32], k: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    // `sort_by` is stable, which gives the insertion-order tie-break.
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    order.truncate(k);
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dot_product() {
        assert_eq!(dot_product(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]), 32.0);
        assert_eq!(dot_product(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(dot_product(&[], &[]), 0.0);
    }

    #[test]
    fn test_top_k_orders_by_score() {
        assert_eq!(top_k(&[0.1, 0.9, 0.5], 2), vec![1, 2]);
        assert_eq!(top_k(&[0.1, 0.9, 0.5], 10), vec![1, 2, 0]);
    }

    #[test]
    fn test_top_k_ties_keep_insertion_order() {
        assert_eq!(top_k(&[0.5, 0.7, 0.5, 0.7, 0.5], 5), vec![1, 3, 0, 2, 4]);
    }

    #[test]
    fn test_document_title_from_heading() {
        let doc = Document::new("\n## Booking and Cancellation\n\n1. How can I cancel?");
        assert_eq!(doc.title.as_deref(), Some("Booking and Cancellation"));

        let doc = Document::new("Plain text without heading");
        assert_eq!(doc.title, None);
    }
}
