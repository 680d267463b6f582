//! Objective embedding for precedent retrieval.
//!
//! The default [`SimHashEmbedder`] produces deterministic, fixed-dimension
//! embeddings by hashing each word and spreading the hash bits across a
//! float vector, normalized to unit length. It needs no API calls, model
//! files, or network access; a neural embedder can be slotted in by the
//! boundary through the [`Embedder`] trait.

use std::hash::{DefaultHasher, Hash, Hasher};

use async_trait::async_trait;

use genesis_types::Result;

/// Turns text into a fixed-dimension vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// The output dimension.
    fn dimension(&self) -> usize;
}

/// Deterministic local embedder based on SimHash.
///
/// For each word, hash it, then for each dimension add +1 or -1
/// depending on a bit of the hash mixed with the dimension index.
/// The accumulated vector is L2-normalized.
pub struct SimHashEmbedder {
    dimension: usize,
}

impl SimHashEmbedder {
    /// Create an embedder with the given dimension.
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    /// The default 256-dimension embedder.
    pub fn default_dimension() -> Self {
        Self::new(256)
    }

    fn compute(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            return vector;
        }

        for word in &words {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            let hash = hasher.finish();
            for (i, val) in vector.iter_mut().enumerate() {
                let mixed = hash ^ (i as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15);
                if (mixed >> (i % 64)) & 1 == 1 {
                    *val += 1.0;
                } else {
                    *val -= 1.0;
                }
            }
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for val in &mut vector {
                *val /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for SimHashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.compute(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Cosine similarity between two vectors; 0.0 when either has zero norm
/// or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deterministic_for_same_text() {
        let embedder = SimHashEmbedder::default_dimension();
        let a = embedder.embed("translate the sign").await.unwrap();
        let b = embedder.embed("translate the sign").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn unit_norm() {
        let embedder = SimHashEmbedder::default_dimension();
        let v = embedder.embed("extract text from image").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.01, "norm was {norm}");
    }

    #[tokio::test]
    async fn empty_text_gives_zero_vector() {
        let embedder = SimHashEmbedder::new(64);
        let v = embedder.embed("   ").await.unwrap();
        assert_eq!(v.len(), 64);
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn similar_text_scores_higher_than_unrelated() {
        let embedder = SimHashEmbedder::default_dimension();
        let base = embedder
            .embed("translate japanese text to english")
            .await
            .unwrap();
        let close = embedder
            .embed("translate the japanese text in this picture to english")
            .await
            .unwrap();
        let far = embedder.embed("denoise this audio recording").await.unwrap();

        assert!(
            cosine_similarity(&base, &close) > cosine_similarity(&base, &far),
            "expected related objectives to score higher"
        );
    }

    #[test]
    fn cosine_edge_cases() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < f32::EPSILON);
    }
}
