//! Offline embedding provider based on hashed words and character trigrams.

use crate::embeddings::provider::EmbeddingProvider;
use insight_core::AppResult;
use std::collections::HashMap;

const STOP_WORDS: [&str; 32] = [
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them",
];

/// Deterministic, content-aware embeddings without a model.
///
/// Each significant word contributes to one bucket for the whole word and
/// one bucket per padded character trigram, so texts sharing vocabulary
/// (including inflections like "user"/"users") land close together. Not
/// semantically accurate, but stable across runs and machines.
#[derive(Debug)]
pub struct MockProvider {
    dimensions: usize,
}

impl MockProvider {
    /// Create a new mock provider with specified dimensions.
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn bucket(&self, token: &str, seed: u64) -> usize {
        // FNV-1a
        let hash = token.bytes().fold(0xcbf2_9ce4_8422_2325 ^ seed, |acc, b| {
            (acc ^ b as u64).wrapping_mul(0x0000_0100_0000_01b3)
        });
        (hash % self.dimensions as u64) as usize
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];

        let lower = text.to_lowercase();
        let mut word_freq: HashMap<&str, u32> = HashMap::new();
        for word in lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty() && !STOP_WORDS.contains(w))
        {
            *word_freq.entry(word).or_insert(0) += 1;
        }

        for (word, freq) in &word_freq {
            let weight = (*freq as f32).sqrt();
            embedding[self.bucket(word, 0)] += *freq as f32;

            let padded: Vec<char> = std::iter::once('^')
                .chain(word.chars())
                .chain(std::iter::once('$'))
                .collect();
            for window in padded.windows(3) {
                let trigram: String = window.iter().collect();
                embedding[self.bucket(&trigram, 1)] += weight;
            }
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut embedding {
                *v /= norm;
            }
        }

        embedding
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for MockProvider {
    fn provider_name(&self) -> &str {
        "mock"
    }

    fn model_name(&self) -> &str {
        "trigram-v1"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::cosine_similarity;

    fn norm(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    #[tokio::test]
    async fn test_mock_provider_embed_batch() {
        let provider = MockProvider::new(384);
        let texts = vec![
            "hello world".to_string(),
            "test embedding".to_string(),
            "rust programming".to_string(),
        ];

        let embeddings = provider.embed_batch(&texts).await.unwrap();

        assert_eq!(embeddings.len(), 3);
        for embedding in &embeddings {
            assert_eq!(embedding.len(), 384);
            assert!((norm(embedding) - 1.0).abs() < 0.001);
        }
    }

    #[tokio::test]
    async fn test_mock_provider_deterministic() {
        let provider = MockProvider::new(384);
        let embedding1 = provider.embed("deterministic test").await.unwrap();
        let embedding2 = provider.embed("deterministic test").await.unwrap();
        assert_eq!(embedding1, embedding2);
    }

    #[tokio::test]
    async fn test_shared_vocabulary_scores_higher() {
        let provider = MockProvider::new(384);
        let stored = provider
            .embed("Client wants 100 user CRM licenses, mobile access required.")
            .await
            .unwrap();
        let related = provider.embed("CRM for 100 users").await.unwrap();
        let unrelated = provider.embed("Pasta recipes with basil").await.unwrap();

        assert!(cosine_similarity(&stored, &related) > cosine_similarity(&stored, &unrelated));
    }

    #[tokio::test]
    async fn test_mock_provider_empty_text() {
        let provider = MockProvider::new(384);
        let embedding = provider.embed("").await.unwrap();

        assert_eq!(embedding.len(), 384);
        assert!(embedding.iter().all(|&x| x == 0.0));
    }

    #[tokio::test]
    async fn test_mock_provider_utf8_safety() {
        let provider = MockProvider::new(64);
        let embedding = provider
            .embed("Gamedex é um aplicativo 🎮 brasileiro para gerenciar jogos!")
            .await
            .unwrap();

        assert_eq!(embedding.len(), 64);
        assert!((norm(&embedding) - 1.0).abs() < 0.001);
    }
}
