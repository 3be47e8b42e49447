use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, ensure};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tracing::info;

/// Seam for query embedding so tests can swap in a fake.
#[async_trait]
pub trait QueryEmbedder: Send + Sync {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}

/// fastembed-backed embedder, constructed once at startup. The inference
/// session is behind a mutex and runs on the blocking pool.
pub struct FastEmbedder {
    model: Arc<Mutex<TextEmbedding>>,
}

impl FastEmbedder {
    pub fn init() -> anyhow::Result<Self> {
        let model = TextEmbedding::try_new(InitOptions::new(EmbeddingModel::AllMiniLML6V2))?;
        Ok(Self {
            model: Arc::new(Mutex::new(model)),
        })
    }
}

#[async_trait]
impl QueryEmbedder for FastEmbedder {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let model = self.model.clone();
        let input = text.to_owned();

        let embedding = tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|_| anyhow!("embedding model lock poisoned"))?;
            let embeddings = model.embed(vec![input], None)?;
            embeddings
                .into_iter()
                .next()
                .ok_or_else(|| anyhow!("embedder returned no vector"))
        })
        .await??;

        info!(
            "Query embedded successfully. Embedding size: {}",
            embedding.len()
        );
        Ok(embedding)
    }
}

/// The precomputed knowledge index: one line of reference text per document
/// plus its embedding vector. Loaded once at process start, read-only after.
pub struct KnowledgeIndex {
    documents: Vec<String>,
    vectors: Vec<Vec<f32>>,
}

impl KnowledgeIndex {
    pub fn new(documents: Vec<String>, vectors: Vec<Vec<f32>>) -> anyhow::Result<Self> {
        ensure!(
            documents.len() == vectors.len(),
            "knowledge index mismatch: {} documents, {} vectors",
            documents.len(),
            vectors.len()
        );
        Ok(Self { documents, vectors })
    }

    /// Load the plain-text document file (one fact per line, blanks skipped)
    /// and the JSON vector file produced alongside it.
    pub fn load(docs_path: &Path, vectors_path: &Path) -> anyhow::Result<Self> {
        let documents: Vec<String> = std::fs::read_to_string(docs_path)?
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        let vectors: Vec<Vec<f32>> = serde_json::from_str(&std::fs::read_to_string(vectors_path)?)?;

        info!("Loaded {} knowledge documents", documents.len());
        Self::new(documents, vectors)
    }

    pub fn documents(&self) -> &[String] {
        &self.documents
    }

    /// Top-k documents by Euclidean distance. The sort is stable, so ties
    /// keep insertion order.
    pub fn nearest(&self, query: &[f32], top_k: usize) -> Vec<&str> {
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(index, vector)| (index, euclidean_distance(query, vector)))
            .collect();

        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        scored
            .into_iter()
            .take(top_k)
            .map(|(index, _)| self.documents[index].as_str())
            .collect()
    }
}

fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> KnowledgeIndex {
        KnowledgeIndex::new(
            vec![
                "fact one".to_string(),
                "fact two".to_string(),
                "fact three".to_string(),
                "fact four".to_string(),
            ],
            vec![
                vec![0.0, 0.0],
                vec![1.0, 0.0],
                vec![0.0, 2.0],
                vec![5.0, 5.0],
            ],
        )
        .unwrap()
    }

    #[test]
    fn nearest_orders_by_distance() {
        let index = index();
        let hits = index.nearest(&[0.0, 0.1], 3);
        assert_eq!(hits, vec!["fact one", "fact two", "fact three"]);
    }

    #[test]
    fn nearest_breaks_ties_by_insertion_order() {
        // the first three documents are equidistant from the query
        let index = index();
        let hits = index.nearest(&[0.5, 1.0], 3);
        assert_eq!(hits, vec!["fact one", "fact two", "fact three"]);
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let result = KnowledgeIndex::new(vec!["a".to_string()], vec![]);
        assert!(result.is_err());
    }
}
