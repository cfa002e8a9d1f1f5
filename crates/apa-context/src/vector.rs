//! Vector Store: dense embeddings plus similarity search, exactly the five
//! operations the context manager needs and nothing else.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use apa_core::error::{Error, Result};

/// A single similarity search hit. `score` is backend-native (distance for
/// some backends, similarity for others) and only comparable within one
/// backend's own results.
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub id: String,
    pub content: String,
    pub metadata: Value,
    pub score: f32,
}

#[derive(Debug, Clone, Default)]
pub struct CollectionStats {
    pub count: u64,
    pub backend_id: String,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    fn dimension(&self) -> usize;

    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>>;

    async fn store_memory(
        &self,
        memory_id: &str,
        content: &str,
        metadata: Value,
        embedding: Option<Vec<f32>>,
    ) -> Result<()>;

    async fn search_similar(
        &self,
        query: &str,
        limit: usize,
        filter_metadata: Option<Value>,
    ) -> Result<Vec<VectorHit>>;

    async fn delete_memory(&self, memory_id: &str) -> Result<()>;

    async fn get_collection_stats(&self) -> Result<CollectionStats>;
}

/// Checks a generated or supplied embedding against the deployment's fixed
/// dimensionality, per the invariant every `VectorStore` implementation must
/// enforce (spec.md §9's open question on embedding dimensionality).
fn check_dimension(dim: usize, embedding: &[f32]) -> Result<()> {
    if embedding.len() != dim {
        return Err(Error::validation(format!(
            "embedding has {} dims, deployment invariant is {}",
            embedding.len(),
            dim
        )));
    }
    Ok(())
}

/// Deterministic, provider-free embedding used by the in-memory store and in
/// tests: a SHA-256-derived pseudo-embedding. Not semantically meaningful,
/// but stable (the same text always embeds to the same vector, so
/// store-then-retrieve round trips work without a live embedding API).
fn hash_embedding(text: &str, dim: usize) -> Vec<f32> {
    use sha2::{Digest, Sha256};

    let mut out = Vec::with_capacity(dim);
    let mut counter: u32 = 0;
    while out.len() < dim {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hasher.update(counter.to_le_bytes());
        let digest = hasher.finalize();
        for chunk in digest.chunks(4) {
            if out.len() >= dim {
                break;
            }
            let mut buf = [0u8; 4];
            buf[..chunk.len()].copy_from_slice(chunk);
            let v = u32::from_le_bytes(buf) as f32 / u32::MAX as f32;
            out.push(v * 2.0 - 1.0);
        }
        counter += 1;
    }
    out
}

fn zero_vector(dim: usize) -> Vec<f32> {
    vec![0.0; dim]
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot / (mag_a * mag_b)
}

#[derive(Clone)]
struct StoredRecord {
    content: String,
    metadata: Value,
    embedding: Vec<f32>,
}

/// In-memory vector store: cosine similarity over a `DashMap`. Used for
/// tests and single-node deployments (`VECTOR_BACKEND=local`).
pub struct SimpleVectorStore {
    dim: usize,
    data: DashMap<String, StoredRecord>,
    /// When true, `generate_embedding` always returns the zero vector,
    /// simulating an unavailable embedding provider (used to exercise the
    /// recency fallback in context manager tests).
    force_embedding_failure: bool,
}

impl SimpleVectorStore {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            data: DashMap::new(),
            force_embedding_failure: false,
        }
    }

    pub fn with_embedding_failure_forced(dim: usize) -> Self {
        Self {
            dim,
            data: DashMap::new(),
            force_embedding_failure: true,
        }
    }
}

#[async_trait]
impl VectorStore for SimpleVectorStore {
    fn dimension(&self) -> usize {
        self.dim
    }

    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
        if self.force_embedding_failure {
            return Ok(zero_vector(self.dim));
        }
        Ok(hash_embedding(text, self.dim))
    }

    async fn store_memory(
        &self,
        memory_id: &str,
        content: &str,
        metadata: Value,
        embedding: Option<Vec<f32>>,
    ) -> Result<()> {
        let embedding = match embedding {
            Some(e) => e,
            None => self.generate_embedding(content).await?,
        };
        check_dimension(self.dim, &embedding)?;
        self.data.insert(
            memory_id.to_string(),
            StoredRecord {
                content: content.to_string(),
                metadata,
                embedding,
            },
        );
        Ok(())
    }

    async fn search_similar(
        &self,
        query: &str,
        limit: usize,
        filter_metadata: Option<Value>,
    ) -> Result<Vec<VectorHit>> {
        let query_embedding = self.generate_embedding(query).await?;
        let mut scored: Vec<VectorHit> = self
            .data
            .iter()
            .filter(|e| matches_filter(&e.value().metadata, filter_metadata.as_ref()))
            .map(|e| VectorHit {
                id: e.key().clone(),
                content: e.value().content.clone(),
                metadata: e.value().metadata.clone(),
                score: cosine_similarity(&query_embedding, &e.value().embedding),
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn delete_memory(&self, memory_id: &str) -> Result<()> {
        self.data.remove(memory_id);
        Ok(())
    }

    async fn get_collection_stats(&self) -> Result<CollectionStats> {
        Ok(CollectionStats {
            count: self.data.len() as u64,
            backend_id: "in_memory".to_string(),
        })
    }
}

fn matches_filter(metadata: &Value, filter: Option<&Value>) -> bool {
    let Some(filter) = filter else { return true };
    let (Value::Object(meta_map), Value::Object(filter_map)) = (metadata, filter) else {
        return true;
    };
    filter_map
        .iter()
        .all(|(k, v)| meta_map.get(k) == Some(v))
}
