//! Qdrant-backed `VectorStore` for production deployments
//! (`VECTOR_BACKEND=managed`).

use async_trait::async_trait;
use qdrant_client::qdrant::{
    vectors_config::Config as VectorsConfigEnum, CreateCollectionBuilder, DeletePointsBuilder,
    Distance, Filter, PointId, PointStruct, PointsIdsList, SearchPointsBuilder,
    UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder, VectorsConfig,
};
use qdrant_client::Qdrant;
use serde_json::Value;
use std::collections::HashMap;

use apa_core::error::{Error, Result};

use crate::vector::{CollectionStats, VectorHit, VectorStore};

pub struct QdrantVectorStore {
    client: Qdrant,
    collection_name: String,
    dim: usize,
    embedder: Box<dyn EmbeddingBackend>,
}

/// Pluggable text-to-vector backend so `QdrantVectorStore` doesn't hardcode
/// a single embedding API.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    async fn embed(&self, text: &str, dim: usize) -> Result<Vec<f32>>;
}

/// Used when no embedding provider is configured: returns a correctly-sized
/// zero vector so writes still succeed (spec.md §4.5's fallback behavior).
pub struct ZeroEmbeddingBackend;

#[async_trait]
impl EmbeddingBackend for ZeroEmbeddingBackend {
    async fn embed(&self, _text: &str, dim: usize) -> Result<Vec<f32>> {
        Ok(vec![0.0; dim])
    }
}

impl QdrantVectorStore {
    pub async fn new(
        url: &str,
        collection_name: &str,
        dim: usize,
        embedder: Box<dyn EmbeddingBackend>,
    ) -> Result<Self> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| Error::persistence(format!("failed to connect to Qdrant: {e}")))?;

        let store = Self {
            client,
            collection_name: collection_name.to_string(),
            dim,
            embedder,
        };
        store.ensure_collection().await?;
        Ok(store)
    }

    async fn ensure_collection(&self) -> Result<()> {
        let collections = self
            .client
            .list_collections()
            .await
            .map_err(|e| Error::persistence(format!("failed to list collections: {e}")))?;

        let exists = collections
            .collections
            .iter()
            .any(|c| c.name == self.collection_name);

        if !exists {
            tracing::info!(collection = %self.collection_name, "creating Qdrant collection");
            let vectors_config = VectorsConfig {
                config: Some(VectorsConfigEnum::Params(
                    VectorParamsBuilder::new(self.dim as u64, Distance::Cosine).build(),
                )),
            };
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(&self.collection_name)
                        .vectors_config(vectors_config),
                )
                .await
                .map_err(|e| Error::persistence(format!("failed to create collection: {e}")))?;
        }
        Ok(())
    }

    fn to_payload(metadata: &Value, content: &str) -> HashMap<String, QdrantValue> {
        let mut payload = HashMap::new();
        payload.insert(
            "content".to_string(),
            QdrantValue {
                kind: Some(qdrant_client::qdrant::value::Kind::StringValue(
                    content.to_string(),
                )),
            },
        );
        payload.insert(
            "metadata".to_string(),
            QdrantValue {
                kind: Some(qdrant_client::qdrant::value::Kind::StringValue(
                    metadata.to_string(),
                )),
            },
        );
        payload
    }

    fn from_payload(payload: &HashMap<String, QdrantValue>) -> (String, Value) {
        let content = payload
            .get("content")
            .and_then(|v| match &v.kind {
                Some(qdrant_client::qdrant::value::Kind::StringValue(s)) => Some(s.clone()),
                _ => None,
            })
            .unwrap_or_default();
        let metadata = payload
            .get("metadata")
            .and_then(|v| match &v.kind {
                Some(qdrant_client::qdrant::value::Kind::StringValue(s)) => {
                    serde_json::from_str(s).ok()
                }
                _ => None,
            })
            .unwrap_or(Value::Object(Default::default()));
        (content, metadata)
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    fn dimension(&self) -> usize {
        self.dim
    }

    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
        self.embedder.embed(text, self.dim).await
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
        if embedding.len() != self.dim {
            return Err(Error::validation(format!(
                "embedding has {} dims, deployment invariant is {}",
                embedding.len(),
                self.dim
            )));
        }

        let point = PointStruct::new(
            memory_id.to_string(),
            embedding,
            Self::to_payload(&metadata, content),
        );
        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection_name, vec![point]))
            .await
            .map_err(|e| Error::persistence(format!("failed to upsert point: {e}")))?;
        Ok(())
    }

    async fn search_similar(
        &self,
        query: &str,
        limit: usize,
        filter_metadata: Option<Value>,
    ) -> Result<Vec<VectorHit>> {
        let query_embedding = self.generate_embedding(query).await?;
        let mut builder =
            SearchPointsBuilder::new(&self.collection_name, query_embedding, limit as u64)
                .with_payload(true);
        if filter_metadata.is_some() {
            // Metadata is stored as an opaque JSON blob; a real deployment
            // would index individual fields. Filtering here is advisory and
            // narrowed client-side below.
            builder = builder.filter(Filter::default());
        }

        let result = self
            .client
            .search_points(builder)
            .await
            .map_err(|e| Error::persistence(format!("failed to search: {e}")))?;

        let hits = result
            .result
            .into_iter()
            .filter_map(|point| {
                let id = match point.id? {
                    PointId {
                        point_id_options:
                            Some(qdrant_client::qdrant::point_id::PointIdOptions::Uuid(uuid)),
                    } => uuid,
                    PointId {
                        point_id_options:
                            Some(qdrant_client::qdrant::point_id::PointIdOptions::Num(num)),
                    } => num.to_string(),
                    _ => return None,
                };
                let (content, metadata) = Self::from_payload(&point.payload);
                Some(VectorHit {
                    id,
                    content,
                    metadata,
                    score: point.score,
                })
            })
            .filter(|hit| matches_filter(&hit.metadata, filter_metadata.as_ref()))
            .collect();

        Ok(hits)
    }

    async fn delete_memory(&self, memory_id: &str) -> Result<()> {
        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection_name).points(PointsIdsList {
                    ids: vec![PointId {
                        point_id_options: Some(
                            qdrant_client::qdrant::point_id::PointIdOptions::Uuid(
                                memory_id.to_string(),
                            ),
                        ),
                    }],
                }),
            )
            .await
            .map_err(|e| Error::persistence(format!("failed to delete point: {e}")))?;
        Ok(())
    }

    async fn get_collection_stats(&self) -> Result<CollectionStats> {
        let info = self
            .client
            .collection_info(&self.collection_name)
            .await
            .map_err(|e| Error::persistence(format!("failed to get collection info: {e}")))?;
        let count = info
            .result
            .map(|r| r.points_count.unwrap_or(0))
            .unwrap_or(0);
        Ok(CollectionStats {
            count,
            backend_id: "qdrant".to_string(),
        })
    }
}

fn matches_filter(metadata: &Value, filter: Option<&Value>) -> bool {
    let Some(filter) = filter else { return true };
    let (Value::Object(meta_map), Value::Object(filter_map)) = (metadata, filter) else {
        return true;
    };
    filter_map.iter().all(|(k, v)| meta_map.get(k) == Some(v))
}
