//! Context Manager: builds the initial per-run context, folds step results
//! into it, and owns the memory write path (relational row + vector index).

use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use apa_core::error::Result;
use apa_core::traits::MemoryRepository;
use apa_core::types::{Action, MemoryItem, MemoryType, Observation, RelevantMemory, RunContext};

use crate::vector::VectorStore;

pub struct ContextManager {
    vector_store: Arc<dyn VectorStore>,
    memory_repo: Arc<dyn MemoryRepository>,
    top_k: usize,
}

impl ContextManager {
    pub fn new(
        vector_store: Arc<dyn VectorStore>,
        memory_repo: Arc<dyn MemoryRepository>,
        top_k: usize,
    ) -> Self {
        Self {
            vector_store,
            memory_repo,
            top_k,
        }
    }

    /// Build the initial context for a run: top-k relevant memories by
    /// semantic similarity to the task description, falling back to the
    /// `k` most recent memories if the vector layer fails.
    pub async fn load_context(
        &self,
        agent_id: &str,
        execution_id: &str,
        task_description: &str,
    ) -> Result<RunContext> {
        let relevant = self.retrieve_relevant_memories(agent_id, task_description).await;
        Ok(RunContext::new(agent_id, execution_id, task_description, relevant))
    }

    pub async fn retrieve_relevant_memories(
        &self,
        agent_id: &str,
        query: &str,
    ) -> Vec<RelevantMemory> {
        let filter = serde_json::json!({ "agent_id": agent_id });
        match self
            .vector_store
            .search_similar(query, self.top_k, Some(filter))
            .await
        {
            Ok(hits) if !hits.is_empty() => {
                let mut memories = Vec::with_capacity(hits.len());
                for hit in hits {
                    if let Ok(Some(item)) = self.memory_repo.get(&hit.id).await {
                        memories.push(RelevantMemory {
                            memory: item,
                            score: hit.score,
                        });
                    }
                }
                memories
            }
            _ => {
                tracing::debug!(agent_id, "vector retrieval empty or failed, falling back to recency");
                self.memory_repo
                    .most_recent(agent_id, None, self.top_k)
                    .await
                    .unwrap_or_default()
                    .into_iter()
                    .map(|memory| RelevantMemory { memory, score: 0.0 })
                    .collect()
            }
        }
    }

    /// Fold one completed ReAct step into the context in place.
    pub fn update_context(&self, context: &mut RunContext, action: Action, observation: Observation) {
        context.record_step(action, observation);
    }

    /// Embed `content`, write one relational Memory Item and one Vector
    /// Store record under the same id. Best-effort consistent: a failed
    /// vector write does not roll back the relational write.
    pub async fn store_memory(
        &self,
        agent_id: &str,
        content: &str,
        memory_type: MemoryType,
        metadata: Value,
        importance_score: Option<f32>,
    ) -> Result<MemoryItem> {
        let id = Uuid::new_v4().to_string();

        let embedding = self
            .vector_store
            .generate_embedding(content)
            .await
            .unwrap_or_else(|_| vec![0.0; self.vector_store.dimension()]);

        let item = MemoryItem {
            id: id.clone(),
            agent_id: agent_id.to_string(),
            memory_type,
            content: content.to_string(),
            embedding: embedding.clone(),
            importance_score,
            access_count: 0,
            last_accessed_at: None,
            metadata: metadata.clone(),
            created_at: chrono::Utc::now(),
        };

        self.memory_repo.save(item.clone()).await?;

        let mut vector_metadata = metadata;
        if let Value::Object(ref mut map) = vector_metadata {
            map.insert("agent_id".to_string(), Value::String(agent_id.to_string()));
        }
        if let Err(err) = self
            .vector_store
            .store_memory(&id, content, vector_metadata, Some(embedding))
            .await
        {
            tracing::warn!(memory_id = %id, error = %err, "vector write failed, relational row still committed");
        }

        Ok(item)
    }

    pub async fn update_memory_access(&self, memory_id: &str) -> Result<()> {
        self.memory_repo.record_access(memory_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apa_core::mem::InMemoryMemoryRepository;
    use crate::vector::SimpleVectorStore;

    fn manager() -> ContextManager {
        ContextManager::new(
            Arc::new(SimpleVectorStore::new(16)),
            Arc::new(InMemoryMemoryRepository::new()),
            5,
        )
    }

    #[tokio::test]
    async fn store_memory_then_load_context_recalls_it() {
        let mgr = manager();
        mgr.store_memory(
            "agent1",
            "the user asked about quarterly revenue",
            MemoryType::Episodic,
            Value::Object(Default::default()),
            None,
        )
        .await
        .unwrap();

        let ctx = mgr
            .load_context("agent1", "exec1", "the user asked about quarterly revenue")
            .await
            .unwrap();
        assert_eq!(ctx.relevant_memories.len(), 1);
    }

    #[tokio::test]
    async fn load_context_falls_back_to_recency_when_vector_empty() {
        let mgr = manager();
        let ctx = mgr.load_context("agent1", "exec1", "anything").await.unwrap();
        assert!(ctx.relevant_memories.is_empty());
    }

    #[tokio::test]
    async fn update_context_sets_shared_knowledge_on_success() {
        let mgr = manager();
        let mut ctx = RunContext::new("agent1", "exec1", "task", vec![]);
        mgr.update_context(
            &mut ctx,
            Action::new("calculation", Value::Null),
            Observation::success(serde_json::json!({"result": 8})),
        );
        assert_eq!(ctx.shared_knowledge.get("calculation").unwrap()["result"], 8);
        assert_eq!(ctx.action_history.len(), 1);
    }

    #[tokio::test]
    async fn update_context_does_not_set_shared_knowledge_on_error() {
        let mgr = manager();
        let mut ctx = RunContext::new("agent1", "exec1", "task", vec![]);
        mgr.update_context(
            &mut ctx,
            Action::new("calculation", Value::Null),
            Observation::error("division by zero"),
        );
        assert!(ctx.shared_knowledge.get("calculation").is_none());
    }
}
