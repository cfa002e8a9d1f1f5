//! Context Manager and Vector Store.

pub mod manager;
pub mod qdrant_store;
pub mod vector;

pub use manager::ContextManager;
pub use qdrant_store::{EmbeddingBackend, QdrantVectorStore, ZeroEmbeddingBackend};
pub use vector::{CollectionStats, SimpleVectorStore, VectorHit, VectorStore};
