//! Code graph index and hybrid retrieval.
//!
//! Source trees are parsed with tree-sitter into file and symbol nodes linked by
//! `contains`, `calls`, `uses_type` and `imports` edges, persisted in `SQLite` with a
//! full-text shadow index, embedded in batches, and searched through a hybrid
//! lexical + dense + graph retriever.

pub mod ann;
pub(crate) mod chunker;
pub mod context;
pub mod error;
pub mod framework;
pub mod ignore_rules;
pub mod indexer;
pub mod languages;
pub mod repo_map;
pub mod retriever;
pub mod store;
pub mod types;

pub use ann::AnnIndex;
pub use error::{IndexError, Result};
pub use indexer::{CodeIndexer, IndexReport, IndexerConfig};
pub use retriever::{HybridRetriever, RetrievalConfig, SearchResult, format_as_context};
pub use store::GraphStore;
pub use types::{CodeNode, Edge, NodeKind, Relationship};
