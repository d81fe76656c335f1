//! Client for the external vector index.
//!
//! The index is an external service with two operations, `query` and
//! `upsert`. The gateway treats it as optional: when unconfigured, recall
//! runs on pinned memories alone.

pub mod rest;
mod types;

pub use rest::RestVectorIndex;
pub use types::{VectorMatch, VectorRecord};

use astrea_domain::error::Result;

#[async_trait::async_trait]
pub trait VectorIndex: Send + Sync {
    /// Nearest-neighbor query, filtered server-side by user.
    async fn query(&self, vector: &[f32], top_k: usize, user_id: &str)
        -> Result<Vec<VectorMatch>>;

    /// Insert or replace records.
    async fn upsert(&self, records: &[VectorRecord]) -> Result<()>;
}
