//! Memory recall: pinned rows composed with semantic nearest-neighbor.
//!
//! Failures in the embedding call or the index query degrade the result
//! (fewer snippets) instead of failing the chat turn.

use std::collections::HashSet;

use serde_json::json;

use astrea_domain::model::MemoryEventType;
use astrea_providers::LlmProvider;
use astrea_store::Store;
use astrea_vector::VectorIndex;

const PINNED_LIMIT: usize = 12;
const TOP_K: usize = 8;
const SNIPPET_CAP: usize = 16;

/// Build the recall block for one chat turn.
///
/// 1. Up to 12 pinned memories, newest-updated first.
/// 2. When an index is configured: embed the query (tolerating failure),
///    query `topK = 8` filtered by user, load matched rows by id.
/// 3. Format `"[<type>] <json-content>"`, de-duplicate, cap at 16.
/// 4. Record a `recall` event with counts.
pub async fn recall(
    store: &Store,
    llm: &dyn LlmProvider,
    vector: Option<&dyn VectorIndex>,
    user_id: &str,
    query: &str,
) -> Vec<String> {
    let pinned = store.pinned_memories(user_id, PINNED_LIMIT).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "pinned memory fetch failed");
        Vec::new()
    });
    let pinned_count = pinned.len();

    let mut semantic = Vec::new();
    if let Some(index) = vector {
        if let Some(embedding) = embed_query(llm, query).await {
            match index.query(&embedding, TOP_K, user_id).await {
                Ok(matches) => {
                    let ids: Vec<String> = matches.into_iter().map(|m| m.id).collect();
                    semantic = store.memories_by_ids(user_id, &ids).unwrap_or_else(|e| {
                        tracing::warn!(error = %e, "semantic memory load failed");
                        Vec::new()
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "vector index query failed, recall degrades");
                }
            }
        }
    }
    let semantic_count = semantic.len();

    let mut seen = HashSet::new();
    let mut snippets = Vec::new();
    for row in pinned.into_iter().chain(semantic) {
        let formatted = format!("[{}] {}", row.mem_type.as_str(), row.content);
        if seen.insert(formatted.clone()) {
            snippets.push(formatted);
        }
        if snippets.len() >= SNIPPET_CAP {
            break;
        }
    }

    if let Err(e) = store.append_event(
        user_id,
        MemoryEventType::Recall,
        &json!({
            "pinned": pinned_count,
            "semantic": semantic_count,
            "returned": snippets.len(),
        }),
    ) {
        tracing::warn!(error = %e, "recall event append failed");
    }

    snippets
}

/// Embed the query, returning `None` on any failure.
async fn embed_query(llm: &dyn LlmProvider, query: &str) -> Option<Vec<f32>> {
    match llm.embed(query).await {
        Ok(v) if !v.is_empty() => Some(v),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(error = %e, "query embedding failed, recall degrades");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use astrea_domain::error::{Error, Result};
    use astrea_domain::model::{MemoryType, Sensitivity};
    use astrea_vector::{VectorMatch, VectorRecord};
    use serde_json::json;

    use super::*;

    struct FixedLlm {
        fail_embed: bool,
    }

    #[async_trait::async_trait]
    impl LlmProvider for FixedLlm {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Ok("ok".into())
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            if self.fail_embed {
                Err(Error::Upstream("embedder down".into()))
            } else {
                Ok(vec![0.1, 0.2])
            }
        }

        fn provider_id(&self) -> &str {
            "fixed"
        }
    }

    struct FixedIndex {
        ids: Vec<String>,
    }

    #[async_trait::async_trait]
    impl VectorIndex for FixedIndex {
        async fn query(
            &self,
            _vector: &[f32],
            _top_k: usize,
            _user_id: &str,
        ) -> Result<Vec<VectorMatch>> {
            Ok(self
                .ids
                .iter()
                .map(|id| VectorMatch {
                    id: id.clone(),
                    score: 0.9,
                    metadata: serde_json::Value::Null,
                })
                .collect())
        }

        async fn upsert(&self, _records: &[VectorRecord]) -> Result<()> {
            Ok(())
        }
    }

    fn seed_pinned(store: &Store, user: &str, n: usize) {
        for i in 0..n {
            store
                .insert_memory(
                    user,
                    MemoryType::Fact,
                    &json!(format!("fact-{i}")),
                    None,
                    None,
                    Sensitivity::Normal,
                    400,
                )
                .unwrap();
        }
    }

    #[tokio::test]
    async fn pinned_only_when_no_index() {
        let store = Store::open_in_memory().unwrap();
        seed_pinned(&store, "u-1", 3);

        let llm = FixedLlm { fail_embed: false };
        let snippets = recall(&store, &llm, None, "u-1", "tea?").await;
        assert_eq!(snippets.len(), 3);
        assert!(snippets[0].starts_with("[fact] "));

        // A recall event was recorded with counts.
        let events = store.events_of_type("u-1", MemoryEventType::Recall).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["pinned"], 3);
        assert_eq!(events[0]["semantic"], 0);
    }

    #[tokio::test]
    async fn semantic_rows_are_merged_and_deduped() {
        let store = Store::open_in_memory().unwrap();
        let pinned_id = store
            .insert_memory(
                "u-1",
                MemoryType::Preference,
                &json!("green tea"),
                None,
                None,
                Sensitivity::Normal,
                400,
            )
            .unwrap();
        let episode_id = store
            .insert_memory(
                "u-1",
                MemoryType::Episode,
                &json!("user: hi\nassistant: hello"),
                None,
                None,
                Sensitivity::Normal,
                400,
            )
            .unwrap();

        let llm = FixedLlm { fail_embed: false };
        // The index returns the pinned row again plus the episode.
        let index = FixedIndex {
            ids: vec![pinned_id, episode_id],
        };
        let snippets = recall(&store, &llm, Some(&index), "u-1", "tea?").await;

        assert_eq!(snippets.len(), 2);
        assert!(snippets.iter().any(|s| s.starts_with("[episode] ")));
    }

    #[tokio::test]
    async fn embed_failure_degrades_to_pinned() {
        let store = Store::open_in_memory().unwrap();
        seed_pinned(&store, "u-1", 2);

        let llm = FixedLlm { fail_embed: true };
        let index = FixedIndex {
            ids: vec!["mem-x".into()],
        };
        let snippets = recall(&store, &llm, Some(&index), "u-1", "tea?").await;
        assert_eq!(snippets.len(), 2);
    }

    #[tokio::test]
    async fn result_is_capped_at_sixteen() {
        let store = Store::open_in_memory().unwrap();
        seed_pinned(&store, "u-1", 12);
        let mut episode_ids = Vec::new();
        for i in 0..8 {
            episode_ids.push(
                store
                    .insert_memory(
                        "u-1",
                        MemoryType::Episode,
                        &json!(format!("ep-{i}")),
                        None,
                        None,
                        Sensitivity::Normal,
                        400,
                    )
                    .unwrap(),
            );
        }

        let llm = FixedLlm { fail_embed: false };
        let index = FixedIndex { ids: episode_ids };
        let snippets = recall(&store, &llm, Some(&index), "u-1", "q").await;
        assert_eq!(snippets.len(), 16);
    }
}
