//! REST implementation of [`VectorIndex`].
//!
//! Wraps a `reqwest::Client` against the index service's `/query` and
//! `/vectors/upsert` endpoints. No retries here: calls happen inside a
//! chat turn, and a failed query degrades recall instead of delaying the
//! reply.

use serde::Deserialize;
use serde_json::json;

use astrea_domain::config::VectorConfig;
use astrea_domain::error::{Error, Result};

use crate::{VectorIndex, VectorMatch, VectorRecord};

#[derive(Debug, Clone)]
pub struct RestVectorIndex {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<VectorMatch>,
}

impl RestVectorIndex {
    pub fn from_config(cfg: &VectorConfig) -> Result<Option<Self>> {
        let Some(ref base_url) = cfg.base_url else {
            return Ok(None);
        };

        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(|e| Error::Upstream(e.to_string()))?;

        Ok(Some(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key: cfg.api_key.clone(),
        }))
    }

    fn decorate(&self, rb: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.api_key {
            Some(ref key) => rb.header("Api-Key", key),
            None => rb,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait::async_trait]
impl VectorIndex for RestVectorIndex {
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        user_id: &str,
    ) -> Result<Vec<VectorMatch>> {
        let body = json!({
            "vector": vector,
            "topK": top_k,
            "filter": { "user_id": user_id },
            "includeMetadata": true,
        });

        let resp = self
            .decorate(self.http.post(self.url("/query")).json(&body))
            .send()
            .await
            .map_err(|e| Error::Upstream(e.to_string()))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| Error::Upstream(e.to_string()))?;
        if !status.is_success() {
            return Err(Error::Upstream(format!("/query returned {status}: {text}")));
        }

        let parsed: QueryResponse = serde_json::from_str(&text)
            .map_err(|e| Error::Upstream(format!("failed to parse query response: {e}")))?;
        Ok(parsed.matches)
    }

    async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        let body = json!({ "vectors": records });

        let resp = self
            .decorate(self.http.post(self.url("/vectors/upsert")).json(&body))
            .send()
            .await
            .map_err(|e| Error::Upstream(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::Upstream(format!(
                "/vectors/upsert returned {status}: {text}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfigured_index_builds_to_none() {
        let client = RestVectorIndex::from_config(&VectorConfig::default()).unwrap();
        assert!(client.is_none());
    }

    #[test]
    fn match_deserializes_with_optional_metadata() {
        let m: VectorMatch =
            serde_json::from_str(r#"{ "id": "mem-1", "score": 0.92 }"#).unwrap();
        assert_eq!(m.id, "mem-1");
        assert!(m.metadata.is_null());
    }
}
