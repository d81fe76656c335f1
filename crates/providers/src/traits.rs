use astrea_domain::error::Result;

/// Trait the language-model adapter must implement.
///
/// The actor builds one deterministic prompt string per turn; the adapter
/// translates it to the provider's wire format. Callers own timeouts
/// (`tokio::time::timeout`) — adapters only cap the underlying connection.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Complete a prompt and return the model's text.
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Embed a single text. Returns one vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// A unique identifier for this provider instance.
    fn provider_id(&self) -> &str;
}
