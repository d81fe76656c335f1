//! The per-user actor.
//!
//! A `UserAgent` is the single writer for one user's conversational
//! state. The routing layer ([`super::actors::ActorMap`]) hands out the
//! instance behind a lock held for the whole turn; everything here may
//! suspend (store, model, index) but never interleaves with another
//! request for the same user.

use std::time::{Duration, Instant};

use serde::Deserialize;
use serde_json::{json, Value};

use astrea_domain::error::{Error, Result};
use astrea_domain::model::{
    ActorState, MemoryEventType, MemoryType, Role, Sensitivity, ToolAudit, ToolStatus, Turn,
};
use astrea_domain::redact::redact_deep;
use astrea_store::Store;
use astrea_vector::VectorRecord;

use crate::runtime::prompt;
use crate::runtime::recall::recall;
use crate::runtime::tool;
use crate::state::AppState;

const EPISODE_EVERY_N_TURNS: u64 = 6;
const EPISODE_WINDOW_TURNS: usize = 12;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / body shapes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The synthetic request the gateway forwards to an actor. Field for
/// field this mirrors the `x-request-id` / `x-memory-allowed` /
/// `x-tools-allowed` headers of the wire contract.
pub struct ActorRequest {
    pub request_id: String,
    pub memory_allowed: bool,
    pub tools_allowed: bool,
    pub body: Vec<u8>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatBody {
    message: String,
    #[serde(default)]
    page_context: Option<String>,
    #[serde(default)]
    memory_enabled: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ToolBody {
    name: String,
    #[serde(default)]
    args: Option<Value>,
}

pub struct ChatReply {
    pub reply: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// UserAgent
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct UserAgent {
    user_id: String,
    state: ActorState,
    hydrated: bool,
    last_active: Option<Instant>,
}

impl UserAgent {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_owned(),
            state: ActorState::default(),
            hydrated: false,
            last_active: None,
        }
    }

    pub fn idle_since(&self) -> Option<Duration> {
        self.last_active.map(|t| t.elapsed())
    }

    /// Load durable state on first use: the persisted blob, and when the
    /// blob holds no turns, a seed from the newest stored conversation.
    fn hydrate(&mut self, app: &AppState) -> Result<()> {
        if self.hydrated {
            return Ok(());
        }
        if let Some(store) = app.store.as_deref() {
            if let Some(persisted) = store.load_state(&self.user_id)? {
                self.state = persisted;
            }
            if self.state.turns.is_empty() {
                self.state.turns = store.recent_turns(&self.user_id, app.config.limits.max_turns)?;
            }
        }
        self.hydrated = true;
        Ok(())
    }

    // ── Chat ─────────────────────────────────────────────────────────

    pub async fn handle_chat(&mut self, app: &AppState, req: &ActorRequest) -> Result<ChatReply> {
        self.last_active = Some(Instant::now());
        let limits = &app.config.limits;

        if req.body.len() > limits.chat_body_cap {
            return Err(Error::PayloadTooLarge(format!(
                "chat body exceeds {} bytes",
                limits.chat_body_cap
            )));
        }
        let body: ChatBody = serde_json::from_slice(&req.body)
            .map_err(|e| Error::BadRequest(format!("invalid JSON body: {e}")))?;

        let msg_chars = body.message.chars().count();
        if msg_chars == 0 || msg_chars > limits.max_msg_chars {
            return Err(Error::BadRequest(format!(
                "message must be 1..={} chars",
                limits.max_msg_chars
            )));
        }
        let page_ctx_chars = body
            .page_context
            .as_deref()
            .map(|s| s.chars().count())
            .unwrap_or(0);
        if page_ctx_chars > limits.max_page_ctx_chars {
            return Err(Error::BadRequest(format!(
                "pageContext must be at most {} chars",
                limits.max_page_ctx_chars
            )));
        }

        self.hydrate(app)?;

        let user_turn = Turn::now(Role::User, body.message.clone());
        self.state.push_turn(user_turn.clone(), limits.max_turns);
        self.state.turn_count += 1;

        let memory_allowed = app.store.is_some()
            && req.memory_allowed
            && body.memory_enabled != Some(false);

        let snippets = match app.store.as_deref() {
            Some(store) if memory_allowed => {
                recall(
                    store,
                    app.llm.as_ref(),
                    app.vector.as_deref(),
                    &self.user_id,
                    &body.message,
                )
                .await
            }
            _ => Vec::new(),
        };

        let reserved = prompt::recall_chars(&snippets) + page_ctx_chars;
        let kept = prompt::trim_turns(&self.state.turns, reserved, limits.max_total_ctx_chars);
        let rendered = prompt::build_prompt(&snippets, body.page_context.as_deref(), kept);

        let deadline = Duration::from_millis(app.config.llm.timeout_ms);
        let reply = match tokio::time::timeout(deadline, app.llm.complete(&rendered)).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                app.metrics.record_upstream_error();
                return Err(e);
            }
            Err(_) => {
                app.metrics.record_upstream_error();
                return Err(Error::UpstreamTimeout(format!(
                    "model call exceeded {}ms",
                    app.config.llm.timeout_ms
                )));
            }
        };

        let assistant_turn = Turn::now(Role::Assistant, reply.clone());
        self.state.push_turn(assistant_turn.clone(), limits.max_turns);

        // Side effects after the reply are best-effort: the response is
        // already produced and must not fail on a persistence error.
        if let Some(store) = app.store.as_deref() {
            if let Err(e) = store.save_state(&self.user_id, &self.state) {
                tracing::warn!(error = %e, "actor state persist failed");
                let _ = store.append_event(
                    &self.user_id,
                    MemoryEventType::Error,
                    &json!({ "op": "save_state", "error": e.to_string() }),
                );
            }
            if let Err(e) = store.append_event(
                &self.user_id,
                MemoryEventType::Write,
                &json!({
                    "turns": 2,
                    "user_chars": msg_chars,
                    "assistant_chars": reply.chars().count(),
                }),
            ) {
                tracing::warn!(error = %e, "write event append failed");
            }
            if let Err(e) = store.append_turns(
                &self.user_id,
                &[user_turn, assistant_turn],
                &req.request_id,
                &app.config.llm.chat_model,
                limits.max_turns,
            ) {
                tracing::warn!(error = %e, "turn persist failed");
            }

            // The trigger counts user turns regardless of past memory
            // settings; only this turn's enablement gates the write.
            if memory_allowed && self.state.turn_count % EPISODE_EVERY_N_TURNS == 0 {
                self.write_episode(app, store).await;
            }
        }

        Ok(ChatReply { reply })
    }

    /// Condense the last turns into one `episode` memory row and, when
    /// an index is configured, upsert its embedding.
    async fn write_episode(&self, app: &AppState, store: &Store) {
        let skip = self.state.turns.len().saturating_sub(EPISODE_WINDOW_TURNS);
        let summary = self.state.turns[skip..]
            .iter()
            .map(|t| format!("{}: {}", t.role.as_str(), t.content))
            .collect::<Vec<_>>()
            .join("\n");

        let embedding = match app.llm.embed(&summary).await {
            Ok(v) if !v.is_empty() => Some(v),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "episode embedding failed");
                None
            }
        };

        let memory_id = match store.insert_memory(
            &self.user_id,
            MemoryType::Episode,
            &json!(summary),
            embedding.as_deref(),
            Some("episode"),
            Sensitivity::Normal,
            app.config.limits.max_memories,
        ) {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(error = %e, "episode insert failed");
                return;
            }
        };

        if let (Some(index), Some(values)) = (app.vector.as_deref(), embedding) {
            let record = VectorRecord {
                id: memory_id,
                values,
                metadata: json!({ "user_id": self.user_id, "type": "episode" }),
            };
            if let Err(e) = index.upsert(&[record]).await {
                tracing::warn!(error = %e, "episode vector upsert failed");
            }
        }
    }

    // ── Tool ─────────────────────────────────────────────────────────

    pub async fn handle_tool(&mut self, app: &AppState, req: &ActorRequest) -> Result<Value> {
        self.last_active = Some(Instant::now());
        let limits = &app.config.limits;

        if !req.tools_allowed {
            return Err(Error::Forbidden("tool access is not allowed for this token".into()));
        }
        if req.body.len() > limits.tool_body_cap {
            return Err(Error::PayloadTooLarge(format!(
                "tool body exceeds {} bytes",
                limits.tool_body_cap
            )));
        }
        let body: ToolBody = serde_json::from_slice(&req.body)
            .map_err(|e| Error::BadRequest(format!("invalid JSON body: {e}")))?;

        if body.name != tool::TOOL_NAME {
            return Err(Error::BadRequest(format!("unknown tool: {}", body.name)));
        }
        let args = match body.args {
            None | Some(Value::Null) => json!({}),
            Some(obj @ Value::Object(_)) => obj,
            Some(_) => return Err(Error::BadRequest("args must be an object".into())),
        };

        let started = Instant::now();
        let result = tool::call_natal_backend(
            &app.backend_http,
            &app.config.backend,
            &req.request_id,
            &self.user_id,
            &args,
        )
        .await;
        let duration_ms = started.elapsed().as_millis() as u64;
        let args_trunc = tool::truncate_chars(&args.to_string(), tool::AUDIT_TRUNCATE_CHARS);

        match result {
            Ok(raw) => {
                let safe = redact_deep(&raw);
                let redaction_applied = safe != raw;
                let wrapped = json!({ "safe_json": safe });

                if let Some(store) = app.store.as_deref() {
                    if let Err(e) = store.append_event(
                        &self.user_id,
                        MemoryEventType::Tool,
                        &json!({
                            "tool": tool::TOOL_NAME,
                            "status": "ok",
                            "duration_ms": duration_ms,
                        }),
                    ) {
                        tracing::warn!(error = %e, "tool event append failed");
                    }
                    if redaction_applied {
                        let _ = store.append_event(
                            &self.user_id,
                            MemoryEventType::Redaction,
                            &json!({ "tool": tool::TOOL_NAME }),
                        );
                    }
                    if let Err(e) = store.append_tool_audit(&ToolAudit {
                        user_id: self.user_id.clone(),
                        tool: tool::TOOL_NAME.into(),
                        request_id: req.request_id.clone(),
                        status: ToolStatus::Ok,
                        args: Some(args_trunc),
                        duration_ms: Some(duration_ms),
                        redaction_applied,
                        redacted_output: Some(tool::truncate_chars(
                            &wrapped.to_string(),
                            tool::AUDIT_TRUNCATE_CHARS,
                        )),
                    }) {
                        tracing::warn!(error = %e, "tool audit append failed");
                    }
                }

                Ok(wrapped)
            }
            Err(e) => {
                app.metrics.record_upstream_error();
                if let Some(store) = app.store.as_deref() {
                    if let Err(audit_err) = store.append_tool_audit(&ToolAudit {
                        user_id: self.user_id.clone(),
                        tool: tool::TOOL_NAME.into(),
                        request_id: req.request_id.clone(),
                        status: ToolStatus::Error,
                        args: Some(args_trunc),
                        duration_ms: Some(duration_ms),
                        redaction_applied: false,
                        redacted_output: None,
                    }) {
                        tracing::warn!(error = %audit_err, "tool audit append failed");
                    }
                }
                Err(e)
            }
        }
    }
}
