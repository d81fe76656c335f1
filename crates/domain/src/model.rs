//! Core data model shared by the gateway, store, and actor runtime.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Conversation turns & actor state
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    /// UTC ISO-8601.
    pub ts: DateTime<Utc>,
}

impl Turn {
    pub fn now(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            ts: Utc::now(),
        }
    }
}

/// The single-writer state a UserAgent actor holds for one user.
///
/// Persisted as one JSON blob under a stable per-user key at the end of
/// every chat, so a crash mid-turn can lose that turn but never corrupt
/// the bounds.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ActorState {
    #[serde(default)]
    pub turns: Vec<Turn>,
    #[serde(default)]
    pub working_memory: HashMap<String, String>,
    /// Counts user turns, monotonically across loads from storage.
    #[serde(default)]
    pub turn_count: u64,
}

impl ActorState {
    /// Append a turn and clamp the ring to `max_turns` (oldest dropped).
    pub fn push_turn(&mut self, turn: Turn, max_turns: usize) {
        self.turns.push(turn);
        if self.turns.len() > max_turns {
            let excess = self.turns.len() - max_turns;
            self.turns.drain(..excess);
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Memory
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryType {
    Fact,
    Preference,
    Constraint,
    Style,
    Episode,
    Note,
}

impl MemoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::Fact => "fact",
            MemoryType::Preference => "preference",
            MemoryType::Constraint => "constraint",
            MemoryType::Style => "style",
            MemoryType::Episode => "episode",
            MemoryType::Note => "note",
        }
    }

    /// Types included in recall regardless of semantic similarity.
    pub const PINNED: [MemoryType; 4] = [
        MemoryType::Fact,
        MemoryType::Preference,
        MemoryType::Constraint,
        MemoryType::Style,
    ];
}

impl std::str::FromStr for MemoryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fact" => Ok(MemoryType::Fact),
            "preference" => Ok(MemoryType::Preference),
            "constraint" => Ok(MemoryType::Constraint),
            "style" => Ok(MemoryType::Style),
            "episode" => Ok(MemoryType::Episode),
            "note" => Ok(MemoryType::Note),
            other => Err(format!("unknown memory type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    Normal,
    Sensitive,
}

impl Sensitivity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sensitivity::Normal => "normal",
            Sensitivity::Sensitive => "sensitive",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRow {
    pub id: String,
    pub user_id: String,
    pub mem_type: MemoryType,
    /// Canonical content, stored as JSON.
    pub content: serde_json::Value,
    pub embedding: Option<Vec<f32>>,
    pub source: Option<String>,
    pub sensitivity: Sensitivity,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryEventType {
    Recall,
    Write,
    Tool,
    Redaction,
    Error,
}

impl MemoryEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryEventType::Recall => "recall",
            MemoryEventType::Write => "write",
            MemoryEventType::Tool => "tool",
            MemoryEventType::Redaction => "redaction",
            MemoryEventType::Error => "error",
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool audit
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Ok,
    Error,
}

impl ToolStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolStatus::Ok => "ok",
            ToolStatus::Error => "error",
        }
    }
}

/// One row per tool invocation attempt.
#[derive(Debug, Clone)]
pub struct ToolAudit {
    pub user_id: String,
    pub tool: String,
    pub request_id: String,
    pub status: ToolStatus,
    /// Truncated argument JSON.
    pub args: Option<String>,
    pub duration_ms: Option<u64>,
    pub redaction_applied: bool,
    /// Truncated sanitized output JSON.
    pub redacted_output: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Auth
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Verified per-request identity. Valid for a single request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,
    pub is_dev_admin: bool,
    pub scopes: HashSet<String>,
    pub memory_allowed: bool,
    pub tools_allowed: bool,
    pub export_allowed: bool,
}

impl AuthContext {
    /// Synthetic context for the dev-admin bypass token.
    pub fn dev_admin() -> Self {
        let mut scopes = HashSet::new();
        scopes.insert("*".to_string());
        Self {
            user_id: "DEV_ADMIN".to_string(),
            is_dev_admin: true,
            scopes,
            memory_allowed: true,
            tools_allowed: true,
            export_allowed: true,
        }
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains("*") || self.scopes.contains(scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_turn_clamps_oldest_first() {
        let mut state = ActorState::default();
        for i in 0..10 {
            state.push_turn(Turn::now(Role::User, format!("m{i}")), 4);
        }
        assert_eq!(state.turns.len(), 4);
        assert_eq!(state.turns[0].content, "m6");
        assert_eq!(state.turns[3].content, "m9");
    }

    #[test]
    fn role_round_trips() {
        assert_eq!("user".parse::<Role>().unwrap(), Role::User);
        assert_eq!(Role::Assistant.as_str(), "assistant");
        assert!("tool".parse::<Role>().is_err());
    }

    #[test]
    fn dev_admin_has_every_scope() {
        let ctx = AuthContext::dev_admin();
        assert!(ctx.has_scope("agent:chat"));
        assert!(ctx.has_scope("agent:export"));
        assert_eq!(ctx.user_id, "DEV_ADMIN");
    }

    #[test]
    fn memory_type_parse() {
        assert_eq!(
            "episode".parse::<MemoryType>().unwrap(),
            MemoryType::Episode
        );
        assert!(MemoryType::PINNED.contains(&MemoryType::Style));
        assert!(!MemoryType::PINNED.contains(&MemoryType::Episode));
    }
}
