//! Relational persistence adapter.
//!
//! One SQLite connection behind a mutex; every statement is prepared and
//! every read is filtered by `user_id` — there is no cross-user access
//! path. Writes to tables with optional "wide" columns attempt the wide
//! form first and fall back to the narrow form, so the adapter keeps
//! working against an older schema.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::Connection;

use astrea_domain::error::{Error, Result};

mod audit;
mod events;
mod memories;
mod state;
mod turns;

/// Thread-safe handle over the relational store.
pub struct Store {
    pub(crate) conn: Mutex<Connection>,
}

impl Store {
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path).map_err(sql_err)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(sql_err)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn
            .lock()
            .execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS agent_state (
                    user_id TEXT PRIMARY KEY,
                    state_json TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS memories (
                    id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL,
                    type TEXT NOT NULL,
                    content_json TEXT NOT NULL,
                    embedding_json TEXT,
                    source TEXT,
                    sensitivity TEXT NOT NULL DEFAULT 'normal',
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS memory_events (
                    id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL,
                    event_type TEXT NOT NULL,
                    payload_json TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    source TEXT,
                    confidence REAL
                );

                CREATE TABLE IF NOT EXISTS conversation_turns (
                    id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL,
                    thread_id TEXT NOT NULL,
                    role TEXT NOT NULL,
                    content TEXT NOT NULL,
                    tokens_est INTEGER,
                    created_at TEXT NOT NULL,
                    request_id TEXT,
                    token_budget INTEGER,
                    model TEXT
                );

                CREATE TABLE IF NOT EXISTS tool_audit (
                    id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL,
                    tool TEXT NOT NULL,
                    request_id TEXT NOT NULL,
                    status TEXT NOT NULL,
                    args_json TEXT,
                    duration_ms INTEGER,
                    redaction_applied INTEGER,
                    redacted_output_json TEXT,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_memories_user_created
                    ON memories(user_id, created_at);
                CREATE INDEX IF NOT EXISTS idx_memories_user_updated
                    ON memories(user_id, updated_at DESC);
                CREATE INDEX IF NOT EXISTS idx_events_user_created
                    ON memory_events(user_id, created_at);
                CREATE INDEX IF NOT EXISTS idx_turns_user_created
                    ON conversation_turns(user_id, created_at);
                CREATE INDEX IF NOT EXISTS idx_turns_thread_created
                    ON conversation_turns(thread_id, created_at);
                CREATE INDEX IF NOT EXISTS idx_audit_user_created
                    ON tool_audit(user_id, created_at);
                "#,
            )
            .map_err(sql_err)?;
        Ok(())
    }
}

pub(crate) fn sql_err(e: rusqlite::Error) -> Error {
    Error::Storage(e.to_string())
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;

    /// A store whose turn/event/audit tables carry only the narrow
    /// (pre-migration) column set. Exercises the wide→narrow fallback.
    pub fn open_narrow() -> Store {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE agent_state (
                user_id TEXT PRIMARY KEY,
                state_json TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE TABLE memories (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                type TEXT NOT NULL,
                content_json TEXT NOT NULL,
                embedding_json TEXT,
                source TEXT,
                sensitivity TEXT NOT NULL DEFAULT 'normal',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE TABLE memory_events (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                event_type TEXT NOT NULL,
                payload_json TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE TABLE conversation_turns (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                thread_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE TABLE tool_audit (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                tool TEXT NOT NULL,
                request_id TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .unwrap();
        Store {
            conn: Mutex::new(conn),
        }
    }
}
