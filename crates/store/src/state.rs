//! Actor state blob, one row per user under a stable key.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use astrea_domain::error::Result;
use astrea_domain::model::ActorState;

use crate::{sql_err, Store};

impl Store {
    /// Load the persisted state blob, if any.
    pub fn load_state(&self, user_id: &str) -> Result<Option<ActorState>> {
        let conn = self.conn.lock();
        let json: Option<String> = conn
            .query_row(
                "SELECT state_json FROM agent_state WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(sql_err)?;

        match json {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    /// Write the complete state atomically (single upsert).
    pub fn save_state(&self, user_id: &str, state: &ActorState) -> Result<()> {
        let json = serde_json::to_string(state)?;
        self.conn
            .lock()
            .execute(
                r#"
                INSERT INTO agent_state (user_id, state_json, updated_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(user_id) DO UPDATE SET
                    state_json = ?2,
                    updated_at = ?3
                "#,
                params![user_id, json, Utc::now().to_rfc3339()],
            )
            .map_err(sql_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use astrea_domain::model::{Role, Turn};

    use super::*;

    #[test]
    fn save_then_load_round_trips() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.load_state("u-1").unwrap().is_none());

        let mut state = ActorState::default();
        state.push_turn(Turn::now(Role::User, "hi"), 40);
        state.turn_count = 1;
        state
            .working_memory
            .insert("mood".into(), "curious".into());
        store.save_state("u-1", &state).unwrap();

        let loaded = store.load_state("u-1").unwrap().unwrap();
        assert_eq!(loaded.turns.len(), 1);
        assert_eq!(loaded.turn_count, 1);
        assert_eq!(loaded.working_memory["mood"], "curious");

        // Upsert replaces, not duplicates.
        state.turn_count = 2;
        store.save_state("u-1", &state).unwrap();
        assert_eq!(store.load_state("u-1").unwrap().unwrap().turn_count, 2);
    }

    #[test]
    fn state_is_per_user() {
        let store = Store::open_in_memory().unwrap();
        store.save_state("u-1", &ActorState::default()).unwrap();
        assert!(store.load_state("u-2").unwrap().is_none());
    }
}
