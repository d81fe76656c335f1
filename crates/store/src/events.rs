//! Append-only memory event log.

use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

use astrea_domain::error::Result;
use astrea_domain::model::MemoryEventType;

use crate::{sql_err, Store};

impl Store {
    /// Append an audit event. Best-effort callers decide whether a
    /// failure here is fatal; the adapter just reports it.
    pub fn append_event(
        &self,
        user_id: &str,
        event_type: MemoryEventType,
        payload: &serde_json::Value,
    ) -> Result<()> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let payload_json = serde_json::to_string(payload)?;

        let conn = self.conn.lock();
        let wide = conn.execute(
            r#"
            INSERT INTO memory_events
                (id, user_id, event_type, payload_json, created_at, source)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![id, user_id, event_type.as_str(), payload_json, now, "agent"],
        );

        if let Err(e) = wide {
            tracing::debug!(error = %e, "wide event insert failed, using narrow form");
            conn.execute(
                r#"
                INSERT INTO memory_events
                    (id, user_id, event_type, payload_json, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![id, user_id, event_type.as_str(), payload_json, now],
            )
            .map_err(sql_err)?;
        }
        Ok(())
    }

    /// Events of one type for a user, newest first.
    pub fn events_of_type(
        &self,
        user_id: &str,
        event_type: MemoryEventType,
    ) -> Result<Vec<serde_json::Value>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                r#"
                SELECT payload_json
                FROM memory_events
                WHERE user_id = ?1 AND event_type = ?2
                ORDER BY rowid DESC
                "#,
            )
            .map_err(sql_err)?;

        let rows = stmt
            .query_map(params![user_id, event_type.as_str()], |row| {
                row.get::<_, String>(0)
            })
            .map_err(sql_err)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(sql_err)?
            .into_iter()
            .filter_map(|j| serde_json::from_str(&j).ok())
            .collect();
        Ok(rows)
    }
}
