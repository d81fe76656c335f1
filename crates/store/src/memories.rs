//! Bounded per-user memory store.

use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use astrea_domain::error::Result;
use astrea_domain::model::{MemoryRow, MemoryType, Sensitivity};

use crate::{sql_err, Store};

impl Store {
    /// Insert a memory row and prune the user's store to `max_memories`
    /// newest-by-`updated_at`. Returns the new row id.
    pub fn insert_memory(
        &self,
        user_id: &str,
        mem_type: MemoryType,
        content: &serde_json::Value,
        embedding: Option<&[f32]>,
        source: Option<&str>,
        sensitivity: Sensitivity,
        max_memories: usize,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let content_json = serde_json::to_string(content)?;
        let embedding_json = embedding.map(serde_json::to_string).transpose()?;

        let conn = self.conn.lock();
        conn.execute(
            r#"
            INSERT INTO memories
                (id, user_id, type, content_json, embedding_json, source,
                 sensitivity, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
            "#,
            params![
                id,
                user_id,
                mem_type.as_str(),
                content_json,
                embedding_json,
                source,
                sensitivity.as_str(),
                now,
            ],
        )
        .map_err(sql_err)?;

        // Prune: newest-by-updated_at survive, ties broken by insertion order.
        conn.execute(
            r#"
            DELETE FROM memories
            WHERE user_id = ?1
              AND id NOT IN (
                  SELECT id FROM memories
                  WHERE user_id = ?1
                  ORDER BY updated_at DESC, rowid DESC
                  LIMIT ?2
              )
            "#,
            params![user_id, max_memories as i64],
        )
        .map_err(sql_err)?;

        Ok(id)
    }

    /// Newest-updated pinned memories (fact/preference/constraint/style).
    pub fn pinned_memories(&self, user_id: &str, limit: usize) -> Result<Vec<MemoryRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                r#"
                SELECT id, user_id, type, content_json, embedding_json,
                       source, sensitivity, created_at, updated_at
                FROM memories
                WHERE user_id = ?1
                  AND type IN ('fact', 'preference', 'constraint', 'style')
                ORDER BY updated_at DESC, rowid DESC
                LIMIT ?2
                "#,
            )
            .map_err(sql_err)?;

        let rows = stmt
            .query_map(params![user_id, limit as i64], row_to_memory)
            .map_err(sql_err)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(sql_err)?;
        Ok(rows)
    }

    /// Load specific memories by id, still filtered by user.
    pub fn memories_by_ids(&self, user_id: &str, ids: &[String]) -> Result<Vec<MemoryRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                r#"
                SELECT id, user_id, type, content_json, embedding_json,
                       source, sensitivity, created_at, updated_at
                FROM memories
                WHERE user_id = ?1 AND id = ?2
                "#,
            )
            .map_err(sql_err)?;

        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let row = stmt
                .query_row(params![user_id, id], row_to_memory)
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })
                .map_err(sql_err)?;
            if let Some(row) = row {
                out.push(row);
            }
        }
        Ok(out)
    }

    pub fn count_memories(&self, user_id: &str) -> Result<usize> {
        let count: i64 = self
            .conn
            .lock()
            .query_row(
                "SELECT COUNT(*) FROM memories WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )
            .map_err(sql_err)?;
        Ok(count as usize)
    }

    /// Memories of one type, newest first (episode assertions in tests).
    pub fn memories_of_type(&self, user_id: &str, mem_type: MemoryType) -> Result<Vec<MemoryRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                r#"
                SELECT id, user_id, type, content_json, embedding_json,
                       source, sensitivity, created_at, updated_at
                FROM memories
                WHERE user_id = ?1 AND type = ?2
                ORDER BY updated_at DESC, rowid DESC
                "#,
            )
            .map_err(sql_err)?;

        let rows = stmt
            .query_map(params![user_id, mem_type.as_str()], row_to_memory)
            .map_err(sql_err)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(sql_err)?;
        Ok(rows)
    }
}

fn row_to_memory(row: &rusqlite::Row<'_>) -> rusqlite::Result<MemoryRow> {
    let mem_type: String = row.get(2)?;
    let content_json: String = row.get(3)?;
    let embedding_json: Option<String> = row.get(4)?;
    let sensitivity: String = row.get(6)?;
    let created_at: String = row.get(7)?;
    let updated_at: String = row.get(8)?;

    Ok(MemoryRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        mem_type: mem_type.parse().unwrap_or(MemoryType::Note),
        content: serde_json::from_str(&content_json)
            .unwrap_or(serde_json::Value::String(content_json)),
        embedding: embedding_json.and_then(|j| serde_json::from_str(&j).ok()),
        source: row.get(5)?,
        sensitivity: if sensitivity == "sensitive" {
            Sensitivity::Sensitive
        } else {
            Sensitivity::Normal
        },
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
    })
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn insert_prunes_to_newest() {
        let store = Store::open_in_memory().unwrap();
        for i in 0..12 {
            store
                .insert_memory(
                    "u-1",
                    MemoryType::Fact,
                    &json!({ "n": i }),
                    None,
                    Some("chat"),
                    Sensitivity::Normal,
                    5,
                )
                .unwrap();
        }
        assert_eq!(store.count_memories("u-1").unwrap(), 5);

        // Survivors are the newest five.
        let rows = store.pinned_memories("u-1", 12).unwrap();
        let ns: Vec<i64> = rows.iter().map(|r| r.content["n"].as_i64().unwrap()).collect();
        assert_eq!(ns, vec![11, 10, 9, 8, 7]);
    }

    #[test]
    fn pinned_excludes_episodes_and_notes() {
        let store = Store::open_in_memory().unwrap();
        store
            .insert_memory("u-1", MemoryType::Fact, &json!("f"), None, None, Sensitivity::Normal, 400)
            .unwrap();
        store
            .insert_memory("u-1", MemoryType::Episode, &json!("e"), None, None, Sensitivity::Normal, 400)
            .unwrap();
        store
            .insert_memory("u-1", MemoryType::Note, &json!("n"), None, None, Sensitivity::Normal, 400)
            .unwrap();

        let rows = store.pinned_memories("u-1", 12).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].mem_type, MemoryType::Fact);
    }

    #[test]
    fn lookup_by_id_is_user_scoped() {
        let store = Store::open_in_memory().unwrap();
        let id = store
            .insert_memory("u-1", MemoryType::Fact, &json!("x"), None, None, Sensitivity::Normal, 400)
            .unwrap();

        let found = store.memories_by_ids("u-1", &[id.clone()]).unwrap();
        assert_eq!(found.len(), 1);

        // Another user cannot load the row even knowing its id.
        let leaked = store.memories_by_ids("u-2", &[id]).unwrap();
        assert!(leaked.is_empty());
    }

    #[test]
    fn embedding_round_trips() {
        let store = Store::open_in_memory().unwrap();
        let id = store
            .insert_memory(
                "u-1",
                MemoryType::Episode,
                &json!("summary"),
                Some(&[0.1, 0.2, 0.3]),
                Some("episode"),
                Sensitivity::Normal,
                400,
            )
            .unwrap();
        let rows = store.memories_by_ids("u-1", &[id]).unwrap();
        assert_eq!(rows[0].embedding.as_deref(), Some(&[0.1_f32, 0.2, 0.3][..]));
    }
}
