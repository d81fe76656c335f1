//! Bounded conversational turn storage.

use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use astrea_domain::error::Result;
use astrea_domain::model::{Role, Turn};

use crate::{sql_err, Store};

/// The service holds one conversation per user.
const THREAD_ID: &str = "main";

impl Store {
    /// Append turns for a user, then clamp the stored history to
    /// `max_turns` newest rows.
    ///
    /// The wide form carries `tokens_est`, `request_id`, and `model`;
    /// older schemas without those columns get the narrow form.
    pub fn append_turns(
        &self,
        user_id: &str,
        turns: &[Turn],
        request_id: &str,
        model: &str,
        max_turns: usize,
    ) -> Result<()> {
        let conn = self.conn.lock();
        for turn in turns {
            let id = Uuid::new_v4().to_string();
            let created_at = turn.ts.to_rfc3339();
            let tokens_est = (turn.content.len() / 4) as i64;

            let wide = conn.execute(
                r#"
                INSERT INTO conversation_turns
                    (id, user_id, thread_id, role, content, tokens_est,
                     created_at, request_id, model)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
                params![
                    id,
                    user_id,
                    THREAD_ID,
                    turn.role.as_str(),
                    turn.content,
                    tokens_est,
                    created_at,
                    request_id,
                    model,
                ],
            );

            if let Err(e) = wide {
                tracing::debug!(error = %e, "wide turn insert failed, using narrow form");
                conn.execute(
                    r#"
                    INSERT INTO conversation_turns
                        (id, user_id, thread_id, role, content, created_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    "#,
                    params![id, user_id, THREAD_ID, turn.role.as_str(), turn.content, created_at],
                )
                .map_err(sql_err)?;
            }
        }

        // Clamp: keep the newest `max_turns` rows by insertion order.
        conn.execute(
            r#"
            DELETE FROM conversation_turns
            WHERE user_id = ?1
              AND rowid NOT IN (
                  SELECT rowid FROM conversation_turns
                  WHERE user_id = ?1
                  ORDER BY rowid DESC
                  LIMIT ?2
              )
            "#,
            params![user_id, max_turns as i64],
        )
        .map_err(sql_err)?;

        Ok(())
    }

    /// Newest `limit` turns in chronological order (used to seed a fresh
    /// actor).
    pub fn recent_turns(&self, user_id: &str, limit: usize) -> Result<Vec<Turn>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                r#"
                SELECT role, content, created_at
                FROM conversation_turns
                WHERE user_id = ?1
                ORDER BY rowid DESC
                LIMIT ?2
                "#,
            )
            .map_err(sql_err)?;

        let mut turns = stmt
            .query_map(params![user_id, limit as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(sql_err)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(sql_err)?
            .into_iter()
            .filter_map(|(role, content, ts)| {
                let role: Role = role.parse().ok()?;
                let ts = DateTime::parse_from_rfc3339(&ts).ok()?.with_timezone(&Utc);
                Some(Turn { role, content, ts })
            })
            .collect::<Vec<_>>();

        turns.reverse();
        Ok(turns)
    }

    pub fn count_turns(&self, user_id: &str) -> Result<usize> {
        let count: i64 = self
            .conn
            .lock()
            .query_row(
                "SELECT COUNT(*) FROM conversation_turns WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )
            .map_err(sql_err)?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(role: Role, content: &str) -> Turn {
        Turn::now(role, content)
    }

    #[test]
    fn append_and_read_back_in_order() {
        let store = Store::open_in_memory().unwrap();
        store
            .append_turns(
                "u-1",
                &[turn(Role::User, "hello"), turn(Role::Assistant, "hi there")],
                "req_x",
                "astrea-chat-1",
                40,
            )
            .unwrap();

        let turns = store.recent_turns("u-1", 10).unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[1].content, "hi there");
    }

    #[test]
    fn stored_turns_are_clamped_to_max() {
        let store = Store::open_in_memory().unwrap();
        for i in 0..30 {
            store
                .append_turns(
                    "u-1",
                    &[turn(Role::User, &format!("m{i}"))],
                    "req_x",
                    "m",
                    8,
                )
                .unwrap();
        }
        assert_eq!(store.count_turns("u-1").unwrap(), 8);
        let turns = store.recent_turns("u-1", 50).unwrap();
        assert_eq!(turns[0].content, "m22");
        assert_eq!(turns[7].content, "m29");
    }

    #[test]
    fn turns_are_isolated_by_user() {
        let store = Store::open_in_memory().unwrap();
        store
            .append_turns("u-1", &[turn(Role::User, "mine")], "r", "m", 40)
            .unwrap();
        store
            .append_turns("u-2", &[turn(Role::User, "theirs")], "r", "m", 40)
            .unwrap();

        let mine = store.recent_turns("u-1", 10).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].content, "mine");
    }

    #[test]
    fn narrow_schema_falls_back() {
        let store = crate::testutil::open_narrow();
        store
            .append_turns("u-1", &[turn(Role::User, "hello")], "req_x", "m", 40)
            .unwrap();
        let turns = store.recent_turns("u-1", 10).unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].content, "hello");
    }
}
