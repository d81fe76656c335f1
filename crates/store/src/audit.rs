//! Tool invocation audit log. One row per invocation attempt.

use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

use astrea_domain::error::Result;
use astrea_domain::model::{ToolAudit, ToolStatus};

use crate::{sql_err, Store};

impl Store {
    pub fn append_tool_audit(&self, audit: &ToolAudit) -> Result<()> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        let conn = self.conn.lock();
        let wide = conn.execute(
            r#"
            INSERT INTO tool_audit
                (id, user_id, tool, request_id, status, args_json,
                 duration_ms, redaction_applied, redacted_output_json, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                id,
                audit.user_id,
                audit.tool,
                audit.request_id,
                audit.status.as_str(),
                audit.args,
                audit.duration_ms.map(|d| d as i64),
                audit.redaction_applied,
                audit.redacted_output,
                now,
            ],
        );

        if let Err(e) = wide {
            tracing::debug!(error = %e, "wide audit insert failed, using narrow form");
            conn.execute(
                r#"
                INSERT INTO tool_audit
                    (id, user_id, tool, request_id, status, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    id,
                    audit.user_id,
                    audit.tool,
                    audit.request_id,
                    audit.status.as_str(),
                    now,
                ],
            )
            .map_err(sql_err)?;
        }
        Ok(())
    }

    /// `(status, request_id)` pairs for a user, newest first.
    pub fn tool_audits(&self, user_id: &str) -> Result<Vec<(ToolStatus, String)>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                r#"
                SELECT status, request_id
                FROM tool_audit
                WHERE user_id = ?1
                ORDER BY rowid DESC
                "#,
            )
            .map_err(sql_err)?;

        let rows = stmt
            .query_map([user_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(sql_err)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(sql_err)?
            .into_iter()
            .map(|(status, request_id)| {
                let status = if status == "ok" {
                    ToolStatus::Ok
                } else {
                    ToolStatus::Error
                };
                (status, request_id)
            })
            .collect();
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audit(user_id: &str, status: ToolStatus) -> ToolAudit {
        ToolAudit {
            user_id: user_id.into(),
            tool: "natal_export_full".into(),
            request_id: "req_1".into(),
            status,
            args: Some("{}".into()),
            duration_ms: Some(120),
            redaction_applied: true,
            redacted_output: Some(r#"{"safe_json":{}}"#.into()),
        }
    }

    #[test]
    fn append_and_read_per_user() {
        let store = Store::open_in_memory().unwrap();
        store.append_tool_audit(&audit("u-1", ToolStatus::Ok)).unwrap();
        store.append_tool_audit(&audit("u-1", ToolStatus::Error)).unwrap();
        store.append_tool_audit(&audit("u-2", ToolStatus::Ok)).unwrap();

        let rows = store.tool_audits("u-1").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, ToolStatus::Error);
        assert_eq!(rows[1].0, ToolStatus::Ok);
    }

    #[test]
    fn narrow_schema_falls_back() {
        let store = crate::testutil::open_narrow();
        store.append_tool_audit(&audit("u-1", ToolStatus::Ok)).unwrap();
        assert_eq!(store.tool_audits("u-1").unwrap().len(), 1);
    }
}
