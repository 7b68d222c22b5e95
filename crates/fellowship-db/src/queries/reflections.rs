use anyhow::Result;
use chrono::Utc;
use rusqlite::{Connection, Row};
use uuid::Uuid;

use fellowship_types::api::MAX_PAGE_SIZE;

use super::{OptionalExt, json_at, uuid_at};
use crate::Database;
use crate::models::{ReflectionFilter, ReflectionRow};

const REFLECTION_SELECT: &str = "
    SELECT r.id, r.user_id, u.name, r.title, r.content, r.tags,
           r.reaction_count, r.comment_count, r.created_at, r.updated_at
    FROM reflections r
    JOIN users u ON u.id = r.user_id";

fn map_reflection(row: &Row<'_>) -> rusqlite::Result<ReflectionRow> {
    Ok(ReflectionRow {
        id: uuid_at(row, 0)?,
        user_id: uuid_at(row, 1)?,
        author_name: row.get(2)?,
        title: row.get(3)?,
        content: row.get(4)?,
        tags: json_at(row, 5)?,
        reaction_count: row.get(6)?,
        comment_count: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

impl Database {
    // -- Reflections --

    pub fn insert_reflection(
        &self,
        id: Uuid,
        user_id: Uuid,
        title: &str,
        content: &str,
        tags: &[String],
    ) -> Result<ReflectionRow> {
        let tags = serde_json::to_string(tags)?;
        self.with_tx(|tx| {
            tx.execute(
                "INSERT INTO reflections (id, user_id, title, content, tags, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                rusqlite::params![id.to_string(), user_id.to_string(), title, content, tags, Utc::now()],
            )?;
            query_reflection(tx, id)?.ok_or_else(|| anyhow::anyhow!("reflection {} vanished after insert", id))
        })
    }

    pub fn get_reflection(&self, id: Uuid) -> Result<Option<ReflectionRow>> {
        self.with_conn(|conn| query_reflection(conn, id))
    }

    pub fn list_reflections(&self, filter: &ReflectionFilter<'_>) -> Result<Vec<ReflectionRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE r.deleted_at IS NULL
                   AND (?1 IS NULL OR EXISTS (SELECT 1 FROM json_each(r.tags) t WHERE t.value = ?1))
                   AND (?2 IS NULL OR r.created_at < ?2 OR (r.created_at = ?2 AND r.id < ?4))
                 ORDER BY r.created_at DESC, r.id DESC
                 LIMIT ?3",
                REFLECTION_SELECT
            );
            let mut stmt = conn.prepare(&sql)?;
            let tag = filter.tag.map(|t| t.trim().to_lowercase());
            let rows = stmt
                .query_map(
                    rusqlite::params![
                        tag,
                        filter.before,
                        filter.limit.clamp(1, MAX_PAGE_SIZE),
                        filter.before_id.map(|id| id.to_string()),
                    ],
                    map_reflection,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_reflection(
        &self,
        id: Uuid,
        title: &str,
        content: &str,
        tags: &[String],
    ) -> Result<Option<ReflectionRow>> {
        let tags = serde_json::to_string(tags)?;
        self.with_tx(|tx| {
            let n = tx.execute(
                "UPDATE reflections SET title = ?2, content = ?3, tags = ?4, updated_at = ?5
                 WHERE id = ?1 AND deleted_at IS NULL",
                rusqlite::params![id.to_string(), title, content, tags, Utc::now()],
            )?;
            if n == 0 {
                return Ok(None);
            }
            query_reflection(tx, id)
        })
    }

    pub fn soft_delete_reflection(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE reflections SET deleted_at = ?2 WHERE id = ?1 AND deleted_at IS NULL",
                (id.to_string(), Utc::now()),
            )?;
            Ok(n > 0)
        })
    }
}

fn query_reflection(conn: &Connection, id: Uuid) -> Result<Option<ReflectionRow>> {
    let sql = format!("{} WHERE r.id = ?1 AND r.deleted_at IS NULL", REFLECTION_SELECT);
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt.query_row([id.to_string()], map_reflection).optional()?;
    Ok(row)
}
