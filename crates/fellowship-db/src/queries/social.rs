use std::collections::HashMap;

use anyhow::Result;
use chrono::Utc;
use rusqlite::{Connection, Row};
use uuid::Uuid;

use fellowship_types::models::{ReactionKind, TargetType};

use super::{OptionalExt, enum_at, placeholders, target_table, uuid_at};
use crate::Database;
use crate::models::{CommentRow, ReactionOutcome, ReactionRemoval};

const COMMENT_SELECT: &str = "
    SELECT c.id, c.user_id, u.name, c.target_type, c.target_id, c.content, c.created_at, c.updated_at
    FROM comments c
    JOIN users u ON u.id = c.user_id";

fn map_comment(row: &Row<'_>) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: uuid_at(row, 0)?,
        user_id: uuid_at(row, 1)?,
        author_name: row.get(2)?,
        target_type: enum_at(row, 3)?,
        target_id: uuid_at(row, 4)?,
        content: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

impl Database {
    /// Owner of a live (not soft-deleted) reaction/comment target.
    pub fn target_owner(&self, target: TargetType, target_id: Uuid) -> Result<Option<Uuid>> {
        self.with_conn(|conn| query_target_owner(conn, target, target_id))
    }

    // -- Reactions --

    /// Adds a reaction and bumps the target's cached counter in one
    /// transaction.
    pub fn add_reaction(
        &self,
        user_id: Uuid,
        target: TargetType,
        target_id: Uuid,
        kind: ReactionKind,
    ) -> Result<ReactionOutcome> {
        self.with_tx(|tx| {
            if query_target_owner(tx, target, target_id)?.is_none() {
                return Ok(ReactionOutcome::TargetMissing);
            }

            let existing: Option<String> = tx
                .query_row(
                    "SELECT id FROM reactions
                     WHERE user_id = ?1 AND target_type = ?2 AND target_id = ?3 AND kind = ?4",
                    (user_id.to_string(), target.as_str(), target_id.to_string(), kind.as_str()),
                    |row| row.get(0),
                )
                .optional()?;
            if existing.is_some() {
                return Ok(ReactionOutcome::Duplicate);
            }

            tx.execute(
                "INSERT INTO reactions (id, user_id, target_type, target_id, kind, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    Uuid::new_v4().to_string(),
                    user_id.to_string(),
                    target.as_str(),
                    target_id.to_string(),
                    kind.as_str(),
                    Utc::now(),
                ],
            )?;
            tx.execute(
                &format!(
                    "UPDATE {} SET reaction_count = reaction_count + 1 WHERE id = ?1",
                    target_table(target)
                ),
                [target_id.to_string()],
            )?;

            Ok(ReactionOutcome::Added)
        })
    }

    /// Removes a reaction and decrements the counter. Soft-deleted targets
    /// are left untouched.
    pub fn remove_reaction(
        &self,
        user_id: Uuid,
        target: TargetType,
        target_id: Uuid,
        kind: ReactionKind,
    ) -> Result<ReactionRemoval> {
        self.with_tx(|tx| {
            if query_target_owner(tx, target, target_id)?.is_none() {
                return Ok(ReactionRemoval::TargetMissing);
            }

            let n = tx.execute(
                "DELETE FROM reactions
                 WHERE user_id = ?1 AND target_type = ?2 AND target_id = ?3 AND kind = ?4",
                (user_id.to_string(), target.as_str(), target_id.to_string(), kind.as_str()),
            )?;
            if n == 0 {
                return Ok(ReactionRemoval::NotReacted);
            }
            tx.execute(
                &format!(
                    "UPDATE {} SET reaction_count = MAX(reaction_count - 1, 0) WHERE id = ?1",
                    target_table(target)
                ),
                [target_id.to_string()],
            )?;
            let reaction_count = tx.query_row(
                &format!("SELECT reaction_count FROM {} WHERE id = ?1", target_table(target)),
                [target_id.to_string()],
                |row| row.get(0),
            )?;
            Ok(ReactionRemoval::Removed { reaction_count })
        })
    }

    /// The reactions a user has left on a batch of targets.
    pub fn reactions_by_user(
        &self,
        user_id: Uuid,
        target: TargetType,
        target_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<ReactionKind>>> {
        if target_ids.is_empty() {
            return Ok(HashMap::new());
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT target_id, kind FROM reactions
                 WHERE user_id = ?1 AND target_type = ?2 AND target_id IN ({})
                 ORDER BY created_at ASC",
                placeholders(3, target_ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;

            let mut params: Vec<String> = Vec::with_capacity(target_ids.len() + 2);
            params.push(user_id.to_string());
            params.push(target.as_str().to_string());
            params.extend(target_ids.iter().map(|id| id.to_string()));

            let mut out: HashMap<Uuid, Vec<ReactionKind>> = HashMap::new();
            let rows = stmt.query_map(rusqlite::params_from_iter(params.iter()), |row| {
                Ok((uuid_at(row, 0)?, enum_at::<ReactionKind>(row, 1)?))
            })?;
            for row in rows {
                let (id, kind) = row?;
                out.entry(id).or_default().push(kind);
            }
            Ok(out)
        })
    }

    // -- Comments --

    /// Returns `None` when the target is missing or soft-deleted.
    pub fn add_comment(
        &self,
        user_id: Uuid,
        target: TargetType,
        target_id: Uuid,
        content: &str,
    ) -> Result<Option<CommentRow>> {
        self.with_tx(|tx| {
            if query_target_owner(tx, target, target_id)?.is_none() {
                return Ok(None);
            }

            let id = Uuid::new_v4();
            tx.execute(
                "INSERT INTO comments (id, user_id, target_type, target_id, content, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                rusqlite::params![
                    id.to_string(),
                    user_id.to_string(),
                    target.as_str(),
                    target_id.to_string(),
                    content,
                    Utc::now(),
                ],
            )?;
            tx.execute(
                &format!(
                    "UPDATE {} SET comment_count = comment_count + 1 WHERE id = ?1",
                    target_table(target)
                ),
                [target_id.to_string()],
            )?;

            query_comment(tx, id)
        })
    }

    pub fn list_comments(&self, target: TargetType, target_id: Uuid) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE c.target_type = ?1 AND c.target_id = ?2 ORDER BY c.created_at ASC",
                COMMENT_SELECT
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map((target.as_str(), target_id.to_string()), map_comment)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_comment(&self, id: Uuid) -> Result<Option<CommentRow>> {
        self.with_conn(|conn| query_comment(conn, id))
    }

    pub fn update_comment(&self, id: Uuid, content: &str) -> Result<Option<CommentRow>> {
        self.with_tx(|tx| {
            let n = tx.execute(
                "UPDATE comments SET content = ?2, updated_at = ?3 WHERE id = ?1",
                rusqlite::params![id.to_string(), content, Utc::now()],
            )?;
            if n == 0 {
                return Ok(None);
            }
            query_comment(tx, id)
        })
    }

    pub fn delete_comment(&self, id: Uuid) -> Result<bool> {
        self.with_tx(|tx| {
            let Some(comment) = query_comment(tx, id)? else {
                return Ok(false);
            };
            tx.execute("DELETE FROM comments WHERE id = ?1", [id.to_string()])?;
            tx.execute(
                &format!(
                    "UPDATE {} SET comment_count = MAX(comment_count - 1, 0) WHERE id = ?1",
                    target_table(comment.target_type)
                ),
                [comment.target_id.to_string()],
            )?;
            Ok(true)
        })
    }
}

fn query_target_owner(conn: &Connection, target: TargetType, target_id: Uuid) -> Result<Option<Uuid>> {
    let sql = format!(
        "SELECT user_id FROM {} WHERE id = ?1 AND deleted_at IS NULL",
        target_table(target)
    );
    let owner = conn
        .query_row(&sql, [target_id.to_string()], |row| uuid_at(row, 0))
        .optional()?;
    Ok(owner)
}

fn query_comment(conn: &Connection, id: Uuid) -> Result<Option<CommentRow>> {
    let sql = format!("{} WHERE c.id = ?1", COMMENT_SELECT);
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt.query_row([id.to_string()], map_comment).optional()?;
    Ok(row)
}
