use anyhow::Result;
use chrono::Utc;
use rusqlite::{Connection, Row};
use uuid::Uuid;

use fellowship_types::api::MAX_PAGE_SIZE;
use fellowship_types::models::PrayerKind;

use super::{OptionalExt, enum_at, uuid_at};
use crate::Database;
use crate::models::{NewPrayer, PrayerFilter, PrayerRow};

const PRAYER_SELECT: &str = "
    SELECT p.id, p.user_id, u.name, p.kind, p.content, p.is_anonymous, p.is_answered,
           p.is_approved, p.reaction_count, p.comment_count, p.created_at
    FROM prayers p
    JOIN users u ON u.id = p.user_id";

fn map_prayer(row: &Row<'_>) -> rusqlite::Result<PrayerRow> {
    Ok(PrayerRow {
        id: uuid_at(row, 0)?,
        user_id: uuid_at(row, 1)?,
        author_name: row.get(2)?,
        kind: enum_at(row, 3)?,
        content: row.get(4)?,
        is_anonymous: row.get(5)?,
        is_answered: row.get(6)?,
        is_approved: row.get(7)?,
        reaction_count: row.get(8)?,
        comment_count: row.get(9)?,
        created_at: row.get(10)?,
    })
}

impl Database {
    // -- Prayers --

    pub fn insert_prayer(&self, new: &NewPrayer<'_>) -> Result<PrayerRow> {
        self.with_tx(|tx| {
            let now = Utc::now();
            tx.execute(
                "INSERT INTO prayers (id, user_id, kind, content, is_anonymous, is_approved, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                rusqlite::params![
                    new.id.to_string(),
                    new.user_id.to_string(),
                    new.kind.as_str(),
                    new.content,
                    new.is_anonymous,
                    new.is_approved,
                    now,
                ],
            )?;
            query_prayer(tx, new.id)?.ok_or_else(|| anyhow::anyhow!("prayer {} vanished after insert", new.id))
        })
    }

    /// A prayer that has not been soft-deleted.
    pub fn get_prayer(&self, id: Uuid) -> Result<Option<PrayerRow>> {
        self.with_conn(|conn| query_prayer(conn, id))
    }

    /// Newest first, ties broken by id. Unapproved prayers only show up
    /// for their author.
    pub fn list_prayers(&self, filter: &PrayerFilter) -> Result<Vec<PrayerRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE p.deleted_at IS NULL
                   AND (p.is_approved OR p.user_id = ?1)
                   AND (?2 IS NULL OR p.kind = ?2)
                   AND (?3 IS NULL OR p.created_at < ?3 OR (p.created_at = ?3 AND p.id < ?5))
                 ORDER BY p.created_at DESC, p.id DESC
                 LIMIT ?4",
                PRAYER_SELECT
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    rusqlite::params![
                        filter.viewer.to_string(),
                        filter.kind.map(|k| k.as_str()),
                        filter.before,
                        filter.limit.clamp(1, MAX_PAGE_SIZE),
                        filter.before_id.map(|id| id.to_string()),
                    ],
                    map_prayer,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn list_pending_prayers(&self) -> Result<Vec<PrayerRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE p.deleted_at IS NULL AND NOT p.is_approved ORDER BY p.created_at ASC",
                PRAYER_SELECT
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], map_prayer)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_prayer(
        &self,
        id: Uuid,
        kind: PrayerKind,
        content: &str,
        is_anonymous: bool,
        is_answered: bool,
    ) -> Result<Option<PrayerRow>> {
        self.with_tx(|tx| {
            let n = tx.execute(
                "UPDATE prayers SET kind = ?2, content = ?3, is_anonymous = ?4, is_answered = ?5, updated_at = ?6
                 WHERE id = ?1 AND deleted_at IS NULL",
                rusqlite::params![id.to_string(), kind.as_str(), content, is_anonymous, is_answered, Utc::now()],
            )?;
            if n == 0 {
                return Ok(None);
            }
            query_prayer(tx, id)
        })
    }

    /// Marks an unapproved prayer as approved. Returns the prayer only when
    /// this call flipped the flag.
    pub fn approve_prayer(&self, id: Uuid) -> Result<Option<PrayerRow>> {
        self.with_tx(|tx| {
            let n = tx.execute(
                "UPDATE prayers SET is_approved = 1
                 WHERE id = ?1 AND deleted_at IS NULL AND NOT is_approved",
                [id.to_string()],
            )?;
            if n == 0 {
                return Ok(None);
            }
            query_prayer(tx, id)
        })
    }

    pub fn soft_delete_prayer(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE prayers SET deleted_at = ?2 WHERE id = ?1 AND deleted_at IS NULL",
                (id.to_string(), Utc::now()),
            )?;
            Ok(n > 0)
        })
    }
}

fn query_prayer(conn: &Connection, id: Uuid) -> Result<Option<PrayerRow>> {
    let sql = format!("{} WHERE p.id = ?1 AND p.deleted_at IS NULL", PRAYER_SELECT);
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt.query_row([id.to_string()], map_prayer).optional()?;
    Ok(row)
}
