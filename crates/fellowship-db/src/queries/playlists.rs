use std::collections::HashSet;

use anyhow::Result;
use chrono::Utc;
use rusqlite::{Connection, Row};
use uuid::Uuid;

use super::{OptionalExt, uuid_at};
use crate::Database;
use crate::models::PlaylistRow;

const PLAYLIST_COLUMNS: &str = "id, title, description, url, sort_index, created_at";

fn map_playlist(row: &Row<'_>) -> rusqlite::Result<PlaylistRow> {
    Ok(PlaylistRow {
        id: uuid_at(row, 0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        url: row.get(3)?,
        sort_index: row.get(4)?,
        created_at: row.get(5)?,
    })
}

impl Database {
    // -- Playlists --

    pub fn list_playlists(&self) -> Result<Vec<PlaylistRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM playlists ORDER BY sort_index ASC, created_at ASC",
                PLAYLIST_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], map_playlist)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_playlist(&self, id: Uuid) -> Result<Option<PlaylistRow>> {
        self.with_conn(|conn| query_playlist(conn, id))
    }

    /// Appends a playlist after the current last one.
    pub fn insert_playlist(&self, id: Uuid, title: &str, description: &str, url: &str) -> Result<PlaylistRow> {
        self.with_tx(|tx| {
            let next: i64 =
                tx.query_row("SELECT COALESCE(MAX(sort_index), -1) + 1 FROM playlists", [], |r| r.get(0))?;
            tx.execute(
                "INSERT INTO playlists (id, title, description, url, sort_index, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![id.to_string(), title, description, url, next, Utc::now()],
            )?;
            query_playlist(tx, id)?.ok_or_else(|| anyhow::anyhow!("playlist {} vanished after insert", id))
        })
    }

    pub fn update_playlist(
        &self,
        id: Uuid,
        title: &str,
        description: &str,
        url: &str,
    ) -> Result<Option<PlaylistRow>> {
        self.with_tx(|tx| {
            let n = tx.execute(
                "UPDATE playlists SET title = ?2, description = ?3, url = ?4 WHERE id = ?1",
                (id.to_string(), title, description, url),
            )?;
            if n == 0 {
                return Ok(None);
            }
            query_playlist(tx, id)
        })
    }

    pub fn delete_playlist(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM playlists WHERE id = ?1", [id.to_string()])?;
            Ok(n > 0)
        })
    }

    /// Rewrites sort indices to follow `ids`. Returns false, changing
    /// nothing, unless `ids` names every playlist exactly once.
    pub fn reorder_playlists(&self, ids: &[Uuid]) -> Result<bool> {
        self.with_tx(|tx| {
            let mut stmt = tx.prepare("SELECT id FROM playlists")?;
            let existing = stmt
                .query_map([], |row| uuid_at(row, 0))?
                .collect::<std::result::Result<HashSet<_>, _>>()?;
            drop(stmt);

            let requested: HashSet<Uuid> = ids.iter().copied().collect();
            if requested.len() != ids.len() || requested != existing {
                return Ok(false);
            }

            for (index, id) in ids.iter().enumerate() {
                tx.execute(
                    "UPDATE playlists SET sort_index = ?2 WHERE id = ?1",
                    (id.to_string(), index as i64),
                )?;
            }
            Ok(true)
        })
    }
}

fn query_playlist(conn: &Connection, id: Uuid) -> Result<Option<PlaylistRow>> {
    let sql = format!("SELECT {} FROM playlists WHERE id = ?1", PLAYLIST_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt.query_row([id.to_string()], map_playlist).optional()?;
    Ok(row)
}
