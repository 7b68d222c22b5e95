use anyhow::Result;
use chrono::Utc;
use rusqlite::{Connection, Row};
use uuid::Uuid;

use fellowship_types::game::Verse;
use fellowship_types::models::AssetKind;

use super::{OptionalExt, enum_at, opt_uuid_at, uuid_at};
use crate::Database;
use crate::models::{KidsAssetFields, KidsAssetRow};

const ASSET_COLUMNS: &str =
    "id, kind, title, description, content, reference, file_key, download_count, created_by, created_at";

fn map_asset(row: &Row<'_>) -> rusqlite::Result<KidsAssetRow> {
    Ok(KidsAssetRow {
        id: uuid_at(row, 0)?,
        kind: enum_at(row, 1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        content: row.get(4)?,
        reference: row.get(5)?,
        file_key: row.get(6)?,
        download_count: row.get(7)?,
        created_by: opt_uuid_at(row, 8)?,
        created_at: row.get(9)?,
    })
}

impl Database {
    // -- Kids assets --

    pub fn insert_kids_asset(
        &self,
        id: Uuid,
        kind: AssetKind,
        created_by: Uuid,
        fields: &KidsAssetFields,
    ) -> Result<KidsAssetRow> {
        self.with_tx(|tx| {
            tx.execute(
                "INSERT INTO kids_assets (id, kind, title, description, content, reference, created_by, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    id.to_string(),
                    kind.as_str(),
                    fields.title,
                    fields.description,
                    fields.content,
                    fields.reference,
                    created_by.to_string(),
                    Utc::now(),
                ],
            )?;
            query_asset(tx, id)?.ok_or_else(|| anyhow::anyhow!("kids asset {} vanished after insert", id))
        })
    }

    pub fn get_kids_asset(&self, id: Uuid) -> Result<Option<KidsAssetRow>> {
        self.with_conn(|conn| query_asset(conn, id))
    }

    pub fn list_kids_assets(&self, kind: Option<AssetKind>) -> Result<Vec<KidsAssetRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM kids_assets WHERE (?1 IS NULL OR kind = ?1) ORDER BY created_at DESC",
                ASSET_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([kind.map(|k| k.as_str())], map_asset)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_kids_asset(&self, id: Uuid, fields: &KidsAssetFields) -> Result<Option<KidsAssetRow>> {
        self.with_tx(|tx| {
            let n = tx.execute(
                "UPDATE kids_assets SET title = ?2, description = ?3, content = ?4, reference = ?5
                 WHERE id = ?1",
                rusqlite::params![
                    id.to_string(),
                    fields.title,
                    fields.description,
                    fields.content,
                    fields.reference,
                ],
            )?;
            if n == 0 {
                return Ok(None);
            }
            query_asset(tx, id)
        })
    }

    /// Deletes the row and hands it back so the caller can remove its file.
    pub fn delete_kids_asset(&self, id: Uuid) -> Result<Option<KidsAssetRow>> {
        self.with_tx(|tx| {
            let Some(asset) = query_asset(tx, id)? else {
                return Ok(None);
            };
            tx.execute("DELETE FROM kids_assets WHERE id = ?1", [id.to_string()])?;
            Ok(Some(asset))
        })
    }

    /// Points the asset at a new stored file. Returns the updated row and
    /// the key it replaced, or `None` if the asset is gone.
    pub fn set_kids_asset_file(&self, id: Uuid, key: &str) -> Result<Option<(KidsAssetRow, Option<String>)>> {
        self.with_tx(|tx| {
            let Some(previous) = query_asset(tx, id)? else {
                return Ok(None);
            };
            tx.execute(
                "UPDATE kids_assets SET file_key = ?2 WHERE id = ?1",
                (id.to_string(), key),
            )?;
            let updated = query_asset(tx, id)?.ok_or_else(|| anyhow::anyhow!("kids asset {} vanished", id))?;
            Ok(Some((updated, previous.file_key)))
        })
    }

    pub fn increment_downloads(&self, id: Uuid) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE kids_assets SET download_count = download_count + 1 WHERE id = ?1",
                [id.to_string()],
            )?;
            Ok(())
        })
    }

    /// Verse assets usable by the matching game.
    pub fn list_verses(&self) -> Result<Vec<Verse>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, reference, content FROM kids_assets
                 WHERE kind = 'verse' AND reference IS NOT NULL AND content IS NOT NULL",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(Verse {
                        id: uuid_at(row, 0)?,
                        reference: row.get(1)?,
                        text: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_asset(conn: &Connection, id: Uuid) -> Result<Option<KidsAssetRow>> {
    let sql = format!("SELECT {} FROM kids_assets WHERE id = ?1", ASSET_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt.query_row([id.to_string()], map_asset).optional()?;
    Ok(row)
}
