use anyhow::Result;
use chrono::Utc;
use rusqlite::Row;
use uuid::Uuid;

use fellowship_types::models::{AdminStats, FeedbackCategory, SiteSettings};

use super::{enum_at, opt_uuid_at, uuid_at};
use crate::Database;
use crate::models::FeedbackRow;

fn map_feedback(row: &Row<'_>) -> rusqlite::Result<FeedbackRow> {
    Ok(FeedbackRow {
        id: uuid_at(row, 0)?,
        user_id: opt_uuid_at(row, 1)?,
        user_name: row.get(2)?,
        category: enum_at(row, 3)?,
        message: row.get(4)?,
        is_read: row.get(5)?,
        created_at: row.get(6)?,
    })
}

impl Database {
    // -- Feedback --

    pub fn insert_feedback(&self, user_id: Uuid, category: FeedbackCategory, message: &str) -> Result<Uuid> {
        self.with_conn(|conn| {
            let id = Uuid::new_v4();
            conn.execute(
                "INSERT INTO feedback (id, user_id, category, message, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id.to_string(), user_id.to_string(), category.as_str(), message, Utc::now()],
            )?;
            Ok(id)
        })
    }

    pub fn list_feedback(&self) -> Result<Vec<FeedbackRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT f.id, f.user_id, u.name, f.category, f.message, f.is_read, f.created_at
                 FROM feedback f
                 LEFT JOIN users u ON u.id = f.user_id
                 ORDER BY f.created_at DESC",
            )?;
            let rows = stmt
                .query_map([], map_feedback)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn mark_feedback_read(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("UPDATE feedback SET is_read = 1 WHERE id = ?1", [id.to_string()])?;
            Ok(n > 0)
        })
    }

    pub fn delete_feedback(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM feedback WHERE id = ?1", [id.to_string()])?;
            Ok(n > 0)
        })
    }

    // -- Site settings --

    pub fn site_settings(&self) -> Result<SiteSettings> {
        self.with_conn(|conn| {
            let prayer_moderation =
                conn.query_row("SELECT prayer_moderation FROM site_settings WHERE id = 1", [], |r| r.get(0))?;
            Ok(SiteSettings { prayer_moderation })
        })
    }

    pub fn save_site_settings(&self, settings: &SiteSettings) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO site_settings (id, prayer_moderation) VALUES (1, ?1)
                 ON CONFLICT(id) DO UPDATE SET prayer_moderation = excluded.prayer_moderation",
                [settings.prayer_moderation],
            )?;
            Ok(())
        })
    }

    // -- Stats --

    pub fn admin_stats(&self) -> Result<AdminStats> {
        self.with_conn(|conn| {
            let stats = conn.query_row(
                "SELECT
                    (SELECT COUNT(*) FROM users),
                    (SELECT COUNT(*) FROM users WHERE status = 'active'),
                    (SELECT COUNT(*) FROM events WHERE is_published AND starts_at >= ?1),
                    (SELECT COUNT(*) FROM prayers WHERE deleted_at IS NULL AND is_approved),
                    (SELECT COUNT(*) FROM prayers WHERE deleted_at IS NULL AND NOT is_approved),
                    (SELECT COUNT(*) FROM reflections WHERE deleted_at IS NULL),
                    (SELECT COUNT(*) FROM recipes),
                    (SELECT COUNT(*) FROM kids_assets),
                    (SELECT COUNT(*) FROM feedback WHERE NOT is_read)",
                [Utc::now()],
                |row| {
                    Ok(AdminStats {
                        users: row.get(0)?,
                        active_users: row.get(1)?,
                        upcoming_events: row.get(2)?,
                        prayers: row.get(3)?,
                        pending_prayers: row.get(4)?,
                        reflections: row.get(5)?,
                        recipes: row.get(6)?,
                        kids_assets: row.get(7)?,
                        unread_feedback: row.get(8)?,
                    })
                },
            )?;
            Ok(stats)
        })
    }
}
