use anyhow::Result;
use chrono::Utc;
use rusqlite::{Connection, Row};
use uuid::Uuid;

use fellowship_types::api::MAX_PAGE_SIZE;
use fellowship_types::models::{NotificationPreferences, Platform};

use super::{OptionalExt, enum_at, placeholders, uuid_at};
use crate::Database;
use crate::models::{DeviceTokenRow, NewNotification, NotificationRow};

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, kind, title, body, link, is_read, email_sent, push_sent, created_at";

fn map_notification(row: &Row<'_>) -> rusqlite::Result<NotificationRow> {
    Ok(NotificationRow {
        id: uuid_at(row, 0)?,
        user_id: uuid_at(row, 1)?,
        kind: enum_at(row, 2)?,
        title: row.get(3)?,
        body: row.get(4)?,
        link: row.get(5)?,
        is_read: row.get(6)?,
        email_sent: row.get(7)?,
        push_sent: row.get(8)?,
        created_at: row.get(9)?,
    })
}

impl Database {
    // -- Notifications --

    pub fn insert_notification(&self, user_id: Uuid, new: &NewNotification) -> Result<NotificationRow> {
        self.with_tx(|tx| {
            let id = Uuid::new_v4();
            tx.execute(
                "INSERT INTO notifications (id, user_id, kind, title, body, link, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    id.to_string(),
                    user_id.to_string(),
                    new.kind.as_str(),
                    new.title,
                    new.body,
                    new.link,
                    Utc::now(),
                ],
            )?;
            query_notification(tx, user_id, id)?
                .ok_or_else(|| anyhow::anyhow!("notification {} vanished after insert", id))
        })
    }

    pub fn list_notifications(&self, user_id: Uuid, unread_only: bool, limit: u32) -> Result<Vec<NotificationRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM notifications
                 WHERE user_id = ?1 AND (NOT ?2 OR NOT is_read)
                 ORDER BY created_at DESC
                 LIMIT ?3",
                NOTIFICATION_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    rusqlite::params![user_id.to_string(), unread_only, limit.clamp(1, MAX_PAGE_SIZE)],
                    map_notification,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn unread_count(&self, user_id: Uuid) -> Result<u32> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND NOT is_read",
                [user_id.to_string()],
                |r| r.get(0),
            )?;
            Ok(count)
        })
    }

    /// Scoped to the owner so users cannot touch each other's rows.
    pub fn mark_notification_read(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE notifications SET is_read = 1 WHERE id = ?1 AND user_id = ?2",
                (id.to_string(), user_id.to_string()),
            )?;
            Ok(n > 0)
        })
    }

    pub fn mark_all_notifications_read(&self, user_id: Uuid) -> Result<usize> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE notifications SET is_read = 1 WHERE user_id = ?1 AND NOT is_read",
                [user_id.to_string()],
            )?;
            Ok(n)
        })
    }

    pub fn delete_notification(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "DELETE FROM notifications WHERE id = ?1 AND user_id = ?2",
                (id.to_string(), user_id.to_string()),
            )?;
            Ok(n > 0)
        })
    }

    pub fn record_delivery(&self, id: Uuid, email_sent: bool, push_sent: bool) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE notifications SET email_sent = ?2, push_sent = ?3 WHERE id = ?1",
                (id.to_string(), email_sent, push_sent),
            )?;
            Ok(())
        })
    }

    // -- Preferences --

    /// Stored preferences, or the all-on defaults when none were saved.
    pub fn notification_preferences(&self, user_id: Uuid) -> Result<NotificationPreferences> {
        self.with_conn(|conn| {
            let prefs = conn
                .query_row(
                    "SELECT email_events, push_events, email_prayers, push_prayers,
                            email_activity, push_activity, email_announcements, push_announcements
                     FROM notification_preferences WHERE user_id = ?1",
                    [user_id.to_string()],
                    |row| {
                        Ok(NotificationPreferences {
                            email_events: row.get(0)?,
                            push_events: row.get(1)?,
                            email_prayers: row.get(2)?,
                            push_prayers: row.get(3)?,
                            email_activity: row.get(4)?,
                            push_activity: row.get(5)?,
                            email_announcements: row.get(6)?,
                            push_announcements: row.get(7)?,
                        })
                    },
                )
                .optional()?;
            Ok(prefs.unwrap_or_default())
        })
    }

    pub fn save_notification_preferences(&self, user_id: Uuid, prefs: &NotificationPreferences) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notification_preferences
                    (user_id, email_events, push_events, email_prayers, push_prayers,
                     email_activity, push_activity, email_announcements, push_announcements)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(user_id) DO UPDATE SET
                    email_events = excluded.email_events,
                    push_events = excluded.push_events,
                    email_prayers = excluded.email_prayers,
                    push_prayers = excluded.push_prayers,
                    email_activity = excluded.email_activity,
                    push_activity = excluded.push_activity,
                    email_announcements = excluded.email_announcements,
                    push_announcements = excluded.push_announcements",
                rusqlite::params![
                    user_id.to_string(),
                    prefs.email_events,
                    prefs.push_events,
                    prefs.email_prayers,
                    prefs.push_prayers,
                    prefs.email_activity,
                    prefs.push_activity,
                    prefs.email_announcements,
                    prefs.push_announcements,
                ],
            )?;
            Ok(())
        })
    }

    // -- Device tokens --

    /// Registers a token for the user, taking it over if another account
    /// had it (same device, different login).
    pub fn upsert_device_token(&self, user_id: Uuid, token: &str, platform: Platform) -> Result<DeviceTokenRow> {
        self.with_tx(|tx| {
            tx.execute(
                "INSERT INTO device_tokens (token, user_id, platform, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(token) DO UPDATE SET
                    user_id = excluded.user_id,
                    platform = excluded.platform",
                rusqlite::params![token, user_id.to_string(), platform.as_str(), Utc::now()],
            )?;
            let row = tx.query_row(
                "SELECT token, user_id, platform, created_at FROM device_tokens WHERE token = ?1",
                [token],
                |row| {
                    Ok(DeviceTokenRow {
                        token: row.get(0)?,
                        user_id: uuid_at(row, 1)?,
                        platform: enum_at(row, 2)?,
                        created_at: row.get(3)?,
                    })
                },
            )?;
            Ok(row)
        })
    }

    pub fn delete_device_token(&self, user_id: Uuid, token: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "DELETE FROM device_tokens WHERE token = ?1 AND user_id = ?2",
                (token, user_id.to_string()),
            )?;
            Ok(n > 0)
        })
    }

    pub fn device_tokens(&self, user_id: Uuid) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT token FROM device_tokens WHERE user_id = ?1")?;
            let tokens = stmt
                .query_map([user_id.to_string()], |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(tokens)
        })
    }

    /// Drops tokens the push provider no longer recognises.
    pub fn prune_device_tokens(&self, tokens: &[String]) -> Result<usize> {
        if tokens.is_empty() {
            return Ok(0);
        }
        self.with_conn(|conn| {
            let sql = format!(
                "DELETE FROM device_tokens WHERE token IN ({})",
                placeholders(1, tokens.len())
            );
            let n = conn.execute(&sql, rusqlite::params_from_iter(tokens.iter()))?;
            Ok(n)
        })
    }
}

fn query_notification(conn: &Connection, user_id: Uuid, id: Uuid) -> Result<Option<NotificationRow>> {
    let sql = format!(
        "SELECT {} FROM notifications WHERE id = ?1 AND user_id = ?2",
        NOTIFICATION_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt
        .query_row((id.to_string(), user_id.to_string()), map_notification)
        .optional()?;
    Ok(row)
}
