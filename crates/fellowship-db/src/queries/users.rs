use anyhow::Result;
use chrono::Utc;
use rusqlite::{Connection, Row};
use uuid::Uuid;

use fellowship_types::models::{Role, UserStatus};

use super::{OptionalExt, enum_at, uuid_at};
use crate::Database;
use crate::models::{NewUser, UserRow};

const USER_COLUMNS: &str = "id, email, name, password, role, status, profile_image_key, created_at";

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: uuid_at(row, 0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        password: row.get(3)?,
        role: enum_at(row, 4)?,
        status: enum_at(row, 5)?,
        profile_image_key: row.get(6)?,
        created_at: row.get(7)?,
    })
}

impl Database {
    // -- Users --

    /// Inserts a user. The very first account becomes an admin. Returns
    /// `None` when the email is already registered.
    pub fn create_user(&self, new: &NewUser<'_>) -> Result<Option<UserRow>> {
        self.with_tx(|tx| {
            if query_user_by_email(tx, new.email)?.is_some() {
                return Ok(None);
            }

            let existing: i64 = tx.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?;
            let role = if existing == 0 { Role::Admin } else { Role::Member };

            tx.execute(
                "INSERT INTO users (id, email, name, password, role, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    new.id.to_string(),
                    new.email,
                    new.name,
                    new.password_hash,
                    role.as_str(),
                    UserStatus::Active.as_str(),
                    Utc::now(),
                ],
            )?;

            query_user_by_id(tx, new.id)
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_email(conn, email))
    }

    pub fn get_user(&self, id: Uuid) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {} FROM users ORDER BY created_at ASC", USER_COLUMNS))?;
            let rows = stmt
                .query_map([], map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_user_name(&self, id: Uuid, name: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("UPDATE users SET name = ?2 WHERE id = ?1", (id.to_string(), name))?;
            Ok(n > 0)
        })
    }

    pub fn update_password(&self, id: Uuid, password_hash: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE users SET password = ?2 WHERE id = ?1",
                (id.to_string(), password_hash),
            )?;
            Ok(n > 0)
        })
    }

    /// Sets or clears the profile image, returning the key it replaced.
    pub fn set_profile_image(&self, id: Uuid, key: Option<&str>) -> Result<Option<String>> {
        self.with_tx(|tx| {
            let previous: Option<String> = tx
                .query_row(
                    "SELECT profile_image_key FROM users WHERE id = ?1",
                    [id.to_string()],
                    |r| r.get(0),
                )
                .optional()?
                .flatten();
            tx.execute(
                "UPDATE users SET profile_image_key = ?2 WHERE id = ?1",
                (id.to_string(), key),
            )?;
            Ok(previous)
        })
    }

    pub fn update_role_status(
        &self,
        id: Uuid,
        role: Option<Role>,
        status: Option<UserStatus>,
    ) -> Result<Option<UserRow>> {
        self.with_tx(|tx| {
            if let Some(role) = role {
                tx.execute("UPDATE users SET role = ?2 WHERE id = ?1", (id.to_string(), role.as_str()))?;
            }
            if let Some(status) = status {
                tx.execute(
                    "UPDATE users SET status = ?2 WHERE id = ?1",
                    (id.to_string(), status.as_str()),
                )?;
            }
            query_user_by_id(tx, id)
        })
    }

    /// Hard-deletes a user. Foreign keys cascade to rows the user owns;
    /// reactions and comments left by others on the user's prayers and
    /// reflections are removed explicitly since their target is
    /// polymorphic. Cached counters are recomputed afterwards.
    pub fn delete_user(&self, id: Uuid) -> Result<Option<UserRow>> {
        self.with_tx(|tx| {
            let Some(user) = query_user_by_id(tx, id)? else {
                return Ok(None);
            };
            let uid = id.to_string();

            for (target, table) in [("prayer", "prayers"), ("reflection", "reflections")] {
                for child in ["reactions", "comments"] {
                    tx.execute(
                        &format!(
                            "DELETE FROM {child} WHERE target_type = ?2
                               AND target_id IN (SELECT id FROM {table} WHERE user_id = ?1)"
                        ),
                        (&uid, target),
                    )?;
                }
            }

            tx.execute("DELETE FROM users WHERE id = ?1", [&uid])?;

            for (target, table) in [("prayer", "prayers"), ("reflection", "reflections")] {
                tx.execute(
                    &format!(
                        "UPDATE {table} SET
                            reaction_count = (SELECT COUNT(*) FROM reactions r
                                              WHERE r.target_type = ?1 AND r.target_id = {table}.id),
                            comment_count = (SELECT COUNT(*) FROM comments c
                                             WHERE c.target_type = ?1 AND c.target_id = {table}.id)"
                    ),
                    [target],
                )?;
            }

            tx.execute(
                "UPDATE recipes SET
                    rating_count = (SELECT COUNT(*) FROM recipe_ratings rr WHERE rr.recipe_id = recipes.id),
                    rating_average = COALESCE(
                        (SELECT AVG(score) FROM recipe_ratings rr WHERE rr.recipe_id = recipes.id), 0.0)",
                [],
            )?;

            Ok(Some(user))
        })
    }

    /// Ids of active users, optionally leaving one out (usually the actor).
    pub fn active_user_ids(&self, except: Option<Uuid>) -> Result<Vec<Uuid>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id FROM users WHERE status = 'active' AND id != ?1")?;
            let except = except.map(|id| id.to_string()).unwrap_or_default();
            let ids = stmt
                .query_map([except], |row| uuid_at(row, 0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(ids)
        })
    }

    pub fn admin_emails(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT email FROM users WHERE role = 'admin' AND status = 'active'")?;
            let emails = stmt
                .query_map([], |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(emails)
        })
    }
}

fn query_user_by_email(conn: &Connection, email: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS))?;
    let row = stmt.query_row([email], map_user).optional()?;
    Ok(row)
}

fn query_user_by_id(conn: &Connection, id: Uuid) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS))?;
    let row = stmt.query_row([id.to_string()], map_user).optional()?;
    Ok(row)
}
