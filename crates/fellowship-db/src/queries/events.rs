use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row};
use uuid::Uuid;

use super::{OptionalExt, uuid_at};
use crate::Database;
use crate::models::{EventFields, EventRow, RsvpOutcome, RsvpRow};

// Aggregates are computed per row; RSVP counts stay small per event.
const EVENT_SELECT: &str = "
    SELECT e.id, e.title, e.description, e.location, e.starts_at, e.ends_at, e.capacity,
           e.is_potluck, e.is_published, e.created_by, e.created_at,
           (SELECT COUNT(*) FROM rsvps r WHERE r.event_id = e.id),
           (SELECT COALESCE(SUM(r.adults + r.kids), 0) FROM rsvps r WHERE r.event_id = e.id)
    FROM events e";

fn map_event(row: &Row<'_>) -> rusqlite::Result<EventRow> {
    Ok(EventRow {
        id: uuid_at(row, 0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        location: row.get(3)?,
        starts_at: row.get(4)?,
        ends_at: row.get(5)?,
        capacity: row.get(6)?,
        is_potluck: row.get(7)?,
        is_published: row.get(8)?,
        created_by: uuid_at(row, 9)?,
        created_at: row.get(10)?,
        rsvp_count: row.get(11)?,
        attendee_count: row.get(12)?,
    })
}

const RSVP_SELECT: &str = "
    SELECT r.event_id, r.user_id, u.name, r.adults, r.kids, r.dish, r.updated_at
    FROM rsvps r
    JOIN users u ON u.id = r.user_id";

fn map_rsvp(row: &Row<'_>) -> rusqlite::Result<RsvpRow> {
    Ok(RsvpRow {
        event_id: uuid_at(row, 0)?,
        user_id: uuid_at(row, 1)?,
        user_name: row.get(2)?,
        adults: row.get(3)?,
        kids: row.get(4)?,
        dish: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

impl Database {
    // -- Events --

    pub fn insert_event(&self, id: Uuid, created_by: Uuid, fields: &EventFields) -> Result<EventRow> {
        self.with_tx(|tx| {
            let now = Utc::now();
            tx.execute(
                "INSERT INTO events (id, title, description, location, starts_at, ends_at, capacity,
                                     is_potluck, is_published, created_by, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
                rusqlite::params![
                    id.to_string(),
                    fields.title,
                    fields.description,
                    fields.location,
                    fields.starts_at,
                    fields.ends_at,
                    fields.capacity,
                    fields.is_potluck,
                    fields.is_published,
                    created_by.to_string(),
                    now,
                ],
            )?;
            query_event(tx, id)?.ok_or_else(|| anyhow::anyhow!("event {} vanished after insert", id))
        })
    }

    pub fn get_event(&self, id: Uuid) -> Result<Option<EventRow>> {
        self.with_conn(|conn| query_event(conn, id))
    }

    /// Events ordered by start time. `from` drops events that started
    /// before it; drafts are only included when asked for.
    pub fn list_events(&self, from: Option<DateTime<Utc>>, include_drafts: bool) -> Result<Vec<EventRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE (?1 IS NULL OR e.starts_at >= ?1) AND (?2 OR e.is_published)
                 ORDER BY e.starts_at ASC",
                EVENT_SELECT
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![from, include_drafts], map_event)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_event(&self, id: Uuid, fields: &EventFields) -> Result<Option<EventRow>> {
        self.with_tx(|tx| {
            let n = tx.execute(
                "UPDATE events SET title = ?2, description = ?3, location = ?4, starts_at = ?5,
                        ends_at = ?6, capacity = ?7, is_potluck = ?8, is_published = ?9, updated_at = ?10
                 WHERE id = ?1",
                rusqlite::params![
                    id.to_string(),
                    fields.title,
                    fields.description,
                    fields.location,
                    fields.starts_at,
                    fields.ends_at,
                    fields.capacity,
                    fields.is_potluck,
                    fields.is_published,
                    Utc::now(),
                ],
            )?;
            if n == 0 {
                return Ok(None);
            }
            query_event(tx, id)
        })
    }

    pub fn delete_event(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM events WHERE id = ?1", [id.to_string()])?;
            Ok(n > 0)
        })
    }

    // -- RSVPs --

    pub fn list_rsvps(&self, event_id: Uuid) -> Result<Vec<RsvpRow>> {
        self.with_conn(|conn| {
            let sql = format!("{} WHERE r.event_id = ?1 ORDER BY r.created_at ASC", RSVP_SELECT);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([event_id.to_string()], map_rsvp)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_rsvp(&self, event_id: Uuid, user_id: Uuid) -> Result<Option<RsvpRow>> {
        self.with_conn(|conn| query_rsvp(conn, event_id, user_id))
    }

    /// The given user's RSVPs for a batch of events.
    pub fn rsvps_for_user(&self, user_id: Uuid, event_ids: &[Uuid]) -> Result<Vec<RsvpRow>> {
        if event_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE r.user_id = ?1 AND r.event_id IN ({})",
                RSVP_SELECT,
                super::placeholders(2, event_ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;

            let mut params: Vec<String> = Vec::with_capacity(event_ids.len() + 1);
            params.push(user_id.to_string());
            params.extend(event_ids.iter().map(|id| id.to_string()));

            let rows = stmt
                .query_map(rusqlite::params_from_iter(params.iter()), map_rsvp)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Creates or replaces a user's RSVP. The capacity check and the write
    /// share a transaction so two concurrent RSVPs cannot both take the last
    /// seats.
    pub fn upsert_rsvp(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        adults: u32,
        kids: u32,
        dish: Option<&str>,
    ) -> Result<RsvpOutcome> {
        self.with_tx(|tx| {
            let capacity: Option<Option<u32>> = tx
                .query_row(
                    "SELECT capacity FROM events WHERE id = ?1",
                    [event_id.to_string()],
                    |r| r.get(0),
                )
                .optional()?;
            let Some(capacity) = capacity else {
                return Ok(RsvpOutcome::EventMissing);
            };

            if let Some(capacity) = capacity {
                let others: u32 = tx.query_row(
                    "SELECT COALESCE(SUM(adults + kids), 0) FROM rsvps
                     WHERE event_id = ?1 AND user_id != ?2",
                    (event_id.to_string(), user_id.to_string()),
                    |r| r.get(0),
                )?;
                let remaining = capacity.saturating_sub(others);
                if adults + kids > remaining {
                    return Ok(RsvpOutcome::OverCapacity { remaining });
                }
            }

            let now = Utc::now();
            tx.execute(
                "INSERT INTO rsvps (event_id, user_id, adults, kids, dish, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                 ON CONFLICT(event_id, user_id) DO UPDATE SET
                    adults = excluded.adults,
                    kids = excluded.kids,
                    dish = excluded.dish,
                    updated_at = excluded.updated_at",
                rusqlite::params![event_id.to_string(), user_id.to_string(), adults, kids, dish, now],
            )?;

            let row = query_rsvp(tx, event_id, user_id)?
                .ok_or_else(|| anyhow::anyhow!("rsvp vanished after upsert"))?;
            Ok(RsvpOutcome::Saved(row))
        })
    }

    pub fn delete_rsvp(&self, event_id: Uuid, user_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "DELETE FROM rsvps WHERE event_id = ?1 AND user_id = ?2",
                (event_id.to_string(), user_id.to_string()),
            )?;
            Ok(n > 0)
        })
    }
}

fn query_event(conn: &Connection, id: Uuid) -> Result<Option<EventRow>> {
    let sql = format!("{} WHERE e.id = ?1", EVENT_SELECT);
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt.query_row([id.to_string()], map_event).optional()?;
    Ok(row)
}

fn query_rsvp(conn: &Connection, event_id: Uuid, user_id: Uuid) -> Result<Option<RsvpRow>> {
    let sql = format!("{} WHERE r.event_id = ?1 AND r.user_id = ?2", RSVP_SELECT);
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt
        .query_row((event_id.to_string(), user_id.to_string()), map_rsvp)
        .optional()?;
    Ok(row)
}
