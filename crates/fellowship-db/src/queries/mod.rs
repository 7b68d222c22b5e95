mod admin;
mod events;
mod kids;
mod notifications;
mod playlists;
mod prayers;
mod recipes;
mod reflections;
mod social;
mod users;

#[cfg(test)]
mod tests;

use std::str::FromStr;

use anyhow::Result;
use rusqlite::Row;
use rusqlite::types::Type;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use fellowship_types::models::TargetType;

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

/// Ids are stored as hyphenated UUID text.
fn uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let text: String = row.get(idx)?;
    text.parse().map_err(|e| conversion_error(idx, e))
}

fn opt_uuid_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(text) => text.parse().map(Some).map_err(|e| conversion_error(idx, e)),
        None => Ok(None),
    }
}

fn enum_at<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text: String = row.get(idx)?;
    text.parse().map_err(|e| conversion_error(idx, e))
}

fn json_at<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text).map_err(|e| conversion_error(idx, e))
}

/// Table backing a reaction/comment target. Only ever interpolated from
/// this fixed mapping.
fn target_table(target: TargetType) -> &'static str {
    match target {
        TargetType::Prayer => "prayers",
        TargetType::Reflection => "reflections",
    }
}

fn placeholders(start: usize, n: usize) -> String {
    (start..start + n).map(|i| format!("?{}", i)).collect::<Vec<_>>().join(", ")
}
