use std::collections::HashMap;

use anyhow::Result;
use chrono::Utc;
use rusqlite::{Connection, Row};
use uuid::Uuid;

use super::{OptionalExt, json_at, placeholders, uuid_at};
use crate::Database;
use crate::models::{RatingSummary, RecipeFields, RecipeRow};

const RECIPE_SELECT: &str = "
    SELECT r.id, r.user_id, u.name, r.title, r.description, r.ingredients, r.instructions,
           r.servings, r.prep_minutes, r.cook_minutes, r.image_url,
           r.rating_average, r.rating_count, r.created_at
    FROM recipes r
    JOIN users u ON u.id = r.user_id";

fn map_recipe(row: &Row<'_>) -> rusqlite::Result<RecipeRow> {
    Ok(RecipeRow {
        id: uuid_at(row, 0)?,
        user_id: uuid_at(row, 1)?,
        author_name: row.get(2)?,
        fields: RecipeFields {
            title: row.get(3)?,
            description: row.get(4)?,
            ingredients: json_at(row, 5)?,
            instructions: row.get(6)?,
            servings: row.get(7)?,
            prep_minutes: row.get(8)?,
            cook_minutes: row.get(9)?,
            image_url: row.get(10)?,
        },
        rating_average: row.get(11)?,
        rating_count: row.get(12)?,
        created_at: row.get(13)?,
    })
}

impl Database {
    // -- Recipes --

    pub fn insert_recipe(&self, id: Uuid, user_id: Uuid, fields: &RecipeFields) -> Result<RecipeRow> {
        let ingredients = serde_json::to_string(&fields.ingredients)?;
        self.with_tx(|tx| {
            tx.execute(
                "INSERT INTO recipes (id, user_id, title, description, ingredients, instructions,
                                      servings, prep_minutes, cook_minutes, image_url, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
                rusqlite::params![
                    id.to_string(),
                    user_id.to_string(),
                    fields.title,
                    fields.description,
                    ingredients,
                    fields.instructions,
                    fields.servings,
                    fields.prep_minutes,
                    fields.cook_minutes,
                    fields.image_url,
                    Utc::now(),
                ],
            )?;
            query_recipe(tx, id)?.ok_or_else(|| anyhow::anyhow!("recipe {} vanished after insert", id))
        })
    }

    pub fn get_recipe(&self, id: Uuid) -> Result<Option<RecipeRow>> {
        self.with_conn(|conn| query_recipe(conn, id))
    }

    /// Highest rated first, then newest. `search` matches title substrings
    /// case-insensitively.
    pub fn list_recipes(&self, search: Option<&str>) -> Result<Vec<RecipeRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE (?1 IS NULL OR r.title LIKE '%' || ?1 || '%' ESCAPE '\\')
                 ORDER BY r.rating_average DESC, r.created_at DESC",
                RECIPE_SELECT
            );
            let pattern = search
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(escape_like);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([pattern], map_recipe)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_recipe(&self, id: Uuid, fields: &RecipeFields) -> Result<Option<RecipeRow>> {
        let ingredients = serde_json::to_string(&fields.ingredients)?;
        self.with_tx(|tx| {
            let n = tx.execute(
                "UPDATE recipes SET title = ?2, description = ?3, ingredients = ?4, instructions = ?5,
                        servings = ?6, prep_minutes = ?7, cook_minutes = ?8, image_url = ?9, updated_at = ?10
                 WHERE id = ?1",
                rusqlite::params![
                    id.to_string(),
                    fields.title,
                    fields.description,
                    ingredients,
                    fields.instructions,
                    fields.servings,
                    fields.prep_minutes,
                    fields.cook_minutes,
                    fields.image_url,
                    Utc::now(),
                ],
            )?;
            if n == 0 {
                return Ok(None);
            }
            query_recipe(tx, id)
        })
    }

    pub fn delete_recipe(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM recipes WHERE id = ?1", [id.to_string()])?;
            Ok(n > 0)
        })
    }

    // -- Ratings --

    /// Upserts the user's rating and refreshes the cached aggregate.
    /// Returns `None` when the recipe does not exist.
    pub fn rate_recipe(&self, recipe_id: Uuid, user_id: Uuid, score: u8) -> Result<Option<RatingSummary>> {
        self.with_tx(|tx| {
            if query_recipe(tx, recipe_id)?.is_none() {
                return Ok(None);
            }
            let now = Utc::now();
            tx.execute(
                "INSERT INTO recipe_ratings (recipe_id, user_id, score, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT(recipe_id, user_id) DO UPDATE SET
                    score = excluded.score,
                    updated_at = excluded.updated_at",
                rusqlite::params![recipe_id.to_string(), user_id.to_string(), score, now],
            )?;
            refresh_rating(tx, recipe_id).map(Some)
        })
    }

    /// Returns `None` when the user had not rated the recipe.
    pub fn remove_rating(&self, recipe_id: Uuid, user_id: Uuid) -> Result<Option<RatingSummary>> {
        self.with_tx(|tx| {
            let n = tx.execute(
                "DELETE FROM recipe_ratings WHERE recipe_id = ?1 AND user_id = ?2",
                (recipe_id.to_string(), user_id.to_string()),
            )?;
            if n == 0 {
                return Ok(None);
            }
            refresh_rating(tx, recipe_id).map(Some)
        })
    }

    pub fn ratings_by_user(&self, user_id: Uuid, recipe_ids: &[Uuid]) -> Result<HashMap<Uuid, u8>> {
        if recipe_ids.is_empty() {
            return Ok(HashMap::new());
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT recipe_id, score FROM recipe_ratings WHERE user_id = ?1 AND recipe_id IN ({})",
                placeholders(2, recipe_ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;

            let mut params: Vec<String> = Vec::with_capacity(recipe_ids.len() + 1);
            params.push(user_id.to_string());
            params.extend(recipe_ids.iter().map(|id| id.to_string()));

            let map = stmt
                .query_map(rusqlite::params_from_iter(params.iter()), |row| {
                    Ok((uuid_at(row, 0)?, row.get::<_, u8>(1)?))
                })?
                .collect::<std::result::Result<HashMap<_, _>, _>>()?;
            Ok(map)
        })
    }
}

/// Recomputes the cached average and count from the rating rows.
fn refresh_rating(conn: &Connection, recipe_id: Uuid) -> Result<RatingSummary> {
    let (average, count): (f64, u32) = conn.query_row(
        "SELECT COALESCE(AVG(score), 0.0), COUNT(*) FROM recipe_ratings WHERE recipe_id = ?1",
        [recipe_id.to_string()],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    conn.execute(
        "UPDATE recipes SET rating_average = ?2, rating_count = ?3 WHERE id = ?1",
        rusqlite::params![recipe_id.to_string(), average, count],
    )?;
    Ok(RatingSummary { average, count })
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

fn query_recipe(conn: &Connection, id: Uuid) -> Result<Option<RecipeRow>> {
    let sql = format!("{} WHERE r.id = ?1", RECIPE_SELECT);
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt.query_row([id.to_string()], map_recipe).optional()?;
    Ok(row)
}
