use crate::Database;
use crate::models::{RecipeFields, RecipeRow};
use anyhow::Result;
use panelinha_types::models::SortKey;
use rusqlite::{Connection, OptionalExtension, Row};

/// Recipe columns joined with the author name. Every recipe query selects
/// exactly this list so `recipe_from_row` can map it.
const RECIPE_SELECT: &str = "SELECT r.id, r.user_id, u.username, r.title, r.description, r.ingredients,
            r.steps, r.image, r.categories, r.difficulty, r.is_draft, r.views,
            r.created_at, r.updated_at
     FROM recipes r
     JOIN users u ON u.id = r.user_id";

impl Database {
    pub fn insert_recipe(&self, user_id: i64, fields: &RecipeFields, image: Option<&str>) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO recipes (user_id, title, description, ingredients, steps, image, categories, difficulty, is_draft)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    user_id,
                    fields.title,
                    fields.description,
                    fields.ingredients,
                    fields.steps,
                    image,
                    fields.categories,
                    fields.difficulty,
                    fields.is_draft,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Rewrites the editable columns. The owner is part of the filter, so a
    /// non-owner update matches nothing and returns `false`.
    pub fn update_recipe(
        &self,
        id: i64,
        owner_id: i64,
        fields: &RecipeFields,
        image: Option<&str>,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE recipes
                 SET title = ?3, description = ?4, ingredients = ?5, steps = ?6, image = ?7,
                     categories = ?8, difficulty = ?9, is_draft = ?10, updated_at = datetime('now')
                 WHERE id = ?1 AND user_id = ?2",
                rusqlite::params![
                    id,
                    owner_id,
                    fields.title,
                    fields.description,
                    fields.ingredients,
                    fields.steps,
                    image,
                    fields.categories,
                    fields.difficulty,
                    fields.is_draft,
                ],
            )?;
            Ok(n > 0)
        })
    }

    pub fn get_recipe(&self, id: i64) -> Result<Option<RecipeRow>> {
        self.with_conn(|conn| {
            let sql = format!("{} WHERE r.id = ?1", RECIPE_SELECT);
            let row = conn.query_row(&sql, [id], recipe_from_row).optional()?;
            Ok(row)
        })
    }

    /// Deletes an owned recipe and returns the removed row (the caller still
    /// has to drop its image file). Likes, comments and saves go with it via
    /// `ON DELETE CASCADE`.
    pub fn delete_recipe(&self, id: i64, owner_id: i64) -> Result<Option<RecipeRow>> {
        self.with_tx(|conn| {
            let sql = format!("{} WHERE r.id = ?1 AND r.user_id = ?2", RECIPE_SELECT);
            let row = conn
                .query_row(&sql, [id, owner_id], recipe_from_row)
                .optional()?;
            if row.is_some() {
                conn.execute("DELETE FROM recipes WHERE id = ?1", [id])?;
            }
            Ok(row)
        })
    }

    /// Single-statement increment so concurrent views never lose an update.
    pub fn increment_views(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("UPDATE recipes SET views = views + 1 WHERE id = ?1", [id])?;
            Ok(n > 0)
        })
    }

    /// Every published recipe in feed order.
    pub fn list_published(&self, sort: SortKey) -> Result<Vec<RecipeRow>> {
        let order = match sort {
            SortKey::Recent => "r.created_at DESC, r.id DESC",
            SortKey::Popular => {
                "(SELECT COUNT(*) FROM likes l WHERE l.recipe_id = r.id) DESC, r.created_at DESC, r.id DESC"
            }
            SortKey::Views => "r.views DESC, r.created_at DESC, r.id DESC",
        };
        self.with_conn(|conn| {
            let sql = format!("{} WHERE r.is_draft = 0 ORDER BY {}", RECIPE_SELECT, order);
            query_recipes(conn, &sql, rusqlite::params![])
        })
    }

    /// Recipes authored by `user_id`, newest first. Drafts only on request.
    pub fn list_by_user(&self, user_id: i64, include_drafts: bool) -> Result<Vec<RecipeRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE r.user_id = ?1 AND (?2 OR r.is_draft = 0) ORDER BY r.created_at DESC, r.id DESC",
                RECIPE_SELECT
            );
            query_recipes(conn, &sql, rusqlite::params![user_id, include_drafts])
        })
    }

    /// Bookmarks of `user_id`, most recently saved first. A draft saved
    /// earlier stays hidden unless the saver owns it.
    pub fn list_saved(&self, user_id: i64) -> Result<Vec<RecipeRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} JOIN saved_recipes s ON s.recipe_id = r.id
                 WHERE s.user_id = ?1 AND (r.is_draft = 0 OR r.user_id = ?1)
                 ORDER BY s.saved_at DESC, s.id DESC",
                RECIPE_SELECT
            );
            query_recipes(conn, &sql, [user_id])
        })
    }

    /// Published recipes matching an optional case-insensitive substring (over
    /// title, description, ingredients and categories) and an optional exact
    /// difficulty. Returns one page and the total match count.
    pub fn search_published(
        &self,
        text: Option<&str>,
        difficulty: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> Result<(Vec<RecipeRow>, i64)> {
        let pattern = text.map(|t| format!("%{}%", escape_like(&t.to_lowercase())));
        let filter = "r.is_draft = 0
            AND (?1 IS NULL
                 OR ulower(r.title) LIKE ?1 ESCAPE '\\'
                 OR ulower(r.description) LIKE ?1 ESCAPE '\\'
                 OR ulower(r.ingredients) LIKE ?1 ESCAPE '\\'
                 OR ulower(COALESCE(r.categories, '')) LIKE ?1 ESCAPE '\\')
            AND (?2 IS NULL OR r.difficulty = ?2)";

        self.with_conn(|conn| {
            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM recipes r WHERE {}", filter),
                rusqlite::params![pattern, difficulty],
                |r| r.get(0),
            )?;

            let sql = format!(
                "{} WHERE {} ORDER BY r.created_at DESC, r.id DESC LIMIT ?3 OFFSET ?4",
                RECIPE_SELECT, filter
            );
            let rows = query_recipes(
                conn,
                &sql,
                rusqlite::params![pattern, difficulty, limit, offset],
            )?;
            Ok((rows, total))
        })
    }
}

fn recipe_from_row(row: &Row<'_>) -> rusqlite::Result<RecipeRow> {
    Ok(RecipeRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        author_username: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        ingredients: row.get(5)?,
        steps: row.get(6)?,
        image: row.get(7)?,
        categories: row.get(8)?,
        difficulty: row.get(9)?,
        is_draft: row.get(10)?,
        views: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

fn query_recipes<P: rusqlite::Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<RecipeRow>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, recipe_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
