use crate::Database;
use crate::models::CommentRow;
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row};

/// Tables holding a (user, recipe) pair with a UNIQUE constraint on the pair.
#[derive(Debug, Clone, Copy)]
enum PairTable {
    Likes,
    SavedRecipes,
}

impl PairTable {
    fn name(self) -> &'static str {
        match self {
            PairTable::Likes => "likes",
            PairTable::SavedRecipes => "saved_recipes",
        }
    }
}

impl Database {
    // -- Likes / saves --

    /// Toggle a like: removes if present, inserts if not.
    /// Returns (liked, like_count) as seen after the toggle.
    pub fn toggle_like(&self, user_id: i64, recipe_id: i64) -> Result<(bool, i64)> {
        self.with_tx(|conn| toggle_pair(conn, PairTable::Likes, user_id, recipe_id))
    }

    /// Toggle a bookmark. Returns (saved, saved_count) as seen after the toggle.
    pub fn toggle_save(&self, user_id: i64, recipe_id: i64) -> Result<(bool, i64)> {
        self.with_tx(|conn| toggle_pair(conn, PairTable::SavedRecipes, user_id, recipe_id))
    }

    // -- Comments --

    pub fn insert_comment(&self, recipe_id: i64, user_id: i64, content: &str) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO comments (recipe_id, user_id, content) VALUES (?1, ?2, ?3)",
                rusqlite::params![recipe_id, user_id, content],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_comment(&self, id: i64) -> Result<Option<CommentRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT c.id, c.recipe_id, c.user_id, u.username, c.content, c.created_at
                     FROM comments c
                     JOIN users u ON u.id = c.user_id
                     WHERE c.id = ?1",
                    [id],
                    comment_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Comments on a recipe in posting order, authors joined in (no N+1).
    pub fn list_comments(&self, recipe_id: i64) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.recipe_id, c.user_id, u.username, c.content, c.created_at
                 FROM comments c
                 JOIN users u ON u.id = c.user_id
                 WHERE c.recipe_id = ?1
                 ORDER BY c.created_at ASC, c.id ASC",
            )?;
            let rows = stmt
                .query_map([recipe_id], comment_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn delete_comment(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM comments WHERE id = ?1", [id])?;
            Ok(n > 0)
        })
    }
}

/// Delete-first toggle: if the DELETE removed nothing the pair was absent and
/// is inserted. Runs inside the caller's transaction, and the UNIQUE
/// constraint rejects any duplicate that slips past.
fn toggle_pair(conn: &Connection, table: PairTable, user_id: i64, recipe_id: i64) -> Result<(bool, i64)> {
    let name = table.name();
    let removed = conn.execute(
        &format!("DELETE FROM {} WHERE user_id = ?1 AND recipe_id = ?2", name),
        [user_id, recipe_id],
    )?;
    if removed == 0 {
        conn.execute(
            &format!("INSERT INTO {} (user_id, recipe_id) VALUES (?1, ?2)", name),
            [user_id, recipe_id],
        )?;
    }

    let count = conn.query_row(
        &format!("SELECT COUNT(*) FROM {} WHERE recipe_id = ?1", name),
        [recipe_id],
        |r| r.get(0),
    )?;
    Ok((removed == 0, count))
}

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: row.get(0)?,
        recipe_id: row.get(1)?,
        user_id: row.get(2)?,
        author_username: row.get(3)?,
        content: row.get(4)?,
        created_at: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::test_support;

    #[test]
    fn double_toggle_restores_like_state() {
        let db = test_support::db();
        let ana = test_support::user(&db, "ana");
        let bia = test_support::user(&db, "bia");
        let id = test_support::recipe(&db, ana, "Bolo");

        assert_eq!(db.toggle_like(ana, id).unwrap(), (true, 1));
        assert_eq!(db.toggle_like(bia, id).unwrap(), (true, 2));
        assert_eq!(db.toggle_like(ana, id).unwrap(), (false, 1));
        assert_eq!(db.toggle_like(ana, id).unwrap(), (true, 2));
    }

    #[test]
    fn saves_toggle_independently_of_likes() {
        let db = test_support::db();
        let ana = test_support::user(&db, "ana");
        let id = test_support::recipe(&db, ana, "Bolo");

        assert_eq!(db.toggle_like(ana, id).unwrap(), (true, 1));
        assert_eq!(db.toggle_save(ana, id).unwrap(), (true, 1));
        assert_eq!(db.toggle_save(ana, id).unwrap(), (false, 0));
        assert_eq!(db.counts_for_recipes(&[id]).unwrap()[&id].likes, 1);
    }

    #[test]
    fn toggle_on_missing_recipe_fails_on_foreign_key() {
        let db = test_support::db();
        let ana = test_support::user(&db, "ana");
        assert!(db.toggle_like(ana, 999).is_err());
    }

    #[test]
    fn comments_round_trip_in_posting_order() {
        let db = test_support::db();
        let ana = test_support::user(&db, "ana");
        let bia = test_support::user(&db, "bia");
        let id = test_support::recipe(&db, ana, "Bolo");

        let first = db.insert_comment(id, bia, "Que delícia").unwrap();
        let second = db.insert_comment(id, ana, "Obrigada!").unwrap();

        let comments = db.list_comments(id).unwrap();
        assert_eq!(comments.iter().map(|c| c.id).collect::<Vec<_>>(), vec![first, second]);
        assert_eq!(comments[0].author_username, "bia");

        let fetched = db.get_comment(first).unwrap().unwrap();
        assert_eq!(fetched.recipe_id, id);
        assert_eq!(fetched.content, "Que delícia");

        assert!(db.delete_comment(first).unwrap());
        assert!(!db.delete_comment(first).unwrap());
        assert_eq!(db.list_comments(id).unwrap().len(), 1);
    }
}
