//! Batch aggregation for recipe listings. Each helper issues one statement no
//! matter how many recipes are asked about; the ids travel as a single JSON
//! array parameter expanded with `json_each`, so list length never runs into
//! SQLite's bound-parameter limit.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use panelinha_types::models::RecipeCounts;

use crate::Database;

impl Database {
    /// Like/comment/save totals keyed by recipe id. Ids that do not exist are
    /// simply absent from the map.
    pub fn counts_for_recipes(&self, recipe_ids: &[i64]) -> Result<HashMap<i64, RecipeCounts>> {
        if recipe_ids.is_empty() {
            return Ok(HashMap::new());
        }

        self.with_conn(|conn| {
            let sql = "SELECT r.id,
                        (SELECT COUNT(*) FROM likes l WHERE l.recipe_id = r.id),
                        (SELECT COUNT(*) FROM comments c WHERE c.recipe_id = r.id),
                        (SELECT COUNT(*) FROM saved_recipes s WHERE s.recipe_id = r.id)
                 FROM recipes r
                 WHERE r.id IN (SELECT value FROM json_each(?1))";

            let mut stmt = conn.prepare(sql)?;
            let rows = stmt.query_map([id_array(recipe_ids)], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    RecipeCounts {
                        likes: row.get(1)?,
                        comments: row.get(2)?,
                        saves: row.get(3)?,
                    },
                ))
            })?;

            let mut counts = HashMap::with_capacity(recipe_ids.len());
            for row in rows {
                let (id, c) = row?;
                counts.insert(id, c);
            }
            Ok(counts)
        })
    }

    /// Which of `recipe_ids` the user has liked.
    pub fn liked_by(&self, user_id: i64, recipe_ids: &[i64]) -> Result<HashSet<i64>> {
        self.pair_members("likes", user_id, recipe_ids)
    }

    /// Which of `recipe_ids` the user has saved.
    pub fn saved_by(&self, user_id: i64, recipe_ids: &[i64]) -> Result<HashSet<i64>> {
        self.pair_members("saved_recipes", user_id, recipe_ids)
    }

    /// Total likes over a user's published recipes.
    pub fn likes_received(&self, user_id: i64) -> Result<i64> {
        self.with_conn(|conn| {
            let total = conn.query_row(
                "SELECT COUNT(*) FROM likes l
                 JOIN recipes r ON r.id = l.recipe_id
                 WHERE r.user_id = ?1 AND r.is_draft = 0",
                [user_id],
                |r| r.get(0),
            )?;
            Ok(total)
        })
    }

    fn pair_members(&self, table: &str, user_id: i64, recipe_ids: &[i64]) -> Result<HashSet<i64>> {
        if recipe_ids.is_empty() {
            return Ok(HashSet::new());
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT recipe_id FROM {} WHERE user_id = ?1 AND recipe_id IN (SELECT value FROM json_each(?2))",
                table
            );
            let mut stmt = conn.prepare(&sql)?;
            let ids = stmt
                .query_map(rusqlite::params![user_id, id_array(recipe_ids)], |row| {
                    row.get::<_, i64>(0)
                })?
                .collect::<std::result::Result<HashSet<_>, _>>()?;
            Ok(ids)
        })
    }
}

/// `[1,2,3]`
fn id_array(ids: &[i64]) -> String {
    let joined = ids.iter().map(i64::to_string).collect::<Vec<_>>().join(",");
    format!("[{}]", joined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    #[test]
    fn id_array_is_json() {
        assert_eq!(id_array(&[1, 22, 333]), "[1,22,333]");
        assert_eq!(id_array(&[7]), "[7]");
    }

    #[test]
    fn lists_beyond_the_parameter_limit() {
        let db = test_support::db();
        let ana = test_support::user(&db, "ana");
        let bia = test_support::user(&db, "bia");
        let a = test_support::recipe(&db, ana, "A");
        db.toggle_like(bia, a).unwrap();
        db.toggle_save(bia, a).unwrap();

        // Far more ids than SQLite accepts as separate bound parameters.
        let mut ids: Vec<i64> = (1_000..41_000).collect();
        ids.push(a);

        let counts = db.counts_for_recipes(&ids).unwrap();
        assert_eq!(counts.len(), 1);
        assert_eq!(counts[&a].likes, 1);
        assert_eq!(db.liked_by(bia, &ids).unwrap(), HashSet::from([a]));
        assert_eq!(db.saved_by(bia, &ids).unwrap(), HashSet::from([a]));
    }

    #[test]
    fn counts_cover_every_requested_recipe() {
        let db = test_support::db();
        let ana = test_support::user(&db, "ana");
        let bia = test_support::user(&db, "bia");
        let a = test_support::recipe(&db, ana, "A");
        let b = test_support::recipe(&db, ana, "B");

        db.toggle_like(ana, a).unwrap();
        db.toggle_like(bia, a).unwrap();
        db.toggle_save(bia, a).unwrap();
        db.insert_comment(b, bia, "bom").unwrap();

        let counts = db.counts_for_recipes(&[a, b, 404]).unwrap();
        assert_eq!(counts[&a], RecipeCounts { likes: 2, comments: 0, saves: 1 });
        assert_eq!(counts[&b], RecipeCounts { likes: 0, comments: 1, saves: 0 });
        assert!(!counts.contains_key(&404));
        assert!(db.counts_for_recipes(&[]).unwrap().is_empty());
    }

    #[test]
    fn membership_sets_are_per_user() {
        let db = test_support::db();
        let ana = test_support::user(&db, "ana");
        let bia = test_support::user(&db, "bia");
        let a = test_support::recipe(&db, ana, "A");
        let b = test_support::recipe(&db, ana, "B");

        db.toggle_like(bia, b).unwrap();
        db.toggle_save(bia, a).unwrap();

        assert_eq!(db.liked_by(bia, &[a, b]).unwrap(), HashSet::from([b]));
        assert_eq!(db.saved_by(bia, &[a, b]).unwrap(), HashSet::from([a]));
        assert!(db.liked_by(ana, &[a, b]).unwrap().is_empty());
        assert!(db.liked_by(bia, &[]).unwrap().is_empty());
    }

    #[test]
    fn likes_received_skips_drafts() {
        let db = test_support::db();
        let ana = test_support::user(&db, "ana");
        let bia = test_support::user(&db, "bia");
        let published = test_support::recipe(&db, ana, "A");
        let mut draft = test_support::fields("B");
        draft.is_draft = true;
        let draft_id = db.insert_recipe(ana, &draft, None).unwrap();

        db.toggle_like(bia, published).unwrap();
        db.toggle_like(ana, published).unwrap();
        db.toggle_like(bia, draft_id).unwrap();

        assert_eq!(db.likes_received(ana).unwrap(), 2);
        assert_eq!(db.likes_received(bia).unwrap(), 0);
    }
}
