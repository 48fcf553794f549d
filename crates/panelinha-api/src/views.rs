//! Row -> response conversions. Listing helpers batch every per-recipe lookup
//! (counts, liked/saved flags) into a fixed number of queries.

use chrono::{DateTime, Utc};
use panelinha_db::Database;
use panelinha_db::models::{CommentRow, RecipeRow, UserRow};
use panelinha_types::api::{CommentView, RecipeCard};
use panelinha_types::models::{Difficulty, RecipeCounts, User};
use tracing::warn;

/// A draft is visible only to its owner.
pub fn visible_to(row: &RecipeRow, viewer: Option<i64>) -> bool {
    !row.is_draft || viewer == Some(row.user_id)
}

pub fn timestamp(raw: &str, what: &str) -> DateTime<Utc> {
    panelinha_db::parse_timestamp(raw).unwrap_or_else(|| {
        warn!("Corrupt timestamp '{}' on {}", raw, what);
        DateTime::default()
    })
}

pub fn split_categories(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn user_view(row: &UserRow) -> User {
    User {
        id: row.id,
        username: row.username.clone(),
        bio: row.bio.clone(),
        profile_picture: row.profile_picture.clone(),
        created_at: timestamp(&row.created_at, "user"),
    }
}

pub fn card(row: RecipeRow, counts: RecipeCounts, liked_by_me: bool, saved_by_me: bool) -> RecipeCard {
    let what = format!("recipe {}", row.id);
    RecipeCard {
        id: row.id,
        categories: split_categories(row.categories.as_deref()),
        difficulty: row.difficulty.as_deref().and_then(|d| {
            d.parse::<Difficulty>()
                .map_err(|e| warn!("Corrupt difficulty on {}: {}", what, e))
                .ok()
        }),
        created_at: timestamp(&row.created_at, &what),
        updated_at: timestamp(&row.updated_at, &what),
        title: row.title,
        description: row.description,
        image: row.image,
        is_draft: row.is_draft,
        views: row.views,
        author_id: row.user_id,
        author: row.author_username,
        counts,
        liked_by_me,
        saved_by_me,
    }
}

/// Cards for a listing: one counts query plus, for a signed-in viewer, one
/// liked and one saved query, whatever the list length.
pub fn cards(db: &Database, rows: Vec<RecipeRow>, viewer: Option<i64>) -> anyhow::Result<Vec<RecipeCard>> {
    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
    let counts = db.counts_for_recipes(&ids)?;
    let (liked, saved) = match viewer {
        Some(user_id) => (db.liked_by(user_id, &ids)?, db.saved_by(user_id, &ids)?),
        None => Default::default(),
    };

    Ok(rows
        .into_iter()
        .map(|row| {
            let id = row.id;
            card(
                row,
                counts.get(&id).copied().unwrap_or_default(),
                liked.contains(&id),
                saved.contains(&id),
            )
        })
        .collect())
}

/// The recipe owner may delete any comment on it; authors their own.
pub fn comment_view(row: CommentRow, viewer: Option<i64>, recipe_owner: i64) -> CommentView {
    let can_delete = viewer.is_some_and(|v| v == row.user_id || v == recipe_owner);
    CommentView {
        created_at: timestamp(&row.created_at, &format!("comment {}", row.id)),
        id: row.id,
        user_id: row.user_id,
        author: row.author_username,
        content: row.content,
        can_delete,
    }
}
