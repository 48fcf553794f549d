//! Row types as they come out of SQLite. Timestamps stay as SQLite text here;
//! the API layer converts them.

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
    pub created_at: String,
}

/// Recipe joined with its author's username.
pub struct RecipeRow {
    pub id: i64,
    pub user_id: i64,
    pub author_username: String,
    pub title: String,
    pub description: String,
    pub ingredients: String,
    pub steps: String,
    pub image: Option<String>,
    pub categories: Option<String>,
    pub difficulty: Option<String>,
    pub is_draft: bool,
    pub views: i64,
    pub created_at: String,
    pub updated_at: String,
}

pub struct CommentRow {
    pub id: i64,
    pub recipe_id: i64,
    pub user_id: i64,
    pub author_username: String,
    pub content: String,
    pub created_at: String,
}

pub struct SessionRow {
    pub user_id: i64,
    pub username: String,
}

/// Author-editable recipe columns. Owner and image are handled separately.
#[derive(Debug, Clone)]
pub struct RecipeFields {
    pub title: String,
    pub description: String,
    pub ingredients: String,
    pub steps: String,
    pub categories: Option<String>,
    pub difficulty: Option<String>,
    pub is_draft: bool,
}
