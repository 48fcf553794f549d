use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::models::{Difficulty, RecipeCounts, SortKey, User};

// -- JWT Claims --

/// Session token claims. `sid` names the server-side session row, so a token
/// stops working as soon as that row is deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    pub sid: Uuid,
    pub exp: usize,
}

// -- Forms --

/// HTML checkboxes submit "y"/"on" when ticked and nothing otherwise.
fn checkbox<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.is_some_and(|v| parse_checkbox(&v)))
}

pub fn parse_checkbox(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "" | "0" | "false" | "off" | "n" | "no"
    )
}

#[derive(Debug, Default, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password2: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, deserialize_with = "checkbox")]
    pub remember: bool,
}

/// Text half of a recipe submission. The optional image travels separately.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct RecipeForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub ingredients: String,
    #[serde(default)]
    pub steps: String,
    #[serde(default)]
    pub categories: String,
    #[serde(default)]
    pub difficulty: String,
    #[serde(default, deserialize_with = "checkbox")]
    pub is_draft: bool,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ProfileForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub bio: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChangePasswordForm {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub confirm_password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub content: String,
}

/// Field name -> messages, in the order the checks ran.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn field(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), FormErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

// -- Query strings --

/// Query parameters are parsed leniently: bad values fall back to defaults.
#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    pub sort: Option<String>,
}

impl FeedQuery {
    pub fn sort_key(&self) -> SortKey {
        match self.sort.as_deref() {
            Some("popular") => SortKey::Popular,
            Some("views") => SortKey::Views,
            _ => SortKey::Recent,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub difficulty: Option<String>,
    pub page: Option<String>,
}

impl SearchQuery {
    pub fn text(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn difficulty(&self) -> Option<&str> {
        self.difficulty.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn page(&self) -> u32 {
        self.page
            .as_deref()
            .and_then(|p| p.trim().parse::<u32>().ok())
            .filter(|p| *p >= 1)
            .unwrap_or(1)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

// -- Responses --

#[derive(Debug, Serialize)]
pub struct Landing {
    pub app: &'static str,
    pub authenticated: bool,
}

/// What a GET on a form route answers: the form name and any prefilled values.
#[derive(Debug, Serialize)]
pub struct FormPage {
    pub form: &'static str,
    pub values: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeCard {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub image: Option<String>,
    pub categories: Vec<String>,
    pub difficulty: Option<Difficulty>,
    pub is_draft: bool,
    pub views: i64,
    pub author_id: i64,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub counts: RecipeCounts,
    pub liked_by_me: bool,
    pub saved_by_me: bool,
}

#[derive(Debug, Serialize)]
pub struct CommentView {
    pub id: i64,
    pub user_id: i64,
    pub author: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub can_delete: bool,
}

#[derive(Debug, Serialize)]
pub struct RecipeDetail {
    #[serde(flatten)]
    pub card: RecipeCard,
    pub ingredients: String,
    pub steps: String,
    pub is_owner: bool,
    pub comments: Vec<CommentView>,
}

#[derive(Debug, Serialize)]
pub struct FeedResponse {
    pub sort: SortKey,
    pub items: Vec<RecipeCard>,
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
    pub pages: u32,
    pub has_prev: bool,
    pub has_next: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, page: u32, per_page: u32, total: i64) -> Self {
        let pages = if total <= 0 {
            0
        } else {
            ((total as u64).div_ceil(per_page as u64)) as u32
        };
        Self {
            items,
            page,
            per_page,
            total,
            pages,
            has_prev: page > 1,
            has_next: page < pages,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileView {
    pub user: User,
    pub is_self: bool,
    pub recipe_count: usize,
    pub total_likes: i64,
    pub recipes: Vec<RecipeCard>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LikeResponse {
    pub liked: bool,
    pub like_count: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SaveResponse {
    pub saved: bool,
    pub saved_count: i64,
}
