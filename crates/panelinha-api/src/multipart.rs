use std::collections::HashMap;

use axum::extract::Multipart;
use panelinha_types::api::{ProfileForm, RecipeForm, parse_checkbox};
use tracing::warn;

use crate::error::AppError;

pub struct UploadedFile {
    pub filename: String,
    pub data: Vec<u8>,
}

/// A `multipart/form-data` body split into text fields and file parts.
/// File inputs left empty by the browser (no filename or no bytes) are dropped.
#[derive(Default)]
pub struct Submission {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl Submission {
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut submission = Submission::default();

        while let Some(field) = multipart.next_field().await.map_err(bad_body)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            match field.file_name().map(str::to_string) {
                Some(filename) => {
                    let data = field.bytes().await.map_err(bad_body)?;
                    if !filename.is_empty() && !data.is_empty() {
                        submission.files.insert(
                            name,
                            UploadedFile {
                                filename,
                                data: data.to_vec(),
                            },
                        );
                    }
                }
                None => {
                    let value = field.text().await.map_err(bad_body)?;
                    submission.fields.insert(name, value);
                }
            }
        }

        Ok(submission)
    }

    pub fn text(&self, name: &str) -> String {
        self.fields.get(name).cloned().unwrap_or_default()
    }

    pub fn checked(&self, name: &str) -> bool {
        self.fields.get(name).is_some_and(|v| parse_checkbox(v))
    }

    pub fn file(&self, name: &str) -> Option<&UploadedFile> {
        self.files.get(name)
    }

    pub fn file_name(&self, name: &str) -> Option<&str> {
        self.file(name).map(|f| f.filename.as_str())
    }

    pub fn recipe_form(&self) -> RecipeForm {
        RecipeForm {
            title: self.text("title"),
            description: self.text("description"),
            ingredients: self.text("ingredients"),
            steps: self.text("steps"),
            categories: self.text("categories"),
            difficulty: self.text("difficulty"),
            is_draft: self.checked("is_draft"),
        }
    }

    pub fn profile_form(&self) -> ProfileForm {
        ProfileForm {
            username: self.text("username"),
            email: self.text("email"),
            bio: self.text("bio"),
        }
    }
}

/// A body that cannot be read as multipart is reported against the form as a
/// whole, like any other invalid submission.
fn bad_body(e: axum::extract::multipart::MultipartError) -> AppError {
    warn!("Unreadable multipart body: {}", e);
    AppError::field("form", "Could not read the submitted form.")
}
