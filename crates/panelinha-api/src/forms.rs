//! Shape checks for every form. Uniqueness and password verification need the
//! database and live in the handlers; they report through the same
//! `FormErrors` so the caller sees one error map.

use panelinha_db::models::RecipeFields;
use panelinha_types::api::{
    ChangePasswordForm, CommentForm, FormErrors, LoginForm, ProfileForm, RecipeForm, RegisterForm,
};
use panelinha_types::models::Difficulty;

pub const ALLOWED_IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "gif"];

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 80;
pub const EMAIL_MAX: usize = 120;
pub const PASSWORD_MIN: usize = 6;
pub const TITLE_MAX: usize = 200;
pub const CATEGORIES_MAX: usize = 200;
pub const BIO_MAX: usize = 500;
pub const COMMENT_MAX: usize = 500;

const REQUIRED: &str = "This field is required.";

fn required(errors: &mut FormErrors, field: &str, value: &str) -> bool {
    if value.trim().is_empty() {
        errors.add(field, REQUIRED);
        false
    } else {
        true
    }
}

fn length(errors: &mut FormErrors, field: &str, value: &str, min: usize, max: Option<usize>) {
    let n = value.chars().count();
    match max {
        Some(max) if n < min || n > max => {
            errors.add(field, format!("Field must be between {} and {} characters long.", min, max))
        }
        None if n < min => errors.add(field, format!("Field must be at least {} characters long.", min)),
        _ => {}
    }
}

fn max_length(errors: &mut FormErrors, field: &str, value: &str, max: usize) {
    if value.chars().count() > max {
        errors.add(field, format!("Field cannot be longer than {} characters.", max));
    }
}

/// Loose address shape: one `@`, something before it, a dotted domain after.
pub fn is_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..")
}

/// Whether an uploaded file name carries an allowed image extension.
pub fn allowed_image(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ALLOWED_IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn image(errors: &mut FormErrors, field: &str, filename: Option<&str>) {
    if let Some(name) = filename {
        if !allowed_image(name) {
            errors.add(field, "Images only! (jpg, jpeg, png, gif)");
        }
    }
}

fn email(errors: &mut FormErrors, value: &str) {
    if required(errors, "email", value) {
        if !is_email(value.trim()) {
            errors.add("email", "Invalid email address.");
        }
        max_length(errors, "email", value.trim(), EMAIL_MAX);
    }
}

fn username(errors: &mut FormErrors, value: &str) {
    if required(errors, "username", value) {
        length(errors, "username", value.trim(), USERNAME_MIN, Some(USERNAME_MAX));
    }
}

pub fn validate_register(form: &RegisterForm) -> Result<(), FormErrors> {
    let mut errors = FormErrors::new();
    username(&mut errors, &form.username);
    email(&mut errors, &form.email);
    if required(&mut errors, "password", &form.password) {
        length(&mut errors, "password", &form.password, PASSWORD_MIN, None);
    }
    if required(&mut errors, "password2", &form.password2) && form.password2 != form.password {
        errors.add("password2", "Passwords must match.");
    }
    errors.into_result()
}

pub fn validate_login(form: &LoginForm) -> Result<(), FormErrors> {
    let mut errors = FormErrors::new();
    if required(&mut errors, "email", &form.email) && !is_email(form.email.trim()) {
        errors.add("email", "Invalid email address.");
    }
    required(&mut errors, "password", &form.password);
    errors.into_result()
}

/// Validate a recipe submission and normalise it into storable fields:
/// text trimmed, empty categories/difficulty become `None`.
pub fn validate_recipe(form: &RecipeForm, image_name: Option<&str>) -> Result<RecipeFields, FormErrors> {
    let mut errors = FormErrors::new();

    if required(&mut errors, "title", &form.title) {
        max_length(&mut errors, "title", form.title.trim(), TITLE_MAX);
    }
    required(&mut errors, "description", &form.description);
    required(&mut errors, "ingredients", &form.ingredients);
    required(&mut errors, "steps", &form.steps);
    max_length(&mut errors, "categories", form.categories.trim(), CATEGORIES_MAX);

    let difficulty = match form.difficulty.trim() {
        "" => None,
        raw => match raw.parse::<Difficulty>() {
            Ok(d) => Some(d),
            Err(_) => {
                errors.add("difficulty", "Not a valid choice.");
                None
            }
        },
    };

    image(&mut errors, "image", image_name);
    errors.into_result()?;

    let categories = form.categories.trim();
    Ok(RecipeFields {
        title: form.title.trim().to_string(),
        description: form.description.trim().to_string(),
        ingredients: form.ingredients.trim().to_string(),
        steps: form.steps.trim().to_string(),
        categories: (!categories.is_empty()).then(|| categories.to_string()),
        difficulty: difficulty.map(|d| d.as_str().to_string()),
        is_draft: form.is_draft,
    })
}

pub fn validate_profile(form: &ProfileForm, picture_name: Option<&str>) -> Result<(), FormErrors> {
    let mut errors = FormErrors::new();
    username(&mut errors, &form.username);
    email(&mut errors, &form.email);
    max_length(&mut errors, "bio", form.bio.trim(), BIO_MAX);
    image(&mut errors, "profile_picture", picture_name);
    errors.into_result()
}

pub fn validate_change_password(form: &ChangePasswordForm) -> Result<(), FormErrors> {
    let mut errors = FormErrors::new();
    required(&mut errors, "current_password", &form.current_password);
    if required(&mut errors, "new_password", &form.new_password) {
        length(&mut errors, "new_password", &form.new_password, PASSWORD_MIN, None);
    }
    if required(&mut errors, "confirm_password", &form.confirm_password)
        && form.confirm_password != form.new_password
    {
        errors.add("confirm_password", "Passwords must match.");
    }
    errors.into_result()
}

/// Returns the trimmed comment text.
pub fn validate_comment(form: &CommentForm) -> Result<String, FormErrors> {
    let mut errors = FormErrors::new();
    let content = form.content.trim();
    if required(&mut errors, "content", content) {
        length(&mut errors, "content", content, 1, Some(COMMENT_MAX));
    }
    errors.into_result()?;
    Ok(content.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(username: &str, email: &str, password: &str, password2: &str) -> RegisterForm {
        RegisterForm {
            username: username.into(),
            email: email.into(),
            password: password.into(),
            password2: password2.into(),
        }
    }

    fn recipe() -> RecipeForm {
        RecipeForm {
            title: " Bolo ".into(),
            description: "Fofinho".into(),
            ingredients: "farinha".into(),
            steps: "asse".into(),
            ..Default::default()
        }
    }

    #[test]
    fn email_shapes() {
        assert!(is_email("ana@x.com"));
        assert!(is_email("a.b+c@mail.example.org"));
        assert!(!is_email("ana"));
        assert!(!is_email("@x.com"));
        assert!(!is_email("ana@x"));
        assert!(!is_email("ana@@x.com"));
        assert!(!is_email("ana @x.com"));
        assert!(!is_email("ana@.com"));
    }

    #[test]
    fn register_rules() {
        assert!(validate_register(&register("ana", "ana@x.com", "secret1", "secret1")).is_ok());

        let errors = validate_register(&register("an", "nope", "123", "456")).unwrap_err();
        assert!(errors.has("username"));
        assert!(errors.has("email"));
        assert!(errors.has("password"));
        assert_eq!(errors.field("password2"), ["Passwords must match."]);

        let errors = validate_register(&RegisterForm::default()).unwrap_err();
        for field in ["username", "email", "password", "password2"] {
            assert_eq!(errors.field(field), [REQUIRED], "{}", field);
        }
    }

    #[test]
    fn login_rules() {
        let ok = LoginForm {
            email: "ana@x.com".into(),
            password: "x".into(),
            remember: false,
        };
        assert!(validate_login(&ok).is_ok());
        assert!(validate_login(&LoginForm::default()).unwrap_err().has("password"));
    }

    #[test]
    fn recipe_is_normalised() {
        let mut form = recipe();
        form.difficulty = "Hard".into();
        form.categories = "  ".into();
        let fields = validate_recipe(&form, Some("foto.JPG")).unwrap();
        assert_eq!(fields.title, "Bolo");
        assert_eq!(fields.difficulty.as_deref(), Some("Hard"));
        assert_eq!(fields.categories, None);
    }

    #[test]
    fn recipe_rejections() {
        let mut form = recipe();
        form.steps = "   ".into();
        form.difficulty = "Impossible".into();
        form.title = "x".repeat(TITLE_MAX + 1);
        let errors = validate_recipe(&form, Some("script.exe")).unwrap_err();
        assert!(errors.has("steps"));
        assert!(errors.has("difficulty"));
        assert!(errors.has("title"));
        assert!(errors.has("image"));
        assert!(!errors.has("description"));
    }

    #[test]
    fn image_extensions() {
        for name in ["a.jpg", "a.jpeg", "a.PNG", "a.b.gif"] {
            assert!(allowed_image(name), "{}", name);
        }
        for name in ["a", "a.webp", "png", "a.png.exe"] {
            assert!(!allowed_image(name), "{}", name);
        }
    }

    #[test]
    fn profile_and_password_rules() {
        let profile = ProfileForm {
            username: "ana".into(),
            email: "ana@x.com".into(),
            bio: "x".repeat(BIO_MAX + 1),
        };
        let errors = validate_profile(&profile, Some("me.bmp")).unwrap_err();
        assert!(errors.has("bio"));
        assert!(errors.has("profile_picture"));

        let change = ChangePasswordForm {
            current_password: "old".into(),
            new_password: "newpass".into(),
            confirm_password: "newpasx".into(),
        };
        assert!(validate_change_password(&change).unwrap_err().has("confirm_password"));
    }

    #[test]
    fn comment_bounds() {
        let ok = CommentForm { content: "  Delícia!  ".into() };
        assert_eq!(validate_comment(&ok).unwrap(), "Delícia!");
        assert!(validate_comment(&CommentForm { content: "   ".into() }).is_err());
        let long = CommentForm { content: "a".repeat(COMMENT_MAX + 1) };
        assert!(validate_comment(&long).is_err());
        let exact = CommentForm { content: "ã".repeat(COMMENT_MAX) };
        assert!(validate_comment(&exact).is_ok());
    }
}
