use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_staff: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

fn validate_username(username: &str) -> Result<(), ValidationError> {
    // Letters, digits and @/./+/-/_ only
    let valid = username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'));

    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("username").with_message(
            "Username may contain only letters, numbers, and @/./+/-/_ characters".into(),
        ))
    }
}

fn validate_passwords_match(form: &SignupForm) -> Result<(), ValidationError> {
    if form.password1 == form.password2 {
        Ok(())
    } else {
        Err(ValidationError::new("password_mismatch")
            .with_message("The two password fields didn't match".into()))
    }
}

// Signup form; absent fields arrive empty and fail validation
#[derive(Debug, Validate, Deserialize)]
#[validate(schema(function = "validate_passwords_match"))]
pub struct SignupForm {
    #[serde(default)]
    #[validate(
        length(min = 3, max = 150, message = "Username must be 3-150 characters"),
        custom(function = "validate_username")
    )]
    pub username: String,
    #[serde(default)]
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
}

// Login form
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub next: Option<String>,
}

impl LoginForm {
    pub fn is_complete(&self) -> bool {
        !self.username.trim().is_empty() && !self.password.is_empty()
    }
}
