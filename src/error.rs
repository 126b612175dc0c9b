use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde_json::json;
use thiserror::Error;

pub const LOGIN_URL: &str = "/accounts/login/";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Login required for {0}")]
    LoginRequired(String),

    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Bcrypt error: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),
}

/// Login page URL that sends the user back to `next` afterwards.
pub fn login_redirect_url(next: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(next.as_bytes()).collect();
    format!("{}?next={}", LOGIN_URL, encoded)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::LoginRequired(ref next) => {
                return Redirect::to(&login_redirect_url(next)).into_response();
            }
            AppError::Database(ref e) => {
                tracing::error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
            AppError::Redis(ref e) => {
                tracing::error!("Redis error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
            AppError::Validation(ref message) => (StatusCode::BAD_REQUEST, message.as_str()),
            AppError::Authorization(ref message) => (StatusCode::FORBIDDEN, message.as_str()),
            AppError::NotFound(ref message) => (StatusCode::NOT_FOUND, message.as_str()),
            AppError::Conflict(ref message) => (StatusCode::CONFLICT, message.as_str()),
            AppError::Internal(ref message) => {
                tracing::error!("Internal error: {}", message);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
            AppError::Jwt(ref e) => {
                tracing::debug!("JWT error: {:?}", e);
                (StatusCode::UNAUTHORIZED, "Invalid token")
            }
            AppError::Bcrypt(ref e) => {
                tracing::error!("Bcrypt error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

// Validation helper
impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(validation_messages(&errors).join(", "))
    }
}

// Key validator uses for struct-level (schema) errors
const FORM_ERRORS_KEY: &str = "__all__";

/// Flattens field errors into `field: message` strings, sorted by field.
/// Form-wide errors come first and carry no field prefix.
pub fn validation_messages(errors: &validator::ValidationErrors) -> Vec<String> {
    let mut field_errors: Vec<_> = errors.field_errors().into_iter().collect();
    field_errors.sort_by(|a, b| {
        (a.0 != FORM_ERRORS_KEY, &a.0).cmp(&(b.0 != FORM_ERRORS_KEY, &b.0))
    });

    field_errors
        .into_iter()
        .flat_map(|(field, errors)| {
            errors.iter().map(move |error| {
                let message = error
                    .message
                    .as_deref()
                    .unwrap_or("Invalid value")
                    .to_string();
                if field == FORM_ERRORS_KEY {
                    message
                } else {
                    format!("{}: {}", field, message)
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SignupForm;
    use axum::http::header::LOCATION;
    use validator::Validate;

    #[test]
    fn login_required_redirects_with_next() {
        let response = AppError::LoginRequired("/polls/3/".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(LOCATION).unwrap(),
            "/accounts/login/?next=%2Fpolls%2F3%2F"
        );
    }

    #[test]
    fn status_codes_follow_variant() {
        let cases = [
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (AppError::Authorization("x".into()), StatusCode::FORBIDDEN),
            (AppError::Conflict("x".into()), StatusCode::CONFLICT),
            (AppError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[test]
    fn form_wide_errors_have_no_field_prefix() {
        let form = SignupForm {
            username: "alice".to_string(),
            password1: "correct horse".to_string(),
            password2: "battery staple".to_string(),
        };
        let errors = form.validate().unwrap_err();

        assert_eq!(
            validation_messages(&errors),
            vec!["The two password fields didn't match".to_string()]
        );
    }

    #[test]
    fn field_errors_keep_their_prefix() {
        let form = SignupForm {
            username: "alice".to_string(),
            password1: "short".to_string(),
            password2: "short".to_string(),
        };
        let messages = validation_messages(&form.validate().unwrap_err());

        assert_eq!(
            messages,
            vec!["password1: Password must be at least 8 characters".to_string()]
        );
    }
}
