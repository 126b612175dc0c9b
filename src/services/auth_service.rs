use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    AppState,
    auth::{Claims, SESSION_COOKIE, hash_password, verify_password},
    error::{AppError, Result},
    models::User,
};

pub async fn get_user_by_id(db: &PgPool, user_id: Uuid) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(db)
        .await?;

    Ok(user)
}

pub async fn get_user_by_username(db: &PgPool, username: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE lower(username) = lower($1)")
        .bind(username)
        .fetch_optional(db)
        .await?;

    Ok(user)
}

pub async fn create_user(db: &PgPool, username: &str, password: &str) -> Result<User> {
    if get_user_by_username(db, username).await?.is_some() {
        return Err(AppError::Conflict(
            "A user with that username already exists.".to_string(),
        ));
    }

    let password_hash = hash_password(password)?;

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (id, username, password_hash, is_staff, created_at)
        VALUES ($1, $2, $3, false, $4)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(username)
    .bind(&password_hash)
    .bind(Utc::now())
    .fetch_one(db)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => AppError::Conflict(
            "A user with that username already exists.".to_string(),
        ),
        other => AppError::Database(other),
    })?;

    Ok(user)
}

/// The user if the credentials match, `None` otherwise.
pub async fn authenticate(db: &PgPool, username: &str, password: &str) -> Result<Option<User>> {
    let Some(user) = get_user_by_username(db, username).await? else {
        return Ok(None);
    };

    if !verify_password(password, &user.password_hash)? {
        return Ok(None);
    }

    sqlx::query("UPDATE users SET last_login_at = $1 WHERE id = $2")
        .bind(Utc::now())
        .bind(user.id)
        .execute(db)
        .await?;

    Ok(Some(user))
}

/// Opens a session for `user` and returns the cookie that carries it.
pub async fn start_session(state: &AppState, user: &User) -> Result<Cookie<'static>> {
    let ttl = state.config.session_ttl_seconds;
    let (token, claims) = Claims::new(user.id, user.username.clone(), &state.config.jwt_secret, ttl)?;

    state
        .redis
        .store_session(&claims.jti, &user.id.to_string(), ttl)
        .await?;

    Ok(session_cookie(token, state.config.secure_cookies))
}

pub async fn end_session(state: &AppState, jti: &str) -> Result<()> {
    state.redis.delete_session(jti).await
}

// Browser-session cookie; the token's own expiry bounds its lifetime
pub fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

/// Post-login target: only local absolute paths are honoured.
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path
        }
        _ => "/polls/",
    }
}
