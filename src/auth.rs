use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::CookieJar;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    AppState,
    error::{AppError, Result},
    services::auth_service,
};

pub const SESSION_COOKIE: &str = "sessionid";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub username: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String, // session id in Redis
}

impl Claims {
    pub fn new(
        user_id: Uuid,
        username: String,
        jwt_secret: &str,
        ttl_seconds: u64,
    ) -> Result<(String, Self)> {
        let now = Utc::now();
        let exp = i64::try_from(ttl_seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| AppError::Internal(format!("Session TTL out of range: {}", ttl_seconds)))?;
        let jti = Uuid::new_v4().to_string();

        let claims = Self {
            sub: user_id.to_string(),
            username,
            exp: exp.timestamp(),
            iat: now.timestamp(),
            jti,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(jwt_secret.as_ref()),
        )?;

        Ok((token, claims))
    }

    pub fn verify(token: &str, jwt_secret: &str) -> Result<Self> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(jwt_secret.as_ref()),
            &Validation::default(),
        )?;

        Ok(token_data.claims)
    }
}

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub username: String,
    pub jti: String,
}

fn requested_path(parts: &Parts) -> String {
    parts
        .uri
        .path_and_query()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "/".to_string())
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let login_required = || AppError::LoginRequired(requested_path(parts));

        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar
            .get(SESSION_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .ok_or_else(login_required)?;

        let claims = Claims::verify(&token, &state.config.jwt_secret).map_err(|e| {
            tracing::debug!("Rejected session token: {}", e);
            login_required()
        })?;

        // Session must still be live in Redis (logout revokes it)
        match state.redis.get_session(&claims.jti).await? {
            Some(stored_user_id) if stored_user_id == claims.sub => {}
            _ => return Err(login_required()),
        }

        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| login_required())?;

        Ok(AuthUser {
            user_id,
            username: claims.username,
            jti: claims.jti,
        })
    }
}

// Optional auth user (for endpoints that work with or without auth)
#[derive(Debug)]
pub struct OptionalAuthUser(pub Option<AuthUser>);

impl FromRequestParts<AppState> for OptionalAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        match AuthUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(OptionalAuthUser(Some(user))),
            Err(AppError::LoginRequired(_)) => Ok(OptionalAuthUser(None)),
            Err(e) => Err(e),
        }
    }
}

/// Logged-in user with the staff flag set.
#[derive(Debug)]
pub struct StaffUser(pub AuthUser);

impl FromRequestParts<AppState> for StaffUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let auth_user = AuthUser::from_request_parts(parts, state).await?;

        let user = auth_service::get_user_by_id(&state.db, auth_user.user_id)
            .await?
            .ok_or_else(|| AppError::LoginRequired(requested_path(parts)))?;

        if !user.is_staff {
            return Err(AppError::Authorization("Staff access required".to_string()));
        }

        Ok(StaffUser(auth_user))
    }
}

// Password hashing utilities
pub fn hash_password(password: &str) -> Result<String> {
    let cost = 12;
    bcrypt::hash(password, cost).map_err(AppError::from)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    bcrypt::verify(password, hash).map_err(AppError::from)
}
