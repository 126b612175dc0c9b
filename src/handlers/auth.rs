use axum::{
    extract::{Form, Query, State},
    response::{IntoResponse, Json, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::{
    AppState,
    auth::{OptionalAuthUser, SESSION_COOKIE},
    client_ip::ClientIp,
    error::{AppError, LOGIN_URL, Result, login_redirect_url, validation_messages},
    flash::{self, Level},
    handlers::polls::INDEX_URL,
    models::{AuthEvent, LoginForm, SignupForm},
    services::{audit_service, auth_service},
};

pub const SIGNUP_URL: &str = "/signup/";

const BAD_CREDENTIALS: &str =
    "Please enter a correct username and password. Note that both fields may be case-sensitive.";
const MISSING_CREDENTIALS: &str = "Please enter your username and password.";

// Login attempts per username
const LOGIN_ATTEMPT_LIMIT: u32 = 10;
const LOGIN_ATTEMPT_WINDOW_SECONDS: i64 = 900;

#[derive(Debug, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

pub async fn login_page(jar: CookieJar, Query(query): Query<NextQuery>) -> impl IntoResponse {
    let (jar, messages) = flash::take(jar);
    (
        jar,
        Json(json!({
            "form": {
                "action": LOGIN_URL,
                "fields": ["username", "password", "next"]
            },
            "next": auth_service::safe_next(query.next.as_deref()),
            "messages": messages
        })),
    )
}

pub async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let next = auth_service::safe_next(form.next.as_deref()).to_string();
    let retry_url = match form.next.as_deref() {
        Some(_) => login_redirect_url(&next),
        None => LOGIN_URL.to_string(),
    };

    if !form.is_complete() {
        return Ok(flash::redirect(jar, Level::Error, MISSING_CREDENTIALS, &retry_url).into_response());
    }

    let allowed = state
        .redis
        .check_rate_limit(
            "login",
            &form.username,
            LOGIN_ATTEMPT_LIMIT,
            LOGIN_ATTEMPT_WINDOW_SECONDS,
        )
        .await?;
    if !allowed {
        audit_service::record_quietly(
            &state.db,
            audit_service::entry(AuthEvent::LoginFailed, &form.username, None, ip),
        )
        .await;
        return Ok(flash::redirect(
            jar,
            Level::Error,
            "Too many login attempts. Please try again later.",
            &retry_url,
        )
        .into_response());
    }

    let Some(user) = auth_service::authenticate(&state.db, &form.username, &form.password).await?
    else {
        audit_service::record_quietly(
            &state.db,
            audit_service::entry(AuthEvent::LoginFailed, &form.username, None, ip),
        )
        .await;
        return Ok(flash::redirect(jar, Level::Error, BAD_CREDENTIALS, &retry_url).into_response());
    };

    state.redis.reset_rate_limit("login", &form.username).await?;
    let cookie = auth_service::start_session(&state, &user).await?;

    audit_service::record_quietly(
        &state.db,
        audit_service::entry(AuthEvent::Login, &user.username, Some(user.id), ip),
    )
    .await;

    Ok((jar.add(cookie), Redirect::to(&next)).into_response())
}

pub async fn signup_page(jar: CookieJar) -> impl IntoResponse {
    let (jar, messages) = flash::take(jar);
    (
        jar,
        Json(json!({
            "form": {
                "action": SIGNUP_URL,
                "fields": ["username", "password1", "password2"]
            },
            "messages": messages
        })),
    )
}

pub async fn signup(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    jar: CookieJar,
    Form(form): Form<SignupForm>,
) -> Result<Response> {
    if let Err(errors) = form.validate() {
        let jar = validation_messages(&errors)
            .into_iter()
            .fold(jar, |jar, message| flash::push(jar, Level::Error, message));
        return Ok((jar, Redirect::to(SIGNUP_URL)).into_response());
    }

    let user = match auth_service::create_user(&state.db, &form.username, &form.password1).await {
        Ok(user) => user,
        Err(AppError::Conflict(message)) => {
            return Ok(flash::redirect(jar, Level::Error, message, SIGNUP_URL).into_response());
        }
        Err(e) => return Err(e),
    };

    audit_service::record_quietly(
        &state.db,
        audit_service::entry(AuthEvent::Signup, &user.username, Some(user.id), ip),
    )
    .await;

    let cookie = auth_service::start_session(&state, &user).await?;

    audit_service::record_quietly(
        &state.db,
        audit_service::entry(AuthEvent::Login, &user.username, Some(user.id), ip),
    )
    .await;

    let jar = flash::push(
        jar.add(cookie),
        Level::Success,
        format!("Welcome, {}!", user.username),
    );
    Ok((jar, Redirect::to(INDEX_URL)).into_response())
}

pub async fn logout(
    State(state): State<AppState>,
    OptionalAuthUser(auth_user): OptionalAuthUser,
    ClientIp(ip): ClientIp,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect)> {
    if let Some(auth_user) = auth_user {
        auth_service::end_session(&state, &auth_user.jti).await?;

        audit_service::record_quietly(
            &state.db,
            audit_service::entry(
                AuthEvent::Logout,
                &auth_user.username,
                Some(auth_user.user_id),
                ip,
            ),
        )
        .await;
    }

    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    Ok((jar, Redirect::to(INDEX_URL)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        extract::FromRequest,
        http::{Request, header::CONTENT_TYPE},
    };

    fn form_request(body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn login_post_without_fields_still_parses() {
        let Form(form) = Form::<LoginForm>::from_request(form_request("next=%2Fpolls%2F"), &())
            .await
            .unwrap();

        assert!(form.username.is_empty());
        assert!(!form.is_complete());
        assert_eq!(form.next.as_deref(), Some("/polls/"));
    }

    #[tokio::test]
    async fn signup_post_without_fields_fails_validation() {
        let Form(form) = Form::<SignupForm>::from_request(form_request(""), &())
            .await
            .unwrap();

        let errors = form.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("username"));
        assert!(errors.field_errors().contains_key("password1"));
    }
}
