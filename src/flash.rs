//! One-shot user messages carried across a redirect in a cookie.

use axum::response::Redirect;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};

pub const FLASH_COOKIE: &str = "messages";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub level: Level,
    pub message: String,
}

fn decode(value: &str) -> Vec<FlashMessage> {
    URL_SAFE_NO_PAD
        .decode(value)
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .unwrap_or_default()
}

fn encode(messages: &[FlashMessage]) -> String {
    // Serializing plain strings and unit variants cannot fail
    let json = serde_json::to_vec(messages).unwrap_or_default();
    URL_SAFE_NO_PAD.encode(json)
}

fn pending(jar: &CookieJar) -> Vec<FlashMessage> {
    jar.get(FLASH_COOKIE)
        .map(|cookie| decode(cookie.value()))
        .unwrap_or_default()
}

/// Queues a message for the next page that renders messages.
pub fn push(jar: CookieJar, level: Level, message: impl Into<String>) -> CookieJar {
    let mut messages = pending(&jar);
    messages.push(FlashMessage {
        level,
        message: message.into(),
    });

    jar.add(
        Cookie::build((FLASH_COOKIE, encode(&messages)))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax),
    )
}

/// Drains queued messages and clears the cookie.
pub fn take(jar: CookieJar) -> (CookieJar, Vec<FlashMessage>) {
    let messages = pending(&jar);
    if jar.get(FLASH_COOKIE).is_none() {
        return (jar, messages);
    }

    (jar.remove(Cookie::build(FLASH_COOKIE).path("/")), messages)
}

pub fn redirect(
    jar: CookieJar,
    level: Level,
    message: impl Into<String>,
    to: &str,
) -> (CookieJar, Redirect) {
    (push(jar, level, message), Redirect::to(to))
}
