pub mod auth;
pub mod client_ip;
pub mod config;
pub mod database;
pub mod error;
pub mod flash;
pub mod handlers;
pub mod models;
pub mod redis;
pub mod repository;
pub mod services;

use axum::{
    Router,
    http::{
        HeaderValue, Method,
        header::{ACCEPT, CONTENT_TYPE},
    },
    routing::{delete, get, patch, post},
};
use sqlx::PgPool;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{config::Config, redis::RedisClient};

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub redis: Arc<RedisClient>,
    pub config: Arc<Config>,
}

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(
            state
                .config
                .allowed_origins
                .iter()
                .filter_map(|origin| match origin.parse::<HeaderValue>() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        tracing::warn!("Ignoring invalid allowed origin: {}", origin);
                        None
                    }
                })
                .collect::<Vec<_>>(),
        )
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([ACCEPT, CONTENT_TYPE])
        .allow_credentials(true);

    // Polls
    let poll_routes = Router::new()
        .route("/", get(handlers::polls::redirect_index))
        .route("/polls/", get(handlers::polls::index))
        .route("/polls/{question_id}/", get(handlers::polls::detail))
        .route(
            "/polls/{question_id}/results/",
            get(handlers::polls::results),
        )
        .route(
            "/polls/{question_id}/vote/",
            get(handlers::polls::vote_page).post(handlers::polls::vote),
        );

    // Accounts
    let account_routes = Router::new()
        .route(
            "/accounts/login/",
            get(handlers::auth::login_page).post(handlers::auth::login),
        )
        .route(
            "/signup/",
            get(handlers::auth::signup_page).post(handlers::auth::signup),
        )
        .route(
            "/logout/",
            get(handlers::auth::logout).post(handlers::auth::logout),
        );

    // Staff only
    let admin_routes = Router::new()
        .route("/admin/", get(handlers::admin::overview))
        .route("/admin/questions", post(handlers::admin::create_question))
        .route(
            "/admin/questions/{question_id}",
            patch(handlers::admin::update_question).delete(handlers::admin::delete_question),
        )
        .route(
            "/admin/questions/{question_id}/choices",
            post(handlers::admin::add_choice),
        )
        .route(
            "/admin/choices/{choice_id}",
            delete(handlers::admin::delete_choice),
        )
        .route("/admin/votes", get(handlers::admin::list_votes))
        .route("/admin/votes/{vote_id}", delete(handlers::admin::delete_vote));

    Router::new()
        .merge(poll_routes)
        .merge(account_routes)
        .merge(admin_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
