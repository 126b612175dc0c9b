use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use validator::Validate;

use crate::{
    AppState,
    auth::StaffUser,
    error::Result,
    models::{CreateChoiceRequest, CreateQuestionRequest, UpdateQuestionRequest},
    services::admin_service,
};

#[derive(Debug, Deserialize)]
pub struct AdminSearchQuery {
    pub q: Option<String>,
}

pub async fn overview(
    State(state): State<AppState>,
    _staff: StaffUser,
    Query(query): Query<AdminSearchQuery>,
) -> Result<Json<Value>> {
    let questions = admin_service::list_questions(&state.db, query.q.as_deref(), Utc::now()).await?;

    Ok(Json(json!({
        "questions": questions,
        "count": questions.len()
    })))
}

pub async fn create_question(
    State(state): State<AppState>,
    StaffUser(staff): StaffUser,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    payload.validate()?;

    let (question, choices) =
        admin_service::create_question(&state.db, &payload, Utc::now()).await?;
    tracing::info!(staff = %staff.username, question_id = question.id, "admin created question");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "question": question,
            "choices": choices
        })),
    ))
}

pub async fn add_choice(
    State(state): State<AppState>,
    _staff: StaffUser,
    Path(question_id): Path<i64>,
    Json(payload): Json<CreateChoiceRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    payload.validate()?;

    let choice = admin_service::add_choice(&state.db, question_id, &payload.choice_text).await?;

    Ok((StatusCode::CREATED, Json(json!({ "choice": choice }))))
}

pub async fn update_question(
    State(state): State<AppState>,
    StaffUser(staff): StaffUser,
    Path(question_id): Path<i64>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> Result<Json<Value>> {
    payload.validate()?;

    let question = admin_service::update_question(&state.db, question_id, &payload).await?;
    tracing::info!(staff = %staff.username, question_id, "admin updated question");

    let now = Utc::now();
    Ok(Json(json!({
        "question": question,
        "is_published": question.is_published(now),
        "can_vote": question.can_vote(now)
    })))
}

pub async fn delete_question(
    State(state): State<AppState>,
    StaffUser(staff): StaffUser,
    Path(question_id): Path<i64>,
) -> Result<Json<Value>> {
    admin_service::delete_question(&state.db, question_id).await?;
    tracing::info!(staff = %staff.username, question_id, "admin deleted question");

    Ok(Json(json!({
        "message": "Question deleted successfully"
    })))
}

pub async fn list_votes(State(state): State<AppState>, _staff: StaffUser) -> Result<Json<Value>> {
    let votes = admin_service::list_votes(&state.db).await?;

    Ok(Json(json!({
        "votes": votes,
        "count": votes.len()
    })))
}

pub async fn delete_choice(
    State(state): State<AppState>,
    StaffUser(staff): StaffUser,
    Path(choice_id): Path<i64>,
) -> Result<Json<Value>> {
    admin_service::delete_choice(&state.db, choice_id).await?;
    tracing::info!(staff = %staff.username, choice_id, "admin deleted choice");

    Ok(Json(json!({
        "message": "Choice deleted successfully"
    })))
}

pub async fn delete_vote(
    State(state): State<AppState>,
    StaffUser(staff): StaffUser,
    Path(vote_id): Path<i64>,
) -> Result<Json<Value>> {
    admin_service::delete_vote(&state.db, vote_id).await?;
    tracing::info!(staff = %staff.username, vote_id, "admin deleted vote");

    Ok(Json(json!({
        "message": "Vote deleted successfully"
    })))
}
