use axum::{
    extract::{Form, Path, State},
    response::{IntoResponse, Json, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use serde_json::json;

use crate::{
    AppState,
    auth::AuthUser,
    error::Result,
    flash::{self, Level},
    models::{VoteForm, VoteOutcome},
    services::poll_service::{self, DetailOutcome},
};

pub const INDEX_URL: &str = "/polls/";

const QUESTION_MISSING: &str = "The question doesn't exist";
const VOTING_CLOSED: &str = "Voting is not allowed for this question.";
const NO_CHOICE: &str = "You didn't select a choice.";

pub fn detail_url(question_id: i64) -> String {
    format!("/polls/{}/", question_id)
}

pub fn results_url(question_id: i64) -> String {
    format!("/polls/{}/results/", question_id)
}

pub async fn redirect_index() -> Redirect {
    Redirect::to(INDEX_URL)
}

pub async fn index(State(state): State<AppState>, jar: CookieJar) -> Result<impl IntoResponse> {
    let now = Utc::now();
    let mut conn = state.db.acquire().await?;
    let questions = poll_service::published_questions(&mut *conn, now).await?;

    let (jar, messages) = flash::take(jar);
    let notice = questions.is_empty().then_some("No polls are available.");

    Ok((
        jar,
        Json(json!({
            "latest_question_list": questions,
            "notice": notice,
            "messages": messages
        })),
    ))
}

pub async fn detail(
    State(state): State<AppState>,
    auth_user: AuthUser,
    jar: CookieJar,
    Path(question_id): Path<i64>,
) -> Result<Response> {
    let now = Utc::now();
    let mut conn = state.db.acquire().await?;
    let outcome =
        poll_service::question_detail(&mut *conn, auth_user.user_id, question_id, now).await?;

    let response = match outcome {
        DetailOutcome::Open(detail) => {
            let (jar, messages) = flash::take(jar);
            (
                jar,
                Json(json!({
                    "question": detail.question,
                    "choices": detail.choices,
                    "user_vote": detail.user_vote,
                    "messages": messages
                })),
            )
                .into_response()
        }
        DetailOutcome::NotFound => {
            flash::redirect(jar, Level::Error, QUESTION_MISSING, INDEX_URL).into_response()
        }
        DetailOutcome::VotingClosed => {
            flash::redirect(jar, Level::Error, VOTING_CLOSED, INDEX_URL).into_response()
        }
    };

    Ok(response)
}

pub async fn results(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(question_id): Path<i64>,
) -> Result<Response> {
    let now = Utc::now();
    let mut conn = state.db.acquire().await?;

    let response = match poll_service::question_results(&mut *conn, question_id, now).await? {
        Some(results) => {
            let (jar, messages) = flash::take(jar);
            (
                jar,
                Json(json!({
                    "question": results.question,
                    "choices": results.choices,
                    "total_votes": results.total_votes,
                    "messages": messages
                })),
            )
                .into_response()
        }
        None => flash::redirect(jar, Level::Error, QUESTION_MISSING, INDEX_URL).into_response(),
    };

    Ok(response)
}

pub async fn vote(
    State(state): State<AppState>,
    auth_user: AuthUser,
    jar: CookieJar,
    Path(question_id): Path<i64>,
    Form(form): Form<VoteForm>,
) -> Result<(CookieJar, Redirect)> {
    let now = Utc::now();

    let mut tx = state.db.begin().await?;
    let outcome =
        poll_service::cast_vote(&mut *tx, auth_user.user_id, question_id, form.choice_id(), now)
            .await?;
    tx.commit().await?;

    Ok(vote_redirect(jar, question_id, outcome))
}

/// A vote URL reached without a submitted form.
pub async fn vote_page(jar: CookieJar, Path(question_id): Path<i64>) -> (CookieJar, Redirect) {
    vote_redirect(jar, question_id, VoteOutcome::NoChoiceSelected)
}

fn vote_redirect(jar: CookieJar, question_id: i64, outcome: VoteOutcome) -> (CookieJar, Redirect) {
    match outcome {
        VoteOutcome::Recorded { choice, .. } => flash::redirect(
            jar,
            Level::Info,
            format!("Your vote for {} has been recorded", choice.choice_text),
            &results_url(question_id),
        ),
        VoteOutcome::QuestionNotFound => flash::redirect(jar, Level::Error, QUESTION_MISSING, INDEX_URL),
        VoteOutcome::VotingClosed => flash::redirect(jar, Level::Error, VOTING_CLOSED, INDEX_URL),
        VoteOutcome::NoChoiceSelected => {
            flash::redirect(jar, Level::Error, NO_CHOICE, &detail_url(question_id))
        }
    }
}
