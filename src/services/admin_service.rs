use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::{
    error::{AppError, Result},
    models::{
        Choice, ChoiceTally, CreateQuestionRequest, END_BEFORE_PUBLISH, Question,
        UpdateQuestionRequest, VoteListing,
    },
    repository::PollStore,
};

// Admin listing row: question state plus per-choice counts
#[derive(Debug, Serialize)]
pub struct AdminQuestion {
    pub id: i64,
    pub question_text: String,
    pub published_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_published: bool,
    pub can_vote: bool,
    pub choices: Vec<ChoiceTally>,
}

pub async fn list_questions(
    db: &PgPool,
    search: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Vec<AdminQuestion>> {
    let pattern = search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", escape_like(s)));

    let questions = sqlx::query_as::<_, Question>(
        r#"
        SELECT id, question_text, published_date, end_date
        FROM questions
        WHERE $1::TEXT IS NULL OR question_text ILIKE $1
        ORDER BY published_date DESC, id DESC
        "#,
    )
    .bind(pattern)
    .fetch_all(db)
    .await?;

    let mut conn = db.acquire().await?;
    let mut listed = Vec::with_capacity(questions.len());
    for question in questions {
        let choices = conn.choice_tallies(question.id).await?;
        listed.push(AdminQuestion {
            is_published: question.is_published(now),
            can_vote: question.can_vote(now),
            id: question.id,
            question_text: question.question_text,
            published_date: question.published_date,
            end_date: question.end_date,
            choices,
        });
    }

    Ok(listed)
}

/// Creates a question together with its inline choices.
pub async fn create_question(
    db: &PgPool,
    request: &CreateQuestionRequest,
    now: DateTime<Utc>,
) -> Result<(Question, Vec<Choice>)> {
    let published_date = request.published_date.unwrap_or(now);
    if let Some(end_date) = request.end_date {
        if end_date < published_date {
            return Err(AppError::Validation(format!("end_date: {}", END_BEFORE_PUBLISH)));
        }
    }

    let mut tx = db.begin().await?;

    let question = sqlx::query_as::<_, Question>(
        r#"
        INSERT INTO questions (question_text, published_date, end_date)
        VALUES ($1, $2, $3)
        RETURNING id, question_text, published_date, end_date
        "#,
    )
    .bind(request.question_text.trim())
    .bind(published_date)
    .bind(request.end_date)
    .fetch_one(&mut *tx)
    .await?;

    let mut choices = Vec::with_capacity(request.choices.len());
    for text in &request.choices {
        let choice = insert_choice(&mut tx, question.id, text.trim()).await?;
        choices.push(choice);
    }

    tx.commit().await?;

    tracing::info!(question_id = question.id, "question created");
    Ok((question, choices))
}

pub async fn add_choice(db: &PgPool, question_id: i64, choice_text: &str) -> Result<Choice> {
    let mut conn = db.acquire().await?;
    if conn.find_question(question_id).await?.is_none() {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    insert_choice(&mut conn, question_id, choice_text.trim()).await
}

async fn insert_choice(
    conn: &mut sqlx::PgConnection,
    question_id: i64,
    choice_text: &str,
) -> Result<Choice> {
    let choice = sqlx::query_as::<_, Choice>(
        r#"
        INSERT INTO choices (question_id, choice_text)
        VALUES ($1, $2)
        RETURNING id, question_id, choice_text
        "#,
    )
    .bind(question_id)
    .bind(choice_text)
    .fetch_one(conn)
    .await?;

    Ok(choice)
}

/// Deletes a question; its choices and votes go with it.
pub async fn delete_question(db: &PgPool, question_id: i64) -> Result<()> {
    let result = sqlx::query("DELETE FROM questions WHERE id = $1")
        .bind(question_id)
        .execute(db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    tracing::info!(question_id, "question deleted");
    Ok(())
}

/// Applies a partial edit; the stored row is locked while the voting window
/// is re-checked.
pub async fn update_question(
    db: &PgPool,
    question_id: i64,
    request: &UpdateQuestionRequest,
) -> Result<Question> {
    let mut tx = db.begin().await?;

    let current = sqlx::query_as::<_, Question>(
        r#"
        SELECT id, question_text, published_date, end_date
        FROM questions
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(question_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Question not found".to_string()))?;

    let updated = request
        .apply_to(&current)
        .ok_or_else(|| AppError::Validation(format!("end_date: {}", END_BEFORE_PUBLISH)))?;

    let question = sqlx::query_as::<_, Question>(
        r#"
        UPDATE questions
        SET question_text = $2, published_date = $3, end_date = $4
        WHERE id = $1
        RETURNING id, question_text, published_date, end_date
        "#,
    )
    .bind(question_id)
    .bind(&updated.question_text)
    .bind(updated.published_date)
    .bind(updated.end_date)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(question_id, "question updated");
    Ok(question)
}

/// Deletes a choice together with the votes cast for it.
pub async fn delete_choice(db: &PgPool, choice_id: i64) -> Result<()> {
    let result = sqlx::query("DELETE FROM choices WHERE id = $1")
        .bind(choice_id)
        .execute(db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Choice not found".to_string()));
    }

    tracing::info!(choice_id, "choice deleted");
    Ok(())
}

pub async fn delete_vote(db: &PgPool, vote_id: i64) -> Result<()> {
    let result = sqlx::query("DELETE FROM votes WHERE id = $1")
        .bind(vote_id)
        .execute(db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Vote not found".to_string()));
    }

    tracing::info!(vote_id, "vote deleted");
    Ok(())
}

pub async fn list_votes(db: &PgPool) -> Result<Vec<VoteListing>> {
    let votes = sqlx::query_as::<_, VoteListing>(
        r#"
        SELECT v.id, u.username, c.id AS choice_id, c.choice_text,
               q.id AS question_id, q.question_text, v.updated_at
        FROM votes v
        JOIN users u ON u.id = v.user_id
        JOIN choices c ON c.id = v.choice_id
        JOIN questions q ON q.id = c.question_id
        ORDER BY q.id, u.username
        "#,
    )
    .fetch_all(db)
    .await?;

    Ok(votes)
}

// ILIKE treats % and _ as wildcards
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
