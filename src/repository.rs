use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    error::Result,
    models::{Choice, ChoiceTally, Question, Vote},
};

/// Storage operations the poll views and the vote upsert need.
///
/// Implemented for a PostgreSQL connection; pass `&mut *tx` to run a
/// sequence of calls inside one transaction.
#[allow(async_fn_in_trait)]
pub trait PollStore {
    /// Questions with `published_date <= now`, oldest first.
    async fn published_questions(&mut self, now: DateTime<Utc>) -> Result<Vec<Question>>;

    async fn find_question(&mut self, question_id: i64) -> Result<Option<Question>>;

    async fn choices(&mut self, question_id: i64) -> Result<Vec<Choice>>;

    async fn choice_tallies(&mut self, question_id: i64) -> Result<Vec<ChoiceTally>>;

    /// The choice only if it belongs to the question.
    async fn find_choice(&mut self, question_id: i64, choice_id: i64) -> Result<Option<Choice>>;

    /// The user's vote on any of the question's choices.
    async fn find_vote(&mut self, user_id: Uuid, question_id: i64) -> Result<Option<Vote>>;

    /// Serializes vote submissions of one user until the surrounding
    /// transaction ends.
    async fn lock_voter(&mut self, user_id: Uuid) -> Result<()>;

    async fn update_vote_choice(&mut self, vote_id: i64, choice_id: i64) -> Result<()>;

    async fn insert_vote(&mut self, user_id: Uuid, choice_id: i64) -> Result<Vote>;
}

impl PollStore for PgConnection {
    async fn published_questions(&mut self, now: DateTime<Utc>) -> Result<Vec<Question>> {
        let questions = sqlx::query_as::<_, Question>(
            r#"
            SELECT id, question_text, published_date, end_date
            FROM questions
            WHERE published_date <= $1
            ORDER BY published_date ASC, id ASC
            "#,
        )
        .bind(now)
        .fetch_all(&mut *self)
        .await?;

        Ok(questions)
    }

    async fn find_question(&mut self, question_id: i64) -> Result<Option<Question>> {
        let question = sqlx::query_as::<_, Question>(
            "SELECT id, question_text, published_date, end_date FROM questions WHERE id = $1",
        )
        .bind(question_id)
        .fetch_optional(&mut *self)
        .await?;

        Ok(question)
    }

    async fn choices(&mut self, question_id: i64) -> Result<Vec<Choice>> {
        let choices = sqlx::query_as::<_, Choice>(
            "SELECT id, question_id, choice_text FROM choices WHERE question_id = $1 ORDER BY id",
        )
        .bind(question_id)
        .fetch_all(&mut *self)
        .await?;

        Ok(choices)
    }

    async fn choice_tallies(&mut self, question_id: i64) -> Result<Vec<ChoiceTally>> {
        let tallies = sqlx::query_as::<_, ChoiceTally>(
            r#"
            SELECT c.id, c.question_id, c.choice_text, COUNT(v.id) AS votes
            FROM choices c
            LEFT JOIN votes v ON v.choice_id = c.id
            WHERE c.question_id = $1
            GROUP BY c.id, c.question_id, c.choice_text
            ORDER BY c.id
            "#,
        )
        .bind(question_id)
        .fetch_all(&mut *self)
        .await?;

        Ok(tallies)
    }

    async fn find_choice(&mut self, question_id: i64, choice_id: i64) -> Result<Option<Choice>> {
        let choice = sqlx::query_as::<_, Choice>(
            "SELECT id, question_id, choice_text FROM choices WHERE id = $1 AND question_id = $2",
        )
        .bind(choice_id)
        .bind(question_id)
        .fetch_optional(&mut *self)
        .await?;

        Ok(choice)
    }

    async fn find_vote(&mut self, user_id: Uuid, question_id: i64) -> Result<Option<Vote>> {
        let vote = sqlx::query_as::<_, Vote>(
            r#"
            SELECT v.id, v.choice_id, v.user_id, v.created_at, v.updated_at
            FROM votes v
            JOIN choices c ON c.id = v.choice_id
            WHERE v.user_id = $1 AND c.question_id = $2
            ORDER BY v.id
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(question_id)
        .fetch_optional(&mut *self)
        .await?;

        Ok(vote)
    }

    async fn lock_voter(&mut self, user_id: Uuid) -> Result<()> {
        sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *self)
            .await?;

        Ok(())
    }

    async fn update_vote_choice(&mut self, vote_id: i64, choice_id: i64) -> Result<()> {
        sqlx::query("UPDATE votes SET choice_id = $1, updated_at = $2 WHERE id = $3")
            .bind(choice_id)
            .bind(Utc::now())
            .bind(vote_id)
            .execute(&mut *self)
            .await?;

        Ok(())
    }

    async fn insert_vote(&mut self, user_id: Uuid, choice_id: i64) -> Result<Vote> {
        let now = Utc::now();
        let vote = sqlx::query_as::<_, Vote>(
            r#"
            INSERT INTO votes (choice_id, user_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, choice_id, user_id, created_at, updated_at
            "#,
        )
        .bind(choice_id)
        .bind(user_id)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *self)
        .await?;

        Ok(vote)
    }
}
