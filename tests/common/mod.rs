use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use polls::database::{create_pool, run_migrations};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// Pool on `DATABASE_URL` with migrations applied, or `None` when no
/// database is configured.
pub async fn test_pool() -> Result<Option<PgPool>> {
    dotenvy::dotenv().ok();

    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping PostgreSQL test");
        return Ok(None);
    };

    let pool = create_pool(&database_url)
        .await
        .context("failed to connect to DATABASE_URL")?;
    run_migrations(&pool).await.context("failed to run migrations")?;

    Ok(Some(pool))
}

pub async fn insert_user(conn: &mut PgConnection, username: &str) -> Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, username, password_hash) VALUES ($1, $2, 'x')")
        .bind(id)
        .bind(username)
        .execute(conn)
        .await?;

    Ok(id)
}

pub fn unique_name(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4().simple())
}

/// Inserts a question and its choices, returning their ids.
pub async fn insert_question(
    conn: &mut PgConnection,
    published_date: DateTime<Utc>,
    end_date: Option<DateTime<Utc>>,
    choices: &[&str],
) -> Result<(i64, Vec<i64>)> {
    let (question_id,): (i64,) = sqlx::query_as(
        "INSERT INTO questions (question_text, published_date, end_date) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(unique_name("question"))
    .bind(published_date)
    .bind(end_date)
    .fetch_one(&mut *conn)
    .await?;

    let mut choice_ids = Vec::with_capacity(choices.len());
    for text in choices {
        let (choice_id,): (i64,) =
            sqlx::query_as("INSERT INTO choices (question_id, choice_text) VALUES ($1, $2) RETURNING id")
                .bind(question_id)
                .bind(*text)
                .fetch_one(&mut *conn)
                .await?;
        choice_ids.push(choice_id);
    }

    Ok((question_id, choice_ids))
}
