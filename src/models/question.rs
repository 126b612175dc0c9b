use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::{Validate, ValidationError};

use crate::models::ChoiceTally;

/// Window during which a question counts as "published recently".
pub const RECENT_WINDOW_HOURS: i64 = 24;

/// True once `now` has reached the publish time.
pub fn is_published(now: DateTime<Utc>, published_at: DateTime<Utc>) -> bool {
    now >= published_at
}

/// True while `now` lies inside the voting window. Without an end time the
/// window never closes.
pub fn can_vote(
    now: DateTime<Utc>,
    published_at: DateTime<Utc>,
    end_at: Option<DateTime<Utc>>,
) -> bool {
    match end_at {
        Some(end_at) => published_at <= now && now <= end_at,
        None => published_at <= now,
    }
}

pub fn was_published_recently(now: DateTime<Utc>, published_at: DateTime<Utc>) -> bool {
    now - Duration::hours(RECENT_WINDOW_HOURS) <= published_at && published_at <= now
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Question {
    pub id: i64,
    pub question_text: String,
    pub published_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
}

impl Question {
    pub fn is_published(&self, now: DateTime<Utc>) -> bool {
        is_published(now, self.published_date)
    }

    pub fn can_vote(&self, now: DateTime<Utc>) -> bool {
        can_vote(now, self.published_date, self.end_date)
    }

    pub fn was_published_recently(&self, now: DateTime<Utc>) -> bool {
        was_published_recently(now, self.published_date)
    }
}

// Question as listed on the index page
#[derive(Debug, Serialize)]
pub struct QuestionSummary {
    pub id: i64,
    pub question_text: String,
    pub published_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_published: bool,
    pub can_vote: bool,
    pub was_published_recently: bool,
}

impl QuestionSummary {
    pub fn new(question: Question, now: DateTime<Utc>) -> Self {
        Self {
            is_published: question.is_published(now),
            can_vote: question.can_vote(now),
            was_published_recently: question.was_published_recently(now),
            id: question.id,
            question_text: question.question_text,
            published_date: question.published_date,
            end_date: question.end_date,
        }
    }
}

// Question with per-choice vote counts
#[derive(Debug, Serialize)]
pub struct QuestionResults {
    pub question: Question,
    pub choices: Vec<ChoiceTally>,
    pub total_votes: i64,
}

impl QuestionResults {
    pub fn new(question: Question, choices: Vec<ChoiceTally>) -> Self {
        let total_votes = choices.iter().map(|c| c.votes).sum();
        Self {
            question,
            choices,
            total_votes,
        }
    }
}

fn validate_choice_texts(choices: &[String]) -> Result<(), ValidationError> {
    if choices
        .iter()
        .all(|c| !c.trim().is_empty() && c.chars().count() <= 200)
    {
        Ok(())
    } else {
        Err(ValidationError::new("choice_text")
            .with_message("Each choice must be 1-200 characters".into()))
    }
}

// Create question request (admin)
#[derive(Debug, Validate, Deserialize)]
#[validate(schema(function = "validate_question_window"))]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 200))]
    pub question_text: String,
    pub published_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    #[validate(custom(function = "validate_choice_texts"))]
    pub choices: Vec<String>,
}

pub const END_BEFORE_PUBLISH: &str = "End date must not be before the published date";

fn validate_question_window(request: &CreateQuestionRequest) -> Result<(), ValidationError> {
    match (request.published_date, request.end_date) {
        (Some(published), Some(end)) if end < published => {
            Err(ValidationError::new("end_date").with_message(END_BEFORE_PUBLISH.into()))
        }
        _ => Ok(()),
    }
}

fn validate_not_blank(text: &str) -> Result<(), ValidationError> {
    if text.trim().is_empty() {
        Err(ValidationError::new("blank").with_message("This field may not be blank".into()))
    } else {
        Ok(())
    }
}

// Present-but-null stays distinct from absent
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Partial edit of a question (admin). `end_date: null` reopens a closed
/// poll; an omitted field is left alone.
#[derive(Debug, Default, Validate, Deserialize)]
pub struct UpdateQuestionRequest {
    #[validate(length(min = 1, max = 200), custom(function = "validate_not_blank"))]
    pub question_text: Option<String>,
    pub published_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "present")]
    pub end_date: Option<Option<DateTime<Utc>>>,
}

impl UpdateQuestionRequest {
    /// The edited question, or `None` when the result would end before it
    /// is published.
    pub fn apply_to(&self, question: &Question) -> Option<Question> {
        let updated = Question {
            id: question.id,
            question_text: self
                .question_text
                .as_deref()
                .map(str::trim)
                .unwrap_or(&question.question_text)
                .to_string(),
            published_date: self.published_date.unwrap_or(question.published_date),
            end_date: self.end_date.unwrap_or(question.end_date),
        };

        match updated.end_date {
            Some(end) if end < updated.published_date => None,
            _ => Some(updated),
        }
    }
}
