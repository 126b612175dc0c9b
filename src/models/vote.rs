use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::Choice;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Vote {
    pub id: i64,
    pub choice_id: i64,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Vote form. `choice` is absent when nothing was selected.
#[derive(Debug, Default, Deserialize)]
pub struct VoteForm {
    pub choice: Option<String>,
}

impl VoteForm {
    /// Selected choice id; anything that is not a number counts as no selection.
    pub fn choice_id(&self) -> Option<i64> {
        self.choice.as_deref().and_then(|c| c.trim().parse().ok())
    }
}

/// Result of a vote submission.
#[derive(Debug)]
pub enum VoteOutcome {
    Recorded { choice: Choice, changed: bool },
    QuestionNotFound,
    VotingClosed,
    NoChoiceSelected,
}

// Admin listing row
#[derive(Debug, Serialize, FromRow)]
pub struct VoteListing {
    pub id: i64,
    pub username: String,
    pub choice_id: i64,
    pub choice_text: String,
    pub question_id: i64,
    pub question_text: String,
    pub updated_at: DateTime<Utc>,
}
