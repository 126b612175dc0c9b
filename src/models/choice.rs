use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Choice {
    pub id: i64,
    pub question_id: i64,
    pub choice_text: String,
}

/// A choice with its vote count, counted from the vote rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ChoiceTally {
    pub id: i64,
    pub question_id: i64,
    pub choice_text: String,
    pub votes: i64,
}

// Add choice request (admin)
#[derive(Debug, Validate, Deserialize)]
pub struct CreateChoiceRequest {
    #[validate(length(min = 1, max = 200))]
    pub choice_text: String,
}
