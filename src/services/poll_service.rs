use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::Result,
    models::{Choice, Question, QuestionResults, QuestionSummary, VoteOutcome},
    repository::PollStore,
};

#[derive(Debug, Serialize)]
pub struct QuestionDetail {
    pub question: Question,
    pub choices: Vec<Choice>,
    pub user_vote: Option<Choice>,
}

#[derive(Debug)]
pub enum DetailOutcome {
    Open(QuestionDetail),
    NotFound,
    VotingClosed,
}

pub async fn published_questions<S: PollStore>(
    store: &mut S,
    now: DateTime<Utc>,
) -> Result<Vec<QuestionSummary>> {
    let questions = store.published_questions(now).await?;

    Ok(questions
        .into_iter()
        .filter(|q| q.is_published(now))
        .map(|q| QuestionSummary::new(q, now))
        .collect())
}

/// Detail page data; only questions currently open for voting are shown.
pub async fn question_detail<S: PollStore>(
    store: &mut S,
    user_id: Uuid,
    question_id: i64,
    now: DateTime<Utc>,
) -> Result<DetailOutcome> {
    let Some(question) = store.find_question(question_id).await? else {
        return Ok(DetailOutcome::NotFound);
    };

    if !question.can_vote(now) {
        return Ok(DetailOutcome::VotingClosed);
    }

    let choices = store.choices(question_id).await?;
    let user_vote = store
        .find_vote(user_id, question_id)
        .await?
        .and_then(|vote| choices.iter().find(|c| c.id == vote.choice_id).cloned());

    Ok(DetailOutcome::Open(QuestionDetail {
        question,
        choices,
        user_vote,
    }))
}

/// Results of a published question; `None` when missing or not yet published.
pub async fn question_results<S: PollStore>(
    store: &mut S,
    question_id: i64,
    now: DateTime<Utc>,
) -> Result<Option<QuestionResults>> {
    let question = match store.find_question(question_id).await? {
        Some(question) if question.is_published(now) => question,
        _ => return Ok(None),
    };

    let tallies = store.choice_tallies(question_id).await?;
    Ok(Some(QuestionResults::new(question, tallies)))
}

/// Records `user_id`'s vote on a question, replacing any earlier vote so the
/// user keeps at most one vote per question.
pub async fn cast_vote<S: PollStore>(
    store: &mut S,
    user_id: Uuid,
    question_id: i64,
    choice_id: Option<i64>,
    now: DateTime<Utc>,
) -> Result<VoteOutcome> {
    let Some(question) = store.find_question(question_id).await? else {
        return Ok(VoteOutcome::QuestionNotFound);
    };

    if !question.can_vote(now) {
        return Ok(VoteOutcome::VotingClosed);
    }

    let choice = match choice_id {
        Some(choice_id) => store.find_choice(question_id, choice_id).await?,
        None => None,
    };
    let Some(choice) = choice else {
        return Ok(VoteOutcome::NoChoiceSelected);
    };

    store.lock_voter(user_id).await?;

    let changed = match store.find_vote(user_id, question_id).await? {
        Some(vote) => {
            if vote.choice_id != choice.id {
                store.update_vote_choice(vote.id, choice.id).await?;
            }
            vote.choice_id != choice.id
        }
        None => {
            store.insert_vote(user_id, choice.id).await?;
            true
        }
    };

    tracing::debug!(
        user_id = %user_id,
        question_id,
        choice_id = choice.id,
        changed,
        "vote recorded"
    );

    Ok(VoteOutcome::Recorded { choice, changed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChoiceTally, Vote};
    use chrono::Duration;

    /// In-memory store mirroring the PostgreSQL queries.
    #[derive(Debug, Default)]
    struct MemoryStore {
        pub questions: Vec<Question>,
        pub choices: Vec<Choice>,
        pub votes: Vec<Vote>,
        pub locked: Vec<Uuid>,
    }

    impl MemoryStore {
        pub fn add_question(&mut self, text: &str, published_date: DateTime<Utc>, end_date: Option<DateTime<Utc>>) -> i64 {
            let id = self.questions.len() as i64 + 1;
            self.questions.push(Question {
                id,
                question_text: text.to_string(),
                published_date,
                end_date,
            });
            id
        }

        pub fn add_choice(&mut self, question_id: i64, text: &str) -> i64 {
            let id = self.choices.len() as i64 + 1;
            self.choices.push(Choice {
                id,
                question_id,
                choice_text: text.to_string(),
            });
            id
        }

        fn question_of(&self, choice_id: i64) -> Option<i64> {
            self.choices
                .iter()
                .find(|c| c.id == choice_id)
                .map(|c| c.question_id)
        }
    }

    impl PollStore for MemoryStore {
        async fn published_questions(&mut self, now: DateTime<Utc>) -> Result<Vec<Question>> {
            let mut questions: Vec<_> = self
                .questions
                .iter()
                .filter(|q| q.published_date <= now)
                .cloned()
                .collect();
            questions.sort_by_key(|q| (q.published_date, q.id));
            Ok(questions)
        }

        async fn find_question(&mut self, question_id: i64) -> Result<Option<Question>> {
            Ok(self.questions.iter().find(|q| q.id == question_id).cloned())
        }

        async fn choices(&mut self, question_id: i64) -> Result<Vec<Choice>> {
            Ok(self
                .choices
                .iter()
                .filter(|c| c.question_id == question_id)
                .cloned()
                .collect())
        }

        async fn choice_tallies(&mut self, question_id: i64) -> Result<Vec<ChoiceTally>> {
            Ok(self
                .choices
                .iter()
                .filter(|c| c.question_id == question_id)
                .map(|c| ChoiceTally {
                    id: c.id,
                    question_id: c.question_id,
                    choice_text: c.choice_text.clone(),
                    votes: self.votes.iter().filter(|v| v.choice_id == c.id).count() as i64,
                })
                .collect())
        }

        async fn find_choice(&mut self, question_id: i64, choice_id: i64) -> Result<Option<Choice>> {
            Ok(self
                .choices
                .iter()
                .find(|c| c.id == choice_id && c.question_id == question_id)
                .cloned())
        }

        async fn find_vote(&mut self, user_id: Uuid, question_id: i64) -> Result<Option<Vote>> {
            Ok(self
                .votes
                .iter()
                .find(|v| v.user_id == user_id && self.question_of(v.choice_id) == Some(question_id))
                .cloned())
        }

        async fn lock_voter(&mut self, user_id: Uuid) -> Result<()> {
            self.locked.push(user_id);
            Ok(())
        }

        async fn update_vote_choice(&mut self, vote_id: i64, choice_id: i64) -> Result<()> {
            if let Some(vote) = self.votes.iter_mut().find(|v| v.id == vote_id) {
                vote.choice_id = choice_id;
                vote.updated_at = Utc::now();
            }
            Ok(())
        }

        async fn insert_vote(&mut self, user_id: Uuid, choice_id: i64) -> Result<Vote> {
            let now = Utc::now();
            let vote = Vote {
                id: self.votes.len() as i64 + 1,
                choice_id,
                user_id,
                created_at: now,
                updated_at: now,
            };
            self.votes.push(vote.clone());
            Ok(vote)
        }
    }

    fn open_poll(store: &mut MemoryStore, now: DateTime<Utc>) -> (i64, i64, i64) {
        let question_id = store.add_question("Favourite colour?", now - Duration::days(1), None);
        let red = store.add_choice(question_id, "Red");
        let blue = store.add_choice(question_id, "Blue");
        (question_id, red, blue)
    }

    #[tokio::test]
    async fn second_vote_replaces_first() {
        let now = Utc::now();
        let mut store = MemoryStore::default();
        let (question_id, red, blue) = open_poll(&mut store, now);
        let user = Uuid::new_v4();

        let first = cast_vote(&mut store, user, question_id, Some(red), now).await.unwrap();
        assert!(matches!(first, VoteOutcome::Recorded { changed: true, .. }));

        let second = cast_vote(&mut store, user, question_id, Some(blue), now).await.unwrap();
        match second {
            VoteOutcome::Recorded { choice, changed } => {
                assert_eq!(choice.id, blue);
                assert!(changed);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        assert_eq!(store.votes.len(), 1);
        assert_eq!(store.votes[0].choice_id, blue);
        assert_eq!(store.locked, vec![user, user]);
    }

    #[tokio::test]
    async fn repeating_same_choice_is_unchanged() {
        let now = Utc::now();
        let mut store = MemoryStore::default();
        let (question_id, red, _) = open_poll(&mut store, now);
        let user = Uuid::new_v4();

        cast_vote(&mut store, user, question_id, Some(red), now).await.unwrap();
        let again = cast_vote(&mut store, user, question_id, Some(red), now).await.unwrap();

        assert!(matches!(again, VoteOutcome::Recorded { changed: false, .. }));
        assert_eq!(store.votes.len(), 1);
    }

    #[tokio::test]
    async fn votes_are_kept_per_user_and_per_question() {
        let now = Utc::now();
        let mut store = MemoryStore::default();
        let (first_q, red, _) = open_poll(&mut store, now);
        let (second_q, _, other_blue) = open_poll(&mut store, now);
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        cast_vote(&mut store, alice, first_q, Some(red), now).await.unwrap();
        cast_vote(&mut store, alice, second_q, Some(other_blue), now).await.unwrap();
        cast_vote(&mut store, bob, first_q, Some(red), now).await.unwrap();

        assert_eq!(store.votes.len(), 3);
        let tallies = store.choice_tallies(first_q).await.unwrap();
        assert_eq!(tallies[0].votes, 2);
    }

    #[tokio::test]
    async fn choice_from_another_question_is_rejected() {
        let now = Utc::now();
        let mut store = MemoryStore::default();
        let (first_q, _, _) = open_poll(&mut store, now);
        let (_, foreign, _) = open_poll(&mut store, now);

        let outcome = cast_vote(&mut store, Uuid::new_v4(), first_q, Some(foreign), now)
            .await
            .unwrap();

        assert!(matches!(outcome, VoteOutcome::NoChoiceSelected));
        assert!(store.votes.is_empty());
    }

    #[tokio::test]
    async fn missing_choice_is_rejected() {
        let now = Utc::now();
        let mut store = MemoryStore::default();
        let (question_id, _, _) = open_poll(&mut store, now);

        let outcome = cast_vote(&mut store, Uuid::new_v4(), question_id, None, now)
            .await
            .unwrap();

        assert!(matches!(outcome, VoteOutcome::NoChoiceSelected));
    }

    #[tokio::test]
    async fn voting_outside_window_is_rejected() {
        let now = Utc::now();
        let mut store = MemoryStore::default();
        let future = store.add_question("Later", now + Duration::days(1), None);
        let future_choice = store.add_choice(future, "Yes");
        let closed = store.add_question(
            "Closed",
            now - Duration::days(2),
            Some(now - Duration::days(1)),
        );
        let closed_choice = store.add_choice(closed, "Yes");
        let user = Uuid::new_v4();

        let outcome = cast_vote(&mut store, user, future, Some(future_choice), now).await.unwrap();
        assert!(matches!(outcome, VoteOutcome::VotingClosed));
        let outcome = cast_vote(&mut store, user, closed, Some(closed_choice), now).await.unwrap();
        assert!(matches!(outcome, VoteOutcome::VotingClosed));
        assert!(store.votes.is_empty());
    }

    #[tokio::test]
    async fn unknown_question_is_reported() {
        let mut store = MemoryStore::default();
        let outcome = cast_vote(&mut store, Uuid::new_v4(), 99, Some(1), Utc::now())
            .await
            .unwrap();
        assert!(matches!(outcome, VoteOutcome::QuestionNotFound));
    }

    #[tokio::test]
    async fn index_excludes_future_questions() {
        let now = Utc::now();
        let mut store = MemoryStore::default();
        store.add_question("Future question.", now + Duration::days(30), None);

        let listed = published_questions(&mut store, now).await.unwrap();
        assert!(listed.is_empty());

        let past = store.add_question("Past question.", now - Duration::days(30), None);
        let listed = published_questions(&mut store, now).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, past);
        assert!(listed[0].can_vote);
        assert!(!listed[0].was_published_recently);
    }

    #[tokio::test]
    async fn index_lists_oldest_first() {
        let now = Utc::now();
        let mut store = MemoryStore::default();
        let newer = store.add_question("Past question 2.", now - Duration::days(5), None);
        let older = store.add_question("Past question 1.", now - Duration::days(30), None);

        let ids: Vec<i64> = published_questions(&mut store, now)
            .await
            .unwrap()
            .into_iter()
            .map(|q| q.id)
            .collect();
        assert_eq!(ids, vec![older, newer]);
    }

    #[tokio::test]
    async fn detail_of_future_question_is_closed() {
        let now = Utc::now();
        let mut store = MemoryStore::default();
        let future = store.add_question("Future question.", now + Duration::days(5), None);

        let outcome = question_detail(&mut store, Uuid::new_v4(), future, now).await.unwrap();
        assert!(matches!(outcome, DetailOutcome::VotingClosed));

        let outcome = question_detail(&mut store, Uuid::new_v4(), 404, now).await.unwrap();
        assert!(matches!(outcome, DetailOutcome::NotFound));
    }

    #[tokio::test]
    async fn detail_shows_users_current_choice() {
        let now = Utc::now();
        let mut store = MemoryStore::default();
        let (question_id, _, blue) = open_poll(&mut store, now);
        let user = Uuid::new_v4();

        let DetailOutcome::Open(detail) = question_detail(&mut store, user, question_id, now).await.unwrap() else {
            panic!("question should be open");
        };
        assert_eq!(detail.question.question_text, "Favourite colour?");
        assert_eq!(detail.choices.len(), 2);
        assert!(detail.user_vote.is_none());

        cast_vote(&mut store, user, question_id, Some(blue), now).await.unwrap();
        let DetailOutcome::Open(detail) = question_detail(&mut store, user, question_id, now).await.unwrap() else {
            panic!("question should be open");
        };
        assert_eq!(detail.user_vote.map(|c| c.id), Some(blue));
    }

    #[tokio::test]
    async fn results_hide_unpublished_questions() {
        let now = Utc::now();
        let mut store = MemoryStore::default();
        let future = store.add_question("Later", now + Duration::days(1), None);
        assert!(question_results(&mut store, future, now).await.unwrap().is_none());

        let (question_id, red, _) = open_poll(&mut store, now);
        cast_vote(&mut store, Uuid::new_v4(), question_id, Some(red), now).await.unwrap();
        cast_vote(&mut store, Uuid::new_v4(), question_id, Some(red), now).await.unwrap();

        let results = question_results(&mut store, question_id, now).await.unwrap().unwrap();
        assert_eq!(results.total_votes, 2);
        assert_eq!(results.choices[0].votes, 2);
        assert_eq!(results.choices[1].votes, 0);
    }

    #[tokio::test]
    async fn results_remain_visible_after_voting_ends() {
        let now = Utc::now();
        let mut store = MemoryStore::default();
        let closed = store.add_question("Closed", now - Duration::days(2), Some(now - Duration::days(1)));
        store.add_choice(closed, "Yes");

        let results = question_results(&mut store, closed, now).await.unwrap();
        assert!(results.is_some());
    }
}
