//! In-process stores, used when no database is configured.

use crate::db::locks::PollLocks;
use crate::db::models::{Answer, Poll};
use crate::db::store::{AnswerStore, PollMutation, PollStore};
use crate::error::{StoreError, UpdateError};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct MemoryPollStore {
    polls: RwLock<HashMap<String, Poll>>,
    locks: PollLocks,
}

impl MemoryPollStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PollStore for MemoryPollStore {
    async fn save(&self, poll: &Poll) -> Result<(), StoreError> {
        let mut polls = self.polls.write().await;
        if polls.contains_key(&poll.id) {
            return Err(StoreError::DuplicateKey(poll.id.clone()));
        }
        polls.insert(poll.id.clone(), poll.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Poll>, StoreError> {
        Ok(self.polls.read().await.get(id).cloned())
    }

    async fn update_by_id(&self, id: &str, mutate: PollMutation) -> Result<Poll, UpdateError> {
        let _guard = self.locks.lock(id).await;

        let mut poll = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| UpdateError::NotFound(id.to_owned()))?;
        mutate(&mut poll).map_err(UpdateError::Rejected)?;

        let mut polls = self.polls.write().await;
        // deleted while we held the copy
        let Some(slot) = polls.get_mut(id) else {
            return Err(UpdateError::NotFound(id.to_owned()));
        };
        *slot = poll.clone();
        Ok(poll)
    }

    async fn delete_by_id(&self, id: &str) -> Result<(), StoreError> {
        self.polls.write().await.remove(id);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Answers {
    by_id: HashMap<String, Answer>,
    /// (user_id, poll_id) -> answer id
    by_user_and_poll: HashMap<(String, String), String>,
}

#[derive(Debug, Default)]
pub struct MemoryAnswerStore {
    answers: RwLock<Answers>,
}

impl MemoryAnswerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AnswerStore for MemoryAnswerStore {
    async fn save(&self, answer: &Answer) -> Result<(), StoreError> {
        let mut answers = self.answers.write().await;
        let key = (answer.user_id.clone(), answer.poll_id.clone());
        if answers.by_user_and_poll.contains_key(&key) || answers.by_id.contains_key(&answer.id) {
            return Err(StoreError::DuplicateKey(answer.id.clone()));
        }
        answers.by_user_and_poll.insert(key, answer.id.clone());
        answers.by_id.insert(answer.id.clone(), answer.clone());
        Ok(())
    }

    async fn get_by_user_and_poll(
        &self,
        user_id: &str,
        poll_id: &str,
    ) -> Result<Option<Answer>, StoreError> {
        let answers = self.answers.read().await;
        let key = (user_id.to_owned(), poll_id.to_owned());
        Ok(answers
            .by_user_and_poll
            .get(&key)
            .and_then(|id| answers.by_id.get(id))
            .cloned())
    }

    async fn list_by_poll(&self, poll_id: &str) -> Result<Vec<Answer>, StoreError> {
        let answers = self.answers.read().await;
        Ok(answers
            .by_id
            .values()
            .filter(|a| a.poll_id == poll_id)
            .cloned()
            .collect())
    }

    async fn delete_by_poll(&self, poll_id: &str) -> Result<u64, StoreError> {
        let mut answers = self.answers.write().await;
        let before = answers.by_id.len();
        answers.by_id.retain(|_, a| a.poll_id != poll_id);
        answers.by_user_and_poll.retain(|(_, p), _| p != poll_id);
        Ok((before - answers.by_id.len()) as u64)
    }
}
