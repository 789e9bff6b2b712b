//! Storage contracts the voting engine is written against.
//!
//! Polls and answers live in two independent stores with no transaction
//! spanning both. Cross-store consistency is the engine's job.

use crate::db::models::{Answer, Poll};
use crate::error::{StoreError, UpdateError, VoteError};
use async_trait::async_trait;

/// In-place edit applied by [`PollStore::update_by_id`]. Returning an error
/// aborts the update without writing.
pub type PollMutation = Box<dyn FnOnce(&mut Poll) -> Result<(), VoteError> + Send>;

#[async_trait]
pub trait PollStore: Send + Sync {
    /// Insert a new poll. Fails with `DuplicateKey` if the id is taken.
    async fn save(&self, poll: &Poll) -> Result<(), StoreError>;

    async fn get_by_id(&self, id: &str) -> Result<Option<Poll>, StoreError>;

    /// Read, mutate and write back one poll, serialized against other
    /// updates of the same poll. Returns the poll as written.
    async fn update_by_id(&self, id: &str, mutate: PollMutation) -> Result<Poll, UpdateError>;

    /// Remove a poll. Removing a missing poll is not an error.
    async fn delete_by_id(&self, id: &str) -> Result<(), StoreError>;
}

#[async_trait]
pub trait AnswerStore: Send + Sync {
    /// Insert an answer unless the same user already answered the same
    /// poll, in which case `DuplicateKey` is returned. Check and insert are
    /// atomic.
    async fn save(&self, answer: &Answer) -> Result<(), StoreError>;

    async fn get_by_user_and_poll(
        &self,
        user_id: &str,
        poll_id: &str,
    ) -> Result<Option<Answer>, StoreError>;

    async fn list_by_poll(&self, poll_id: &str) -> Result<Vec<Answer>, StoreError>;

    /// Remove every answer of a poll and return how many went away.
    async fn delete_by_poll(&self, poll_id: &str) -> Result<u64, StoreError>;
}
