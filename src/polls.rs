use crate::db::{Answer, AnswerStore, Poll, PollStore};
use crate::error::{StoreError, VoteError};
use crate::startup::AppState;
use axum::{
    extract::{Extension, Json, Path},
    response::IntoResponse,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Owns every rule that spans the poll and answer stores.
///
/// The two stores share no transaction. A vote is recorded as an answer
/// first and counted second, so a failure in between can under-count a
/// poll but never count a ballot twice; [`VotingEngine::reconcile_poll`]
/// repairs such tallies from the stored answers once the poll is closed.
pub struct VotingEngine {
    polls: Arc<dyn PollStore>,
    answers: Arc<dyn AnswerStore>,
    store_timeout: Duration,
}

impl VotingEngine {
    pub fn new(
        polls: Arc<dyn PollStore>,
        answers: Arc<dyn AnswerStore>,
        store_timeout: Duration,
    ) -> Self {
        VotingEngine {
            polls,
            answers,
            store_timeout,
        }
    }

    /// Run one store call under the configured deadline.
    async fn deadline<T, E>(&self, call: impl Future<Output = Result<T, E>>) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.store_timeout).into()),
        }
    }

    async fn fetch_poll(&self, id: &str) -> Result<Poll, VoteError> {
        self.deadline(self.polls.get_by_id(id))
            .await?
            .ok_or_else(|| VoteError::PollNotFound(id.to_owned()))
    }

    pub async fn create_poll(&self, poll: &Poll) -> Result<(), VoteError> {
        self.deadline(self.polls.save(poll)).await?;
        info!("Poll {} created by {}", poll.id, poll.author);
        Ok(())
    }

    pub async fn add_answer(&self, answer: &Answer) -> Result<(), VoteError> {
        if answer.user_id.is_empty() {
            return Err(VoteError::InvalidUser);
        }

        let poll = self.fetch_poll(&answer.poll_id).await?;
        if !poll.is_active {
            return Err(VoteError::PollClosed(poll.id));
        }
        // options never change after creation, so an out-of-range ballot is
        // refused before anything is stored
        option_index(answer.vote, poll.options.len())?;

        match self.deadline(self.answers.save(answer)).await {
            Ok(()) => {}
            Err(StoreError::DuplicateKey(_)) => return Err(VoteError::AnswerExists),
            Err(e @ StoreError::Timeout(_)) => {
                // the store may still commit the answer after we gave up
                error!(
                    answer_id = %answer.id,
                    user_id = %answer.user_id,
                    poll_id = %answer.poll_id,
                    vote = answer.vote,
                    "Answer save timed out, it may be stored but not counted: {}",
                    e
                );
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        }

        let vote = answer.vote;
        let counted = self
            .deadline(self.polls.update_by_id(
                &answer.poll_id,
                Box::new(move |poll: &mut Poll| -> Result<(), VoteError> {
                    // closed polls belong to reconciliation, which may
                    // already have counted this answer
                    if !poll.is_active {
                        return Err(VoteError::PollClosed(poll.id.clone()));
                    }
                    let index = option_index(vote, poll.options.len())?;
                    poll.options[index].votes += 1;
                    Ok(())
                }),
            ))
            .await;

        if let Err(e) = counted {
            // not retried: a retry after an unseen success would double count
            error!(
                answer_id = %answer.id,
                user_id = %answer.user_id,
                poll_id = %answer.poll_id,
                vote = answer.vote,
                "Answer recorded but poll tally not updated: {}",
                e
            );
            return Err(e.into());
        }

        debug!("User {} voted {} in poll {}", answer.user_id, vote, answer.poll_id);
        Ok(())
    }

    pub async fn get_poll(&self, id: &str) -> Result<Poll, VoteError> {
        self.fetch_poll(id).await
    }

    pub async fn get_answer(&self, user_id: &str, poll_id: &str) -> Result<Answer, VoteError> {
        if user_id.is_empty() {
            return Err(VoteError::InvalidUser);
        }

        self.deadline(self.answers.get_by_user_and_poll(user_id, poll_id))
            .await?
            .ok_or_else(|| VoteError::AnswerNotFound {
                user_id: user_id.to_owned(),
                poll_id: poll_id.to_owned(),
            })
    }

    /// Deactivate a poll. Closing a closed poll is a no-op.
    pub async fn close_poll(&self, id: &str, requester: &str) -> Result<(), VoteError> {
        let requester = requester.to_owned();
        self.deadline(self.polls.update_by_id(
            id,
            Box::new(move |poll: &mut Poll| -> Result<(), VoteError> {
                if poll.author != requester {
                    return Err(VoteError::NotAuthor);
                }
                poll.is_active = false;
                Ok(())
            }),
        ))
        .await?;

        info!("Poll {} closed", id);
        Ok(())
    }

    /// Remove a poll, then make a best-effort pass over its answers.
    pub async fn delete_poll(&self, id: &str, requester: &str) -> Result<(), VoteError> {
        let poll = self.fetch_poll(id).await?;
        if poll.author != requester {
            return Err(VoteError::NotAuthor);
        }

        self.deadline(self.polls.delete_by_id(id)).await?;
        info!("Poll {} deleted", id);

        match self.deadline(self.answers.delete_by_poll(id)).await {
            Ok(removed) => debug!("Removed {} answers of poll {}", removed, id),
            Err(e) => warn!("Could not delete answers of poll {}: {}", id, e),
        }
        Ok(())
    }

    /// Recount a poll's tallies from its stored answers.
    ///
    /// Meant for repairing the under-count left when a vote's answer was
    /// saved but the tally update failed. Only closed polls are recounted:
    /// a closed poll's tally never moves on its own, so a vote caught
    /// between its two writes cannot be counted twice.
    pub async fn reconcile_poll(&self, id: &str) -> Result<Poll, VoteError> {
        let answers = self.deadline(self.answers.list_by_poll(id)).await?;

        let poll_id = id.to_owned();
        let poll = self
            .deadline(self.polls.update_by_id(
                id,
                Box::new(move |poll: &mut Poll| -> Result<(), VoteError> {
                    if poll.is_active {
                        return Err(VoteError::PollActive(poll.id.clone()));
                    }
                    let mut counts = vec![0u64; poll.options.len()];
                    for answer in &answers {
                        match option_index(answer.vote, counts.len()) {
                            Ok(index) => counts[index] += 1,
                            Err(_) => warn!(
                                answer_id = %answer.id,
                                "Skipping answer with vote {} out of range in poll {}",
                                answer.vote,
                                poll_id
                            ),
                        }
                    }
                    for (option, count) in poll.options.iter_mut().zip(counts) {
                        option.votes = count;
                    }
                    Ok(())
                }),
            ))
            .await?;

        info!("Poll {} reconciled: {} votes", id, poll.total_votes());
        Ok(poll)
    }
}

fn option_index(vote: i64, options: usize) -> Result<usize, VoteError> {
    usize::try_from(vote)
        .ok()
        .filter(|index| *index < options)
        .ok_or(VoteError::InvalidOption { vote, options })
}

/// Get a poll with its current tally
pub async fn get_poll(
    Extension(app_state): Extension<AppState>,
    Path(poll_id): Path<String>,
) -> Result<impl IntoResponse, VoteError> {
    let poll = app_state.engine.get_poll(&poll_id).await.inspect_err(|e| {
        if let VoteError::Store(store_error) = e {
            error!("Failed to get poll {}: {}", poll_id, store_error);
        }
    })?;

    Ok(Json(poll))
}

/// Recount a poll's tally from its answers (maintenance)
pub async fn reconcile_poll(
    Extension(app_state): Extension<AppState>,
    Path(poll_id): Path<String>,
) -> Result<impl IntoResponse, VoteError> {
    let poll = app_state.engine.reconcile_poll(&poll_id).await.inspect_err(|e| {
        if let VoteError::Store(store_error) = e {
            error!("Failed to reconcile poll {}: {}", poll_id, store_error);
        }
    })?;

    Ok(Json(poll))
}
