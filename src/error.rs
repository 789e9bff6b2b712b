use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("record already exists: {0}")]
    DuplicateKey(String),
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Error, Debug)]
pub enum VoteError {
    #[error("invalid user id")]
    InvalidUser,
    #[error("poll has {options} options, got vote {vote}")]
    InvalidOption { vote: i64, options: usize },
    #[error("poll {0} not found")]
    PollNotFound(String),
    #[error("answer of user {user_id} in poll {poll_id} not found")]
    AnswerNotFound { user_id: String, poll_id: String },
    #[error("poll {0} is not active")]
    PollClosed(String),
    #[error("poll {0} is still active")]
    PollActive(String),
    #[error("answer already exists")]
    AnswerExists,
    #[error("user is not poll author")]
    NotAuthor,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of a failed `PollStore::update_by_id`.
#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("poll {0} not found")]
    NotFound(String),
    /// The mutation refused the poll; nothing was written.
    #[error(transparent)]
    Rejected(VoteError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid {key}={value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl VoteError {
    /// Text shown to the chat user. Store failures stay opaque.
    pub fn user_message(&self) -> &'static str {
        match self {
            VoteError::InvalidUser => "Could not identify you. Try again",
            VoteError::InvalidOption { .. } => "There are not so many options. Try again",
            VoteError::PollNotFound(_) => "There is no poll with such ID. Try again",
            VoteError::AnswerNotFound { .. } => "You have not voted in this poll yet",
            VoteError::PollClosed(_) => "Poll is closed, you can not vote",
            VoteError::PollActive(_) => "Close the poll first",
            VoteError::AnswerExists => "You have already voted in this poll",
            VoteError::NotAuthor => "Only the author of the poll can do that",
            VoteError::Store(_) => "Something went wrong. Try again",
        }
    }
}

impl IntoResponse for VoteError {
    fn into_response(self) -> Response {
        let status = match &self {
            VoteError::InvalidUser | VoteError::InvalidOption { .. } => StatusCode::BAD_REQUEST,
            VoteError::PollNotFound(_) | VoteError::AnswerNotFound { .. } => StatusCode::NOT_FOUND,
            VoteError::PollClosed(_) | VoteError::PollActive(_) | VoteError::AnswerExists => {
                StatusCode::CONFLICT
            }
            VoteError::NotAuthor => StatusCode::FORBIDDEN,
            VoteError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.user_message(),
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for UpdateError {
    fn from(error: sqlx::Error) -> Self {
        UpdateError::Store(StoreError::Database(error))
    }
}

impl From<UpdateError> for VoteError {
    fn from(error: UpdateError) -> Self {
        match error {
            UpdateError::NotFound(id) => VoteError::PollNotFound(id),
            UpdateError::Rejected(e) => e,
            UpdateError::Store(e) => VoteError::Store(e),
        }
    }
}
