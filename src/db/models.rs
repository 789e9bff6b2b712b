use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    pub id: String,
    pub question: String,
    pub options: Vec<PollOption>,
    pub is_active: bool,
    pub author: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    pub text: String,
    /// Number of answers that picked this option.
    pub votes: u64,
}

/// One user's ballot in one poll. `vote` indexes into the poll's options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub id: String,
    pub user_id: String,
    pub poll_id: String,
    pub vote: i64,
}

impl Poll {
    pub fn new(question: impl Into<String>, options: Vec<String>, author: impl Into<String>) -> Self {
        Poll {
            id: Uuid::new_v4().to_string(),
            question: question.into(),
            options: options.into_iter().map(PollOption::new).collect(),
            is_active: true,
            author: author.into(),
        }
    }

    pub fn total_votes(&self) -> u64 {
        self.options.iter().map(|o| o.votes).sum()
    }
}

impl PollOption {
    pub fn new(text: impl Into<String>) -> Self {
        PollOption {
            text: text.into(),
            votes: 0,
        }
    }
}

impl Answer {
    pub fn new(user_id: impl Into<String>, poll_id: impl Into<String>, vote: i64) -> Self {
        Answer {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            poll_id: poll_id.into(),
            vote,
        }
    }
}
