//! Chat commands: turns a message into an engine call and the outcome into
//! reply text.

use crate::db::{Answer, Poll};
use crate::error::VoteError;
use crate::polls::VotingEngine;
use crate::startup::AppState;
use axum::{
    extract::{Extension, Json},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use thiserror::Error;
use tracing::{debug, error};

const HELP: &str = r#"Available commands:
* /help - info about commands
* /poll_start [question] "[option1]" "[option2]" ... - creates a poll and returns poll's ID. Options with spaces must be quoted.
* /poll_vote [pollID] [vote] - registers your vote. [vote] is the number of the option in the list of options.
* /poll_results [pollID] - shows poll's results.
* /poll_my_vote [pollID] - shows which option you voted for.
* /poll_close [pollID] - author of the poll can close it.
* /poll_delete [pollID] - author of the poll can delete it."#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start { question: String, options: Vec<String> },
    Vote { poll_id: String, vote: i64 },
    Results { poll_id: String },
    MyVote { poll_id: String },
    Close { poll_id: String },
    Delete { poll_id: String },
    Help,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unbalanced quotes. Quote each option and double any quote inside it")]
    UnbalancedQuote,
    #[error("The question must not be empty")]
    EmptyQuestion,
    #[error("Too few arguments. May be you didn't write the options?")]
    MissingOptions,
    #[error("There must be 2 arguments: poll ID and option's number")]
    VoteArgs,
    #[error("Vote must be an integer: option's number")]
    VoteNotInteger,
    #[error("There must be 1 argument: poll ID")]
    PollIdArg,
}

impl Command {
    /// `Ok(None)` means the message is not addressed to the bot.
    pub fn parse(message: &str) -> Result<Option<Command>, ParseError> {
        let known = matches!(
            message.split_whitespace().next(),
            Some(
                "/poll_start"
                    | "/poll_vote"
                    | "/poll_results"
                    | "/poll_my_vote"
                    | "/poll_close"
                    | "/poll_delete"
                    | "/help"
            )
        );
        if !known {
            return Ok(None);
        }

        let tokens = split_tokens(message)?;
        let Some((name, args)) = tokens.split_first() else {
            return Ok(None);
        };

        let command = match name.as_str() {
            "/poll_start" => {
                let Some((question, options)) = args.split_first() else {
                    return Err(ParseError::MissingOptions);
                };
                if question.trim().is_empty() {
                    return Err(ParseError::EmptyQuestion);
                }
                if options.is_empty() {
                    return Err(ParseError::MissingOptions);
                }
                Command::Start {
                    question: question.clone(),
                    options: options.to_vec(),
                }
            }
            "/poll_vote" => {
                let [poll_id, vote] = args else {
                    return Err(ParseError::VoteArgs);
                };
                let vote = vote.parse::<i64>().map_err(|_| ParseError::VoteNotInteger)?;
                Command::Vote {
                    poll_id: poll_id.clone(),
                    vote,
                }
            }
            "/poll_results" => Command::Results {
                poll_id: poll_id_arg(args)?,
            },
            "/poll_my_vote" => Command::MyVote {
                poll_id: poll_id_arg(args)?,
            },
            "/poll_close" => Command::Close {
                poll_id: poll_id_arg(args)?,
            },
            "/poll_delete" => Command::Delete {
                poll_id: poll_id_arg(args)?,
            },
            _ => Command::Help,
        };
        Ok(Some(command))
    }
}

fn poll_id_arg(args: &[String]) -> Result<String, ParseError> {
    match args {
        [poll_id] => Ok(poll_id.clone()),
        _ => Err(ParseError::PollIdArg),
    }
}

/// Split on whitespace, except inside double quotes. A doubled quote inside
/// a quoted token stands for one literal quote.
pub fn split_tokens(message: &str) -> Result<Vec<String>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = message.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let mut token = String::new();
        if c == '"' {
            chars.next();
            loop {
                match chars.next() {
                    None => return Err(ParseError::UnbalancedQuote),
                    Some('"') if chars.peek() == Some(&'"') => {
                        chars.next();
                        token.push('"');
                    }
                    Some('"') => break,
                    Some(ch) => token.push(ch),
                }
            }
            // closing quote must end the token
            if chars.peek().is_some_and(|ch| !ch.is_whitespace()) {
                return Err(ParseError::UnbalancedQuote);
            }
        } else {
            while let Some(&ch) = chars.peek() {
                if ch.is_whitespace() {
                    break;
                }
                token.push(ch);
                chars.next();
            }
        }
        tokens.push(token);
    }

    Ok(tokens)
}

/// Run a parsed command on behalf of `user_id` and render the reply.
pub async fn execute(engine: &VotingEngine, user_id: &str, command: Command) -> String {
    match command {
        Command::Start { question, options } => {
            let poll = Poll::new(question, options, user_id);
            match engine.create_poll(&poll).await {
                Ok(()) => render_created(&poll),
                Err(e) => reply_error(e, "start poll"),
            }
        }
        Command::Vote { poll_id, vote } => {
            match engine.add_answer(&Answer::new(user_id, poll_id, vote)).await {
                Ok(()) => "Vote successfully registered".to_string(),
                Err(e) => reply_error(e, "vote"),
            }
        }
        Command::Results { poll_id } => match engine.get_poll(&poll_id).await {
            Ok(poll) => render_results(&poll),
            Err(e) => reply_error(e, "get poll results"),
        },
        Command::MyVote { poll_id } => match engine.get_answer(user_id, &poll_id).await {
            Ok(answer) => {
                let poll = match engine.get_poll(&poll_id).await {
                    Ok(poll) => Some(poll),
                    Err(e) => {
                        if let VoteError::Store(store_error) = &e {
                            error!("Failed to get poll {} for answer text: {}", poll_id, store_error);
                        }
                        None
                    }
                };
                let text = poll.and_then(|poll| {
                    usize::try_from(answer.vote)
                        .ok()
                        .and_then(|i| poll.options.get(i))
                        .map(|option| option.text.clone())
                });
                match text {
                    Some(text) => format!("You voted for {}. {}", answer.vote, text),
                    None => format!("You voted for option {}", answer.vote),
                }
            }
            Err(e) => reply_error(e, "get answer"),
        },
        Command::Close { poll_id } => match engine.close_poll(&poll_id, user_id).await {
            Ok(()) => "Poll successfully closed".to_string(),
            Err(e) => reply_error(e, "close poll"),
        },
        Command::Delete { poll_id } => match engine.delete_poll(&poll_id, user_id).await {
            Ok(()) => "Poll successfully deleted".to_string(),
            Err(e) => reply_error(e, "delete poll"),
        },
        Command::Help => HELP.to_string(),
    }
}

fn reply_error(e: VoteError, action: &str) -> String {
    if let VoteError::Store(store_error) = &e {
        error!("Failed to {}: {}", action, store_error);
    }
    e.user_message().to_string()
}

fn render_created(poll: &Poll) -> String {
    let mut msg = format!("Poll successfully created!\nID: {}", poll.id);
    for (i, option) in poll.options.iter().enumerate() {
        let _ = write!(msg, "\n{}. {}", i, option.text);
    }
    msg
}

fn render_results(poll: &Poll) -> String {
    let mut msg = poll.question.clone();
    if !poll.is_active {
        msg.push_str(" (closed)");
    }
    for (i, option) in poll.options.iter().enumerate() {
        let _ = write!(msg, "\n{}. {}\nVotes: {}", i, option.text, option.votes);
    }
    msg
}

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub user_id: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct CommandResponse {
    /// `None` when the message was not a command.
    pub reply: Option<String>,
}

/// Accept one chat message from the transport and answer with reply text
pub async fn handle_command(
    Extension(app_state): Extension<AppState>,
    Json(payload): Json<CommandRequest>,
) -> impl IntoResponse {
    let reply = match Command::parse(&payload.message) {
        Ok(Some(command)) => {
            debug!("Handling {:?} from {}", command, payload.user_id);
            Some(execute(&app_state.engine, &payload.user_id, command).await)
        }
        Ok(None) => None,
        Err(e) => Some(e.to_string()),
    };

    (StatusCode::OK, Json(CommandResponse { reply }))
}
