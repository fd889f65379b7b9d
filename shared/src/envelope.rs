//! The CRUD envelope shared by every service on the fabric.
//!
//! Requests travel as `{ ownerId, action, command, args }`. Replies are
//! `{ status, payload }` on success and `{ status, message }` on failure,
//! where `status` follows HTTP semantics.
//!
//! Inbound requests are turned into a [`Command`] before anything else
//! happens, so every routable `action.command` pair is a variant here and an
//! unknown pair is rejected up front.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, ErrorCode, Result};
use crate::models::Direction;
use crate::validation::{parse_direction, string_arg, validate_entity_id, validate_owner_id};

pub const MALFORMED: &str = "malformed api call";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
}

impl Action {
    pub const fn as_str(self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "create" => Ok(Action::Create),
            "read" => Ok(Action::Read),
            "update" => Ok(Action::Update),
            "delete" => Ok(Action::Delete),
            other => Err(Error::with_details(ErrorCode::InvalidArgument, MALFORMED, format!("unknown action {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    #[serde(default)]
    pub owner_id: Option<String>,
    pub action: Action,
    pub command: String,
    #[serde(default, deserialize_with = "one_or_many")]
    pub args: Vec<Value>,
}

impl Request {
    pub fn new(owner_id: Option<String>, action: Action, command: impl Into<String>, args: impl Into<Value>) -> Self {
        Self {
            owner_id,
            action,
            command: command.into(),
            args: into_args(args.into()),
        }
    }

    /// Builds a request from an `action.command` path such as `"read.votes"`.
    pub fn from_path(path: &str, args: impl Into<Value>, owner_id: Option<String>) -> Result<Self> {
        let mut parts = path.split('.');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(action), Some(command), None) if !action.is_empty() && !command.is_empty() => {
                Ok(Self::new(owner_id, action.parse()?, command, args))
            }
            _ => Err(Error::with_details(ErrorCode::InvalidArgument, MALFORMED, format!("bad request path {path:?}"))),
        }
    }

    pub fn path(&self) -> String {
        format!("{}.{}", self.action, self.command)
    }

    fn owner(&self) -> &str {
        self.owner_id.as_deref().unwrap_or_default()
    }
}

fn into_args(value: Value) -> Vec<Value> {
    match value {
        Value::Array(args) => args,
        Value::Null => Vec::new(),
        single => vec![single],
    }
}

fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<Value>, D::Error> {
    Value::deserialize(deserializer).map(into_args)
}

/// Every operation this service answers on the request/response channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `update.vote` with args `[entityId, direction]`.
    CastVote {
        entity_id: String,
        direction: Direction,
        owner_id: String,
    },
    /// `read.votes` with args `[entityId]`.
    ReadVotes {
        entity_id: String,
        owner_id: String,
    },
    /// `read.bffSubscriptions`, the topics this service wants forwarded.
    ReadSubscriptions,
}

impl Command {
    pub const fn path(&self) -> &'static str {
        match self {
            Command::CastVote { .. } => "update.vote",
            Command::ReadVotes { .. } => "read.votes",
            Command::ReadSubscriptions => "read.bffSubscriptions",
        }
    }
}

impl TryFrom<&Request> for Command {
    type Error = Error;

    fn try_from(request: &Request) -> Result<Self> {
        match (request.action, request.command.as_str()) {
            (Action::Update, "vote") => {
                let entity_id = string_arg(&request.args, 0, "targetId")?;
                let direction = string_arg(&request.args, 1, "direction")?;
                validate_entity_id(entity_id)?;
                validate_owner_id(request.owner())?;
                Ok(Command::CastVote {
                    entity_id: entity_id.to_string(),
                    direction: parse_direction(direction)?,
                    owner_id: request.owner().to_string(),
                })
            }
            (Action::Read, "votes") => {
                let entity_id = string_arg(&request.args, 0, "entityId")?;
                validate_entity_id(entity_id)?;
                validate_owner_id(request.owner())?;
                Ok(Command::ReadVotes {
                    entity_id: entity_id.to_string(),
                    owner_id: request.owner().to_string(),
                })
            }
            (Action::Read, "bffSubscriptions") => Ok(Command::ReadSubscriptions),
            _ => Err(Error::with_details(ErrorCode::InvalidArgument, MALFORMED, format!("no handler for {}", request.path()))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    pub payload: Value,
}

impl Response {
    pub fn ok<T: Serialize>(payload: &T) -> Result<Self> {
        serde_json::to_value(payload)
            .map(|payload| Self { status: 200, payload })
            .map_err(|e| Error::with_details(ErrorCode::InternalError, "internal server error", e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub status: u16,
    pub message: String,
}

impl ErrorReply {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }
}

impl From<&Error> for ErrorReply {
    fn from(e: &Error) -> Self {
        let message = match &e.details {
            Some(details) => format!("{}: {}", e.message, details),
            None => e.message.clone(),
        };
        Self::new(e.status(), message)
    }
}
