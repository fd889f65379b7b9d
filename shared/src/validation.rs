use serde_json::Value;
use crate::error::Error;
use crate::models::Direction;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Entity id must not be empty")]
    EmptyEntityId,
    #[error("Owner id must not be empty")]
    EmptyOwnerId,
    #[error("Invalid vote direction: {0:?} (must be '+' or '-')")]
    InvalidDirection(String),
    #[error("Missing argument: {0}")]
    MissingArgument(&'static str),
    #[error("Argument {0} must be a string")]
    NotAString(&'static str),
}

impl From<ValidationError> for Error {
    fn from(e: ValidationError) -> Self {
        Error::with_details(crate::ErrorCode::InvalidArgument, "bad api call", e.to_string())
    }
}

pub fn validate_entity_id(entity_id: &str) -> Result<(), ValidationError> {
    if entity_id.is_empty() { return Err(ValidationError::EmptyEntityId); }
    Ok(())
}

pub fn validate_owner_id(owner_id: &str) -> Result<(), ValidationError> {
    if owner_id.is_empty() { return Err(ValidationError::EmptyOwnerId); }
    Ok(())
}

pub fn parse_direction(raw: &str) -> Result<Direction, ValidationError> {
    Direction::try_from(raw).map_err(ValidationError::InvalidDirection)
}

/// Pulls positional argument `idx` out of an envelope's `args` as a string.
pub fn string_arg<'a>(args: &'a [Value], idx: usize, name: &'static str) -> Result<&'a str, ValidationError> {
    match args.get(idx) {
        None | Some(Value::Null) => Err(ValidationError::MissingArgument(name)),
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(ValidationError::NotAString(name)),
    }
}
