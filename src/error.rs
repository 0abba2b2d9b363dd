//! Error taxonomy shared by the store, backend, RPC layer and gateways

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoachError>;

#[derive(Debug, Error)]
pub enum CoachError {
    /// Malformed input, rejected before it reaches storage
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("{kind} '{id}' not found")]
    NotFound { kind: String, id: String },

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Not signed in")]
    Unauthenticated,

    /// Transport failure; the underlying cause is logged, not surfaced
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl CoachError {
    pub fn validation(msg: impl Into<String>) -> Self {
        CoachError::Validation(msg.into())
    }

    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        CoachError::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Stable wire code used in RPC error bodies
    pub fn code(&self) -> &'static str {
        match self {
            CoachError::Validation(_) => "INVALID_INPUT",
            CoachError::NotFound { .. } => "RESOURCE_NOT_FOUND",
            CoachError::InvalidCredentials => "AUTH_INVALID",
            CoachError::Unauthenticated => "AUTH_REQUIRED",
            CoachError::BackendUnavailable(_) => "BACKEND_UNAVAILABLE",
            CoachError::Storage(_) => "STORAGE_ERROR",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            CoachError::Validation(_) => 400,
            CoachError::InvalidCredentials | CoachError::Unauthenticated => 401,
            CoachError::NotFound { .. } => 404,
            CoachError::BackendUnavailable(_) => 502,
            CoachError::Storage(_) => 500,
        }
    }

    /// Rebuild an error received over the wire.
    ///
    /// Not-found messages carry `kind` and `id` in the message text, so they
    /// are parsed back out when possible.
    pub fn from_wire(code: &str, message: &str) -> Self {
        match code {
            "INVALID_INPUT" => CoachError::Validation(
                message.strip_prefix("invalid input: ").unwrap_or(message).to_string(),
            ),
            "RESOURCE_NOT_FOUND" => parse_not_found(message),
            "AUTH_INVALID" => CoachError::InvalidCredentials,
            "AUTH_REQUIRED" => CoachError::Unauthenticated,
            "STORAGE_ERROR" => CoachError::Storage(
                message.strip_prefix("storage error: ").unwrap_or(message).to_string(),
            ),
            _ => CoachError::BackendUnavailable(message.to_string()),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CoachError::NotFound { .. })
    }
}

fn parse_not_found(message: &str) -> CoachError {
    // "<kind> '<id>' not found"
    let parsed = message
        .strip_suffix(" not found")
        .and_then(|rest| rest.split_once(" '"))
        .and_then(|(kind, id)| id.strip_suffix('\'').map(|id| (kind, id)));
    match parsed {
        Some((kind, id)) => CoachError::not_found(kind, id),
        None => CoachError::not_found("record", message),
    }
}

impl From<rusqlite::Error> for CoachError {
    fn from(err: rusqlite::Error) -> Self {
        CoachError::Storage(err.to_string())
    }
}

impl From<std::io::Error> for CoachError {
    fn from(err: std::io::Error) -> Self {
        CoachError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for CoachError {
    fn from(err: serde_json::Error) -> Self {
        CoachError::Storage(format!("serialization: {}", err))
    }
}

impl From<bcrypt::BcryptError> for CoachError {
    fn from(err: bcrypt::BcryptError) -> Self {
        CoachError::Storage(format!("password hashing: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_roundtrip_not_found() {
        let err = CoachError::not_found("workout", "w-1");
        let back = CoachError::from_wire(err.code(), &err.to_string());
        match back {
            CoachError::NotFound { kind, id } => {
                assert_eq!(kind, "workout");
                assert_eq!(id, "w-1");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_wire_validation_strips_prefix() {
        let err = CoachError::validation("daysOfWeek out of range");
        let back = CoachError::from_wire(err.code(), &err.to_string());
        assert_eq!(back.to_string(), err.to_string());
    }

    #[test]
    fn test_unknown_code_is_backend_unavailable() {
        let err = CoachError::from_wire("TEAPOT", "short and stout");
        assert!(matches!(err, CoachError::BackendUnavailable(_)));
    }

    #[test]
    fn test_http_status() {
        assert_eq!(CoachError::InvalidCredentials.http_status(), 401);
        assert_eq!(CoachError::not_found("diet", "d").http_status(), 404);
        assert_eq!(CoachError::validation("x").http_status(), 400);
    }
}
