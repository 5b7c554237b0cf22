use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Structured context attached to reported errors.
pub type Details = Map<String, Value>;

/// Shown to the user whenever a provider is misconfigured or unreachable.
pub const SERVICE_UNAVAILABLE: &str =
    "Weather Service is not available at this time. Please try again later.";

/// An error as handed to the error reporter: message, HTTP-like status and details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct ServiceError {
    pub message: String,
    pub status: u16,
    pub details: Details,
}

impl ServiceError {
    pub const DEFAULT_STATUS: u16 = 500;

    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: Self::DEFAULT_STATUS,
            details: Details::new(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_details(mut self, details: Details) -> Self {
        self.details = details;
        self
    }
}

/// A non-exceptional failure carrying user-facing messages.
///
/// Messages accumulate while a resolver validates its inputs, so a caller
/// sees every problem at once rather than only the first.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{}", .messages.join(", "))]
pub struct ValidationFailure {
    pub messages: Vec<String>,
    pub status: u16,
    pub details: Details,
}

impl Default for ValidationFailure {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            status: Self::DEFAULT_STATUS,
            details: Details::new(),
        }
    }
}

impl ValidationFailure {
    pub const DEFAULT_STATUS: u16 = 422;

    pub fn new(message: impl Into<String>) -> Self {
        let mut failure = Self::default();
        failure.push(message);
        failure
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn push(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    /// Records the generic unavailability message once, however many
    /// configuration problems were found.
    pub fn push_unavailable(&mut self) {
        if !self.messages.iter().any(|m| m == SERVICE_UNAVAILABLE) {
            self.push(SERVICE_UNAVAILABLE);
        }
        self.status = 503;
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// `Ok(())` when nothing was recorded, otherwise the failure itself.
    pub fn into_result(self) -> Result<(), ForecastError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ForecastError::Invalid(self))
        }
    }
}

/// Everything a resolver can fail with.
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Bad input, missing configuration or a lookup miss. Safe to show to the user.
    #[error(transparent)]
    Invalid(#[from] ValidationFailure),

    /// Unexpected fault from the network or the cache store.
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

impl ForecastError {
    pub fn validation(&self) -> Option<&ValidationFailure> {
        match self {
            ForecastError::Invalid(failure) => Some(failure),
            ForecastError::Transport(_) => None,
        }
    }
}
