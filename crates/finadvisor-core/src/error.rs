//! Error types for the advisor client.

use thiserror::Error;

/// Bad or missing user input. Never reaches the network.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Both user data and query are required")]
    MissingSubmissionInput,

    #[error("A life goal needs a name, a timeline and a cost")]
    IncompleteGoal,

    #[error("'{value}' is not a valid number for {field}")]
    InvalidNumber { field: String, value: String },
}

/// Network, HTTP status or payload failure talking to a remote service.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{endpoint} returned {status}: {body}")]
    Status {
        endpoint: String,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Invalid response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },

    #[error("Empty response from {0}")]
    EmptyResponse(String),
}

/// Failure submitting a job.
#[derive(Error, Debug)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Failed to execute query: {0}")]
    Transport(#[from] TransportError),
}

/// The single error a chat caller sees once retries are exhausted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    #[error("Unable to get a response from the AI service. Please try again later.")]
    Unavailable { attempts: u32 },
}

impl TransportError {
    pub(crate) fn invalid(endpoint: &str, reason: impl ToString) -> Self {
        TransportError::InvalidResponse {
            endpoint: endpoint.to_string(),
            reason: reason.to_string(),
        }
    }
}
