use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::airdrop::models::TaskStatus;
use crate::airdrop::readiness::ReadinessReport;

/// Top-level error type for the entire application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Account not ready: {}", .0.issues.join("; "))]
    Readiness(Box<ReadinessReport>),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Signing error: {0}")]
    Signing(#[from] SigningError),

    #[error("Task state error: {0}")]
    State(#[from] StateError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Malformed input. Always raised before any state is created.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Unsupported network: {0}")]
    UnsupportedNetwork(String),

    #[error("At least one recipient is required")]
    NoRecipients,

    #[error("Too many recipients: {count} exceeds the limit of {max}")]
    TooManyRecipients { count: usize, max: usize },

    #[error("Duplicate recipient: {0}")]
    DuplicateRecipient(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Missing amount for recipient {0}")]
    MissingAmount(String),

    #[error("Invalid currency code: {0}")]
    InvalidCurrency(String),

    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    #[error("Invalid slot count {count}: {reason}")]
    InvalidSlotCount { count: u32, reason: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Failures talking to the ledger node
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Ledger unreachable: {0}")]
    Transport(String),

    #[error("Ledger call timed out: {0}")]
    Timeout(String),

    #[error("Ledger RPC error {code}: {message}")]
    Rpc { code: String, message: String },

    #[error("Unexpected ledger response: {0}")]
    MalformedResponse(String),

    #[error("Transaction rejected {code}: {message}")]
    Rejected { code: String, message: String },
}

/// Failures producing a signature, either locally through the node or through
/// the interactive signing service
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SigningError {
    #[error("Signing service is not configured")]
    NotConfigured,

    #[error("Credential could not be resolved: {0}")]
    UnusableCredential(String),

    #[error("Signing request failed: {0}")]
    Request(String),

    #[error("Signing request was cancelled")]
    Cancelled,

    #[error("Signing request expired")]
    Expired,

    #[error("Timed out waiting for signature")]
    Timeout,
}

/// Illegal task or recipient state transitions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("Invalid task transition: {from} -> {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },

    #[error("Recipient {0} already resolved")]
    RecipientAlreadyResolved(usize),

    #[error("Recipient index {0} out of range")]
    RecipientOutOfRange(usize),

    #[error("Recipient outcome must be terminal")]
    NonTerminalOutcome,

    #[error("Task is {0}, expected running")]
    NotRunning(TaskStatus),
}

/// Task-level failures that stop a worker before any recipient is attempted.
/// Messages never carry credential material.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FatalError {
    #[error("Signing credential unusable: {0}")]
    CredentialUnusable(String),

    #[error("Ledger unreachable: {0}")]
    LedgerUnreachable(String),

    #[error("Funding account not found: {0}")]
    FundingAccountNotFound(String),

    #[error("Credential resolves to {actual}, task was created for {expected}")]
    AccountMismatch { expected: String, actual: String },

    #[error("Insufficient slots: {available} available, {required} required")]
    InsufficientSlots { available: usize, required: usize },

    #[error("cancelled")]
    Cancelled,

    #[error("Task state error: {0}")]
    State(#[from] StateError),
}

/// API error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            AppError::Validation(ref e) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                e.to_string(),
                None,
            ),
            AppError::Readiness(report) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "ACCOUNT_NOT_READY",
                format!("Account not ready: {}", report.issues.join("; ")),
                serde_json::to_value(&*report).ok(),
            ),
            AppError::Ledger(LedgerError::AccountNotFound(account)) => (
                StatusCode::NOT_FOUND,
                "ACCOUNT_NOT_FOUND",
                format!("Account not found: {}", account),
                Some(serde_json::json!({ "account": account })),
            ),
            AppError::Ledger(LedgerError::Timeout(op)) => (
                StatusCode::GATEWAY_TIMEOUT,
                "LEDGER_TIMEOUT",
                format!("Ledger call timed out: {}", op),
                None,
            ),
            AppError::Ledger(LedgerError::Rejected { code, message }) => (
                StatusCode::BAD_GATEWAY,
                "TRANSACTION_REJECTED",
                format!("Transaction rejected: {}", message),
                Some(serde_json::json!({ "engine_result": code })),
            ),
            AppError::Ledger(ref e) => (
                StatusCode::BAD_GATEWAY,
                "LEDGER_ERROR",
                e.to_string(),
                None,
            ),
            AppError::Signing(SigningError::NotConfigured) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SIGNING_NOT_CONFIGURED",
                "Signing service is not configured".to_string(),
                None,
            ),
            AppError::Signing(SigningError::UnusableCredential(_)) => (
                StatusCode::BAD_REQUEST,
                "INVALID_CREDENTIAL",
                "Signing credential could not be resolved".to_string(),
                None,
            ),
            AppError::Signing(ref e) => (
                StatusCode::BAD_GATEWAY,
                "SIGNING_ERROR",
                e.to_string(),
                None,
            ),
            AppError::State(ref e) => (
                StatusCode::CONFLICT,
                "INVALID_TASK_STATE",
                e.to_string(),
                None,
            ),
            AppError::NotFound(ref what) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("Not found: {}", what),
                None,
            ),
            AppError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
                None,
            ),
        };

        let body = Json(ErrorResponse {
            error: message,
            error_code: error_code.to_string(),
            details,
        });

        (status, body).into_response()
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .into_iter()
            .map(|(field, errors)| {
                let codes: Vec<String> = errors
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|s| s.to_string())
                            .unwrap_or_else(|| e.code.to_string())
                    })
                    .collect();
                format!("{}: {}", field, codes.join(", "))
            })
            .collect::<Vec<String>>()
            .join("; ");

        AppError::Validation(ValidationError::InvalidRequest(message))
    }
}

impl From<reqwest::Error> for LedgerError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            LedgerError::Timeout("http request".to_string())
        } else {
            // node URLs may embed API keys
            LedgerError::Transport(error.without_url().to_string())
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(error: config::ConfigError) -> Self {
        AppError::Config(error.to_string())
    }
}

/// Result type alias for the application
pub type AppResult<T> = Result<T, AppError>;
