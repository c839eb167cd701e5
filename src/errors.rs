//! Error taxonomy shared by the translation, client and reconciliation layers.
//!
//! NotFound-class outcomes are carried as `RemoteError::NotFound` and are
//! turned into state transitions by the services; everything else is fatal
//! to the operation that hit it.

use crate::models::user::PartialCredentials;
use thiserror::Error;

/// Failure reported by (or while talking to) one of the remote APIs.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("{code}: not found")]
    NotFound { code: String },
    #[error("{code} (HTTP {status}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("could not decode response: {0}")]
    Decode(String),
}

impl RemoteError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RemoteError::NotFound { .. })
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Treat a NotFound-class failure as a valid "absent" outcome.
pub fn optional<T>(result: RemoteResult<T>) -> RemoteResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err),
    }
}

/// Remote data did not have the shape the translation layer expects.
#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("malformed policy principal `{0}`, expected `arn:...:user/<id>`")]
    MalformedPrincipal(String),
    #[error("invalid bucket policy document: {0}")]
    PolicyDocument(#[from] serde_json::Error),
    #[error("invalid lifecycle rule: {0}")]
    LifecycleRule(String),
}

/// Attempt to change a write-once field.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{entity} {field} cannot be changed from {from:?} to {to:?}")]
pub struct ImmutableFieldError {
    pub entity: &'static str,
    pub field: &'static str,
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("update not supported: {0}")]
    Immutable(#[from] ImmutableFieldError),
    #[error("{step} failed: {source}")]
    Remote {
        step: &'static str,
        #[source]
        source: RemoteError,
    },
    #[error("{step} failed: {source}")]
    Translation {
        step: &'static str,
        #[source]
        source: TranslationError,
    },
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type ReconcileResult<T> = Result<T, ReconcileError>;

impl From<PartialCredentials> for ReconcileError {
    fn from(err: PartialCredentials) -> Self {
        ReconcileError::InvalidInput(err.to_string())
    }
}

/// Attach the name of the failing step to a lower-level error.
pub trait StepContext<T> {
    fn step(self, step: &'static str) -> ReconcileResult<T>;
}

impl<T> StepContext<T> for Result<T, RemoteError> {
    fn step(self, step: &'static str) -> ReconcileResult<T> {
        self.map_err(|source| ReconcileError::Remote { step, source })
    }
}

impl<T> StepContext<T> for Result<T, TranslationError> {
    fn step(self, step: &'static str) -> ReconcileResult<T> {
        self.map_err(|source| ReconcileError::Translation { step, source })
    }
}
