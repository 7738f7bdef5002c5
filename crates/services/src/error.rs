//! Shared error types for the services crate.

use thiserror::Error;

use storage::StorageError;
use tracker_core::model::CohortError;
use tracker_core::timeline::TimelineErrors;

use crate::request::RequestError;

/// Errors emitted by the app-facing services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Timeline(#[from] TimelineErrors),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("another request is still in flight")]
    InFlight,
}

impl From<&ServiceError> for RequestError {
    fn from(err: &ServiceError) -> Self {
        match err {
            ServiceError::Storage(storage) => RequestError::from(storage),
            other => RequestError::new(other.to_string()),
        }
    }
}

/// Errors raised while reading configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("invalid API base url {value:?}: {source}")]
    InvalidBaseUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },
    #[error("API base url {0:?} cannot carry a path")]
    UnsupportedBaseUrl(String),
    #[error(transparent)]
    Cohort(#[from] CohortError),
}
