//! Lifecycle of a single network request.
//!
//! An [`AsyncOperation`] is owned by whoever issues the request (a view, a
//! loader partition, a form). Failure leaves any previously stored data in
//! place; `start` and `reset` are the only transitions that clear it.

use std::fmt;

use thiserror::Error;

use storage::StorageError;

/// Shown when a failure carries no server message and the caller gave no default.
pub const FALLBACK_ERROR_MESSAGE: &str =
    "Something went wrong. Please try again later or contact support if the problem persists";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RequestStatus {
    #[default]
    NotSent,
    Loading,
    Success,
    Failure,
    Reset,
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NotSent => "not sent",
            Self::Loading => "loading",
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Reset => "reset",
        };
        f.write_str(label)
    }
}

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Cloneable snapshot of a failed request, kept inside an [`AsyncOperation`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RequestError {
    status: Option<u16>,
    server_message: Option<String>,
    message: String,
}

impl RequestError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            server_message: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_server_message(mut self, message: impl Into<String>) -> Self {
        self.server_message = Some(message.into());
        self
    }

    #[must_use]
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        self.server_message.as_deref()
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Text for the user: the server's message, else `default`, else
    /// [`FALLBACK_ERROR_MESSAGE`].
    #[must_use]
    pub fn display_message(&self, default: Option<&str>) -> String {
        self.server_message
            .as_deref()
            .or(default)
            .unwrap_or(FALLBACK_ERROR_MESSAGE)
            .to_owned()
    }
}

impl From<&StorageError> for RequestError {
    fn from(err: &StorageError) -> Self {
        Self {
            status: err.status(),
            server_message: err.server_message().map(str::to_owned),
            message: err.to_string(),
        }
    }
}

//
// ─── OPERATION ─────────────────────────────────────────────────────────────────
//

/// Dismissible alert content derived from an operation's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Error(String),
    Success(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AsyncOperation<T, E = RequestError> {
    status: RequestStatus,
    data: Option<T>,
    error: Option<E>,
}

impl<T, E> Default for AsyncOperation<T, E> {
    fn default() -> Self {
        Self {
            status: RequestStatus::NotSent,
            data: None,
            error: None,
        }
    }
}

impl<T, E> AsyncOperation<T, E> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves to `Loading`, dropping data and error.
    ///
    /// Callers check [`Self::is_loading`] first; starting twice is a bug in
    /// the caller.
    pub fn start(&mut self) {
        self.status = RequestStatus::Loading;
        self.data = None;
        self.error = None;
    }

    pub fn succeed(&mut self, data: T) {
        self.status = RequestStatus::Success;
        self.data = Some(data);
        self.error = None;
    }

    /// Moves to `Failure`. Data from an earlier success is kept.
    pub fn fail(&mut self, error: E) {
        self.status = RequestStatus::Failure;
        self.error = Some(error);
    }

    pub fn reset(&mut self) {
        self.status = RequestStatus::Reset;
        self.data = None;
        self.error = None;
    }

    #[must_use]
    pub fn status(&self) -> RequestStatus {
        self.status
    }

    #[must_use]
    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    #[must_use]
    pub fn error(&self) -> Option<&E> {
        self.error.as_ref()
    }

    /// False only before the first `start` and after `reset`.
    #[must_use]
    pub fn is_sent(&self) -> bool {
        !matches!(self.status, RequestStatus::NotSent | RequestStatus::Reset)
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.status == RequestStatus::Loading
    }
}

impl<T> AsyncOperation<T, RequestError> {
    /// Alert to show for the current state, if any.
    ///
    /// Failures always produce an error notice; successes only when the
    /// caller supplies a success message. Dismissing the alert is `reset`.
    #[must_use]
    pub fn notice(&self, default_error: Option<&str>, success: Option<&str>) -> Option<Notice> {
        match self.status {
            RequestStatus::Failure => Some(Notice::Error(
                self.error
                    .as_ref()
                    .map_or_else(
                        || default_error.unwrap_or(FALLBACK_ERROR_MESSAGE).to_owned(),
                        |e| e.display_message(default_error),
                    ),
            )),
            RequestStatus::Success => success.map(|m| Notice::Success(m.to_owned())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_then_fail_leaves_no_data() {
        let mut op: AsyncOperation<Vec<u32>> = AsyncOperation::new();
        assert!(!op.is_sent());

        op.start();
        assert!(op.is_loading());
        op.fail(RequestError::new("timeout"));

        assert_eq!(op.status(), RequestStatus::Failure);
        assert_eq!(op.error().map(RequestError::message), Some("timeout"));
        assert!(op.data().is_none());
        assert!(op.is_sent());

        op.reset();
        assert_eq!(op.status(), RequestStatus::Reset);
        assert!(!op.is_sent());
        assert!(op.error().is_none());
    }

    #[test]
    fn failure_after_success_keeps_stale_data() {
        let mut op: AsyncOperation<u32> = AsyncOperation::new();
        op.start();
        op.succeed(7);
        op.fail(RequestError::new("offline"));
        assert_eq!(op.data(), Some(&7));
        assert!(op.error().is_some());
    }

    #[test]
    fn success_clears_error_and_start_clears_data() {
        let mut op: AsyncOperation<&str> = AsyncOperation::new();
        op.start();
        op.fail(RequestError::new("nope"));
        op.succeed("ok");
        assert!(op.error().is_none());
        assert_eq!(op.data(), Some(&"ok"));

        op.start();
        assert!(op.data().is_none());
    }

    #[test]
    fn display_message_prefers_server_then_default() {
        let plain = RequestError::new("connection error: reset");
        assert_eq!(plain.display_message(None), FALLBACK_ERROR_MESSAGE);
        assert_eq!(plain.display_message(Some("Failed to load")), "Failed to load");

        let server = plain.with_status(400).with_server_message("Invalid cohort");
        assert_eq!(server.display_message(Some("Failed to load")), "Invalid cohort");
        assert_eq!(server.status(), Some(400));
    }

    #[test]
    fn converts_storage_errors() {
        let err = RequestError::from(&StorageError::HttpStatus {
            status: 500,
            message: Some("db down".into()),
        });
        assert_eq!(err.status(), Some(500));
        assert_eq!(err.server_message(), Some("db down"));
        assert_eq!(err.message(), "request failed with status 500");

        let err = RequestError::from(&StorageError::not_found());
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.server_message(), None);

        let err = RequestError::from(&StorageError::Unauthorized {
            message: Some("Invalid request: not authenticated".into()),
        });
        assert_eq!(err.status(), Some(401));
        assert_eq!(
            err.display_message(None),
            "Invalid request: not authenticated"
        );
        assert_eq!(
            RequestError::from(&StorageError::unauthorized()).display_message(None),
            FALLBACK_ERROR_MESSAGE
        );
    }

    #[test]
    fn notice_reflects_status() {
        let mut op: AsyncOperation<()> = AsyncOperation::new();
        assert_eq!(op.notice(None, Some("Saved")), None);

        op.start();
        op.succeed(());
        assert_eq!(op.notice(None, None), None);
        assert_eq!(
            op.notice(None, Some("Saved")),
            Some(Notice::Success("Saved".into()))
        );

        op.fail(RequestError::new("x"));
        assert_eq!(
            op.notice(None, Some("Saved")),
            Some(Notice::Error(FALLBACK_ERROR_MESSAGE.into()))
        );

        op.reset();
        assert_eq!(op.notice(None, Some("Saved")), None);
    }
}
