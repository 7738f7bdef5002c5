//! REST backend for the repository traits.
//!
//! Paths mirror the tracker API: list endpoints accept a `startKey` query
//! parameter and answer with a [`Page`]; single-entity endpoints answer with
//! the entity itself. Authenticated calls carry a bearer token obtained from
//! a [`CredentialProvider`].

mod wire;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use tracker_core::model::{Cohort, Event, Graduation, Requirement, RequirementId, User, Username};
use tracker_core::timeline::TimelineUpdate;

use crate::pagination::Page;
use crate::repository::{
    EventRepository, GraduationRepository, ProgressUpdate, RequirementRepository, Storage,
    StorageError, UserRepository,
};

use self::wire::{ProgressRequest, TimelineRequest};

//
// ─── CREDENTIALS ───────────────────────────────────────────────────────────────
//

/// Source of the bearer token sent with authenticated calls.
///
/// Refreshing and expiring tokens is the provider's business; the backend
/// asks for a token before every request.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Current ID token, or `None` to call anonymously.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Credentials` if a token cannot be obtained.
    async fn id_token(&self) -> Result<Option<String>, StorageError>;
}

/// A fixed token, typically read from the environment.
#[derive(Clone, Default)]
pub struct StaticCredentials {
    token: Option<String>,
}

impl StaticCredentials {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        let token = token.into();
        Self {
            token: (!token.trim().is_empty()).then_some(token),
        }
    }

    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }
}

impl fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn id_token(&self) -> Result<Option<String>, StorageError> {
        Ok(self.token.clone())
    }
}

//
// ─── BACKEND ───────────────────────────────────────────────────────────────────
//

#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
    credentials: Arc<dyn CredentialProvider>,
}

impl HttpBackend {
    #[must_use]
    pub fn new(base_url: Url, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            client: Client::new(),
            base_url,
            credentials,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, StorageError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                StorageError::Connection(format!("base url cannot hold a path: {}", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, StorageError> {
        Ok(match self.credentials.id_token().await? {
            Some(token) => request.bearer_auth(token),
            None => request,
        })
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, StorageError> {
        let response = request
            .send()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "backend request failed");
            return Err(status_error(status.as_u16(), &body));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, StorageError> {
        debug!(%url, "GET");
        let request = self.authorized(self.client.get(url)).await?;
        self.send(request).await
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        start_key: Option<String>,
    ) -> Result<Page<T>, StorageError> {
        let mut url = self.endpoint(segments)?;
        if let Some(key) = start_key {
            url.query_pairs_mut().append_pair("startKey", &key);
        }
        self.get(url).await
    }
}

/// Maps a non-success status and its body onto a `StorageError`.
fn status_error(status: u16, body: &str) -> StorageError {
    match status {
        401 | 403 => StorageError::Unauthorized {
            message: wire::error_message(body),
        },
        404 => StorageError::NotFound {
            message: wire::error_message(body),
        },
        _ => StorageError::HttpStatus {
            status,
            message: wire::error_message(body),
        },
    }
}

#[async_trait]
impl RequirementRepository for HttpBackend {
    async fn list_requirements(
        &self,
        cohort: &Cohort,
        start_key: Option<String>,
    ) -> Result<Page<Requirement>, StorageError> {
        self.get_page(&["requirements", cohort.as_str()], start_key)
            .await
    }

    async fn get_requirement(&self, id: &RequirementId) -> Result<Requirement, StorageError> {
        self.get(self.endpoint(&["requirement", id.as_str()])?).await
    }
}

#[async_trait]
impl EventRepository for HttpBackend {
    async fn list_events(&self, start_key: Option<String>) -> Result<Page<Event>, StorageError> {
        self.get_page(&["event"], start_key).await
    }
}

#[async_trait]
impl UserRepository for HttpBackend {
    async fn get_user(&self) -> Result<User, StorageError> {
        self.get(self.endpoint(&["user"])?).await
    }

    async fn get_user_public(&self, username: &Username) -> Result<User, StorageError> {
        self.get(self.endpoint(&["public", "user", username.as_str()])?)
            .await
    }

    async fn list_users_by_cohort(
        &self,
        cohort: &Cohort,
        start_key: Option<String>,
    ) -> Result<Page<User>, StorageError> {
        self.get_page(&["user", cohort.as_str()], start_key).await
    }

    async fn update_progress(&self, update: &ProgressUpdate) -> Result<User, StorageError> {
        let url = self.endpoint(&["user", "progress"])?;
        debug!(%url, requirement = %update.requirement_id, "POST");
        let request = self
            .client
            .post(url)
            .json(&ProgressRequest::from(update));
        let request = self.authorized(request).await?;
        self.send(request).await
    }

    async fn update_timeline(&self, update: &TimelineUpdate) -> Result<User, StorageError> {
        let url = self.endpoint(&["user", "progress", "timeline"])?;
        debug!(%url, requirement = %update.requirement_id, entries = update.entries.len(), "POST");
        let request = self
            .client
            .post(url)
            .json(&TimelineRequest::from(update));
        let request = self.authorized(request).await?;
        self.send(request).await
    }
}

#[async_trait]
impl GraduationRepository for HttpBackend {
    async fn list_graduations_by_cohort(
        &self,
        cohort: &Cohort,
        start_key: Option<String>,
    ) -> Result<Page<Graduation>, StorageError> {
        self.get_page(&["graduations", cohort.as_str()], start_key)
            .await
    }
}

impl Storage {
    /// Uses the REST backend for every repository.
    #[must_use]
    pub fn http(backend: HttpBackend) -> Self {
        Self::from_repository(backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(base: &str) -> HttpBackend {
        HttpBackend::new(
            Url::parse(base).unwrap(),
            Arc::new(StaticCredentials::anonymous()),
        )
    }

    #[test]
    fn repository_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<HttpBackend>();
        assert_send_sync::<Storage>();
    }

    #[test]
    fn endpoints_extend_the_base_path() {
        let with_slash = backend("https://api.example.com/prod/");
        let without = backend("https://api.example.com/prod");
        for b in [with_slash, without] {
            assert_eq!(
                b.endpoint(&["requirements", "1500-1600"]).unwrap().as_str(),
                "https://api.example.com/prod/requirements/1500-1600"
            );
        }
    }

    #[test]
    fn path_segments_are_escaped() {
        let b = backend("https://api.example.com/");
        assert_eq!(
            b.endpoint(&["public", "user", "a b/c"]).unwrap().as_str(),
            "https://api.example.com/public/user/a%20b%2Fc"
        );
    }

    #[test]
    fn statuses_map_to_storage_errors() {
        assert!(matches!(status_error(401, ""), StorageError::Unauthorized { .. }));
        assert!(matches!(status_error(403, ""), StorageError::Unauthorized { .. }));
        assert!(matches!(status_error(404, ""), StorageError::NotFound { .. }));
        match status_error(400, r#"{"message": "Invalid request"}"#) {
            StorageError::HttpStatus { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message.as_deref(), Some("Invalid request"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rejected_requests_keep_the_server_message() {
        let err = status_error(403, r#"{"message": "Invalid request: not authenticated"}"#);
        assert!(matches!(err, StorageError::Unauthorized { .. }));
        assert_eq!(err.server_message(), Some("Invalid request: not authenticated"));

        let err = status_error(404, r#"{"message": "User not found"}"#);
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.server_message(), Some("User not found"));
    }

    #[tokio::test]
    async fn blank_static_token_is_anonymous() {
        assert_eq!(StaticCredentials::new("  ").id_token().await.unwrap(), None);
        assert_eq!(
            StaticCredentials::new("abc").id_token().await.unwrap().as_deref(),
            Some("abc")
        );
        assert_eq!(
            format!("{:?}", StaticCredentials::new("abc")),
            r#"StaticCredentials { token: Some("<redacted>") }"#
        );
    }
}
