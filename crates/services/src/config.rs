use std::env;
use std::fmt;
use std::sync::Arc;

use url::Url;

use storage::{HttpBackend, StaticCredentials};
use tracker_core::model::Cohort;

use crate::error::ConfigError;

pub const BASE_URL_VAR: &str = "TRACKER_API_BASE_URL";
pub const ID_TOKEN_VAR: &str = "TRACKER_ID_TOKEN";
pub const COHORT_VAR: &str = "TRACKER_COHORT";

/// Connection settings for the tracker API.
#[derive(Clone)]
pub struct ApiConfig {
    pub base_url: Url,
    pub id_token: Option<String>,
    pub cohort: Option<Cohort>,
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url.as_str())
            .field("id_token", &self.id_token.as_ref().map(|_| "<redacted>"))
            .field("cohort", &self.cohort)
            .finish()
    }
}

impl ApiConfig {
    /// Reads `TRACKER_API_BASE_URL`, `TRACKER_ID_TOKEN` and `TRACKER_COHORT`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the base url is missing or invalid, or the
    /// cohort is blank.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Like [`Self::from_env`], reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the base url is missing or invalid, or the
    /// cohort is blank.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let base_url = value(BASE_URL_VAR).ok_or(ConfigError::Missing(BASE_URL_VAR))?;
        let cohort = value(COHORT_VAR).map(Cohort::new).transpose()?;
        Ok(Self {
            base_url: parse_base_url(&base_url)?,
            id_token: value(ID_TOKEN_VAR),
            cohort,
        })
    }

    #[must_use]
    pub fn credentials(&self) -> StaticCredentials {
        self.id_token
            .as_deref()
            .map_or_else(StaticCredentials::anonymous, StaticCredentials::new)
    }

    #[must_use]
    pub fn backend(&self) -> HttpBackend {
        HttpBackend::new(self.base_url.clone(), Arc::new(self.credentials()))
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let raw = raw.trim();
    let url = Url::parse(raw).map_err(|source| ConfigError::InvalidBaseUrl {
        value: raw.to_owned(),
        source,
    })?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::UnsupportedBaseUrl(raw.to_owned()));
    }
    Ok(url)
}
