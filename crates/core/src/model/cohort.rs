use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Wire sentinel for counters that apply regardless of cohort.
pub const ALL_COHORTS: &str = "ALL_COHORTS";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CohortError {
    #[error("cohort name cannot be empty")]
    EmptyName,
    #[error("`{ALL_COHORTS}` is reserved and cannot name a cohort")]
    ReservedName,
}

//
// ─── COHORT ────────────────────────────────────────────────────────────────────
//

/// A named peer group, e.g. `"1500-1600"`.
///
/// Cohorts are the primary partition key for progress data and scoreboards.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cohort(String);

impl Cohort {
    /// Creates a cohort from its display name.
    ///
    /// # Errors
    ///
    /// Returns `CohortError::EmptyName` for blank names and
    /// `CohortError::ReservedName` for the `ALL_COHORTS` sentinel.
    pub fn new(name: impl Into<String>) -> Result<Self, CohortError> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(CohortError::EmptyName);
        }
        if trimmed == ALL_COHORTS {
            return Err(CohortError::ReservedName);
        }
        Ok(Self(trimmed.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Cohort {
    type Error = CohortError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Cohort> for String {
    fn from(value: Cohort) -> Self {
        value.0
    }
}

impl fmt::Debug for Cohort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cohort({})", self.0)
    }
}

impl fmt::Display for Cohort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Deserializes an optional cohort, treating blank strings as absent.
///
/// The backend sends `""` for users that never graduated or have not
/// picked a cohort yet.
pub(crate) fn optional_cohort<'de, D>(deserializer: D) -> Result<Option<Cohort>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw {
        Some(name) if !name.trim().is_empty() => {
            Cohort::new(name).map(Some).map_err(serde::de::Error::custom)
        }
        _ => Ok(None),
    }
}

//
// ─── SCORE KEY ─────────────────────────────────────────────────────────────────
//

/// Key of a counter map: either the global counter or a single cohort.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ScoreKey {
    Global,
    Cohort(Cohort),
}

impl TryFrom<String> for ScoreKey {
    type Error = CohortError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value == ALL_COHORTS {
            return Ok(Self::Global);
        }
        Cohort::new(value).map(Self::Cohort)
    }
}

impl From<ScoreKey> for String {
    fn from(value: ScoreKey) -> Self {
        match value {
            ScoreKey::Global => ALL_COHORTS.to_owned(),
            ScoreKey::Cohort(cohort) => cohort.into(),
        }
    }
}

impl From<Cohort> for ScoreKey {
    fn from(value: Cohort) -> Self {
        Self::Cohort(value)
    }
}

//
// ─── COUNTS ────────────────────────────────────────────────────────────────────
//

/// Integer counters keyed by [`ScoreKey`].
///
/// Used both for requirement targets and for achieved progress.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Counts(BTreeMap<ScoreKey, i64>);

impl Counts {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds counts holding only the global counter.
    #[must_use]
    pub fn global(value: i64) -> Self {
        Self::new().with(ScoreKey::Global, value)
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<ScoreKey>, value: i64) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    pub fn insert(&mut self, key: impl Into<ScoreKey>, value: i64) -> Option<i64> {
        self.0.insert(key.into(), value)
    }

    #[must_use]
    pub fn get(&self, key: &ScoreKey) -> Option<i64> {
        self.0.get(key).copied()
    }

    /// Two-step lookup: the global counter wins, then the cohort's own counter.
    #[must_use]
    pub fn resolve(&self, cohort: &Cohort) -> Option<i64> {
        self.get(&ScoreKey::Global)
            .or_else(|| self.0.get(&ScoreKey::Cohort(cohort.clone())).copied())
    }

    /// True when a counter exists for the cohort, either globally or directly.
    #[must_use]
    pub fn covers(&self, cohort: &Cohort) -> bool {
        self.resolve(cohort).is_some()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ScoreKey, i64)> {
        self.0.iter().map(|(k, v)| (k, *v))
    }
}

impl FromIterator<(ScoreKey, i64)> for Counts {
    fn from_iter<I: IntoIterator<Item = (ScoreKey, i64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
