use std::future::Future;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::repository::StorageError;

/// One page of a paginated list endpoint.
///
/// The backend names the item array after the entity kind
/// (`requirements`, `users`, ...); all of them are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(
        alias = "requirements",
        alias = "events",
        alias = "users",
        alias = "graduations"
    )]
    pub items: Vec<T>,
    #[serde(default)]
    pub last_evaluated_key: Option<String>,
}

impl<T> Page<T> {
    #[must_use]
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            last_evaluated_key: None,
        }
    }

    /// Continuation cursor, treating an empty key as the end of the list.
    #[must_use]
    pub fn next_key(&self) -> Option<&str> {
        self.last_evaluated_key
            .as_deref()
            .filter(|key| !key.is_empty())
    }
}

/// Follows continuation cursors until the server stops returning one and
/// returns every item across all pages.
///
/// # Errors
///
/// Returns the first `StorageError` raised by `fetch`, or
/// `StorageError::Serialization` if the server hands back the cursor it was
/// just given.
pub async fn collect_pages<T, F, Fut>(mut fetch: F) -> Result<Vec<T>, StorageError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>, StorageError>>,
{
    let mut items = Vec::new();
    let mut start_key: Option<String> = None;
    let mut pages = 0_usize;
    loop {
        let page = fetch(start_key.clone()).await?;
        pages += 1;
        let next = page.next_key().map(str::to_owned);
        items.extend(page.items);

        match next {
            None => break,
            Some(key) if start_key.as_deref() == Some(key.as_str()) => {
                return Err(StorageError::Serialization(format!(
                    "pagination cursor did not advance: {key}"
                )));
            }
            Some(key) => start_key = Some(key),
        }
    }
    debug!(pages, items = items.len(), "collected paginated result");
    Ok(items)
}
