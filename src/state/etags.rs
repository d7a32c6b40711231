//! Conditional-fetch validator cache.
//!
//! One entry per resource key, holding the last `ETag` the remote returned
//! for it. The whole mapping is rewritten to disk after every fetch.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing as log;

pub const ETAGS_FILE: &str = "etags";

/// Outcome of a conditional request.
///
/// `body` is `None` when the server answered "not modified".
#[derive(Debug)]
pub struct Conditional<T> {
    pub etag: Option<String>,
    pub body: Option<T>,
}

impl<T> Conditional<T> {
    pub fn changed(etag: Option<String>, body: T) -> Self {
        Conditional {
            etag,
            body: Some(body),
        }
    }

    pub fn unchanged(etag: Option<String>) -> Self {
        Conditional { etag, body: None }
    }
}

pub struct EtagCache {
    path: PathBuf,
    tags: Mutex<HashMap<String, String>>,
}

impl EtagCache {
    /// Loads the mapping persisted at `path`. Malformed state is dropped.
    pub async fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let tags = super::load_or_default(&path).await;
        EtagCache {
            path,
            tags: Mutex::new(tags),
        }
    }

    pub async fn token_for(&self, key: &str) -> Option<String> {
        self.tags.lock().await.get(key).cloned()
    }

    /// Stores `token` for `key` and persists the full mapping.
    pub async fn record(&self, key: &str, token: &str) -> anyhow::Result<()> {
        let mut tags = self.tags.lock().await;
        tags.insert(key.to_string(), token.to_string());
        super::persist(&self.path, &*tags).await
    }

    /// Drops the validators of `keys`, so their next fetch is unconditional.
    pub async fn forget(&self, keys: &[String]) -> anyhow::Result<()> {
        let mut tags = self.tags.lock().await;
        for key in keys {
            tags.remove(key);
        }
        super::persist(&self.path, &*tags).await
    }

    /// Runs `fetch` with the `If-None-Match` value for `key` and returns the
    /// decoded body only if the resource changed.
    ///
    /// Whatever validator comes back is recorded, even when the body is not
    /// used. A response carrying the validator we already hold counts as
    /// unchanged.
    pub async fn fetch_if_changed<T, F, Fut>(&self, key: &str, fetch: F) -> anyhow::Result<Option<T>>
    where
        F: FnOnce(Option<String>) -> Fut,
        Fut: Future<Output = anyhow::Result<Conditional<T>>>,
    {
        let previous = self.token_for(key).await;
        let header = previous.as_deref().and_then(if_none_match);
        let Conditional { etag, body } = fetch(header).await?;

        let same_validator = match (&previous, &etag) {
            (Some(prev), Some(new)) => strip_validator(prev) == strip_validator(new),
            _ => false,
        };
        if let Some(etag) = &etag {
            if let Err(e) = self.record(key, etag).await {
                log::error!("failed to persist validator for {key}: {e:?}");
            }
        }

        match body {
            Some(_) if same_validator => {
                log::trace!("{key}: validator unchanged, ignoring body");
                Ok(None)
            }
            Some(body) => Ok(Some(body)),
            None => {
                log::trace!("{key}: not modified");
                Ok(None)
            }
        }
    }
}

/// Formats a stored validator for the `If-None-Match` header.
///
/// Weak validators (`W/"..."`) are sent as their bare quoted token.
pub fn if_none_match(token: &str) -> Option<String> {
    let bare = strip_validator(token);
    if bare.is_empty() {
        None
    } else {
        Some(format!("\"{bare}\""))
    }
}

fn strip_validator(token: &str) -> &str {
    let token = token.trim();
    let token = token.strip_prefix("W/").unwrap_or(token);
    token.trim_matches('"')
}
