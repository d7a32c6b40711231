//! Durable, file-backed state shared by all poll cycles.
//!
//! Both stores keep a JSON object on disk and serialise their
//! load-mutate-persist steps behind a `tokio::sync::Mutex`, so overlapping
//! cycles never lose each other's updates.

use anyhow::Context as _;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing as log;

pub mod etags;
pub mod notified;

pub use etags::{Conditional, EtagCache};
pub use notified::{Category, EventId, NotifiedStore};

/// Reads a JSON document, treating a missing or malformed file as empty.
pub(crate) async fn load_or_default<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    let contents = match tokio::fs::read(path).await {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return T::default(),
        Err(e) => {
            log::error!("failed to read {}: {:?}; starting empty", path.display(), e);
            return T::default();
        }
    };
    match crate::deserialize_payload::<T>(&contents) {
        Ok(v) => v,
        Err(e) => {
            log::error!("malformed state in {}: {:?}; clearing it", path.display(), e);
            T::default()
        }
    }
}

/// Writes `value` as JSON next to `path` and renames it into place.
pub(crate) async fn persist<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let body = serde_json::to_vec(value)?;
    write_atomic(path, &body).await
}

/// Replaces `path` with `contents`; readers see either the old or the new
/// file, never a partial one.
pub(crate) async fn write_atomic(path: &Path, contents: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, contents)
        .await
        .with_context(|| format!("writing {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("renaming into {}", path.display()))?;
    Ok(())
}
