//! Files kept in the mapping repository (the identity table and the
//! subscription tables), mirrored to the state directory.

use crate::handlers::Context;
use anyhow::Context as _;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing as log;

/// One lock per mirrored file. The holder owns the file's validator and its
/// local copy until it is done with both.
#[derive(Default)]
pub struct MirrorLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl MirrorLocks {
    async fn get(&self, key: &str) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .await
            .entry(key.to_string())
            .or_default()
            .clone()
    }
}

/// Returns the current contents of `file` from the mapping repository.
///
/// The remote copy is only downloaded when its validator changed; otherwise,
/// or when the remote is unreachable, the local mirror is used.
pub(crate) async fn synced_file(ctx: &Context, key: &str, file: &str) -> anyhow::Result<Vec<u8>> {
    let lock = ctx.mirrors.get(key).await;
    let _guard = lock.lock().await;

    let local = ctx.config.state_path(file);
    let repo = &ctx.config.github.mapping_repo;
    let fetched = ctx
        .etags
        .fetch_if_changed(key, |etag| ctx.github.file_contents(repo, file, etag))
        .await;
    let unchanged = match fetched {
        Ok(Some(contents)) => {
            log::debug!("{file} changed upstream, refreshing local copy");
            write_mirror(&local, &contents).await;
            return Ok(contents);
        }
        Ok(None) => true,
        Err(e) => {
            log::warn!("failed to fetch {file}, using local copy: {:?}", e);
            false
        }
    };
    match tokio::fs::read(&local).await {
        Ok(contents) => Ok(contents),
        // The validator is current but the mirror is gone: download it again.
        Err(e) if unchanged && e.kind() == std::io::ErrorKind::NotFound => {
            let contents = ctx
                .github
                .file_contents(repo, file, None)
                .await?
                .body
                .with_context(|| format!("{file} returned no contents"))?;
            write_mirror(&local, &contents).await;
            Ok(contents)
        }
        Err(e) => Err(e).with_context(|| format!("reading {}", local.display())),
    }
}

async fn write_mirror(path: &Path, contents: &[u8]) {
    if let Err(e) = crate::state::write_atomic(path, contents).await {
        log::error!("failed to write {}: {:?}", path.display(), e);
    }
}
