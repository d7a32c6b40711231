//! Record of events that were already notified.
//!
//! Each category lives in its own file mapping an event id to the time (ms
//! since epoch) the event occurred. Ids are stored in their string form, so
//! `7` and `"7"` are the same event.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing as log;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    Commits,
    Pulls,
    Comments,
    Builds,
}

impl Category {
    pub fn file_name(self) -> &'static str {
        match self {
            Category::Commits => "shas",
            Category::Pulls => "pull_numbers",
            Category::Comments => "comment_ids",
            Category::Builds => "build_numbers",
        }
    }

    fn index(self) -> usize {
        match self {
            Category::Commits => 0,
            Category::Pulls => 1,
            Category::Comments => 2,
            Category::Builds => 3,
        }
    }
}

/// Source-specific event identifier: a commit sha, a pull request id, a
/// comment id or a build number.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventId {
    Number(u64),
    Text(String),
}

impl EventId {
    fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EventId::Number(n) => write!(f, "{n}"),
            EventId::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for EventId {
    fn from(n: u64) -> Self {
        EventId::Number(n)
    }
}

impl From<&str> for EventId {
    fn from(s: &str) -> Self {
        EventId::Text(s.to_string())
    }
}

impl From<String> for EventId {
    fn from(s: String) -> Self {
        EventId::Text(s)
    }
}

type Entries = HashMap<String, Millis>;

/// Milliseconds since epoch. Files written by earlier deployments hold
/// fractional values; they are truncated on load.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct Millis(#[serde(deserialize_with = "whole_millis")] i64);

fn whole_millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    f64::deserialize(deserializer).map(|ms| ms.trunc() as i64)
}

pub struct NotifiedStore {
    dir: PathBuf,
    locks: [Mutex<()>; 4],
}

impl NotifiedStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        NotifiedStore {
            dir: dir.into(),
            locks: Default::default(),
        }
    }

    fn path(&self, category: Category) -> PathBuf {
        self.dir.join(category.file_name())
    }

    async fn entries(&self, category: Category) -> Entries {
        super::load_or_default(&self.path(category)).await
    }

    pub async fn is_notified(&self, id: &EventId, category: Category) -> bool {
        let _guard = self.locks[category.index()].lock().await;
        self.entries(category).await.contains_key(&id.key())
    }

    pub async fn mark_notified(
        &self,
        id: &EventId,
        timestamp_ms: i64,
        category: Category,
    ) -> anyhow::Result<()> {
        let _guard = self.locks[category.index()].lock().await;
        let mut entries = self.entries(category).await;
        entries.insert(id.key(), Millis(timestamp_ms));
        super::persist(&self.path(category), &entries).await
    }

    /// Drops every entry that occurred more than `max_age_ms` before
    /// `current_time_ms`. Returns how many were removed.
    pub async fn evict_expired(
        &self,
        current_time_ms: i64,
        max_age_ms: i64,
        category: Category,
    ) -> anyhow::Result<usize> {
        let _guard = self.locks[category.index()].lock().await;
        let mut entries = self.entries(category).await;
        let before = entries.len();
        entries.retain(|_, Millis(timestamp)| current_time_ms - *timestamp <= max_age_ms);
        let removed = before - entries.len();
        if removed > 0 {
            log::debug!("evicted {removed} {category:?} entries");
        }
        super::persist(&self.path(category), &entries).await?;
        Ok(removed)
    }
}
