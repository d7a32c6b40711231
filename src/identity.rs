//! Maps the actor of an event to a chat identity and its notification
//! preferences.
//!
//! The identity table is a CSV file with the columns `real_name`,
//! `slack_name`, `slack_id`, `email`, `notify_on_finish` and
//! `notify_on_failure`. Flags are the strings `True` / `False`.

use crate::handlers::Context;
use tracing as log;

pub const MAPPING_FILE: &str = "mapping.csv";
/// Conditional-fetch key of the identity table.
pub const MAPPING_KEY: &str = "mapping";

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct IdentityRecord {
    pub real_name: String,
    pub slack_name: String,
    pub slack_id: String,
    pub email: String,
    #[serde(deserialize_with = "flag")]
    pub notify_on_finish: bool,
    #[serde(deserialize_with = "flag")]
    pub notify_on_failure: bool,
}

impl IdentityRecord {
    fn matches(&self, candidate: &str) -> bool {
        [&self.real_name, &self.slack_name, &self.slack_id, &self.email]
            .into_iter()
            .any(|field| field == candidate)
    }
}

fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::de::Deserializer<'de>,
{
    use serde::de::Deserialize;
    let s = <Option<String>>::deserialize(deserializer)?;
    Ok(matches!(s.as_deref().map(str::trim), Some("True" | "true")))
}

/// A resolved recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub chat_id: String,
    pub chat_name: String,
    pub notify_on_failure: bool,
    pub notify_on_finish: bool,
}

impl Identity {
    /// Both preference flags are set.
    pub fn wants_everything(&self) -> bool {
        self.notify_on_failure && self.notify_on_finish
    }
}

impl From<&IdentityRecord> for Identity {
    fn from(record: &IdentityRecord) -> Self {
        Identity {
            chat_id: record.slack_id.clone(),
            chat_name: record.slack_name.clone(),
            notify_on_failure: record.notify_on_failure,
            notify_on_finish: record.notify_on_finish,
        }
    }
}

#[derive(Debug, Default)]
pub struct IdentityTable {
    records: Vec<IdentityRecord>,
    ignored_users: Vec<String>,
}

impl IdentityTable {
    pub fn new(records: Vec<IdentityRecord>, ignored_users: Vec<String>) -> Self {
        IdentityTable {
            records,
            ignored_users,
        }
    }

    /// Parses the CSV table. Rows that fail to decode are skipped.
    pub fn parse(contents: &[u8], ignored_users: Vec<String>) -> anyhow::Result<Self> {
        let mut reader = csv::Reader::from_reader(contents);
        let mut records = Vec::new();
        for (i, row) in reader.deserialize::<IdentityRecord>().enumerate() {
            match row {
                Ok(record) => records.push(record),
                Err(e) => log::warn!("skipping malformed row {} of {MAPPING_FILE}: {e}", i + 1),
            }
        }
        Ok(Self::new(records, ignored_users))
    }

    /// Resolves an actor, trying the platform username first, then the
    /// email, then the display name. The first matching row wins.
    ///
    /// Returns `None` for unknown actors; the caller must not notify them.
    pub fn resolve(&self, author: &str, email: &str, username: &str) -> Option<Identity> {
        let found = [username, email, author]
            .into_iter()
            .filter(|candidate| !candidate.is_empty())
            .find_map(|candidate| self.records.iter().find(|r| r.matches(candidate)));
        if let Some(record) = found {
            return Some(Identity::from(record));
        }
        if !author.is_empty()
            && !username.is_empty()
            && !self.ignored_users.iter().any(|u| u == username)
        {
            log::warn!("{author} ({username}) is an unknown user. Add this user to {MAPPING_FILE}.");
        }
        None
    }
}

/// Loads the identity table, downloading it again only if it changed.
pub async fn refresh(ctx: &Context) -> anyhow::Result<IdentityTable> {
    let contents = crate::tables::synced_file(ctx, MAPPING_KEY, MAPPING_FILE).await?;
    IdentityTable::parse(&contents, ctx.config.ignored_users.clone())
}
