//! Which chat channels follow which users, one YAML table per event kind:
//!
//! ```yaml
//! C024BE91L: [U01JDOE, U02JSMITH]
//! C0G9QF9GZ: [U01JDOE]
//! ```

use crate::handlers::{Context, EventKind};
use crate::identity::Identity;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct Subscriptions {
    channels: BTreeMap<String, Vec<String>>,
}

impl Subscriptions {
    pub fn parse(contents: &[u8]) -> anyhow::Result<Self> {
        if contents.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        let raw: BTreeMap<String, Option<Vec<String>>> = serde_yaml::from_slice(contents)?;
        Ok(Subscriptions {
            channels: raw
                .into_iter()
                .map(|(channel, users)| (channel, users.unwrap_or_default()))
                .collect(),
        })
    }

    /// Channels subscribed to `identity`, by chat id or chat name.
    pub fn channels_for(&self, identity: &Identity) -> Vec<String> {
        self.channels
            .iter()
            .filter(|(_, users)| {
                users
                    .iter()
                    .any(|u| *u == identity.chat_id || *u == identity.chat_name)
            })
            .map(|(channel, _)| channel.clone())
            .collect()
    }
}

pub fn file_name(kind: EventKind) -> String {
    format!("{}_subscriptions.yaml", kind.name())
}

/// Loads the subscription table of `kind`, downloading it again only if it
/// changed.
pub async fn load(ctx: &Context, kind: EventKind) -> anyhow::Result<Subscriptions> {
    let contents = crate::tables::synced_file(ctx, kind.name(), &file_name(kind)).await?;
    Subscriptions::parse(&contents)
}
