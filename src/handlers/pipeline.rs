//! The poll, filter, normalize and dispatch steps shared by every
//! source-hosting event kind.

use super::{Context, EventKind};
use crate::identity::{self, IdentityTable};
use crate::state::EventId;
use crate::subscriptions::{self, Subscriptions};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tracing as log;

/// An event reduced to what identity resolution and message templates need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedEvent {
    pub author: String,
    pub email: String,
    pub username: String,
    pub url: String,
    pub body: Option<String>,
    pub id: EventId,
    pub occurred_at: DateTime<Utc>,
}

impl NormalizedEvent {
    /// The author's display name, or their username if they have none.
    pub fn display_name(&self) -> &str {
        if self.author.is_empty() {
            &self.username
        } else {
            &self.author
        }
    }
}

/// What an event kind plugs into [`run`].
#[async_trait]
pub trait EventSource: Send {
    type Item: Send + Sync;

    const KIND: EventKind;

    /// Raw items that changed since the previous cycle.
    async fn fetch(&mut self, ctx: &Context) -> anyhow::Result<Vec<Self::Item>>;

    /// Cache keys whose validators the last `fetch` advanced.
    fn fetched_keys(&self) -> Vec<String>;

    fn occurred_at(&self, item: &Self::Item) -> DateTime<Utc>;

    fn id(&self, item: &Self::Item) -> EventId;

    async fn normalize(
        &mut self,
        ctx: &Context,
        item: Self::Item,
    ) -> anyhow::Result<NormalizedEvent>;

    fn message(&self, event: &NormalizedEvent) -> String;
}

/// Counters for one run, for logging.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub fetched: usize,
    pub fresh: usize,
    pub delivered: usize,
    pub evicted: usize,
}

pub async fn run<S: EventSource>(
    ctx: &Context,
    source: &mut S,
    now: DateTime<Utc>,
) -> anyhow::Result<Summary> {
    let max_age = TimeDelta::seconds(ctx.config.github.max_age_secs);
    let mut summary = Summary::default();

    let outcome = dispatch(ctx, source, now, max_age, &mut summary).await;
    // Expired entries go even when the cycle failed.
    let evicted = ctx
        .notified
        .evict_expired(
            now.timestamp_millis(),
            max_age.num_milliseconds(),
            S::KIND.category(),
        )
        .await;
    outcome?;
    summary.evicted = evicted?;
    Ok(summary)
}

async fn dispatch<S: EventSource>(
    ctx: &Context,
    source: &mut S,
    now: DateTime<Utc>,
    max_age: TimeDelta,
    summary: &mut Summary,
) -> anyhow::Result<()> {
    let kind = S::KIND;
    let category = kind.category();

    let items = source.fetch(ctx).await?;
    summary.fetched = items.len();

    let mut fresh = Vec::new();
    for item in items {
        let occurred_at = source.occurred_at(&item);
        if now - occurred_at >= max_age {
            continue;
        }
        let id = source.id(&item);
        if ctx.notified.is_notified(&id, category).await {
            log::trace!("{} {id} already notified", kind.name());
            continue;
        }
        fresh.push((id, occurred_at, item));
    }
    if fresh.is_empty() {
        return Ok(());
    }

    // Nothing is marked until both tables are loaded.
    let (table, subscriptions) = match load_tables(ctx, kind).await {
        Ok(tables) => tables,
        Err(e) => {
            // Fetched in full again next cycle.
            if let Err(err) = ctx.etags.forget(&source.fetched_keys()).await {
                log::error!("failed to reset {} validators: {:?}", kind.name(), err);
            }
            return Err(e);
        }
    };

    for (id, occurred_at, item) in fresh {
        // Recorded before delivery: a failed send is not retried next cycle.
        if let Err(e) = ctx
            .notified
            .mark_notified(&id, occurred_at.timestamp_millis(), category)
            .await
        {
            log::error!("failed to record {} {id}: {:?}", kind.name(), e);
            continue;
        }
        let event = match source.normalize(ctx, item).await {
            Ok(event) => event,
            Err(e) => {
                log::error!("failed to normalize {} {id}: {:?}", kind.name(), e);
                continue;
            }
        };
        summary.fresh += 1;

        let Some(identity) = table.resolve(&event.author, &event.email, &event.username) else {
            continue;
        };
        let message = source.message(&event);
        for channel in subscriptions.channels_for(&identity) {
            match ctx.chat.send_message(&channel, &message).await {
                Ok(()) => summary.delivered += 1,
                Err(e) => log::error!(
                    "failed to deliver {} {} to {channel}: {:?}",
                    kind.name(),
                    event.id,
                    e
                ),
            }
        }
    }
    Ok(())
}

async fn load_tables(
    ctx: &Context,
    kind: EventKind,
) -> anyhow::Result<(IdentityTable, Subscriptions)> {
    let table = identity::refresh(ctx).await?;
    let subscriptions = subscriptions::load(ctx, kind).await?;
    Ok((table, subscriptions))
}
