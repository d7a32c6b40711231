use crate::config::Config;
use crate::github::SourceHost;
use crate::jenkins::BuildServer;
use crate::slack::Messenger;
use crate::state::{Category, EtagCache, NotifiedStore, etags::ETAGS_FILE};
use crate::tables::MirrorLocks;
use chrono::Utc;
use std::sync::Arc;
use tracing as log;

mod comments;
mod commits;
pub mod pipeline;
mod pulls;
mod users;

pub use comments::CommentSource;
pub use commits::CommitSource;
pub use pipeline::{EventSource, NormalizedEvent, Summary};
pub use pulls::PullSource;

/// The kinds of source-hosting events that are polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Commit,
    Pull,
    Comment,
}

impl EventKind {
    /// Used for the subscription table and its conditional-fetch key.
    pub fn name(self) -> &'static str {
        match self {
            EventKind::Commit => "commit",
            EventKind::Pull => "pull",
            EventKind::Comment => "comment",
        }
    }

    pub fn category(self) -> Category {
        match self {
            EventKind::Commit => Category::Commits,
            EventKind::Pull => Category::Pulls,
            EventKind::Comment => Category::Comments,
        }
    }
}

pub struct Context {
    pub config: Config,
    pub github: Arc<dyn SourceHost>,
    pub jenkins: Arc<dyn BuildServer>,
    pub chat: Arc<dyn Messenger>,
    pub etags: EtagCache,
    pub notified: NotifiedStore,
    pub(crate) mirrors: MirrorLocks,
}

impl Context {
    /// Builds the context, loading the validator mapping from the state
    /// directory.
    pub async fn new(
        config: Config,
        github: Arc<dyn SourceHost>,
        jenkins: Arc<dyn BuildServer>,
        chat: Arc<dyn Messenger>,
    ) -> Self {
        let etags = EtagCache::load(config.state_path(ETAGS_FILE)).await;
        let notified = NotifiedStore::new(config.state_dir.clone());
        Context {
            config,
            github,
            jenkins,
            chat,
            etags,
            notified,
            mirrors: MirrorLocks::default(),
        }
    }
}

/// One polling cycle over commits, pull requests and comments.
///
/// A failing source is logged and does not stop the others.
pub async fn poll(ctx: &Context) {
    let now = Utc::now();

    let commits = pipeline::run(ctx, &mut CommitSource::new(ctx), now).await;
    log_outcome(EventKind::Commit, commits);

    let pulls = pipeline::run(ctx, &mut PullSource::default(), now).await;
    log_outcome(EventKind::Pull, pulls);

    let comments = pipeline::run(ctx, &mut CommentSource::default(), now).await;
    log_outcome(EventKind::Comment, comments);
}

fn log_outcome(kind: EventKind, outcome: anyhow::Result<Summary>) {
    match outcome {
        Ok(summary) => log::debug!("{} cycle: {:?}", kind.name(), summary),
        Err(e) => log::error!("failed to poll {} events: {:?}", kind.name(), e),
    }
}
