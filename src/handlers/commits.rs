//! Commits pushed to the primary branch of the main repository.

use super::pipeline::{EventSource, NormalizedEvent};
use super::{Context, EventKind};
use crate::github::GithubCommit;
use crate::state::EventId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub struct CommitSource {
    repo: String,
    branch: String,
    fetched: Vec<String>,
}

impl CommitSource {
    pub fn new(ctx: &Context) -> Self {
        CommitSource {
            repo: ctx.config.github.commits_repo.clone(),
            branch: ctx.config.github.commits_branch.clone(),
            fetched: Vec::new(),
        }
    }
}

#[async_trait]
impl EventSource for CommitSource {
    type Item = GithubCommit;

    const KIND: EventKind = EventKind::Commit;

    async fn fetch(&mut self, ctx: &Context) -> anyhow::Result<Vec<GithubCommit>> {
        let key = format!("{}-commits", self.repo);
        let commits = ctx
            .etags
            .fetch_if_changed(&key, |etag| {
                ctx.github.commits(&self.repo, &self.branch, etag)
            })
            .await?;
        self.fetched.clear();
        match commits {
            Some(commits) => {
                self.fetched.push(key);
                Ok(commits)
            }
            None => Ok(Vec::new()),
        }
    }

    fn fetched_keys(&self) -> Vec<String> {
        self.fetched.clone()
    }

    fn occurred_at(&self, commit: &GithubCommit) -> DateTime<Utc> {
        commit.commit.author.date
    }

    fn id(&self, commit: &GithubCommit) -> EventId {
        EventId::from(commit.sha.as_str())
    }

    async fn normalize(
        &mut self,
        _ctx: &Context,
        commit: GithubCommit,
    ) -> anyhow::Result<NormalizedEvent> {
        Ok(NormalizedEvent {
            id: EventId::from(commit.sha),
            author: commit.commit.author.name,
            email: commit.commit.author.email,
            username: commit.author.map(|u| u.login).unwrap_or_default(),
            url: commit.html_url,
            body: None,
            occurred_at: commit.commit.author.date,
        })
    }

    fn message(&self, event: &NormalizedEvent) -> String {
        format!(
            "{} committed to {}: {}",
            event.display_name(),
            self.branch,
            event.url
        )
    }
}
