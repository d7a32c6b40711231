//! Pull requests opened in any repository of the organization.

use super::pipeline::{EventSource, NormalizedEvent};
use super::users::{UserCache, repo_names};
use super::{Context, EventKind};
use crate::github::PullRequest;
use crate::state::EventId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing as log;

#[derive(Default)]
pub struct PullSource {
    users: UserCache,
    fetched: Vec<String>,
}

#[async_trait]
impl EventSource for PullSource {
    type Item = PullRequest;

    const KIND: EventKind = EventKind::Pull;

    async fn fetch(&mut self, ctx: &Context) -> anyhow::Result<Vec<PullRequest>> {
        let mut pulls = Vec::new();
        self.fetched.clear();
        for repo in repo_names(ctx).await? {
            let key = format!("{repo}-pulls");
            let fetched = ctx
                .etags
                .fetch_if_changed(&key, |etag| ctx.github.pulls(&repo, etag))
                .await;
            match fetched {
                Ok(Some(new)) => {
                    pulls.extend(new);
                    self.fetched.push(key);
                }
                Ok(None) => {}
                Err(e) => log::error!("failed to list pull requests of {repo}: {:?}", e),
            }
        }
        Ok(pulls)
    }

    fn fetched_keys(&self) -> Vec<String> {
        self.fetched.clone()
    }

    fn occurred_at(&self, pull: &PullRequest) -> DateTime<Utc> {
        pull.created_at
    }

    fn id(&self, pull: &PullRequest) -> EventId {
        EventId::from(pull.id)
    }

    async fn normalize(
        &mut self,
        ctx: &Context,
        pull: PullRequest,
    ) -> anyhow::Result<NormalizedEvent> {
        // The list endpoint omits the author's name and email.
        let detail = self.users.get(ctx, &pull.user.login).await?;
        Ok(NormalizedEvent {
            author: detail.name.clone(),
            email: detail.email.clone(),
            username: pull.user.login,
            url: pull.html_url,
            body: None,
            id: EventId::from(pull.id),
            occurred_at: pull.created_at,
        })
    }

    fn message(&self, event: &NormalizedEvent) -> String {
        format!(
            "{} opened a pull request: {}",
            event.display_name(),
            event.url
        )
    }
}
