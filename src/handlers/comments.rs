//! Issue and pull request comments in any repository of the organization.

use super::pipeline::{EventSource, NormalizedEvent};
use super::users::{UserCache, repo_names};
use super::{Context, EventKind};
use crate::github::IssueComment;
use crate::state::EventId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing as log;

#[derive(Default)]
pub struct CommentSource {
    users: UserCache,
    fetched: Vec<String>,
}

#[async_trait]
impl EventSource for CommentSource {
    type Item = IssueComment;

    const KIND: EventKind = EventKind::Comment;

    async fn fetch(&mut self, ctx: &Context) -> anyhow::Result<Vec<IssueComment>> {
        let mut comments = Vec::new();
        self.fetched.clear();
        for repo in repo_names(ctx).await? {
            let key = format!("{repo}-comments");
            let fetched = ctx
                .etags
                .fetch_if_changed(&key, |etag| ctx.github.issue_comments(&repo, etag))
                .await;
            match fetched {
                Ok(Some(new)) => {
                    comments.extend(new);
                    self.fetched.push(key);
                }
                Ok(None) => {}
                Err(e) => log::error!("failed to list comments of {repo}: {:?}", e),
            }
        }
        Ok(comments)
    }

    fn fetched_keys(&self) -> Vec<String> {
        self.fetched.clone()
    }

    fn occurred_at(&self, comment: &IssueComment) -> DateTime<Utc> {
        comment.created_at
    }

    fn id(&self, comment: &IssueComment) -> EventId {
        EventId::from(comment.id)
    }

    async fn normalize(
        &mut self,
        ctx: &Context,
        comment: IssueComment,
    ) -> anyhow::Result<NormalizedEvent> {
        let detail = self.users.get(ctx, &comment.user.login).await?;
        Ok(NormalizedEvent {
            author: detail.name.clone(),
            email: detail.email.clone(),
            username: comment.user.login,
            url: comment.html_url,
            body: Some(comment.body),
            id: EventId::from(comment.id),
            occurred_at: comment.created_at,
        })
    }

    fn message(&self, event: &NormalizedEvent) -> String {
        format!(
            "{} made a comment: ```{}``` {}",
            event.display_name(),
            event.body.as_deref().unwrap_or_default(),
            event.url
        )
    }
}
