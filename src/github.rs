//! Source-hosting API: payload schemas and the collaborator trait the
//! pollers talk to.

use crate::state::Conditional;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub(crate) mod client;
pub(crate) mod utils;

pub use client::GithubClient;

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct User {
    pub login: String,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct GithubCommit {
    pub sha: String,
    pub html_url: String,
    pub commit: GithubCommitCommitField,
    /// `None` when the commit email is not linked to an account.
    pub author: Option<User>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct GithubCommitCommitField {
    pub author: GitUser,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct GitUser {
    #[serde(default, deserialize_with = "utils::opt_string")]
    pub name: String,
    #[serde(default, deserialize_with = "utils::opt_string")]
    pub email: String,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct PullRequest {
    pub id: u64,
    pub html_url: String,
    pub created_at: DateTime<Utc>,
    pub user: User,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct IssueComment {
    pub id: u64,
    pub html_url: String,
    pub created_at: DateTime<Utc>,
    pub user: User,
    #[serde(default, deserialize_with = "utils::opt_string")]
    pub body: String,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Repository {
    pub name: String,
}

/// The profile of an account, used because list endpoints omit emails.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct UserDetail {
    pub login: String,
    #[serde(default, deserialize_with = "utils::opt_string")]
    pub name: String,
    #[serde(default, deserialize_with = "utils::opt_string")]
    pub email: String,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Issue {
    pub title: String,
    #[serde(default)]
    pub assignees: Vec<User>,
}

/// Operations the pollers need from the source-hosting API.
///
/// Methods taking an `etag` send it as `If-None-Match` and report "not
/// modified" as [`Conditional::unchanged`].
#[async_trait]
pub trait SourceHost: Send + Sync {
    async fn commits(
        &self,
        repo: &str,
        branch: &str,
        etag: Option<String>,
    ) -> anyhow::Result<Conditional<Vec<GithubCommit>>>;

    async fn pulls(
        &self,
        repo: &str,
        etag: Option<String>,
    ) -> anyhow::Result<Conditional<Vec<PullRequest>>>;

    /// The newest page of issue comments for `repo`. `etag` validates that
    /// page, not the first one.
    async fn issue_comments(
        &self,
        repo: &str,
        etag: Option<String>,
    ) -> anyhow::Result<Conditional<Vec<IssueComment>>>;

    /// Every repository of the organization, following pagination.
    async fn org_repos(&self) -> anyhow::Result<Vec<Repository>>;

    async fn user(&self, login: &str) -> anyhow::Result<UserDetail>;

    async fn issues(&self, repo: &str) -> anyhow::Result<Vec<Issue>>;

    /// The decoded contents of `path` in `repo`.
    async fn file_contents(
        &self,
        repo: &str,
        path: &str,
        etag: Option<String>,
    ) -> anyhow::Result<Conditional<Vec<u8>>>;
}
