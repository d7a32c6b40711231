//! Build-server API: the tree of jobs and builds, plus per-build artifacts.

use async_trait::async_trait;
use std::fmt;

pub(crate) mod client;

pub use client::JenkinsClient;

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct JobTree {
    #[serde(default)]
    pub jobs: Vec<Job>,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct Job {
    #[serde(default)]
    pub builds: Vec<RawBuild>,
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBuild {
    #[serde(default)]
    pub actions: Vec<Action>,
    pub number: u64,
    /// Milliseconds since epoch.
    pub timestamp: i64,
    /// `None` while the build is still running.
    pub result: Option<BuildResult>,
    pub url: String,
    #[serde(default)]
    pub change_set: ChangeSet,
    pub full_display_name: String,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct Action {
    #[serde(default)]
    pub causes: Vec<Cause>,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cause {
    #[serde(default)]
    pub short_description: String,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct ChangeSet {
    #[serde(default)]
    pub items: Vec<ChangeSetItem>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ChangeSetItem {
    /// The commit message, which is the title of the associated issue.
    #[serde(default)]
    pub msg: String,
    pub author: ChangeSetAuthor,
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSetAuthor {
    pub full_name: String,
    pub absolute_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildResult {
    Success,
    Failure,
    Unstable,
    Aborted,
    NotBuilt,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for BuildResult {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            BuildResult::Success => "SUCCESS",
            BuildResult::Failure => "FAILURE",
            BuildResult::Unstable => "UNSTABLE",
            BuildResult::Aborted => "ABORTED",
            BuildResult::NotBuilt => "NOT_BUILT",
            BuildResult::Unknown => "UNKNOWN",
        })
    }
}

/// Operations the build poller needs from the build server.
#[async_trait]
pub trait BuildServer: Send + Sync {
    /// Every job with its recent builds, in one request.
    async fn job_tree(&self) -> anyhow::Result<JobTree>;

    /// A numeric artifact (such as a retry counter) archived by a build.
    async fn numeric_artifact(&self, job: &str, number: u64, name: &str) -> anyhow::Result<i64>;
}
