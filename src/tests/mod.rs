//! In-memory collaborators and fixtures shared by the unit tests.

use crate::config::{Config, GithubConfig, JenkinsConfig};
use crate::github::{
    GithubCommit, Issue, IssueComment, PullRequest, Repository, SourceHost, User, UserDetail,
};
use crate::handlers::Context;
use crate::jenkins::{BuildServer, JobTree};
use crate::slack::Messenger;
use crate::state::Conditional;
use anyhow::Context as _;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};


pub use github::{comment, commit, pull};
pub use jenkins::raw_build;

/// A source host serving whatever the test put in it. Every request is
/// logged so tests can assert on what was (not) fetched.
///
/// Each setter bumps the version of what it replaced. Conditional requests
/// get `"{resource}@{version}"` as their `ETag` and are answered "not
/// modified" when they present the current one.
#[derive(Default)]
pub struct FakeHost {
    versions: Mutex<HashMap<String, u64>>,
    commits: Mutex<Vec<GithubCommit>>,
    pulls: Mutex<BTreeMap<String, Vec<PullRequest>>>,
    comments: Mutex<BTreeMap<String, Vec<IssueComment>>>,
    users: Mutex<HashMap<String, UserDetail>>,
    issues: Mutex<HashMap<String, Vec<Issue>>>,
    files: Mutex<HashMap<String, Vec<u8>>>,
    requests: Mutex<Vec<String>>,
}

impl FakeHost {
    pub fn set_commits(&self, commits: Vec<GithubCommit>) {
        *self.commits.lock().unwrap() = commits;
        self.bump("commits");
    }

    pub fn set_pulls(&self, repo: &str, pulls: Vec<PullRequest>) {
        self.pulls.lock().unwrap().insert(repo.to_string(), pulls);
        self.bump(&format!("pulls/{repo}"));
    }

    pub fn set_comments(&self, repo: &str, comments: Vec<IssueComment>) {
        self.comments.lock().unwrap().insert(repo.to_string(), comments);
        self.bump(&format!("comments/{repo}"));
    }

    pub fn set_user(&self, login: &str, name: &str, email: &str) {
        self.users.lock().unwrap().insert(
            login.to_string(),
            UserDetail {
                login: login.to_string(),
                name: name.to_string(),
                email: email.to_string(),
            },
        );
    }

    pub fn set_issue(&self, repo: &str, title: &str, assignees: &[&str]) {
        let issue = Issue {
            title: title.to_string(),
            assignees: assignees
                .iter()
                .map(|login| User {
                    login: login.to_string(),
                })
                .collect(),
        };
        self.issues
            .lock()
            .unwrap()
            .entry(repo.to_string())
            .or_default()
            .push(issue);
    }

    pub fn set_file(&self, path: &str, contents: &str) {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), contents.as_bytes().to_vec());
        self.bump(&format!("files/{path}"));
    }

    pub fn requested(&self, request: &str) -> bool {
        self.request_count(request) > 0
    }

    pub fn request_count(&self, request: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| *r == request)
            .count()
    }

    fn log(&self, request: String) {
        self.requests.lock().unwrap().push(request);
    }

    fn bump(&self, resource: &str) {
        *self
            .versions
            .lock()
            .unwrap()
            .entry(resource.to_string())
            .or_default() += 1;
    }

    fn respond<T>(&self, resource: &str, etag: Option<String>, body: T) -> Conditional<T> {
        let version = self
            .versions
            .lock()
            .unwrap()
            .get(resource)
            .copied()
            .unwrap_or_default();
        let current = format!("\"{resource}@{version}\"");
        if etag.as_deref() == Some(current.as_str()) {
            Conditional::unchanged(Some(current))
        } else {
            Conditional::changed(Some(current), body)
        }
    }
}

#[async_trait]
impl SourceHost for FakeHost {
    async fn commits(
        &self,
        repo: &str,
        _branch: &str,
        etag: Option<String>,
    ) -> anyhow::Result<Conditional<Vec<GithubCommit>>> {
        self.log(format!("repos/{repo}/commits"));
        let commits = self.commits.lock().unwrap().clone();
        Ok(self.respond("commits", etag, commits))
    }

    async fn pulls(
        &self,
        repo: &str,
        etag: Option<String>,
    ) -> anyhow::Result<Conditional<Vec<PullRequest>>> {
        self.log(format!("repos/{repo}/pulls"));
        let pulls = self.pulls.lock().unwrap().get(repo).cloned();
        Ok(self.respond(&format!("pulls/{repo}"), etag, pulls.unwrap_or_default()))
    }

    async fn issue_comments(
        &self,
        repo: &str,
        etag: Option<String>,
    ) -> anyhow::Result<Conditional<Vec<IssueComment>>> {
        self.log(format!("repos/{repo}/issues/comments"));
        let comments = self.comments.lock().unwrap().get(repo).cloned();
        Ok(self.respond(
            &format!("comments/{repo}"),
            etag,
            comments.unwrap_or_default(),
        ))
    }

    async fn org_repos(&self) -> anyhow::Result<Vec<Repository>> {
        self.log("repos".to_string());
        let mut names = BTreeSet::new();
        names.extend(self.pulls.lock().unwrap().keys().cloned());
        names.extend(self.comments.lock().unwrap().keys().cloned());
        Ok(names.into_iter().map(|name| Repository { name }).collect())
    }

    async fn user(&self, login: &str) -> anyhow::Result<UserDetail> {
        self.log(format!("users/{login}"));
        self.users
            .lock()
            .unwrap()
            .get(login)
            .cloned()
            .with_context(|| format!("no such user {login}"))
    }

    async fn issues(&self, repo: &str) -> anyhow::Result<Vec<Issue>> {
        self.log(format!("repos/{repo}/issues"));
        Ok(self
            .issues
            .lock()
            .unwrap()
            .get(repo)
            .cloned()
            .unwrap_or_default())
    }

    async fn file_contents(
        &self,
        _repo: &str,
        path: &str,
        etag: Option<String>,
    ) -> anyhow::Result<Conditional<Vec<u8>>> {
        self.log(path.to_string());
        let contents = self
            .files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .with_context(|| format!("no such file {path}"))?;
        Ok(self.respond(&format!("files/{path}"), etag, contents))
    }
}

#[derive(Default)]
pub struct FakeBuildServer {
    tree: Mutex<JobTree>,
    artifacts: Mutex<HashMap<(String, u64, String), i64>>,
}

impl FakeBuildServer {
    pub fn set_tree(&self, tree: JobTree) {
        *self.tree.lock().unwrap() = tree;
    }

    pub fn set_artifact(&self, job: &str, number: u64, name: &str, value: i64) {
        self.artifacts
            .lock()
            .unwrap()
            .insert((job.to_string(), number, name.to_string()), value);
    }
}

#[async_trait]
impl BuildServer for FakeBuildServer {
    async fn job_tree(&self) -> anyhow::Result<JobTree> {
        Ok(self.tree.lock().unwrap().clone())
    }

    async fn numeric_artifact(&self, job: &str, number: u64, name: &str) -> anyhow::Result<i64> {
        self.artifacts
            .lock()
            .unwrap()
            .get(&(job.to_string(), number, name.to_string()))
            .copied()
            .with_context(|| format!("no artifact {name} for {job} #{number}"))
    }
}

/// Records every message instead of sending it.
#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<(String, String)>>,
    failing: AtomicBool,
}

impl RecordingMessenger {
    /// Channel and text of every message delivered so far.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Makes every following delivery fail (or succeed again).
    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_message(&self, channel: &str, content: &str) -> anyhow::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("channel_not_found");
        }
        self.sent
            .lock()
            .unwrap()
            .push((channel.to_string(), content.to_string()));
        Ok(())
    }
}

/// Fakes for the three collaborators plus a scratch state directory.
pub struct TestContext {
    dir: tempfile::TempDir,
    pub github: Arc<FakeHost>,
    pub jenkins: Arc<FakeBuildServer>,
    pub chat: Arc<RecordingMessenger>,
}

impl TestContext {
    pub fn new() -> Self {
        TestContext {
            dir: tempfile::tempdir().expect("Cannot create state directory"),
            github: Arc::new(FakeHost::default()),
            jenkins: Arc::new(FakeBuildServer::default()),
            chat: Arc::new(RecordingMessenger::default()),
        }
    }

    pub fn config(&self) -> Config {
        Config {
            state_dir: self.dir.path().to_path_buf(),
            github: GithubConfig {
                org: "acme".to_string(),
                commits_repo: "web".to_string(),
                mapping_repo: "notify-config".to_string(),
                issues_repo: "web".to_string(),
                ..GithubConfig::default()
            },
            jenkins: JenkinsConfig {
                url: "http://ci.test".to_string(),
                user: "notifybot".to_string(),
                email_domain: "acme.test".to_string(),
                ..JenkinsConfig::default()
            },
            ..Config::default()
        }
    }

    pub async fn context(&self) -> Context {
        Context::new(
            self.config(),
            self.github.clone(),
            self.jenkins.clone(),
            self.chat.clone(),
        )
        .await
    }
}
