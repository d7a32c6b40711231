use super::{
    GithubCommit, Issue, IssueComment, PullRequest, Repository, SourceHost, UserDetail, utils,
};
use crate::state::Conditional;
use anyhow::Context as _;
use async_trait::async_trait;
use base64::Engine as _;
use reqwest::header::{
    AUTHORIZATION, ETAG, HeaderMap, HeaderValue, IF_NONE_MATCH, LINK, USER_AGENT,
};
use reqwest::{Client, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing as log;

#[derive(Clone)]
pub struct GithubClient {
    auth: HeaderValue,
    client: Client,
    api_url: String,
    org: String,
}

/// A response whose status was either successful or "not modified".
struct RawResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl RawResponse {
    fn etag(&self) -> Option<String> {
        self.headers
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    fn link(&self, rel: &str) -> Option<String> {
        self.headers
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(|h| utils::link_url(h, rel))
    }

    fn decode<T: DeserializeOwned>(&self) -> anyhow::Result<T> {
        crate::deserialize_payload(&self.body)
    }
}

impl GithubClient {
    pub fn new(
        token: SecretString,
        api_url: String,
        org: String,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("building GitHub http client")?;
        let mut auth = HeaderValue::from_str(&format!("token {}", token.expose_secret()))
            .context("GitHub token is not a valid header value")?;
        auth.set_sensitive(true);
        Ok(GithubClient {
            auth,
            client,
            api_url,
            org,
        })
    }

    async fn send_req(&self, req: RequestBuilder) -> anyhow::Result<RawResponse> {
        log::debug!("send_req with {:?}", req);
        let req_dbg = format!("{req:?}");
        let resp = req
            .send()
            .await
            .with_context(|| format!("sending {req_dbg}"))?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let maybe_err = if status == StatusCode::NOT_MODIFIED {
            None
        } else {
            resp.error_for_status_ref().err()
        };
        let body = resp
            .bytes()
            .await
            .with_context(|| format!("failed to read response body {req_dbg}"))?
            .to_vec();
        if let Some(e) = maybe_err {
            return Err(anyhow::Error::new(e))
                .with_context(|| format!("response: {}", String::from_utf8_lossy(&body)));
        }
        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }

    async fn json<T: DeserializeOwned>(&self, url: &str) -> anyhow::Result<T> {
        self.send_req(self.get(url))
            .await?
            .decode()
            .with_context(|| format!("decoding {url}"))
    }

    async fn conditional<T: DeserializeOwned>(
        &self,
        url: &str,
        etag: Option<String>,
    ) -> anyhow::Result<Conditional<T>> {
        let mut req = self.get(url);
        if let Some(etag) = etag {
            req = req.header(IF_NONE_MATCH, etag);
        }
        let resp = self.send_req(req).await?;
        if resp.status == StatusCode::NOT_MODIFIED {
            return Ok(Conditional::unchanged(resp.etag()));
        }
        let body = resp.decode().with_context(|| format!("decoding {url}"))?;
        Ok(Conditional::changed(resp.etag(), body))
    }

    fn repo_url(&self, repo: &str) -> String {
        format!("{}/repos/{}/{}", self.api_url, self.org, repo)
    }

    fn get(&self, url: &str) -> RequestBuilder {
        log::trace!("get {:?}", url);
        self.client.get(url).configure(self)
    }
}

#[async_trait]
impl SourceHost for GithubClient {
    async fn commits(
        &self,
        repo: &str,
        branch: &str,
        etag: Option<String>,
    ) -> anyhow::Result<Conditional<Vec<GithubCommit>>> {
        let url = format!("{}/commits?sha={branch}", self.repo_url(repo));
        self.conditional(&url, etag).await
    }

    async fn pulls(
        &self,
        repo: &str,
        etag: Option<String>,
    ) -> anyhow::Result<Conditional<Vec<PullRequest>>> {
        let url = format!("{}/pulls", self.repo_url(repo));
        self.conditional(&url, etag).await
    }

    async fn issue_comments(
        &self,
        repo: &str,
        etag: Option<String>,
    ) -> anyhow::Result<Conditional<Vec<IssueComment>>> {
        // The newest comments are on the last page, so the validator belongs
        // to that page. The first page is only asked for its `Link` header.
        let url = format!("{}/issues/comments", self.repo_url(repo));
        let first = self.send_req(self.get(&url)).await?;
        match first.link("last") {
            Some(last) => self.conditional(&last, etag).await,
            None => {
                let comments = first
                    .decode()
                    .with_context(|| format!("decoding {url}"))?;
                Ok(Conditional::changed(first.etag(), comments))
            }
        }
    }

    async fn org_repos(&self) -> anyhow::Result<Vec<Repository>> {
        let mut url = format!("{}/orgs/{}/repos?per_page=100", self.api_url, self.org);
        let mut repos = Vec::new();
        loop {
            let resp = self.send_req(self.get(&url)).await?;
            let page: Vec<Repository> = resp
                .decode()
                .with_context(|| format!("failed to list repositories from {url}"))?;
            repos.extend(page);
            match resp.link("next") {
                Some(next) => url = next,
                None => break,
            }
        }
        Ok(repos)
    }

    async fn user(&self, login: &str) -> anyhow::Result<UserDetail> {
        self.json(&format!("{}/users/{login}", self.api_url)).await
    }

    async fn issues(&self, repo: &str) -> anyhow::Result<Vec<Issue>> {
        self.json(&format!("{}/issues", self.repo_url(repo))).await
    }

    async fn file_contents(
        &self,
        repo: &str,
        path: &str,
        etag: Option<String>,
    ) -> anyhow::Result<Conditional<Vec<u8>>> {
        #[derive(serde::Deserialize)]
        struct Contents {
            content: String,
        }

        let url = format!("{}/contents/{path}", self.repo_url(repo));
        let result = self.conditional::<Contents>(&url, etag).await?;
        let body = match result.body {
            Some(contents) => {
                // The API wraps the base64 text every 60 characters.
                let encoded: String = contents
                    .content
                    .chars()
                    .filter(|c| !c.is_ascii_whitespace())
                    .collect();
                Some(
                    base64::engine::general_purpose::STANDARD
                        .decode(encoded)
                        .with_context(|| format!("decoding contents of {path}"))?,
                )
            }
            None => None,
        };
        Ok(Conditional {
            etag: result.etag,
            body,
        })
    }
}

trait RequestSend: Sized {
    fn configure(self, g: &GithubClient) -> Self;
}

impl RequestSend for RequestBuilder {
    fn configure(self, g: &GithubClient) -> RequestBuilder {
        self.header(USER_AGENT, "notifybot")
            .header(AUTHORIZATION, g.auth.clone())
    }
}
