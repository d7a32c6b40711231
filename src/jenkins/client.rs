use super::{BuildServer, JobTree};
use anyhow::Context as _;
use async_trait::async_trait;
use reqwest::{Client, Proxy};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing as log;

/// Only the fields the correlation engine reads are requested.
const TREE_QUERY: &str = "jobs[builds[actions[causes[shortDescription]],number,timestamp,\
result,url,changeSet[items[msg,author[fullName,absoluteUrl]]{0}],fullDisplayName]]";

#[derive(Clone)]
pub struct JenkinsClient {
    client: Client,
    base_url: String,
    user: String,
    token: SecretString,
}

impl JenkinsClient {
    pub fn new(
        base_url: String,
        user: String,
        token: SecretString,
        timeout: Duration,
        proxy: Option<&str>,
    ) -> anyhow::Result<Self> {
        let mut builder = Client::builder().timeout(timeout);
        if let Some(proxy) = proxy {
            builder = builder.proxy(Proxy::http(proxy).context("invalid build server proxy")?);
        }
        Ok(JenkinsClient {
            client: builder.build().context("building build server http client")?,
            base_url,
            user,
            token,
        })
    }

    async fn json<T: DeserializeOwned>(&self, url: &str) -> anyhow::Result<T> {
        log::trace!("get {:?}", url);
        let resp = self
            .client
            .get(url)
            .basic_auth(&self.user, Some(self.token.expose_secret()))
            .send()
            .await
            .with_context(|| format!("requesting {url}"))?
            .error_for_status()?;
        let body = resp
            .bytes()
            .await
            .with_context(|| format!("failed to read response body {url}"))?;
        crate::deserialize_payload(&body).with_context(|| format!("decoding {url}"))
    }
}

#[async_trait]
impl BuildServer for JenkinsClient {
    async fn job_tree(&self) -> anyhow::Result<JobTree> {
        self.json(&format!("{}/api/json?tree={TREE_QUERY}", self.base_url))
            .await
    }

    async fn numeric_artifact(&self, job: &str, number: u64, name: &str) -> anyhow::Result<i64> {
        self.json(&format!(
            "{}/job/{job}/{number}/artifact/{name}",
            self.base_url
        ))
        .await
    }
}
