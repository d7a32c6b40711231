use super::{MessageApiResponse, Messenger};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

#[derive(Clone)]
pub struct SlackClient {
    client: Client,
    api_url: String,
    bot_api_token: SecretString,
}

impl SlackClient {
    pub fn new(
        api_url: String,
        bot_api_token: SecretString,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("building Slack http client")?;
        Ok(Self {
            client,
            api_url,
            bot_api_token,
        })
    }
}

#[async_trait]
impl Messenger for SlackClient {
    async fn send_message(&self, channel: &str, content: &str) -> anyhow::Result<()> {
        #[derive(serde::Serialize)]
        struct SerializedApi<'a> {
            token: &'a str,
            channel: &'a str,
            text: &'a str,
            as_user: bool,
            link_names: u8,
        }

        let response = self
            .client
            .post(format!("{}/chat.postMessage", self.api_url))
            .form(&SerializedApi {
                token: self.bot_api_token.expose_secret(),
                channel,
                text: content,
                as_user: true,
                link_names: 1,
            })
            .send()
            .await
            .context("fail sending Slack message")?;

        let response = deserialize_response(response).await?;
        if !response.ok {
            anyhow::bail!(
                "Slack rejected message to {channel}: {}",
                response.error.as_deref().unwrap_or("unknown error")
            );
        }
        Ok(())
    }
}

async fn deserialize_response(response: Response) -> anyhow::Result<MessageApiResponse> {
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.context("Slack API request failed")?;
        Err(anyhow::anyhow!(body))
    } else {
        response
            .json::<MessageApiResponse>()
            .await
            .context("Failed to deserialize Slack response")
    }
}
