//! Chat delivery.

use async_trait::async_trait;

pub(crate) mod client;

pub use client::SlackClient;

/// Sends a text message to one chat channel.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_message(&self, channel: &str, content: &str) -> anyhow::Result<()>;
}

#[derive(Debug, serde::Deserialize)]
pub struct MessageApiResponse {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
}
