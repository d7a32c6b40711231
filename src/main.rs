use clap::{Parser, ValueEnum};
use notifybot::builds;
use notifybot::config::{self, Config, secret_from_env};
use notifybot::github::GithubClient;
use notifybot::handlers::{self, Context};
use notifybot::jenkins::JenkinsClient;
use notifybot::slack::SlackClient;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing as log;
use tracing_subscriber::EnvFilter;

/// Polls GitHub and Jenkins and forwards what happened to Slack.
#[derive(Parser, Debug)]
struct Opt {
    /// Path of the configuration file.
    #[arg(long, default_value = config::CONFIG_FILE_NAME)]
    config: PathBuf,

    /// Run a single cycle of each selected source, then exit.
    #[arg(long)]
    once: bool,

    /// Which sources to poll.
    #[arg(long, value_enum, default_value_t = Source::All)]
    source: Source,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Source {
    Github,
    Builds,
    All,
}

impl Source {
    fn github(self) -> bool {
        matches!(self, Source::Github | Source::All)
    }

    fn builds(self) -> bool {
        matches!(self, Source::Builds | Source::All)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let opt = Opt::parse();
    let config = config::load(&opt.config)?;
    let ctx = Arc::new(build_context(config).await?);

    if opt.once {
        if opt.source.github() {
            handlers::poll(&ctx).await;
        }
        if opt.source.builds() {
            builds::poll(&ctx).await;
        }
        return Ok(());
    }

    let mut tasks = Vec::new();
    if opt.source.github() {
        let ctx = ctx.clone();
        let period = Duration::from_secs(ctx.config.github_interval_secs);
        tasks.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                handlers::poll(&ctx).await;
            }
        }));
    }
    if opt.source.builds() {
        let ctx = ctx.clone();
        let period = Duration::from_secs(ctx.config.builds_interval_secs);
        tasks.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                builds::poll(&ctx).await;
            }
        }));
    }
    log::info!("polling started");
    for task in tasks {
        task.await?;
    }
    Ok(())
}

async fn build_context(config: Config) -> anyhow::Result<Context> {
    let github = GithubClient::new(
        secret_from_env("GITHUB_TOKEN")?,
        config.github.api_url.clone(),
        config.github.org.clone(),
        config.http_timeout(),
    )?;
    let proxy = std::env::var("JENKINS_PROXY").ok();
    let jenkins = JenkinsClient::new(
        config.jenkins.url.clone(),
        config.jenkins.user.clone(),
        secret_from_env("JENKINS_API_TOKEN")?,
        Duration::from_secs(config.jenkins.timeout_secs),
        proxy.as_deref(),
    )?;
    let slack = SlackClient::new(
        config.slack.api_url.clone(),
        secret_from_env("SLACK_API_TOKEN")?,
        config.http_timeout(),
    )?;
    Ok(Context::new(config, Arc::new(github), Arc::new(jenkins), Arc::new(slack)).await)
}
