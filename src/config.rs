use secrecy::SecretString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub static CONFIG_FILE_NAME: &str = "notifybot.toml";

#[derive(PartialEq, Eq, Debug, serde::Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    /// Directory holding the validator mapping, the notified-event files and
    /// the cached identity/subscription tables.
    pub state_dir: PathBuf,
    pub http_timeout_secs: u64,
    pub github_interval_secs: u64,
    pub builds_interval_secs: u64,
    /// Platform usernames that never trigger an unknown-user warning.
    pub ignored_users: Vec<String>,
    pub github: GithubConfig,
    pub jenkins: JenkinsConfig,
    pub slack: SlackConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            state_dir: PathBuf::from("."),
            http_timeout_secs: 10,
            github_interval_secs: 60,
            builds_interval_secs: 10,
            ignored_users: vec![
                "noreply".to_string(),
                "deploybot".to_string(),
                "dependabot[bot]".to_string(),
            ],
            github: GithubConfig::default(),
            jenkins: JenkinsConfig::default(),
            slack: SlackConfig::default(),
        }
    }
}

#[derive(PartialEq, Eq, Debug, serde::Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct GithubConfig {
    pub api_url: String,
    pub org: String,
    pub commits_repo: String,
    pub commits_branch: String,
    /// Repository holding `mapping.csv` and the `*_subscriptions.yaml` tables.
    pub mapping_repo: String,
    /// Repository whose issues carry the assignees of a build.
    pub issues_repo: String,
    pub max_age_secs: i64,
}

impl Default for GithubConfig {
    fn default() -> Self {
        GithubConfig {
            api_url: "https://api.github.com".to_string(),
            org: String::new(),
            commits_repo: String::new(),
            commits_branch: "master".to_string(),
            mapping_repo: "slack-mapping".to_string(),
            issues_repo: String::new(),
            max_age_secs: 100,
        }
    }
}

#[derive(PartialEq, Eq, Debug, serde::Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct JenkinsConfig {
    pub url: String,
    pub user: String,
    /// 1_000_000ms is about 15 minutes, long enough to catch slow builds.
    pub max_age_ms: i64,
    pub timeout_secs: u64,
    pub primary_branch: String,
    /// Build authors are mailed at `<username>@<email-domain>`.
    pub email_domain: String,
    pub channel: String,
    pub pipeline: PipelineConfig,
}

impl Default for JenkinsConfig {
    fn default() -> Self {
        JenkinsConfig {
            url: String::new(),
            user: String::new(),
            max_age_ms: 1_000_000,
            timeout_secs: 3,
            primary_branch: "master".to_string(),
            email_domain: String::new(),
            channel: "#build-notifications".to_string(),
            pipeline: PipelineConfig::default(),
        }
    }
}

#[derive(PartialEq, Eq, Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PipelineConfig {
    /// The syntax-check job that fans out into the stage jobs.
    pub upstream_job: String,
    /// Text a cause description must contain (besides "upstream") to name
    /// the upstream job.
    pub upstream_marker: String,
    /// Text identifying a build started by the flaky-test retry plugin.
    pub retry_marker: String,
    /// The only job that is ever retried automatically.
    pub retry_job: String,
    pub core_marker: String,
    /// Jobs containing this marker report through another channel.
    pub excluded_marker: String,
    /// Every one of these must succeed for the same upstream build.
    pub stages: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            upstream_job: "Core-SyntaxCheck-PHP-DevCloud".to_string(),
            upstream_marker: "Syntax".to_string(),
            retry_marker: "Naginator".to_string(),
            retry_job: "Core-Acceptance-PHP-DevCloud".to_string(),
            core_marker: "Core".to_string(),
            excluded_marker: "CodeSize".to_string(),
            stages: [
                "Acceptance",
                "CodeSniff",
                "Unit-JS",
                "Unit-PHP",
                "API-Functional",
                "API-Unit",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

#[derive(PartialEq, Eq, Debug, serde::Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SlackConfig {
    pub api_url: String,
}

impl Default for SlackConfig {
    fn default() -> Self {
        SlackConfig {
            api_url: "https://slack.com/api".to_string(),
        }
    }
}

impl Config {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn state_path(&self, file: &str) -> PathBuf {
        self.state_dir.join(file)
    }
}

/// Loads the configuration file at `path`.
///
/// A missing file yields the defaults, anything unparsable is an error.
pub fn load(path: &Path) -> Result<Config, ConfigurationError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!("no {} found, using defaults", path.display());
            return Ok(Config::default());
        }
        Err(e) => return Err(ConfigurationError::Io(path.to_path_buf(), e.to_string())),
    };
    let config = toml::from_str::<Config>(&contents).map_err(ConfigurationError::Toml)?;
    tracing::debug!("configuration from {}: {:?}", path.display(), config);
    Ok(config)
}

/// Reads a required secret from the environment.
pub fn secret_from_env(var: &'static str) -> Result<SecretString, ConfigurationError> {
    std::env::var(var)
        .map(SecretString::from)
        .map_err(|_| ConfigurationError::MissingEnv(var))
}

#[derive(Clone, Debug)]
pub enum ConfigurationError {
    Io(PathBuf, String),
    Toml(toml::de::Error),
    MissingEnv(&'static str),
}

impl std::error::Error for ConfigurationError {}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigurationError::Io(path, e) => {
                write!(f, "Failed to read `{}`: {}", path.display(), e)
            }
            ConfigurationError::Toml(e) => {
                write!(f, "Malformed `{}`.\n{}", CONFIG_FILE_NAME, e)
            }
            ConfigurationError::MissingEnv(var) => {
                write!(f, "The `{var}` environment variable is not set.")
            }
        }
    }
}
