use crate::config::PipelineConfig;
use crate::jenkins::{Action, BuildResult, RawBuild};
use regex::Regex;
use std::sync::LazyLock;

static TRAILING_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\D*$").expect("Invalid regexp"));

/// One build execution, as the correlation engine sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRecord {
    /// Full display name, such as `Core-Unit-PHP-DevCloud #4410 (cart-fix)`.
    pub name: String,
    pub number: u64,
    pub result: Option<BuildResult>,
    pub timestamp: i64,
    pub url: String,
    pub author: String,
    pub username: String,
    pub branch: String,
    pub started_by_retry: bool,
    /// Number of the upstream syntax-check build, or 0 outside the pipeline.
    pub upstream: u64,
    /// Title of the associated issue.
    pub title: String,
}

impl BuildRecord {
    /// Returns `None` for builds that are not notified about: those without
    /// changes, without branch information, or of the excluded job.
    pub fn from_raw(raw: &RawBuild, pipeline: &PipelineConfig) -> Option<BuildRecord> {
        let change = raw.change_set.items.first()?;
        if raw.full_display_name.contains(&pipeline.excluded_marker) {
            return None;
        }
        let branch = branch_of(&raw.full_display_name)?;
        Some(BuildRecord {
            name: raw.full_display_name.clone(),
            number: raw.number,
            result: raw.result,
            timestamp: raw.timestamp,
            url: raw.url.clone(),
            author: change.author.full_name.clone(),
            username: username_from_url(&change.author.absolute_url),
            branch: branch.to_string(),
            started_by_retry: started_by_retry(&raw.actions, &pipeline.retry_marker),
            upstream: upstream_of(&raw.actions, &pipeline.upstream_marker),
            title: change.msg.clone(),
        })
    }

    pub fn is_core(&self, pipeline: &PipelineConfig) -> bool {
        self.name.contains(&pipeline.core_marker)
    }

    pub fn is_stage(&self, stage: &str) -> bool {
        self.name.contains(stage)
    }
}

/// The text between the first pair of parentheses.
fn branch_of(name: &str) -> Option<&str> {
    let (_, rest) = name.split_once('(')?;
    Some(rest.split(')').next().unwrap_or(rest))
}

/// The last path segment of a user URL such as `http://ci/user/jdoe`.
fn username_from_url(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()?
                .filter(|s| !s.is_empty())
                .last()
                .map(str::to_string)
        })
        .unwrap_or_default()
}

fn first_causes(actions: &[Action]) -> impl Iterator<Item = &str> {
    actions
        .iter()
        .filter_map(|a| a.causes.first())
        .map(|c| c.short_description.as_str())
}

fn started_by_retry(actions: &[Action], marker: &str) -> bool {
    first_causes(actions).any(|d| d.contains(marker))
}

fn upstream_of(actions: &[Action], marker: &str) -> u64 {
    first_causes(actions)
        .find(|d| d.contains("upstream") && d.contains(marker))
        .and_then(|d| TRAILING_NUMBER.captures(d))
        .and_then(|caps| caps[1].parse().ok())
        .unwrap_or(0)
}
