//! Build notifications: correlates the builds of the test pipeline and
//! reports failures, aggregate successes and unusual results to their
//! authors.

use crate::handlers::Context;
use crate::identity::{self, IdentityTable};
use crate::jenkins::BuildResult;
use crate::state::{Category, EventId};
use anyhow::Context as _;
use chrono::Utc;
use tracing as log;

pub mod correlation;
pub mod record;

pub use correlation::{PipelineCompletionSet, will_be_retried};
pub use record::BuildRecord;

/// Counters for one build cycle, for logging.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub candidates: usize,
    pub considered: usize,
    pub delivered: usize,
    pub evicted: usize,
}

/// One build cycle. Errors are logged; the next cycle starts from scratch.
pub async fn poll(ctx: &Context) {
    match run(ctx, Utc::now().timestamp_millis()).await {
        Ok(summary) => log::debug!("build cycle: {:?}", summary),
        Err(e) => log::error!("failed to poll builds: {:?}", e),
    }
}

pub async fn run(ctx: &Context, now_ms: i64) -> anyhow::Result<Summary> {
    let mut summary = Summary::default();
    let outcome = notify_builds(ctx, now_ms, &mut summary).await;
    // Expired entries go even when the cycle failed.
    let evicted = ctx
        .notified
        .evict_expired(now_ms, ctx.config.jenkins.max_age_ms, Category::Builds)
        .await;
    outcome?;
    summary.evicted = evicted?;
    Ok(summary)
}

async fn notify_builds(ctx: &Context, now_ms: i64, summary: &mut Summary) -> anyhow::Result<()> {
    let jenkins = &ctx.config.jenkins;

    let tree = ctx
        .jenkins
        .job_tree()
        .await
        .context("failed to fetch the build tree")?;
    let records: Vec<BuildRecord> = tree
        .jobs
        .iter()
        .flat_map(|job| &job.builds)
        .filter_map(|raw| BuildRecord::from_raw(raw, &jenkins.pipeline))
        .collect();
    summary.candidates = records.len();

    let mut pending = Vec::new();
    for record in &records {
        if now_ms - record.timestamp >= jenkins.max_age_ms
            || record.branch == jenkins.primary_branch
        {
            continue;
        }
        if ctx
            .notified
            .is_notified(&EventId::from(record.number), Category::Builds)
            .await
        {
            continue;
        }
        pending.push(record);
    }
    if pending.is_empty() {
        return Ok(());
    }

    // Nothing is marked until the table is loaded.
    let table = identity::refresh(ctx).await?;
    let mut completed = PipelineCompletionSet::default();
    for record in pending {
        let id = EventId::from(record.number);
        // The same number may show up under several jobs.
        if ctx.notified.is_notified(&id, Category::Builds).await {
            continue;
        }
        summary.considered += 1;
        summary.delivered += notify(ctx, &table, record, &records, &mut completed).await;

        // Running builds are looked at again once they finish.
        if record.result.is_some() {
            if let Err(e) = ctx
                .notified
                .mark_notified(&id, record.timestamp, Category::Builds)
                .await
            {
                log::error!("failed to record build {}: {:?}", record.number, e);
            }
        }
    }
    Ok(())
}

/// Sends every message `record` calls for, returning how many were sent.
async fn notify(
    ctx: &Context,
    table: &IdentityTable,
    record: &BuildRecord,
    records: &[BuildRecord],
    completed: &mut PipelineCompletionSet,
) -> usize {
    let jenkins = &ctx.config.jenkins;
    let pipeline = &jenkins.pipeline;
    let email = format!("{}@{}", record.username, jenkins.email_domain);
    let Some(user) = table.resolve(&record.author, &email, &record.username) else {
        return 0;
    };

    let mut messages = Vec::new();
    if user.notify_on_failure
        && record.result == Some(BuildResult::Failure)
        && !will_be_retried(ctx.jenkins.as_ref(), pipeline, record).await
    {
        messages.push(format!("{} failed: {}", record.name, record.url));
    }
    if user.notify_on_finish
        && record.result == Some(BuildResult::Success)
        && completed.all_tests_passed(record.upstream, records, &pipeline.stages)
    {
        messages.push(format!(
            "All tests triggered by upstream build #{n} passed: {}/job/{}/{n}/changes",
            jenkins.url.trim_end_matches('/'),
            pipeline.upstream_job,
            n = record.upstream,
        ));
    }
    if !record.is_core(pipeline)
        && user.wants_everything()
        && record.result == Some(BuildResult::Success)
    {
        messages.push(format!("{} passed: {}", record.name, record.url));
    }
    if let Some(result) = record.result {
        if result != BuildResult::Success
            && result != BuildResult::Failure
            && user.wants_everything()
        {
            messages.push(format!("{} was {}: {}", record.name, result, record.url));
        }
    }
    if messages.is_empty() {
        return 0;
    }

    let cc = match assignees(ctx, table, &record.title).await {
        Ok(cc) => cc,
        Err(e) => {
            log::warn!("failed to look up assignees of {:?}: {:?}", record.title, e);
            String::new()
        }
    };
    let mut sent = 0;
    for message in messages {
        let text = format!("@{}: {message}{cc}", user.chat_name);
        match ctx.chat.send_message(&jenkins.channel, &text).await {
            Ok(()) => sent += 1,
            Err(e) => log::error!("failed to deliver build {}: {:?}", record.number, e),
        }
    }
    sent
}

/// Mentions for the assignees of the issue titled `title` who want every
/// build notification, such as `" cc: @jdoe @bob"`.
async fn assignees(ctx: &Context, table: &IdentityTable, title: &str) -> anyhow::Result<String> {
    let issues = ctx.github.issues(&ctx.config.github.issues_repo).await?;
    let Some(issue) = issues.into_iter().find(|i| i.title == title) else {
        return Ok(String::new());
    };
    let mut names = Vec::new();
    for assignee in issue.assignees {
        let detail = match ctx.github.user(&assignee.login).await {
            Ok(detail) => detail,
            Err(e) => {
                log::warn!("failed to look up assignee {}: {:?}", assignee.login, e);
                continue;
            }
        };
        if let Some(identity) = table.resolve(&detail.name, &detail.email, &assignee.login) {
            if identity.wants_everything() {
                names.push(format!("@{}", identity.chat_name));
            }
        }
    }
    if names.is_empty() {
        Ok(String::new())
    } else {
        Ok(format!(" cc: {}", names.join(" ")))
    }
}
