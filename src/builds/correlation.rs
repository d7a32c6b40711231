//! Pipeline aggregation and retry prediction.

use super::record::BuildRecord;
use crate::config::PipelineConfig;
use crate::jenkins::{BuildResult, BuildServer};
use std::collections::HashSet;
use tracing as log;

pub const RETRY_COUNT_ARTIFACT: &str = "naginator_count";
pub const RETRY_MAX_ARTIFACT: &str = "naginator_maxcount";

/// Upstream builds whose aggregate verdict was already emitted this cycle.
///
/// A fresh set is created at the start of every build cycle.
#[derive(Debug, Default)]
pub struct PipelineCompletionSet {
    emitted: HashSet<u64>,
}

impl PipelineCompletionSet {
    /// Returns `true` once per upstream build, when every stage it triggered
    /// reported success.
    ///
    /// The first record (newest first, as the build server lists them) of
    /// each stage triggered by `upstream` decides that stage.
    pub fn all_tests_passed(
        &mut self,
        upstream: u64,
        records: &[BuildRecord],
        stages: &[String],
    ) -> bool {
        if upstream == 0 || self.emitted.contains(&upstream) {
            return false;
        }
        let passed = stages.iter().all(|stage| {
            records
                .iter()
                .find(|r| r.upstream == upstream && r.is_stage(stage))
                .is_some_and(|r| r.result == Some(BuildResult::Success))
        });
        if passed {
            self.emitted.insert(upstream);
        }
        passed
    }
}

/// Whether a failed build will be re-run automatically, in which case its
/// failure is not reported yet.
///
/// Only the acceptance job is retried. A build that was itself started by a
/// retry is final; otherwise the retry counters archived by the build decide.
pub async fn will_be_retried(
    jenkins: &dyn BuildServer,
    pipeline: &PipelineConfig,
    record: &BuildRecord,
) -> bool {
    if !record.name.contains(&pipeline.retry_job) || record.started_by_retry {
        return false;
    }
    let counters = async {
        let count = jenkins
            .numeric_artifact(&pipeline.retry_job, record.number, RETRY_COUNT_ARTIFACT)
            .await?;
        let max = jenkins
            .numeric_artifact(&pipeline.retry_job, record.number, RETRY_MAX_ARTIFACT)
            .await?;
        anyhow::Ok((count, max))
    };
    match counters.await {
        Ok((count, max)) => count < max,
        Err(e) => {
            log::warn!("failed to read retry counters of {}: {:?}", record.name, e);
            false
        }
    }
}
