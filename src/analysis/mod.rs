//! Failure analysis
//!
//! Turns a job record into either a status summary (nothing to diagnose)
//! or a failure diagnosis built from the job's artifacts:
//!
//! 1. `results.xml` gives the failed test cases, in listed order
//! 2. each failed test's logs are scanned backward for a generic marker
//! 3. without a per-test hit, logs attached to the plan itself are scanned
//! 4. failing that (or without a summary) the pipeline log is scanned
//!
//! Artifact problems never fail the analysis. They are logged, recorded as
//! notes on the diagnosis, and leave the excerpt empty.

pub mod scanner;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::farm::{ArtifactSource, JobRecord, JobState, LogRef, ResultsSummary, TestCase};

pub use scanner::{Excerpt, LogScanner};

/// Why no diagnosis was produced
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Queued or running
    Pending,
    Passed,
    Canceled,
    /// Finished without a recognizable outcome
    Inconclusive,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusSummary {
    pub job: JobRecord,
    pub verdict: Verdict,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailedTest {
    pub name: String,
    pub result: String,
    pub excerpt: Option<Excerpt>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailureDiagnosis {
    /// Failed test cases in the order the result summary lists them
    pub failed_tests: Vec<FailedTest>,
    /// Best guess at the line explaining the failure
    pub excerpt: Option<Excerpt>,
    /// Number of logs actually downloaded and scanned
    pub logs_scanned: usize,
    /// Artifacts that could not be used
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Analysis {
    Status(StatusSummary),
    Failure {
        job: JobRecord,
        diagnosis: FailureDiagnosis,
    },
}

impl Analysis {
    pub fn job(&self) -> &JobRecord {
        match self {
            Analysis::Status(summary) => &summary.job,
            Analysis::Failure { job, .. } => job,
        }
    }
}

pub struct FailureAnalyzer {
    artifacts: Arc<dyn ArtifactSource>,
    scanner: LogScanner,
    config: AnalysisConfig,
}

impl FailureAnalyzer {
    pub fn new(artifacts: Arc<dyn ArtifactSource>, config: AnalysisConfig) -> Result<Self> {
        let scanner = LogScanner::from_config(&config)?;
        Ok(Self {
            artifacts,
            scanner,
            config,
        })
    }

    pub async fn analyze(&self, job: JobRecord) -> Analysis {
        let verdict = if job.state.is_in_progress() {
            Verdict::Pending
        } else if job.is_passed() {
            Verdict::Passed
        } else if job.state == JobState::Canceled {
            Verdict::Canceled
        } else if job.is_failed() {
            let diagnosis = self.diagnose(&job).await;
            return Analysis::Failure { job, diagnosis };
        } else {
            Verdict::Inconclusive
        };

        debug!(job_id = %job.id, verdict = ?verdict, "No diagnosis needed");
        Analysis::Status(StatusSummary { job, verdict })
    }

    async fn diagnose(&self, job: &JobRecord) -> FailureDiagnosis {
        let mut diagnosis = FailureDiagnosis::default();

        let summary = self.fetch_summary(job, &mut diagnosis).await;
        if let Some(summary) = &summary {
            let failed: Vec<&TestCase> = summary.failed_tests().collect();
            info!(job_id = %job.id, failed = failed.len(), "Result summary loaded");

            for (index, case) in failed.into_iter().enumerate() {
                let excerpt = if index < self.config.max_tests_inspected {
                    self.scan_logs(&case.name, &case.logs, &mut diagnosis).await
                } else {
                    None
                };
                diagnosis.failed_tests.push(FailedTest {
                    name: case.name.clone(),
                    result: case.result.clone(),
                    excerpt,
                });
            }
        }

        diagnosis.excerpt = diagnosis
            .failed_tests
            .iter()
            .find_map(|test| test.excerpt.clone());

        // plan-level logs hold setup and provisioning failures
        if diagnosis.excerpt.is_none() {
            if let Some(summary) = summary.as_ref().filter(|s| !s.suite_logs.is_empty()) {
                let excerpt = self.scan_logs("plan", &summary.suite_logs, &mut diagnosis).await;
                diagnosis.excerpt = excerpt;
            }
        }

        if diagnosis.excerpt.is_none() {
            let url = &job.artifacts.execution_log;
            match self.artifacts.fetch_artifact(url).await {
                Ok(text) => {
                    diagnosis.logs_scanned += 1;
                    diagnosis.excerpt = self.scanner.scan("pipeline.log", &text);
                }
                Err(e) => {
                    warn!(job_id = %job.id, error = %e, "Execution log unavailable");
                    diagnosis.notes.push(e.to_string());
                }
            }
        }

        info!(
            job_id = %job.id,
            failed_tests = diagnosis.failed_tests.len(),
            logs_scanned = diagnosis.logs_scanned,
            found = diagnosis.excerpt.is_some(),
            "Diagnosis complete"
        );
        diagnosis
    }

    async fn fetch_summary(
        &self,
        job: &JobRecord,
        diagnosis: &mut FailureDiagnosis,
    ) -> Option<ResultsSummary> {
        let xml = match self.artifacts.fetch_artifact(&job.artifacts.results_xml).await {
            Ok(xml) => xml,
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "Result summary unavailable");
                diagnosis.notes.push(e.to_string());
                return None;
            }
        };

        match ResultsSummary::parse(&xml, &job.artifacts.directory) {
            Ok(summary) => Some(summary),
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "Result summary unreadable");
                diagnosis.notes.push(e.to_string());
                None
            }
        }
    }

    /// Scan `logs` in priority order; `owner` names the test or plan they belong to.
    async fn scan_logs(
        &self,
        owner: &str,
        logs: &[LogRef],
        diagnosis: &mut FailureDiagnosis,
    ) -> Option<Excerpt> {
        for log in self.ordered_logs(logs) {
            let text = match self.artifacts.fetch_artifact(&log.url).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(owner = owner, log = %log.name, error = %e, "Log unavailable");
                    diagnosis.notes.push(e.to_string());
                    continue;
                }
            };
            diagnosis.logs_scanned += 1;

            let source = format!("{}: {}", owner, log.name);
            if let Some(excerpt) = self.scanner.scan(&source, &text) {
                debug!(owner = owner, log = %log.name, line = excerpt.line_number, "Marker found");
                return Some(excerpt);
            }
        }
        None
    }

    /// Logs whose names hint at test output come first, then the rest,
    /// capped at `max_logs_per_test`.
    fn ordered_logs<'a>(&self, logs: &'a [LogRef]) -> Vec<&'a LogRef> {
        let (priority, other): (Vec<&LogRef>, Vec<&LogRef>) = logs.iter().partition(|log| {
            let name = log.name.to_lowercase();
            self.config
                .priority_log_hints
                .iter()
                .any(|hint| name.contains(hint.as_str()))
        });

        priority
            .into_iter()
            .chain(other)
            .take(self.config.max_logs_per_test)
            .collect()
    }
}
