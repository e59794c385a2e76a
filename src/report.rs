//! Text rendering of job status and analysis results
//!
//! Output is deterministic for a given record so repeated calls against an
//! unchanged job produce identical text.

use chrono::{DateTime, Utc};

use crate::analysis::{Analysis, FailureDiagnosis, StatusSummary, Verdict};
use crate::farm::JobRecord;

/// Status block for `get_job_status`
pub fn render_status(job: &JobRecord) -> String {
    let mut lines = vec![format!("Job {}", job.id)];
    lines.extend(detail_lines(job));
    lines.push(format!("  Artifacts: {}", job.artifacts.directory));
    lines.join("\n")
}

/// Report for `analyze_job`
pub fn render_analysis(analysis: &Analysis) -> String {
    match analysis {
        Analysis::Status(summary) => render_summary(summary),
        Analysis::Failure { job, diagnosis } => render_failure(job, diagnosis),
    }
}

fn render_summary(summary: &StatusSummary) -> String {
    let job = &summary.job;
    let headline = match summary.verdict {
        Verdict::Passed => format!("Job {} completed successfully", job.id),
        Verdict::Pending => format!(
            "Job {} is still {}. Analyze it again once it has finished.",
            job.id, job.state
        ),
        Verdict::Canceled => format!("Job {} was canceled", job.id),
        Verdict::Inconclusive => format!(
            "Job {} finished without a recognizable result (state: {})",
            job.id, job.state
        ),
    };

    let mut lines = vec![headline];
    lines.extend(detail_lines(job));
    lines.join("\n")
}

fn render_failure(job: &JobRecord, diagnosis: &FailureDiagnosis) -> String {
    let mut lines = vec![format!("Job {} failed", job.id)];
    lines.extend(detail_lines(job));

    lines.push(String::new());
    if diagnosis.failed_tests.is_empty() {
        lines.push("Failed tests: none listed in the result summary".to_string());
    } else {
        lines.push(format!("Failed tests ({}):", diagnosis.failed_tests.len()));
        for test in &diagnosis.failed_tests {
            lines.push(format!("  - {}: {}", test.name, test.result));
        }
    }

    lines.push(String::new());
    match &diagnosis.excerpt {
        Some(excerpt) => {
            lines.push(format!(
                "Failure details (from {}, line {}):",
                excerpt.source, excerpt.line_number
            ));
            lines.push(excerpt.to_string().trim_end().to_string());
        }
        None => lines.push(format!(
            "Failure details: no failure marker found ({} log(s) scanned)",
            diagnosis.logs_scanned
        )),
    }

    // other failed tests with their own excerpt
    let additional: Vec<_> = diagnosis
        .failed_tests
        .iter()
        .filter_map(|t| t.excerpt.as_ref())
        .filter(|e| Some(*e) != diagnosis.excerpt.as_ref())
        .collect();
    for excerpt in additional {
        lines.push(String::new());
        lines.push(format!("Also from {}, line {}:", excerpt.source, excerpt.line_number));
        lines.push(format!("  {}", excerpt.line));
    }

    if !diagnosis.notes.is_empty() {
        lines.push(String::new());
        lines.push("Unavailable artifacts:".to_string());
        for note in &diagnosis.notes {
            lines.push(format!("  - {}", note));
        }
    }

    lines.push(String::new());
    lines.push(format!("Artifacts: {}", job.artifacts.directory));
    lines.join("\n")
}

fn detail_lines(job: &JobRecord) -> Vec<String> {
    let mut lines = vec![
        format!("  State: {}", job.state),
        format!(
            "  Result: {}",
            job.result.map(|r| r.as_str()).unwrap_or("pending")
        ),
    ];

    let env = &job.environment;
    if let Some(arch) = &env.arch {
        lines.push(format!("  Architecture: {}", arch));
    }
    if let Some(os) = &env.os {
        lines.push(format!("  OS: {}", os));
    }
    if let Some(pool) = &env.pool {
        lines.push(format!("  Pool: {}", pool));
    }

    let times = &job.timestamps;
    for (label, value) in [
        ("Created", times.created),
        ("Started", times.started),
        ("Finished", times.finished),
        ("Updated", times.updated),
    ] {
        if let Some(at) = value {
            lines.push(format!("  {}: {}", label, timestamp(at)));
        }
    }

    if let Some(summary) = &job.summary {
        lines.push(format!("  Summary: {}", summary));
    }
    if !job.notes.is_empty() {
        lines.push("  Notes:".to_string());
        for note in &job.notes {
            lines.push(format!("    - {}", note));
        }
    }
    lines
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}
