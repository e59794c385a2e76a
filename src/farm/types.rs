use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Lifecycle state of a request
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Complete,
    Error,
    Canceled,
    Unknown,
}

impl JobState {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "new" | "pending" | "queued" => JobState::Queued,
            "running" => JobState::Running,
            "complete" | "completed" => JobState::Complete,
            "error" => JobState::Error,
            "canceled" | "cancelled" | "cancel-requested" => JobState::Canceled,
            _ => JobState::Unknown,
        }
    }

    /// Still waiting or executing; nothing final can be said yet
    pub fn is_in_progress(&self) -> bool {
        matches!(self, JobState::Queued | JobState::Running)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Complete | JobState::Error | JobState::Canceled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Complete => "complete",
            JobState::Error => "error",
            JobState::Canceled => "canceled",
            JobState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall outcome of a request
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobResult {
    Passed,
    Failed,
    Unknown,
}

impl JobResult {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "passed" | "pass" | "success" => JobResult::Passed,
            "failed" | "fail" | "error" => JobResult::Failed,
            _ => JobResult::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobResult::Passed => "passed",
            JobResult::Failed => "failed",
            JobResult::Unknown => "unknown",
        }
    }
}

impl fmt::Display for JobResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First requested environment of a job
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Environment {
    pub arch: Option<String>,
    /// Compose / distro label, e.g. `CentOS-Stream-9`
    pub os: Option<String>,
    pub pool: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Timestamps {
    pub created: Option<DateTime<Utc>>,
    pub started: Option<DateTime<Utc>>,
    pub finished: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
}

/// Where the artifacts of a job live
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactRefs {
    pub directory: String,
    /// Structured xUnit-style result summary
    pub results_xml: String,
    /// Raw execution log of the whole pipeline
    pub execution_log: String,
}

impl ArtifactRefs {
    pub fn under(directory: &str) -> Self {
        let directory = directory.trim_end_matches('/').to_string();
        Self {
            results_xml: format!("{}/results.xml", directory),
            execution_log: format!("{}/pipeline.log", directory),
            directory,
        }
    }
}

/// Normalized view of one Testing Farm request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobRecord {
    pub id: String,
    pub state: JobState,
    /// `None` until the service reports an outcome
    pub result: Option<JobResult>,
    pub environment: Environment,
    pub timestamps: Timestamps,
    pub artifacts: ArtifactRefs,
    /// Free-text summary the service attaches to the result
    pub summary: Option<String>,
    /// Messages from the request's notes
    pub notes: Vec<String>,
}

impl JobRecord {
    /// Map an API response onto a record.
    ///
    /// The remote schema is not guaranteed, so every field is optional:
    /// anything missing or of an unexpected shape degrades to `unknown`
    /// or `None` instead of failing the whole record.
    pub fn from_json(job_id: &str, body: &Value, fallback_artifacts: &str) -> Self {
        let id = str_at(body, &["id"]).unwrap_or_else(|| job_id.to_string());

        let state = str_at(body, &["state"])
            .map(|s| JobState::parse(&s))
            .unwrap_or(JobState::Unknown);

        // `result` is an object with `overall` on the current API, a bare string on older ones
        let result_value = body.get("result");
        let result = match result_value {
            Some(Value::String(s)) => Some(JobResult::parse(s)),
            Some(Value::Object(_)) => str_at(body, &["result", "overall"]).map(|s| JobResult::parse(&s)),
            _ => None,
        };
        let summary = str_at(body, &["result", "summary"]).filter(|s| !s.trim().is_empty());

        let environment = body
            .get("environments_requested")
            .and_then(|envs| envs.as_array())
            .and_then(|envs| envs.first())
            .map(|env| Environment {
                arch: str_at(env, &["arch"]),
                os: str_at(env, &["os", "compose"]).or_else(|| str_at(env, &["os"])),
                pool: str_at(env, &["pool"]),
            })
            .unwrap_or_default();

        let updated = time_at(body, &["updated"]);
        let finished = time_at(body, &["finished"]).or(if state.is_terminal() {
            updated
        } else {
            None
        });
        let timestamps = Timestamps {
            created: time_at(body, &["created"]),
            started: time_at(body, &["started"]).or_else(|| time_at(body, &["run", "started"])),
            finished,
            updated,
        };

        let directory =
            str_at(body, &["run", "artifacts"]).unwrap_or_else(|| fallback_artifacts.to_string());
        let mut artifacts = ArtifactRefs::under(&directory);
        if let Some(xunit_url) = str_at(body, &["result", "xunit_url"]) {
            artifacts.results_xml = xunit_url;
        }

        let notes = body
            .get("notes")
            .and_then(|n| n.as_array())
            .map(|notes| {
                notes
                    .iter()
                    .filter_map(|note| str_at(note, &["message"]))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            id,
            state,
            result,
            environment,
            timestamps,
            artifacts,
            summary,
            notes,
        }
    }

    pub fn is_passed(&self) -> bool {
        self.result == Some(JobResult::Passed)
    }

    pub fn is_failed(&self) -> bool {
        self.result == Some(JobResult::Failed) || self.state == JobState::Error
    }
}

fn str_at(value: &Value, path: &[&str]) -> Option<String> {
    let mut current = value;
    for key in path {
        current = current.get(key)?;
    }
    current.as_str().map(|s| s.to_string())
}

fn time_at(value: &Value, path: &[&str]) -> Option<DateTime<Utc>> {
    str_at(value, path).and_then(|raw| parse_timestamp(&raw))
}

/// The API emits naive ISO timestamps in UTC; RFC 3339 is accepted too.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
