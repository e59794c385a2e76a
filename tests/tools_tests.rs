//! End-to-end tool tests against mocked Testing Farm API and artifact servers

use httpmock::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;
use testing_farm_mcp::{AnalysisConfig, FarmConfig, FarmTools, McpHandler};

const PATHSPEC_LINE: &str =
    "error: pathspec '2943d306' did not match any file(s) known to git";

struct Farm {
    api: MockServer,
    artifacts: MockServer,
}

impl Farm {
    async fn start() -> Self {
        Self {
            api: MockServer::start_async().await,
            artifacts: MockServer::start_async().await,
        }
    }

    fn tools(&self) -> FarmTools {
        let config = FarmConfig::new(self.api.url("/v0.1"), self.artifacts.base_url())
            .with_token(Some("secret".to_string()));
        FarmTools::connect(config, AnalysisConfig::default()).unwrap()
    }

    fn artifacts_dir(&self, job_id: &str) -> String {
        self.artifacts.url(format!("/{}", job_id))
    }
}

fn clone_log() -> String {
    let mut lines = vec![
        "+ git clone https://gitlab.com/CentOS/automotive/sig.git".to_string(),
        "Cloning into 'sig'...".to_string(),
    ];
    for i in 0..40 {
        lines.push(format!("remote: Counting objects: {}% ({}/40)", i * 100 / 40, i));
    }
    lines.push("Receiving objects: 100% (40/40), done.".to_string());
    lines.push("+ git checkout 2943d306".to_string());
    lines.push(PATHSPEC_LINE.to_string());
    lines.push("+ rc=1".to_string());
    lines.push("Shared connection to 10.0.0.4 closed.".to_string());
    lines.join("\n")
}

fn results_xml(dir: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<testsuites overall-result="failed">
  <testsuite name="/plans/sig" result="failed" tests="2">
    <testcase name="/Install deps" result="passed">
      <logs>
        <log href="{dir}/install/testout.log" name="testout.log"/>
      </logs>
    </testcase>
    <testcase name="/Clone SIG repo" result="failed">
      <logs>
        <log href="{dir}/clone/journal.txt" name="journal.txt"/>
        <log href="{dir}/clone/testout.log" name="testout.log"/>
      </logs>
    </testcase>
  </testsuite>
</testsuites>"#,
        dir = dir
    )
}

#[tokio::test]
async fn test_passed_job_summary_without_artifacts() {
    let farm = Farm::start().await;

    let job = farm
        .api
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v0.1/requests/abc123")
                .header("authorization", "Bearer secret");
            then.status(200).json_body(json!({
                "id": "abc123",
                "state": "complete",
                "result": {"overall": "passed", "summary": "all tests passed"},
                "environments_requested": [
                    {"arch": "aarch64", "os": {"compose": "CentOS-Stream-9"}}
                ],
                "created": "2024-05-02T10:11:12.345678",
                "updated": "2024-05-02T10:41:00.000000",
            }));
        })
        .await;
    let any_artifact = farm
        .artifacts
        .mock_async(|when, then| {
            when.method(GET).path_contains("abc123");
            then.status(200).body("");
        })
        .await;

    let tools = farm.tools();
    let output = tools.analyze_job("abc123").await;

    assert!(!output.is_error);
    assert!(output.text.contains("completed successfully"));
    assert!(output.text.contains("aarch64"));
    assert!(output.text.contains("CentOS-Stream-9"));
    assert!(!output.text.contains("Failed tests"));
    assert!(!output.text.contains("Failure details"));

    job.assert_async().await;
    assert_eq!(any_artifact.hits_async().await, 0);
}

#[tokio::test]
async fn test_failed_job_points_at_pathspec_error() {
    let farm = Farm::start().await;
    let dir = farm.artifacts_dir("def456");

    let body = json!({
        "id": "def456",
        "state": "complete",
        "result": {"overall": "failed"},
        "environments_requested": [{"arch": "x86_64", "os": {"compose": "CentOS-Stream-9"}}],
        "run": {"artifacts": dir},
    });
    farm.api
        .mock_async(|when, then| {
            when.method(GET).path("/v0.1/requests/def456");
            then.status(200).json_body(body);
        })
        .await;

    let xml = results_xml(&dir);
    let summary = farm
        .artifacts
        .mock_async(|when, then| {
            when.method(GET)
                .path("/def456/results.xml")
                .matches(|req| {
                    req.headers.as_ref().map_or(true, |headers| {
                        !headers
                            .iter()
                            .any(|(name, _)| name.eq_ignore_ascii_case("authorization"))
                    })
                });
            then.status(200).body(xml);
        })
        .await;
    let testout = farm
        .artifacts
        .mock_async(|when, then| {
            when.method(GET).path("/def456/clone/testout.log");
            then.status(200).body(clone_log());
        })
        .await;
    let journal = farm
        .artifacts
        .mock_async(|when, then| {
            when.method(GET).path("/def456/clone/journal.txt");
            then.status(200).body("systemd[1]: Started session 3.\n");
        })
        .await;
    let pipeline = farm
        .artifacts
        .mock_async(|when, then| {
            when.method(GET).path("/def456/pipeline.log");
            then.status(200).body("pipeline failed\n");
        })
        .await;

    let output = farm.tools().analyze_job("def456").await;

    assert!(!output.is_error);
    assert!(output.text.starts_with("Job def456 failed"));
    assert!(output.text.contains("/Clone SIG repo"));
    assert!(!output.text.contains("/Install deps"));
    assert!(output.text.contains(PATHSPEC_LINE));
    assert!(output.text.contains("from /Clone SIG repo: testout.log"));

    summary.assert_async().await;
    testout.assert_async().await;
    // testout.log is scanned first and already has the answer
    assert_eq!(journal.hits_async().await, 0);
    assert_eq!(pipeline.hits_async().await, 0);
}

#[tokio::test]
async fn test_failed_job_without_artifacts_degrades() {
    let farm = Farm::start().await;

    farm.api
        .mock_async(|when, then| {
            when.method(GET).path("/v0.1/requests/bad789");
            then.status(200)
                .json_body(json!({"state": "error", "result": null}));
        })
        .await;

    let output = farm.tools().analyze_job("bad789").await;

    assert!(!output.is_error);
    assert!(output.text.contains("Job bad789 failed"));
    assert!(output.text.contains("Failed tests: none listed"));
    assert!(output.text.contains("no failure marker found (0 log(s) scanned)"));
    assert!(output.text.contains("Unavailable artifacts:"));
}

#[tokio::test]
async fn test_status_is_idempotent_and_errors_are_text() {
    let farm = Farm::start().await;

    farm.api
        .mock_async(|when, then| {
            when.method(GET).path("/v0.1/requests/run1");
            then.status(200).json_body(json!({
                "state": "running",
                "environments_requested": [{"arch": "x86_64", "os": {"compose": "Fedora-40"}}],
                "created": "2024-05-02T10:11:12",
            }));
        })
        .await;
    farm.api
        .mock_async(|when, then| {
            when.method(GET).path("/v0.1/requests/gone");
            then.status(404);
        })
        .await;

    let tools = farm.tools();
    let first = tools.get_job_status("run1").await;
    let second = tools.get_job_status("run1").await;
    assert_eq!(first, second);
    assert!(first.text.contains("State: running"));
    assert!(first.text.contains("Result: pending"));

    let running = tools.analyze_job("run1").await;
    assert!(running.text.contains("is still running"));

    let missing = tools.get_job_status("gone").await;
    assert!(missing.is_error);
    assert!(missing.text.contains("gone"));
}

#[tokio::test]
async fn test_mcp_tools_call_round_trip() {
    let farm = Farm::start().await;

    farm.api
        .mock_async(|when, then| {
            when.method(GET).path("/v0.1/requests/abc123");
            then.status(200).json_body(json!({
                "state": "complete",
                "result": {"overall": "passed"},
            }));
        })
        .await;

    let handler = McpHandler::new(Arc::new(farm.tools()));

    let init: Value = handler
        .handle_message(r#"{"jsonrpc":"2.0","id":0,"method":"initialize","params":{}}"#)
        .await
        .unwrap();
    assert!(init["result"]["capabilities"]["tools"].is_object());

    let reply = handler
        .handle_message(
            &json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "tools/call",
                "params": {"name": "get_job_status", "arguments": {"job_id": "abc123"}},
            })
            .to_string(),
        )
        .await
        .unwrap();

    assert_eq!(reply["id"], 1);
    assert_eq!(reply["result"]["isError"], false);
    assert_eq!(reply["result"]["content"][0]["type"], "text");
    assert!(reply["result"]["content"][0]["text"]
        .as_str()
        .unwrap()
        .contains("Result: passed"));
}
