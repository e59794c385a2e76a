use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use super::types::JobRecord;
use crate::config::FarmConfig;
use crate::error::{FarmError, Result};

/// Source of job records
#[async_trait]
pub trait JobSource: Send + Sync {
    async fn fetch_job(&self, job_id: &str) -> Result<JobRecord>;
}

/// Source of job artifacts (result summaries, logs)
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// Fetch an artifact as text. Every failure is reported as `PartialData`.
    async fn fetch_artifact(&self, url: &str) -> Result<String>;
}

/// Read-only client for the Testing Farm API and artifact server
pub struct FarmClient {
    client: Client,
    config: FarmConfig,
}

impl FarmClient {
    pub fn new(config: FarmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(concat!("testing-farm-mcp/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FarmError::Config(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn authorize(&self, request: RequestBuilder, url: &str) -> RequestBuilder {
        match &self.config.api_token {
            Some(token) if self.config.is_api_url(url) => request.bearer_auth(token),
            _ => request,
        }
    }

    fn status_error(&self, job_id: &str, status: StatusCode, body: &str) -> FarmError {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                if self.config.api_token.is_some() {
                    FarmError::Auth(format!("credential rejected ({})", status))
                } else {
                    FarmError::Auth(format!("no API token configured ({})", status))
                }
            }
            StatusCode::NOT_FOUND | StatusCode::UNPROCESSABLE_ENTITY => {
                FarmError::NotFound(job_id.to_string())
            }
            StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => {
                FarmError::Transient(format!("service answered {}", status))
            }
            s if s.is_server_error() => {
                FarmError::Transient(format!("service answered {}", status))
            }
            _ => FarmError::InvalidResponse(format!("unexpected status {}: {}", status, body)),
        }
    }
}

#[async_trait]
impl JobSource for FarmClient {
    async fn fetch_job(&self, job_id: &str) -> Result<JobRecord> {
        let job_id = job_id.trim();
        // request ids are UUIDs; anything else would change the URL's meaning
        if job_id.is_empty()
            || !job_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(FarmError::NotFound(job_id.to_string()));
        }

        let url = self.config.request_url(job_id);
        debug!(job_id = job_id, url = %url, "Fetching request");

        let resp = self
            .authorize(self.client.get(&url), &url)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(self.status_error(job_id, status, &body));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| FarmError::InvalidResponse(format!("request body is not JSON: {}", e)))?;

        let record = JobRecord::from_json(job_id, &body, &self.config.artifacts_dir(job_id));
        debug!(
            job_id = job_id,
            state = %record.state,
            result = ?record.result,
            "Fetched request"
        );
        Ok(record)
    }
}

#[async_trait]
impl ArtifactSource for FarmClient {
    async fn fetch_artifact(&self, url: &str) -> Result<String> {
        debug!(url = url, "Fetching artifact");

        let resp = self
            .authorize(self.client.get(url), url)
            .send()
            .await
            .map_err(|e| {
                warn!(url = url, error = %e, "Artifact request failed");
                FarmError::PartialData(format!("{}: {}", url, e))
            })?;

        if !resp.status().is_success() {
            warn!(url = url, status = %resp.status(), "Artifact unavailable");
            return Err(FarmError::PartialData(format!(
                "{} answered {}",
                url,
                resp.status()
            )));
        }

        resp.text()
            .await
            .map_err(|e| FarmError::PartialData(format!("{}: {}", url, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::farm::types::{JobResult, JobState};
    use httpmock::prelude::*;
    use std::time::Duration;

    fn client_for(server: &MockServer, token: Option<&str>) -> FarmClient {
        let config = FarmConfig::new(server.url("/v0.1"), server.url("/artifacts"))
            .with_token(token.map(|t| t.to_string()))
            .with_timeout(Duration::from_secs(5));
        FarmClient::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_job_sends_bearer_token() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v0.1/requests/abc123")
                    .header("authorization", "Bearer secret");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"id": "abc123", "state": "running", "result": null}"#);
            })
            .await;

        let client = client_for(&server, Some("secret"));
        let job = client.fetch_job("abc123").await.unwrap();

        mock.assert_async().await;
        assert_eq!(job.state, JobState::Running);
        assert!(job.result.is_none());
        assert_eq!(job.artifacts.directory, server.url("/artifacts/abc123"));
    }

    #[tokio::test]
    async fn test_fetch_job_without_token_is_unauthenticated() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v0.1/requests/abc123")
                    .matches(|req| {
                        req.headers.as_ref().map_or(true, |headers| {
                            !headers
                                .iter()
                                .any(|(name, _)| name.eq_ignore_ascii_case("authorization"))
                        })
                    });
                then.status(200)
                    .body(r#"{"state": "complete", "result": {"overall": "passed"}}"#);
            })
            .await;

        let client = client_for(&server, None);
        let job = client.fetch_job("abc123").await.unwrap();

        mock.assert_async().await;
        assert_eq!(job.result, Some(JobResult::Passed));
    }

    #[tokio::test]
    async fn test_fetch_job_status_mapping() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v0.1/requests/missing");
                then.status(404).body(r#"{"message": "not found"}"#);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v0.1/requests/locked");
                then.status(401);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v0.1/requests/flaky");
                then.status(503);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v0.1/requests/garbled");
                then.status(200).body("<html>maintenance</html>");
            })
            .await;

        let client = client_for(&server, Some("secret"));

        assert!(matches!(
            client.fetch_job("missing").await,
            Err(FarmError::NotFound(id)) if id == "missing"
        ));
        assert!(matches!(
            client.fetch_job("locked").await,
            Err(FarmError::Auth(reason)) if reason.contains("rejected")
        ));
        assert!(matches!(
            client.fetch_job("flaky").await,
            Err(FarmError::Transient(_))
        ));
        assert!(matches!(
            client.fetch_job("garbled").await,
            Err(FarmError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_token_reported_on_401() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v0.1/requests/locked");
                then.status(403);
            })
            .await;

        let client = client_for(&server, None);
        let err = client.fetch_job("locked").await.unwrap_err();
        assert!(matches!(err, FarmError::Auth(reason) if reason.contains("no API token")));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_transient() {
        // nothing listens on port 9 of localhost
        let config = FarmConfig::new("http://127.0.0.1:9/v0.1", "http://127.0.0.1:9")
            .with_timeout(Duration::from_secs(2));
        let client = FarmClient::new(config).unwrap();
        let err = client.fetch_job("abc123").await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_invalid_job_id_rejected_locally() {
        let server = MockServer::start_async().await;
        let client = client_for(&server, None);
        assert!(matches!(
            client.fetch_job("../../etc").await,
            Err(FarmError::NotFound(_))
        ));
        assert!(matches!(client.fetch_job("  ").await, Err(FarmError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_job_id_cannot_alter_request_url() {
        let server = MockServer::start_async().await;
        let any_request = server
            .mock_async(|when, then| {
                when.method(GET).path_contains("/v0.1/requests/");
                then.status(200).body(r#"{"state": "complete"}"#);
            })
            .await;

        let client = client_for(&server, None);
        for job_id in ["abc?x=1", "abc#frag", "abc%2F..", "a b"] {
            assert!(
                matches!(client.fetch_job(job_id).await, Err(FarmError::NotFound(_))),
                "{} should be rejected",
                job_id
            );
        }
        assert_eq!(any_request.hits_async().await, 0);

        let job = client
            .fetch_job("2f1c0a9e-7b1d-4c3e-9f00-1a2b3c4d5e6f")
            .await
            .unwrap();
        assert_eq!(job.state, JobState::Complete);
        assert_eq!(any_request.hits_async().await, 1);
    }

    #[tokio::test]
    async fn test_fetch_artifact_failures_are_partial_data() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/artifacts/abc123/pipeline.log");
                then.status(200).body("line one\nline two\n");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/artifacts/abc123/results.xml");
                then.status(404);
            })
            .await;

        let client = client_for(&server, Some("secret"));
        let log = client
            .fetch_artifact(&server.url("/artifacts/abc123/pipeline.log"))
            .await
            .unwrap();
        assert_eq!(log, "line one\nline two\n");

        let missing = client
            .fetch_artifact(&server.url("/artifacts/abc123/results.xml"))
            .await;
        assert!(matches!(missing, Err(FarmError::PartialData(_))));
    }

    #[tokio::test]
    async fn test_artifact_requests_do_not_carry_token() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/artifacts/abc123/pipeline.log")
                    .matches(|req| {
                        req.headers.as_ref().map_or(true, |headers| {
                            !headers
                                .iter()
                                .any(|(name, _)| name.eq_ignore_ascii_case("authorization"))
                        })
                    });
                then.status(200).body("ok");
            })
            .await;

        let client = client_for(&server, Some("secret"));
        client
            .fetch_artifact(&server.url("/artifacts/abc123/pipeline.log"))
            .await
            .unwrap();
        mock.assert_async().await;
    }
}
