//! Parser for the `results.xml` artifact
//!
//! Testing Farm publishes an xUnit-flavoured summary per request:
//!
//! ```text
//! <testsuites overall-result="failed">
//!   <testsuite name="/plans/smoke" result="failed">
//!     <logs><log name="workdir" href="..."/></logs>
//!     <testcase name="/Clone SIG repo" result="failed">
//!       <logs><log name="testout.log" href="..."/></logs>
//!     </testcase>
//!   </testsuite>
//! </testsuites>
//! ```
//!
//! Only the parts needed for failure analysis are kept: test cases in
//! document order, their results, and the logs attached to them.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

use crate::error::{FarmError, Result};

/// A log file attached to a test case or suite
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogRef {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestCase {
    pub name: String,
    pub result: String,
    pub logs: Vec<LogRef>,
}

impl TestCase {
    pub fn is_failure(&self) -> bool {
        matches!(self.result.as_str(), "failed" | "error")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResultsSummary {
    /// `overall-result` of the root element, when present
    pub overall: Option<String>,
    /// Test cases in the order the summary lists them
    pub test_cases: Vec<TestCase>,
    /// Logs attached to suites rather than individual test cases
    pub suite_logs: Vec<LogRef>,
}

impl ResultsSummary {
    /// Parse a summary. Relative `href`s are resolved against `base_url`.
    pub fn parse(xml: &str, base_url: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        let mut buf = Vec::new();
        let mut summary = ResultsSummary::default();
        let mut current: Option<TestCase> = None;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => match e.local_name().as_ref() {
                    b"testsuites" => summary.overall = attr(&e, "overall-result"),
                    b"testcase" => current = Some(test_case(&e)),
                    b"log" => summary.attach_log(&mut current, &e, base_url),
                    _ => {}
                },
                Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                    b"testcase" => summary.test_cases.push(test_case(&e)),
                    b"log" => summary.attach_log(&mut current, &e, base_url),
                    _ => {}
                },
                Ok(Event::End(e)) => {
                    if e.local_name().as_ref() == b"testcase" {
                        if let Some(case) = current.take() {
                            summary.test_cases.push(case);
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(FarmError::InvalidResponse(format!(
                        "results.xml parse error at byte {}: {}",
                        reader.buffer_position(),
                        e
                    )));
                }
                _ => {}
            }
            buf.clear();
        }

        Ok(summary)
    }

    /// Failed or errored test cases, order preserved
    pub fn failed_tests(&self) -> impl Iterator<Item = &TestCase> {
        self.test_cases.iter().filter(|case| case.is_failure())
    }

    fn attach_log(&mut self, current: &mut Option<TestCase>, e: &BytesStart, base_url: &str) {
        let Some(log) = log_ref(e, base_url) else {
            return;
        };
        match current {
            Some(case) => case.logs.push(log),
            None => self.suite_logs.push(log),
        }
    }
}

fn test_case(e: &BytesStart) -> TestCase {
    TestCase {
        name: attr(e, "name").unwrap_or_else(|| "Unknown Test".to_string()),
        result: attr(e, "result")
            .map(|r| r.to_lowercase())
            .unwrap_or_else(|| "unknown".to_string()),
        logs: Vec::new(),
    }
}

fn log_ref(e: &BytesStart, base_url: &str) -> Option<LogRef> {
    let href = attr(e, "href").filter(|h| !h.trim().is_empty())?;
    let url = if href.starts_with("http://") || href.starts_with("https://") {
        href
    } else {
        format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            href.trim_start_matches("./").trim_start_matches('/')
        )
    };
    Some(LogRef {
        name: attr(e, "name").unwrap_or_else(|| "unknown".to_string()),
        url,
    })
}

fn attr(e: &BytesStart, key: &str) -> Option<String> {
    e.try_get_attribute(key)
        .ok()
        .flatten()
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.into_owned())
}
