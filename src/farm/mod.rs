//! Testing Farm integration module
//!
//! Read-only access to the Testing Farm request API and the artifact
//! server: request records, the `results.xml` summary and raw logs.

pub mod client;
pub mod results;
pub mod types;

pub use client::{ArtifactSource, FarmClient, JobSource};
pub use results::{LogRef, ResultsSummary, TestCase};
pub use types::{ArtifactRefs, Environment, JobRecord, JobResult, JobState, Timestamps};
