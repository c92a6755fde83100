//! The Sandboxed Test Harness: drives a command under test across a sequence
//! of test cases, using the `sandbox` crate's execution envelope for each
//! case, and produces an [`ExecutionSummary`].
//!
//! This crate owns no comparison logic — it only classifies each run's
//! termination and records the bytes it produced. Turning those records into
//! verdicts is the `judge` crate's job.

#[macro_use]
extern crate error_chain;
extern crate log;
extern crate sandbox;

pub mod document;
mod runner;

use serde::{Deserialize, Serialize};

pub use runner::{RunnerConfig, TestRunner};

error_chain! {
    types {
        Error, ErrorKind, ResultExt, Result;
    }

    links {
        Sandbox(::sandbox::Error, ::sandbox::ErrorKind);
    }

    foreign_links {
        Io(::std::io::Error);
        Json(::serde_json::Error);
    }

    errors {
        InvalidDocument(detail: String) {
            description("malformed test-case document")
            display("malformed test-case document: {}", detail)
        }

        Cancelled {
            description("execution cancelled")
            display("execution cancelled by signal")
        }
    }
}

/// One test case as loaded from a test-case document.
#[derive(Debug, Clone)]
pub struct TestCase {
    pub id: String,
    pub input: String,
    pub expected_output: String,
    pub time_limit_ms: Option<u64>,
    pub memory_limit_kb: Option<u64>,
    pub hidden: bool,
    pub weight: f64,
    pub stop_on_failure: bool,
}

/// How one test case's sandboxed run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    TimedOut,
    MemoryLimit,
    RuntimeError,
}

/// The harness's record of one test case's execution. This is the atomic unit of the
/// harness-output document consumed by the judge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRecord {
    pub test_id: String,
    pub status: RunStatus,
    #[serde(default)]
    pub actual_output: String,
    #[serde(default)]
    pub stderr: String,
    pub exit_code: i32,
    pub execution_time_ms: u64,
    pub memory_used_kb: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A submission-level compile precondition, reported alongside the test records but not itself
/// one of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileResult {
    pub success: bool,
    #[serde(default)]
    pub skipped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
}

/// The harness-output document: the full result of running one command under test across a test
/// suite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub success: bool,
    pub total_tests: usize,
    pub passed_tests: usize,
    pub failed_tests: usize,
    pub total_time_ms: u64,
    pub max_memory_kb: u64,
    pub test_results: Vec<TestRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compile_result: Option<CompileResult>,
}
