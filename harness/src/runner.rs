use sandbox::{MemorySize, Sandbox, SandboxConfig, TerminationStatus};

use crate::{ExecutionSummary, Result, RunStatus, TestCase, TestRecord};

/// Upper bound on the previews folded into a `TestRecord` for non-hidden cases, per §4.3.
const PREVIEW_LIMIT: usize = 1_000;

const HIDDEN_PLACEHOLDER: &str = "[hidden]";

/// Global defaults and the runnable command under test.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// `argv[0]` and the remaining arguments of the program under test.
    pub command: Vec<String>,
    pub working_dir: Option<std::path::PathBuf>,
    pub time_limit_ms: u64,
    pub memory_limit_kb: u64,
    pub network_isolation: bool,
}

/// Drives the sandbox across a test suite and accumulates an [`ExecutionSummary`].
pub struct TestRunner {
    config: RunnerConfig,
}

impl TestRunner {
    pub fn new(config: RunnerConfig) -> TestRunner {
        TestRunner { config }
    }

    /// Run every case in `cases`, in order, honoring each case's `stop_on_failure` flag.
    pub fn run(&self, cases: &[TestCase]) -> Result<ExecutionSummary> {
        let mut records = Vec::with_capacity(cases.len());
        let mut total_time_ms: u64 = 0;
        let mut max_memory_kb: u64 = 0;

        for case in cases {
            if sandbox::cancellation::is_cancelled() {
                bail!(crate::ErrorKind::Cancelled);
            }

            log::trace!("running test case {}", case.id);

            let record = self.run_one(case)?;
            total_time_ms += record.execution_time_ms;
            max_memory_kb = max_memory_kb.max(record.memory_used_kb);

            let should_stop = case.stop_on_failure && record.status != RunStatus::Success;
            records.push(record);
            if should_stop {
                break;
            }
        }

        let passed_tests = records.iter().filter(|r| r.status == RunStatus::Success).count();
        let failed_tests = records.len() - passed_tests;

        Ok(ExecutionSummary {
            success: failed_tests == 0,
            total_tests: records.len(),
            passed_tests,
            failed_tests,
            total_time_ms,
            max_memory_kb,
            test_results: records,
            compile_result: None,
        })
    }

    fn run_one(&self, case: &TestCase) -> Result<TestRecord> {
        let time_limit_ms = case.time_limit_ms.unwrap_or(self.config.time_limit_ms);
        let memory_limit_kb = case.memory_limit_kb.unwrap_or(self.config.memory_limit_kb);

        let mut sandbox_config = SandboxConfig::new(self.config.command.clone());
        sandbox_config.working_dir = self.config.working_dir.clone();
        sandbox_config.stdin = case.input.clone().into_bytes();
        sandbox_config.wall_time_limit = std::time::Duration::from_millis(time_limit_ms);
        sandbox_config.cpu_time_limit = std::time::Duration::from_millis(time_limit_ms);
        sandbox_config.memory_limit = MemorySize::KiloBytes(memory_limit_kb as usize);
        sandbox_config.network_isolation = self.config.network_isolation;

        let outcome = Sandbox::run(&sandbox_config)?;

        if let TerminationStatus::Cancelled = &outcome.status {
            bail!(crate::ErrorKind::Cancelled);
        }

        let (status, exit_code, error) = match &outcome.status {
            TerminationStatus::Completed(0) => (RunStatus::Success, 0, None),
            TerminationStatus::Completed(code) => {
                (RunStatus::RuntimeError, *code,
                    Some(format!("runtime error (exit code: {})", code)))
            }
            TerminationStatus::TimedOut => (RunStatus::TimedOut, 124,
                Some(format!("execution timeout ({} ms exceeded)", time_limit_ms))),
            TerminationStatus::MemoryExceeded => (RunStatus::MemoryLimit, 137,
                Some(format!("memory limit exceeded ({} KB)", memory_limit_kb))),
            TerminationStatus::Signaled(sig) => {
                let code = 128 + (*sig as i32);
                (RunStatus::RuntimeError, code, Some(format!("killed by signal {}", sig)))
            }
            TerminationStatus::SandboxError(msg) =>
                (RunStatus::RuntimeError, -1, Some(msg.clone())),
            TerminationStatus::Cancelled => unreachable!("handled above"),
        };

        let memory_used_kb = outcome.peak_memory().kilobytes();

        let stderr_bytes = outcome.stderr;
        let stderr_text = String::from_utf8_lossy(&stderr_bytes).into_owned();
        let error = error.map(|e| {
            if !stderr_text.is_empty() && status == RunStatus::RuntimeError {
                format!("{}: {}", e, truncate(&stderr_text, 500))
            } else {
                e
            }
        });

        let actual_output = String::from_utf8_lossy(&outcome.stdout).into_owned();

        Ok(TestRecord {
            test_id: case.id.clone(),
            status,
            actual_output,
            stderr: stderr_text,
            exit_code,
            execution_time_ms: outcome.wall_time.as_millis() as u64,
            memory_used_kb,
            input: Some(preview(&case.input, case.hidden)),
            expected_output: Some(preview(&case.expected_output, case.hidden)),
            error,
        })
    }
}

fn truncate(s: &str, limit: usize) -> &str {
    if s.len() <= limit {
        s
    } else {
        let mut end = limit;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        &s[..end]
    }
}

fn preview(s: &str, hidden: bool) -> String {
    if hidden {
        HIDDEN_PLACEHOLDER.to_owned()
    } else {
        truncate(s, PREVIEW_LIMIT).to_owned()
    }
}
