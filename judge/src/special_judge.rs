//! The Special Judge Invoker: runs an external comparison program over three
//! scratch files (input, expected, actual) and parses its verdict.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use sandbox::{MemorySize, Sandbox, SandboxConfig, TerminationStatus};
use serde::Deserialize;
use tempfile::NamedTempFile;

use crate::Result;

const WALL_TIME_LIMIT: Duration = Duration::from_secs(30);
const MEMORY_LIMIT: MemorySize = MemorySize::MegaBytes(1024);

/// A special judge's verdict on one test case.
pub struct SpecialJudgeVerdict {
    pub passed: bool,
    pub score: f64,
    pub message: String,
    /// Set when the special judge program itself failed to produce a verdict (crashed, timed
    /// out, or could not be launched) rather than genuinely rejecting the submission's output.
    /// The caller surfaces this as a case-level RE rather than a WA.
    pub crashed: bool,
}

#[derive(Debug, Deserialize)]
struct RawVerdict {
    #[serde(default)]
    verdict: Option<String>,
    #[serde(default)]
    passed: Option<bool>,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    message: Option<String>,
}

/// Run `judge_path` against `input`/`expected`/`actual`, per the §4.5 argv
/// contract `(input_path, expected_path, actual_path, test_id)`.
///
/// Never returns an error for a judge-side failure — those collapse into a
/// failing [`SpecialJudgeVerdict`] with a diagnostic message, since one
/// special judge crash must not abort the rest of the submission.
pub fn run(judge_path: &Path, input: &str, expected: &str, actual: &str, test_id: &str) -> Result<SpecialJudgeVerdict> {
    let (input_path, _input_disposer) = persist_scratch_file(input)?;
    let (expected_path, _expected_disposer) = persist_scratch_file(expected)?;
    let (actual_path, _actual_disposer) = persist_scratch_file(actual)?;

    let command = vec![
        judge_path.display().to_string(),
        input_path.display().to_string(),
        expected_path.display().to_string(),
        actual_path.display().to_string(),
        test_id.to_owned(),
    ];

    let mut config = SandboxConfig::new(command);
    config.wall_time_limit = WALL_TIME_LIMIT;
    config.cpu_time_limit = WALL_TIME_LIMIT;
    config.memory_limit = MEMORY_LIMIT;

    let outcome = match Sandbox::run(&config) {
        Ok(outcome) => outcome,
        Err(e) => {
            return Ok(SpecialJudgeVerdict {
                passed: false,
                score: 0.0,
                message: format!("special judge error: {}", e),
                crashed: true,
            });
        }
    };

    match outcome.status {
        TerminationStatus::TimedOut => Ok(SpecialJudgeVerdict {
            passed: false,
            score: 0.0,
            message: "special judge timeout".to_owned(),
            crashed: true,
        }),
        TerminationStatus::Completed(0) => {
            let stdout = String::from_utf8_lossy(&outcome.stdout).trim().to_owned();
            Ok(parse_verdict(&stdout))
        }
        TerminationStatus::Completed(_) | TerminationStatus::Signaled(_) | TerminationStatus::MemoryExceeded => {
            let stderr = String::from_utf8_lossy(&outcome.stderr).into_owned();
            Ok(SpecialJudgeVerdict {
                passed: false,
                score: 0.0,
                message: format!("special judge error: {}", stderr),
                crashed: true,
            })
        }
        TerminationStatus::Cancelled => Ok(SpecialJudgeVerdict {
            passed: false,
            score: 0.0,
            message: "special judge cancelled".to_owned(),
            crashed: true,
        }),
        TerminationStatus::SandboxError(msg) => Ok(SpecialJudgeVerdict {
            passed: false,
            score: 0.0,
            message: format!("special judge error: {}", msg),
            crashed: true,
        }),
    }
}

/// Write `content` to a fresh scratch file and hand back its path together
/// with a disposer that unlinks it on drop. The file is persisted past
/// `NamedTempFile`'s own scope via `keep()` so its lifetime is governed by the
/// returned disposer, not by the temp-file handle.
fn persist_scratch_file(content: &str) -> Result<(std::path::PathBuf, sandbox::Disposer<impl FnOnce()>)> {
    let mut file = NamedTempFile::new()?;
    file.write_all(content.as_bytes())?;
    let (_, path) = file.keep().map_err(|e| e.error)?;
    let cleanup_path = path.clone();
    let disposer = sandbox::Disposer::new(move || {
        let _ = std::fs::remove_file(&cleanup_path);
    });
    Ok((path, disposer))
}

/// Parse a special judge's stdout, preferring structured JSON, falling back
/// to a handful of recognized loose strings, then a bare numeric score,
/// finally rejecting with a diagnostic.
fn parse_verdict(stdout: &str) -> SpecialJudgeVerdict {
    if let Ok(raw) = serde_json::from_str::<RawVerdict>(stdout) {
        let passed = raw.verdict.as_deref() == Some("AC") || raw.passed.unwrap_or(false);
        let score = raw.score.unwrap_or(if passed { 1.0 } else { 0.0 });
        let message = raw.message.unwrap_or_default();
        return SpecialJudgeVerdict { passed, score, message, crashed: false };
    }

    match stdout {
        "1" | "AC" | "ACCEPTED" | "true" => SpecialJudgeVerdict {
            passed: true,
            score: 1.0,
            message: "Accepted by special judge".to_owned(),
            crashed: false,
        },
        "0" | "WA" | "WRONG" | "false" => SpecialJudgeVerdict {
            passed: false,
            score: 0.0,
            message: "Rejected by special judge".to_owned(),
            crashed: false,
        },
        other => match other.parse::<f64>() {
            Ok(score) => SpecialJudgeVerdict {
                passed: score > 0.0,
                score,
                message: format!("Score: {}", score),
                crashed: false,
            },
            Err(_) => SpecialJudgeVerdict {
                passed: false,
                score: 0.0,
                message: format!("Unknown special judge output: {}", other),
                crashed: false,
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_structured_json_verdict() {
        let verdict = parse_verdict(r#"{"verdict": "AC", "passed": true, "score": 1.0, "message": "ok"}"#);
        assert!(verdict.passed);
        assert_eq!(1.0, verdict.score);
        assert!(!verdict.crashed);
    }

    #[test]
    fn parses_loose_string_verdict() {
        let verdict = parse_verdict("AC");
        assert!(verdict.passed);
        assert_eq!(1.0, verdict.score);

        let verdict = parse_verdict("WA");
        assert!(!verdict.passed);
    }

    #[test]
    fn parses_numeric_fallback_as_partial_score() {
        let verdict = parse_verdict("0.5");
        assert!(verdict.passed);
        assert_eq!(0.5, verdict.score);
    }

    #[test]
    fn rejects_unrecognized_output() {
        let verdict = parse_verdict("garbage output");
        assert!(!verdict.passed);
        assert_eq!(0.0, verdict.score);
    }
}
