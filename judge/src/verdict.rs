//! Per-case classification and the final-verdict aggregation rules: the
//! Verdict Engine itself.

use std::collections::HashMap;
use std::path::Path;

use serde::Serialize;

use crate::comparator;
use crate::config::{ComparisonMode, ProblemConfig};
use crate::document::{CompileResult, HarnessOutputDocument, TestResultRecord};
use crate::special_judge;
use crate::Result;

/// Upper bound on the `expected_output`/`actual_output` snippets folded into
/// a [`TestCaseVerdict`] for diagnostic display.
const SNIPPET_LIMIT: usize = 500;
/// Upper bound on the `input_preview` snippet.
const INPUT_PREVIEW_LIMIT: usize = 100;

/// Per-case and submission-level verdict codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    AC,
    WA,
    TLE,
    MLE,
    RE,
    CE,
    IE,
}

impl Verdict {
    fn as_str(&self) -> &'static str {
        match self {
            Verdict::AC => "AC",
            Verdict::WA => "WA",
            Verdict::TLE => "TLE",
            Verdict::MLE => "MLE",
            Verdict::RE => "RE",
            Verdict::CE => "CE",
            Verdict::IE => "IE",
        }
    }
}

/// The verdict assigned to one test case.
#[derive(Debug, Clone, Serialize)]
pub struct TestCaseVerdict {
    pub test_id: String,
    pub verdict: &'static str,
    pub score: f64,
    pub max_score: f64,
    pub execution_time_ms: u64,
    pub memory_used_kb: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_preview: Option<String>,
}

/// The final, submission-level result.
#[derive(Debug, Clone, Serialize)]
pub struct JudgeResult {
    pub final_verdict: &'static str,
    pub total_score: f64,
    pub max_score: f64,
    pub score_percentage: f64,
    pub passed_count: usize,
    pub failed_count: usize,
    pub total_count: usize,
    pub total_time_ms: u64,
    pub max_memory_kb: u64,
    pub test_verdicts: Vec<TestCaseVerdict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compilation_status: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compilation_message: Option<String>,
    /// Set only when the submission's final verdict is IE for a reason outside the per-case
    /// verdicts themselves, e.g. judging was aborted by a cancellation signal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

/// Applies a [`ProblemConfig`]'s comparison rules across a harness-output
/// document and produces a [`JudgeResult`].
pub struct VerdictEngine<'a> {
    config: &'a ProblemConfig,
}

impl<'a> VerdictEngine<'a> {
    pub fn new(config: &'a ProblemConfig) -> VerdictEngine<'a> {
        VerdictEngine { config }
    }

    /// Judge a complete submission: checks the compile precondition first,
    /// then every test case, then aggregates into a final verdict.
    pub fn judge(
        &self,
        harness_output: &HarnessOutputDocument,
        expected_outputs: Option<&HashMap<String, String>>,
    ) -> Result<JudgeResult> {
        if let Some(compile) = &harness_output.compile_result {
            if !compile.success && !compile.skipped {
                return Ok(compilation_failure(compile));
            }
        }

        let mut verdicts = Vec::with_capacity(harness_output.test_results.len());
        for record in &harness_output.test_results {
            if sandbox::cancellation::is_cancelled() {
                return Ok(cancelled(verdicts));
            }
            let expected = expected_outputs.and_then(|m| m.get(&record.test_id));
            verdicts.push(self.judge_test_case(record, expected)?);
        }

        let total_score: f64 = verdicts.iter().map(|v| v.score).sum();
        let max_score: f64 = verdicts.iter().map(|v| v.max_score).sum();
        let passed_count = verdicts.iter().filter(|v| v.verdict == Verdict::AC.as_str()).count();
        let failed_count = verdicts.len() - passed_count;
        let total_time_ms: u64 = verdicts.iter().map(|v| v.execution_time_ms).sum();
        let max_memory_kb = verdicts.iter().map(|v| v.memory_used_kb).max().unwrap_or(0);

        let final_verdict = final_verdict(&verdicts);
        let score_percentage = if max_score > 0.0 { total_score / max_score * 100.0 } else { 0.0 };

        Ok(JudgeResult {
            final_verdict: final_verdict.as_str(),
            total_score: round2(total_score),
            max_score: round2(max_score),
            score_percentage: round2(score_percentage),
            passed_count,
            failed_count,
            total_count: verdicts.len(),
            total_time_ms,
            max_memory_kb,
            test_verdicts: verdicts,
            compilation_status: harness_output.compile_result.as_ref().map(|_| "success"),
            compilation_message: None,
            diagnostic: None,
        })
    }

    fn judge_test_case(&self, record: &TestResultRecord, expected_override: Option<&String>) -> Result<TestCaseVerdict> {
        let weight = self.config.weight_of(&record.test_id);
        let expected_output = expected_override
            .cloned()
            .or_else(|| record.expected_output.clone())
            .unwrap_or_default();

        if record.status == "timed_out" || record.timed_out {
            return Ok(self.execution_failure(
                record,
                weight,
                Verdict::TLE,
                format!("Time limit exceeded ({}ms)", record.execution_time_ms),
            ));
        }
        if record.status == "memory_limit" {
            return Ok(self.execution_failure(
                record,
                weight,
                Verdict::MLE,
                format!("Memory limit exceeded ({}KB)", record.memory_used_kb),
            ));
        }
        if record.status == "runtime_error" {
            let message = record.error.clone().unwrap_or_else(|| "Unknown runtime error".to_owned());
            return Ok(self.execution_failure(record, weight, Verdict::RE, message));
        }

        let (passed, score, message) = if self.config.comparison_mode == ComparisonMode::Special {
            let judge_path = self
                .config
                .special_judge_path
                .as_deref()
                .unwrap_or_else(|| Path::new(""));
            let outcome = special_judge::run(
                judge_path,
                &record.input.clone().unwrap_or_default(),
                &expected_output,
                &record.actual_output,
                &record.test_id,
            )?;
            if outcome.crashed {
                return Ok(self.execution_failure(record, weight, Verdict::RE, outcome.message));
            }
            (outcome.passed, outcome.score * weight, outcome.message)
        } else {
            let result = comparator::compare(self.config.comparison_mode, &expected_output, &record.actual_output, self.config);
            if result.internal_error {
                return Ok(self.execution_failure(record, weight, Verdict::IE, result.message));
            }
            (result.passed, if result.passed { weight } else { 0.0 }, result.message)
        };

        let verdict = if passed { Verdict::AC } else { Verdict::WA };

        Ok(TestCaseVerdict {
            test_id: record.test_id.clone(),
            verdict: verdict.as_str(),
            score,
            max_score: weight,
            execution_time_ms: record.execution_time_ms,
            memory_used_kb: record.memory_used_kb,
            message: Some(message),
            expected_output: snippet(&expected_output, SNIPPET_LIMIT),
            actual_output: snippet(&record.actual_output, SNIPPET_LIMIT),
            input_preview: record.input.as_deref().and_then(|s| snippet(s, INPUT_PREVIEW_LIMIT)),
        })
    }

    fn execution_failure(&self, record: &TestResultRecord, weight: f64, verdict: Verdict, message: String) -> TestCaseVerdict {
        TestCaseVerdict {
            test_id: record.test_id.clone(),
            verdict: verdict.as_str(),
            score: 0.0,
            max_score: weight,
            execution_time_ms: record.execution_time_ms,
            memory_used_kb: record.memory_used_kb,
            message: Some(message),
            expected_output: None,
            actual_output: None,
            input_preview: record.input.as_deref().and_then(|s| snippet(s, INPUT_PREVIEW_LIMIT)),
        }
    }
}

/// A partial result for a submission aborted mid-way by a cancellation signal. The verdicts
/// gathered for cases judged before the signal arrived are kept; the rest are simply absent.
fn cancelled(verdicts: Vec<TestCaseVerdict>) -> JudgeResult {
    let total_score: f64 = verdicts.iter().map(|v| v.score).sum();
    let max_score: f64 = verdicts.iter().map(|v| v.max_score).sum();
    let passed_count = verdicts.iter().filter(|v| v.verdict == Verdict::AC.as_str()).count();
    let failed_count = verdicts.len() - passed_count;
    let total_time_ms: u64 = verdicts.iter().map(|v| v.execution_time_ms).sum();
    let max_memory_kb = verdicts.iter().map(|v| v.memory_used_kb).max().unwrap_or(0);

    JudgeResult {
        final_verdict: Verdict::IE.as_str(),
        total_score: round2(total_score),
        max_score: round2(max_score),
        score_percentage: 0.0,
        passed_count,
        failed_count,
        total_count: verdicts.len(),
        total_time_ms,
        max_memory_kb,
        test_verdicts: verdicts,
        compilation_status: None,
        compilation_message: None,
        diagnostic: Some("judging cancelled by signal".to_owned()),
    }
}

fn compilation_failure(compile: &CompileResult) -> JudgeResult {
    JudgeResult {
        final_verdict: Verdict::CE.as_str(),
        total_score: 0.0,
        max_score: 0.0,
        score_percentage: 0.0,
        passed_count: 0,
        failed_count: 0,
        total_count: 0,
        total_time_ms: 0,
        max_memory_kb: 0,
        test_verdicts: Vec::new(),
        compilation_status: Some("failed"),
        compilation_message: Some(compile.stderr.clone().unwrap_or_else(|| "Compilation failed".to_owned())),
        diagnostic: None,
    }
}

/// Fixed precedence scan: a case-level IE (unusable reference data, not the
/// submission's fault) wins outright since the submission was never fairly
/// judged; otherwise all-AC wins; otherwise the first of TLE/MLE/RE present
/// anywhere wins; otherwise WA.
fn final_verdict(verdicts: &[TestCaseVerdict]) -> Verdict {
    if verdicts.iter().any(|v| v.verdict == Verdict::IE.as_str()) {
        return Verdict::IE;
    }
    if verdicts.iter().all(|v| v.verdict == Verdict::AC.as_str()) {
        return Verdict::AC;
    }
    if verdicts.iter().any(|v| v.verdict == Verdict::TLE.as_str()) {
        return Verdict::TLE;
    }
    if verdicts.iter().any(|v| v.verdict == Verdict::MLE.as_str()) {
        return Verdict::MLE;
    }
    if verdicts.iter().any(|v| v.verdict == Verdict::RE.as_str()) {
        return Verdict::RE;
    }
    Verdict::WA
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn snippet(s: &str, limit: usize) -> Option<String> {
    if s.is_empty() {
        None
    } else if s.len() <= limit {
        Some(s.to_owned())
    } else {
        let mut end = limit;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        Some(s[..end].to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::parse_harness_output;

    fn config() -> ProblemConfig {
        ProblemConfig::default()
    }

    #[test]
    fn all_matching_cases_yield_accepted() {
        let doc = parse_harness_output(
            r#"{"test_results": [
                {"test_id": "t1", "status": "success", "actual_output": "3\n", "expected_output": "3\n"}
            ]}"#,
        )
        .unwrap();
        let config = config();
        let engine = VerdictEngine::new(&config);
        let result = engine.judge(&doc, None).unwrap();
        assert_eq!("AC", result.final_verdict);
        assert_eq!(1.0, result.total_score);
    }

    #[test]
    fn timeout_case_wins_over_wrong_answer() {
        let doc = parse_harness_output(
            r#"{"test_results": [
                {"test_id": "t1", "status": "success", "actual_output": "wrong", "expected_output": "right"},
                {"test_id": "t2", "status": "timed_out", "execution_time_ms": 5000}
            ]}"#,
        )
        .unwrap();
        let config = config();
        let engine = VerdictEngine::new(&config);
        let result = engine.judge(&doc, None).unwrap();
        assert_eq!("TLE", result.final_verdict);
    }

    #[test]
    fn compile_failure_short_circuits_to_ce() {
        let doc = parse_harness_output(
            r#"{"compile_result": {"success": false, "stderr": "error: expected ;"}, "test_results": []}"#,
        )
        .unwrap();
        let config = config();
        let engine = VerdictEngine::new(&config);
        let result = engine.judge(&doc, None).unwrap();
        assert_eq!("CE", result.final_verdict);
        assert_eq!(Some("failed"), result.compilation_status);
    }

    #[test]
    fn skipped_compile_step_is_not_a_failure() {
        let doc = parse_harness_output(
            r#"{"compile_result": {"success": false, "skipped": true},
                "test_results": [{"test_id": "t1", "status": "success", "actual_output": "1\n", "expected_output": "1\n"}]}"#,
        )
        .unwrap();
        let config = config();
        let engine = VerdictEngine::new(&config);
        let result = engine.judge(&doc, None).unwrap();
        assert_eq!("AC", result.final_verdict);
        assert_eq!(Some("success"), result.compilation_status);
    }

    #[test]
    fn unparseable_expected_float_output_yields_internal_error() {
        let doc = parse_harness_output(
            r#"{"test_results": [
                {"test_id": "t1", "status": "success", "actual_output": "1.0", "expected_output": "not-a-number"}
            ]}"#,
        )
        .unwrap();
        let mut config = config();
        config.comparison_mode = ComparisonMode::Float;
        let engine = VerdictEngine::new(&config);
        let result = engine.judge(&doc, None).unwrap();
        assert_eq!("IE", result.final_verdict);
        assert_eq!("IE", result.test_verdicts[0].verdict);
    }

    #[test]
    fn weighted_partial_credit_computes_percentage() {
        let doc = parse_harness_output(
            r#"{"test_results": [
                {"test_id": "t1", "status": "success", "actual_output": "1", "expected_output": "1"},
                {"test_id": "t2", "status": "success", "actual_output": "wrong", "expected_output": "2"}
            ]}"#,
        )
        .unwrap();
        let mut config = config();
        config.test_weights.insert("t1".to_owned(), 3.0);
        config.test_weights.insert("t2".to_owned(), 1.0);
        let engine = VerdictEngine::new(&config);
        let result = engine.judge(&doc, None).unwrap();
        assert_eq!("WA", result.final_verdict);
        assert_eq!(3.0, result.total_score);
        assert_eq!(4.0, result.max_score);
        assert_eq!(75.0, result.score_percentage);
    }
}
