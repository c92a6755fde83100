//! Parsing of the judge's two input documents: the harness-output document
//! produced by the test harness, and the expected-outputs document supplied
//! separately by the problem setter.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use crate::{Error, ErrorKind, Result};

/// One test case's record as read back from the harness-output document.
#[derive(Debug, Clone)]
pub struct TestResultRecord {
    pub test_id: String,
    pub status: String,
    pub actual_output: String,
    pub expected_output: Option<String>,
    pub execution_time_ms: u64,
    pub memory_used_kb: u64,
    pub input: Option<String>,
    pub error: Option<String>,
    pub timed_out: bool,
}

/// A submission-level compile precondition, read from the harness-output
/// document's `compile_result` field.
#[derive(Debug, Clone)]
pub struct CompileResult {
    pub success: bool,
    pub skipped: bool,
    pub stderr: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCompileResult {
    #[serde(default = "default_true")]
    success: bool,
    #[serde(default)]
    skipped: bool,
    #[serde(default)]
    stderr: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct RawTestResult {
    #[serde(alias = "testId", default)]
    test_id: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(alias = "actualOutput", default)]
    actual_output: Option<String>,
    #[serde(alias = "expectedOutput", default)]
    expected_output: Option<String>,
    #[serde(alias = "executionTimeMs", default)]
    execution_time_ms: Option<u64>,
    #[serde(alias = "memoryUsedKb", default)]
    memory_used_kb: Option<u64>,
    #[serde(default)]
    input: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(alias = "timedOut", default)]
    timed_out: Option<bool>,
}

/// A harness-output document: compile precondition plus per-case test
/// results, in whichever of the two accepted shapes (multi-case array or
/// single-run synthetic wrap) it was written.
#[derive(Debug, Clone)]
pub struct HarnessOutputDocument {
    pub compile_result: Option<CompileResult>,
    pub test_results: Vec<TestResultRecord>,
}

/// Parse a harness-output document from its raw JSON text.
pub fn parse_harness_output(text: &str) -> Result<HarnessOutputDocument> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| Error::from(ErrorKind::InvalidDocument(e.to_string())))?;
    let object = value
        .as_object()
        .ok_or_else(|| Error::from(ErrorKind::InvalidDocument("expected a JSON object".to_owned())))?;

    let compile_result = object
        .get("compile_result")
        .or_else(|| object.get("compileResult"))
        .map(|v| {
            serde_json::from_value::<RawCompileResult>(v.clone())
                .map_err(|e| Error::from(ErrorKind::InvalidDocument(e.to_string())))
        })
        .transpose()?
        .map(|raw| CompileResult {
            success: raw.success,
            skipped: raw.skipped,
            stderr: raw.stderr.or(raw.error),
        });

    let raw_results = object
        .get("test_results")
        .or_else(|| object.get("testResults"))
        .cloned()
        .unwrap_or(Value::Array(Vec::new()));
    let mut raw_results: Vec<RawTestResult> = serde_json::from_value(raw_results)
        .map_err(|e| Error::from(ErrorKind::InvalidDocument(e.to_string())))?;

    // Per §6: a harness-output document with no test_results but a top-level
    // `stdout` field is a single-run result, synthetically wrapped as test-1.
    if raw_results.is_empty() && object.contains_key("stdout") {
        raw_results.push(RawTestResult {
            test_id: Some("test-1".to_owned()),
            status: Some(
                object
                    .get("status")
                    .and_then(Value::as_str)
                    .unwrap_or("success")
                    .to_owned(),
            ),
            actual_output: object
                .get("stdout")
                .or_else(|| object.get("output"))
                .and_then(Value::as_str)
                .map(str::to_owned),
            expected_output: None,
            execution_time_ms: object
                .get("execution_time_ms")
                .or_else(|| object.get("executionTimeMs"))
                .and_then(Value::as_u64),
            memory_used_kb: object
                .get("memory_used_kb")
                .or_else(|| object.get("memoryUsedKb"))
                .and_then(Value::as_u64),
            input: object.get("input").and_then(Value::as_str).map(str::to_owned),
            error: object.get("error").and_then(Value::as_str).map(str::to_owned),
            timed_out: object
                .get("timed_out")
                .or_else(|| object.get("timedOut"))
                .and_then(Value::as_bool),
        });
    }

    let mut test_results = Vec::with_capacity(raw_results.len());
    for (i, raw) in raw_results.into_iter().enumerate() {
        test_results.push(TestResultRecord {
            test_id: raw.test_id.unwrap_or_else(|| format!("test-{}", i + 1)),
            status: raw.status.unwrap_or_default(),
            actual_output: raw.actual_output.unwrap_or_default(),
            expected_output: raw.expected_output,
            execution_time_ms: raw.execution_time_ms.unwrap_or(0),
            memory_used_kb: raw.memory_used_kb.unwrap_or(0),
            input: raw.input,
            error: raw.error,
            timed_out: raw.timed_out.unwrap_or(false),
        });
    }

    Ok(HarnessOutputDocument { compile_result, test_results })
}

#[derive(Debug, Deserialize)]
struct RawExpectedCase {
    #[serde(default)]
    id: Option<String>,
    #[serde(alias = "testId", default)]
    test_id: Option<String>,
    #[serde(alias = "expectedOutput", default)]
    expected_output: String,
}

/// Parse an expected-outputs document: either an array of `{id,
/// expected_output}` entries, a direct `{test_id: expected_output}` mapping,
/// or a `{test_cases: [...]}` wrapper around the array form.
pub fn parse_expected_outputs(text: &str) -> Result<HashMap<String, String>> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| Error::from(ErrorKind::InvalidDocument(e.to_string())))?;

    match value {
        Value::Array(entries) => Ok(expected_from_list(entries)?),
        Value::Object(mut object) => {
            if let Some(list) = object.remove("test_cases").or_else(|| object.remove("testCases")) {
                let entries = list
                    .as_array()
                    .cloned()
                    .ok_or_else(|| Error::from(ErrorKind::InvalidDocument("test_cases must be an array".to_owned())))?;
                Ok(expected_from_list(entries)?)
            } else {
                let mut map = HashMap::with_capacity(object.len());
                for (key, v) in object {
                    if let Some(s) = v.as_str() {
                        map.insert(key, s.to_owned());
                    }
                }
                Ok(map)
            }
        }
        _ => bail!(ErrorKind::InvalidDocument(
            "expected outputs document must be an array or object".to_owned()
        )),
    }
}

fn expected_from_list(entries: Vec<Value>) -> Result<HashMap<String, String>> {
    let mut map = HashMap::with_capacity(entries.len());
    for (i, entry) in entries.into_iter().enumerate() {
        let raw: RawExpectedCase = serde_json::from_value(entry)
            .map_err(|e| Error::from(ErrorKind::InvalidDocument(e.to_string())))?;
        let id = raw.id.or(raw.test_id).unwrap_or_else(|| format!("test-{}", i + 1));
        map.insert(id, raw.expected_output);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_multi_case_document() {
        let doc = r#"{"test_results": [
            {"test_id": "t1", "status": "success", "actual_output": "3\n"}
        ]}"#;
        let parsed = parse_harness_output(doc).unwrap();
        assert_eq!(1, parsed.test_results.len());
        assert_eq!("t1", parsed.test_results[0].test_id);
    }

    #[test]
    fn wraps_single_run_document_as_test_1() {
        let doc = r#"{"status": "success", "stdout": "42\n", "execution_time_ms": 12}"#;
        let parsed = parse_harness_output(doc).unwrap();
        assert_eq!(1, parsed.test_results.len());
        assert_eq!("test-1", parsed.test_results[0].test_id);
        assert_eq!("42\n", parsed.test_results[0].actual_output);
    }

    #[test]
    fn wraps_single_run_document_accepting_snake_case_timed_out() {
        let doc = r#"{"status": "success", "stdout": "", "timed_out": true}"#;
        let parsed = parse_harness_output(doc).unwrap();
        assert!(parsed.test_results[0].timed_out);

        let doc = r#"{"status": "success", "stdout": "", "timedOut": true}"#;
        let parsed = parse_harness_output(doc).unwrap();
        assert!(parsed.test_results[0].timed_out);
    }

    #[test]
    fn parses_compile_result_failure() {
        let doc = r#"{"compile_result": {"success": false, "stderr": "syntax error"}, "test_results": []}"#;
        let parsed = parse_harness_output(doc).unwrap();
        let compile = parsed.compile_result.unwrap();
        assert!(!compile.success);
        assert_eq!(Some("syntax error".to_owned()), compile.stderr);
    }

    #[test]
    fn parses_expected_outputs_as_mapping() {
        let doc = r#"{"test-1": "42\n", "test-2": "7\n"}"#;
        let map = parse_expected_outputs(doc).unwrap();
        assert_eq!(Some(&"42\n".to_owned()), map.get("test-1"));
    }

    #[test]
    fn parses_expected_outputs_as_wrapped_list() {
        let doc = r#"{"test_cases": [{"id": "t1", "expected_output": "ok"}]}"#;
        let map = parse_expected_outputs(doc).unwrap();
        assert_eq!(Some(&"ok".to_owned()), map.get("t1"));
    }
}
