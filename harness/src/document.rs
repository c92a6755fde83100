//! Parsing of the test-case document: the harness's input format, accepted in either a bare-array
//! or an object-wrapped shape, with every field accepted in snake_case or lowerCamelCase.

use serde::Deserialize;

use crate::{Error, ErrorKind, Result, TestCase};

const DEFAULT_WEIGHT: f64 = 1.0;

fn default_weight() -> f64 {
    DEFAULT_WEIGHT
}

#[derive(Debug, Deserialize)]
struct RawTestCase {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    input: String,
    #[serde(alias = "expectedOutput", default)]
    expected_output: String,
    #[serde(alias = "timeLimitMs", default)]
    time_limit_ms: Option<u64>,
    #[serde(alias = "memoryLimitKb", default)]
    memory_limit_kb: Option<u64>,
    #[serde(default)]
    hidden: bool,
    #[serde(default = "default_weight")]
    weight: f64,
    #[serde(alias = "stopOnFailure", default)]
    stop_on_failure: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawDocument {
    Wrapped {
        #[serde(alias = "testCases")]
        test_cases: Vec<RawTestCase>,
    },
    Bare(Vec<RawTestCase>),
}

/// Parse a test-case document from its raw JSON text.
pub fn parse_test_cases(text: &str) -> Result<Vec<TestCase>> {
    let raw: RawDocument = serde_json::from_str(text)
        .map_err(|e| Error::from(ErrorKind::InvalidDocument(e.to_string())))?;
    let entries = match raw {
        RawDocument::Wrapped { test_cases } => test_cases,
        RawDocument::Bare(cases) => cases,
    };

    let mut seen = std::collections::HashSet::new();
    let mut cases = Vec::with_capacity(entries.len());
    for (i, raw) in entries.into_iter().enumerate() {
        let id = raw.id.unwrap_or_else(|| format!("test-{}", i + 1));
        if !seen.insert(id.clone()) {
            bail!(ErrorKind::InvalidDocument(format!("duplicate test case id: {}", id)));
        }
        cases.push(TestCase {
            id,
            input: raw.input,
            expected_output: raw.expected_output,
            time_limit_ms: raw.time_limit_ms,
            memory_limit_kb: raw.memory_limit_kb,
            hidden: raw.hidden,
            weight: raw.weight,
            stop_on_failure: raw.stop_on_failure,
        });
    }

    Ok(cases)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_array_with_defaults() {
        let doc = r#"[{"id": "t1", "input": "3\n", "expected_output": "3\n"}]"#;
        let cases = parse_test_cases(doc).unwrap();
        assert_eq!(1, cases.len());
        assert_eq!("t1", cases[0].id);
        assert_eq!(DEFAULT_WEIGHT, cases[0].weight);
        assert!(!cases[0].hidden);
    }

    #[test]
    fn parses_wrapped_object_with_camel_case_fields() {
        let doc = r#"{"testCases": [{"input": "1", "expectedOutput": "1", "timeLimitMs": 500}]}"#;
        let cases = parse_test_cases(doc).unwrap();
        assert_eq!(1, cases.len());
        assert_eq!("test-1", cases[0].id);
        assert_eq!(Some(500), cases[0].time_limit_ms);
    }

    #[test]
    fn rejects_duplicate_ids() {
        let doc = r#"[{"id": "a", "input": "", "expected_output": ""},
                       {"id": "a", "input": "", "expected_output": ""}]"#;
        assert!(parse_test_cases(doc).is_err());
    }
}
