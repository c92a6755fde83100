//! The problem-config document: comparison rules and resource defaults that
//! apply to every test case of a problem unless overridden per case.

use std::collections::HashMap;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{Error, ErrorKind, Result};

/// How a test case's actual output is compared against its expected output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonMode {
    Exact,
    Token,
    Float,
    Special,
}

impl ComparisonMode {
    fn parse(s: &str) -> Result<ComparisonMode> {
        match s {
            "exact" => Ok(ComparisonMode::Exact),
            "token" => Ok(ComparisonMode::Token),
            "float" => Ok(ComparisonMode::Float),
            "special" => Ok(ComparisonMode::Special),
            other => bail!(ErrorKind::UnsupportedComparisonMode(other.to_owned())),
        }
    }
}

/// A problem's comparison rules and resource defaults, loaded from the
/// problem-config document or assembled from judge CLI flags.
#[derive(Debug, Clone)]
pub struct ProblemConfig {
    pub time_limit_ms: u64,
    pub memory_limit_kb: u64,
    pub comparison_mode: ComparisonMode,
    pub float_tolerance: f64,
    pub special_judge_path: Option<PathBuf>,
    pub case_sensitive: bool,
    pub ignore_trailing_whitespace: bool,
    pub ignore_trailing_newlines: bool,
    pub partial_scoring: bool,
    pub test_weights: HashMap<String, f64>,
}

impl Default for ProblemConfig {
    fn default() -> ProblemConfig {
        ProblemConfig {
            time_limit_ms: 5000,
            memory_limit_kb: 262_144,
            comparison_mode: ComparisonMode::Exact,
            float_tolerance: 1e-6,
            special_judge_path: None,
            case_sensitive: true,
            ignore_trailing_whitespace: true,
            ignore_trailing_newlines: true,
            partial_scoring: true,
            test_weights: HashMap::new(),
        }
    }
}

impl ProblemConfig {
    /// Weight assigned to `test_id`, falling back to 1.0 when the problem
    /// doesn't override it.
    pub fn weight_of(&self, test_id: &str) -> f64 {
        self.test_weights.get(test_id).copied().unwrap_or(1.0)
    }

    /// Check that `comparison_mode = special` implies `special_judge_path` is
    /// set and points at an executable file.
    pub fn validate(&self) -> Result<()> {
        if self.comparison_mode == ComparisonMode::Special {
            let path = self.special_judge_path.as_ref().ok_or_else(|| {
                Error::from(ErrorKind::InvalidDocument(
                    "comparison_mode is \"special\" but special_judge_path is not set".to_owned(),
                ))
            })?;
            check_executable(path)?;
        }
        Ok(())
    }
}

fn check_executable(path: &Path) -> Result<()> {
    let metadata = std::fs::metadata(path)
        .map_err(|_| Error::from(ErrorKind::SpecialJudgeNotExecutable(path.display().to_string())))?;
    if metadata.permissions().mode() & 0o111 == 0 {
        bail!(ErrorKind::SpecialJudgeNotExecutable(path.display().to_string()));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct RawProblemConfig {
    #[serde(alias = "timeLimitMs", default)]
    time_limit_ms: Option<u64>,
    #[serde(alias = "memoryLimitKb", default)]
    memory_limit_kb: Option<u64>,
    #[serde(alias = "comparisonMode", default)]
    comparison_mode: Option<String>,
    #[serde(alias = "floatTolerance", default)]
    float_tolerance: Option<f64>,
    #[serde(alias = "specialJudgePath", default)]
    special_judge_path: Option<String>,
    #[serde(alias = "caseSensitive", default)]
    case_sensitive: Option<bool>,
    #[serde(default)]
    ignore_trailing_whitespace: Option<bool>,
    #[serde(default)]
    ignore_trailing_newlines: Option<bool>,
    #[serde(alias = "partialScoring", default)]
    partial_scoring: Option<bool>,
    #[serde(alias = "testWeights", default)]
    test_weights: Option<HashMap<String, f64>>,
}

/// Parse a problem-config document from its raw JSON text.
pub fn parse_problem_config(text: &str) -> Result<ProblemConfig> {
    let raw: RawProblemConfig = serde_json::from_str(text)
        .map_err(|e| Error::from(ErrorKind::InvalidDocument(e.to_string())))?;
    let defaults = ProblemConfig::default();

    let comparison_mode = match raw.comparison_mode {
        Some(s) => ComparisonMode::parse(&s)?,
        None => defaults.comparison_mode,
    };

    let config = ProblemConfig {
        time_limit_ms: raw.time_limit_ms.unwrap_or(defaults.time_limit_ms),
        memory_limit_kb: raw.memory_limit_kb.unwrap_or(defaults.memory_limit_kb),
        comparison_mode,
        float_tolerance: raw.float_tolerance.unwrap_or(defaults.float_tolerance),
        special_judge_path: raw.special_judge_path.map(PathBuf::from),
        case_sensitive: raw.case_sensitive.unwrap_or(defaults.case_sensitive),
        ignore_trailing_whitespace: raw
            .ignore_trailing_whitespace
            .unwrap_or(defaults.ignore_trailing_whitespace),
        ignore_trailing_newlines: raw
            .ignore_trailing_newlines
            .unwrap_or(defaults.ignore_trailing_newlines),
        partial_scoring: raw.partial_scoring.unwrap_or(defaults.partial_scoring),
        test_weights: raw.test_weights.unwrap_or_default(),
    };

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_original_judge() {
        let config = ProblemConfig::default();
        assert_eq!(5000, config.time_limit_ms);
        assert_eq!(262_144, config.memory_limit_kb);
        assert_eq!(ComparisonMode::Exact, config.comparison_mode);
        assert!((config.float_tolerance - 1e-6).abs() < 1e-12);
    }

    #[test]
    fn parses_camel_case_fields() {
        let doc = r#"{"comparisonMode": "token", "floatTolerance": 0.01, "testWeights": {"t1": 2.0}}"#;
        let config = parse_problem_config(doc).unwrap();
        assert_eq!(ComparisonMode::Token, config.comparison_mode);
        assert_eq!(2.0, config.weight_of("t1"));
        assert_eq!(1.0, config.weight_of("t2"));
    }

    #[test]
    fn special_mode_without_path_is_rejected() {
        let doc = r#"{"comparison_mode": "special"}"#;
        assert!(parse_problem_config(doc).is_err());
    }
}
