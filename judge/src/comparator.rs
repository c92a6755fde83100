//! The built-in comparator suite: exact, token, and float comparison, each
//! applied after a shared normalisation pass.

use crate::config::{ComparisonMode, ProblemConfig};

/// Fixed absolute tolerance used alongside a problem's configurable relative
/// tolerance, matching the split-tolerance policy of the standalone
/// float-tolerance special judge.
const FLOAT_ABS_TOL: f64 = 1e-9;

/// Outcome of comparing one test case's actual output against its expected
/// output with the built-in comparator suite.
pub struct MatchResult {
    pub passed: bool,
    pub message: String,
    /// Set when the mismatch stems from the reference data itself being unusable (e.g. the
    /// expected output cannot be parsed as the problem's comparison mode expects), as opposed to
    /// the submission's own output being wrong. The caller surfaces this as a case-level IE
    /// rather than a WA.
    pub internal_error: bool,
}

impl MatchResult {
    fn ok(message: impl Into<String>) -> MatchResult {
        MatchResult { passed: true, message: message.into(), internal_error: false }
    }

    fn fail(message: impl Into<String>) -> MatchResult {
        MatchResult { passed: false, message: message.into(), internal_error: false }
    }

    fn internal_error(message: impl Into<String>) -> MatchResult {
        MatchResult { passed: false, message: message.into(), internal_error: true }
    }
}

/// Strip per-line trailing whitespace, trailing newlines, and fold case,
/// according to `config`.
pub fn normalize(text: &str, config: &ProblemConfig) -> String {
    let mut result = text.to_owned();

    if config.ignore_trailing_whitespace {
        result = result
            .split('\n')
            .map(|line| line.trim_end())
            .collect::<Vec<_>>()
            .join("\n");
    }

    if config.ignore_trailing_newlines {
        result = result.trim_end_matches('\n').to_owned();
    }

    if !config.case_sensitive {
        result = result.to_lowercase();
    }

    result
}

/// Run `mode` over `expected`/`actual`. Only the built-in modes are handled
/// here; `ComparisonMode::Special` is the invoker's job.
pub fn compare(mode: ComparisonMode, expected: &str, actual: &str, config: &ProblemConfig) -> MatchResult {
    match mode {
        ComparisonMode::Token => token_match(expected, actual, config),
        ComparisonMode::Float => float_match_with_tolerance(expected, actual, config.float_tolerance),
        ComparisonMode::Exact | ComparisonMode::Special => exact_match(expected, actual, config),
    }
}

fn exact_match(expected: &str, actual: &str, config: &ProblemConfig) -> MatchResult {
    let norm_expected = normalize(expected, config);
    let norm_actual = normalize(actual, config);

    if norm_expected == norm_actual {
        return MatchResult::ok("Output matches expected");
    }

    let exp_lines: Vec<&str> = norm_expected.split('\n').collect();
    let act_lines: Vec<&str> = norm_actual.split('\n').collect();

    if exp_lines.len() != act_lines.len() {
        return MatchResult::fail(format!(
            "Line count mismatch: expected {}, got {}",
            exp_lines.len(),
            act_lines.len()
        ));
    }

    for (i, (exp_line, act_line)) in exp_lines.iter().zip(act_lines.iter()).enumerate() {
        if exp_line != act_line {
            return MatchResult::fail(format!("Difference at line {}", i + 1));
        }
    }

    MatchResult::fail("Output differs from expected")
}

fn token_match(expected: &str, actual: &str, config: &ProblemConfig) -> MatchResult {
    let fold = |s: &str| -> Vec<String> {
        let tokens = s.split_whitespace();
        if config.case_sensitive {
            tokens.map(str::to_owned).collect()
        } else {
            tokens.map(|t| t.to_lowercase()).collect()
        }
    };

    let exp_tokens = fold(expected);
    let act_tokens = fold(actual);

    if exp_tokens == act_tokens {
        return MatchResult::ok("All tokens match");
    }

    if exp_tokens.len() != act_tokens.len() {
        return MatchResult::fail(format!(
            "Token count mismatch: expected {}, got {}",
            exp_tokens.len(),
            act_tokens.len()
        ));
    }

    for (i, (exp_tok, act_tok)) in exp_tokens.iter().zip(act_tokens.iter()).enumerate() {
        if exp_tok != act_tok {
            return MatchResult::fail(format!(
                "Token mismatch at position {}: expected '{}', got '{}'",
                i + 1,
                exp_tok,
                act_tok
            ));
        }
    }

    MatchResult::fail("Tokens differ")
}

/// Run the float comparator with an explicit relative tolerance, as used by a
/// problem's `float_tolerance` setting rather than the hardcoded default.
pub fn float_match_with_tolerance(expected: &str, actual: &str, rel_tol: f64) -> MatchResult {
    let exp_values = match parse_floats(expected) {
        Ok(v) => v,
        Err(e) => return MatchResult::internal_error(format!("Cannot parse expected output as float: {}", e)),
    };
    let act_values = match parse_floats(actual) {
        Ok(v) => v,
        Err(e) => return MatchResult::fail(format!("Cannot parse as float: {}", e)),
    };

    if exp_values.len() != act_values.len() {
        return MatchResult::fail(format!(
            "Value count mismatch: expected {}, got {}",
            exp_values.len(),
            act_values.len()
        ));
    }

    for (i, (exp_val, act_val)) in exp_values.iter().zip(act_values.iter()).enumerate() {
        if !floats_close(*exp_val, *act_val, FLOAT_ABS_TOL, rel_tol) {
            return MatchResult::fail(format!(
                "Value mismatch at position {}: expected {}, got {} (tolerance: {})",
                i + 1,
                exp_val,
                act_val,
                rel_tol
            ));
        }
    }

    MatchResult::ok("All values within tolerance")
}

fn parse_floats(text: &str) -> std::result::Result<Vec<f64>, std::num::ParseFloatError> {
    text.split_whitespace().map(str::parse).collect()
}

/// Compare two floats under a dual absolute/relative tolerance, with the same
/// NaN/infinity special cases as the standalone float-tolerance judge.
pub fn floats_close(expected: f64, actual: f64, abs_tol: f64, rel_tol: f64) -> bool {
    if expected.is_nan() && actual.is_nan() {
        return true;
    }
    if expected.is_nan() || actual.is_nan() {
        return false;
    }
    if expected.is_infinite() && actual.is_infinite() {
        return expected.is_sign_positive() == actual.is_sign_positive();
    }
    if expected.is_infinite() || actual.is_infinite() {
        return false;
    }

    let diff = (expected - actual).abs();
    diff <= abs_tol || diff <= rel_tol * expected.abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ProblemConfig {
        ProblemConfig::default()
    }

    #[test]
    fn exact_match_ignores_trailing_whitespace_and_newline() {
        let result = exact_match("1 2 3\n", "1 2 3   \n\n", &config());
        assert!(result.passed);
    }

    #[test]
    fn exact_match_reports_line_difference() {
        let result = exact_match("a\nb\n", "a\nc\n", &config());
        assert!(!result.passed);
        assert_eq!("Difference at line 2", result.message);
    }

    #[test]
    fn token_match_is_whitespace_insensitive() {
        let result = token_match("1  2   3", "1\n2\n3", &config());
        assert!(result.passed);
    }

    #[test]
    fn float_match_accepts_within_tolerance() {
        let result = float_match_with_tolerance("1.0 2.0", "1.0000001 2.0000002", 1e-6);
        assert!(result.passed);
    }

    #[test]
    fn float_match_rejects_outside_tolerance() {
        let result = float_match_with_tolerance("1.0", "1.1", 1e-6);
        assert!(!result.passed);
        assert!(!result.internal_error);
    }

    #[test]
    fn float_match_flags_unparseable_expected_as_internal_error() {
        let result = float_match_with_tolerance("not-a-number", "1.0", 1e-6);
        assert!(!result.passed);
        assert!(result.internal_error);
    }

    #[test]
    fn float_match_treats_unparseable_actual_as_plain_mismatch() {
        let result = float_match_with_tolerance("1.0", "not-a-number", 1e-6);
        assert!(!result.passed);
        assert!(!result.internal_error);
    }

    #[test]
    fn floats_close_treats_same_signed_infinities_as_equal() {
        assert!(floats_close(f64::INFINITY, f64::INFINITY, 1e-9, 1e-6));
        assert!(!floats_close(f64::INFINITY, f64::NEG_INFINITY, 1e-9, 1e-6));
    }
}
