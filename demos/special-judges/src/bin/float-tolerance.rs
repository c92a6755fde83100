//! Standalone special judge: floating-point comparison under a split
//! absolute/relative tolerance, configurable via `FLOAT_ABS_TOL`/`FLOAT_REL_TOL`.

use serde_json::json;

fn env_tolerance(name: &str, default: f64) -> f64 {
    std::env::var(name).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn is_close(expected: f64, actual: f64, abs_tol: f64, rel_tol: f64) -> bool {
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
    if diff <= abs_tol {
        return true;
    }
    if expected != 0.0 {
        return diff <= rel_tol * expected.abs();
    }
    false
}

fn parse_floats(text: &str) -> Result<Vec<f64>, std::num::ParseFloatError> {
    text.split_whitespace().map(str::parse).collect()
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 4 {
        println!(
            "{}",
            json!({"verdict": "IE", "score": 0, "message": "Usage: float-tolerance <input> <expected> <actual> [test_id]"})
        );
        std::process::exit(1);
    }

    let abs_tol = env_tolerance("FLOAT_ABS_TOL", 1e-9);
    let rel_tol = env_tolerance("FLOAT_REL_TOL", 1e-6);

    let expected_text = match std::fs::read_to_string(&args[2]) {
        Ok(text) => text.trim().to_owned(),
        Err(e) => {
            println!("{}", json!({"verdict": "IE", "score": 0, "message": format!("Judge error: {}", e)}));
            std::process::exit(1);
        }
    };
    let actual_text = match std::fs::read_to_string(&args[3]) {
        Ok(text) => text.trim().to_owned(),
        Err(e) => {
            println!("{}", json!({"verdict": "IE", "score": 0, "message": format!("Judge error: {}", e)}));
            std::process::exit(1);
        }
    };

    let expected_values = match parse_floats(&expected_text) {
        Ok(v) => v,
        Err(e) => {
            println!("{}", json!({"verdict": "IE", "score": 0, "message": format!("Cannot parse expected output: {}", e)}));
            return;
        }
    };
    let actual_values = match parse_floats(&actual_text) {
        Ok(v) => v,
        Err(e) => {
            println!("{}", json!({"verdict": "WA", "score": 0, "message": format!("Cannot parse contestant output as float: {}", e)}));
            return;
        }
    };

    if expected_values.len() != actual_values.len() {
        println!(
            "{}",
            json!({"verdict": "WA", "score": 0, "message": format!(
                "Expected {} values, got {}", expected_values.len(), actual_values.len())})
        );
        return;
    }

    for (i, (exp, act)) in expected_values.iter().zip(actual_values.iter()).enumerate() {
        if !is_close(*exp, *act, abs_tol, rel_tol) {
            println!(
                "{}",
                json!({"verdict": "WA", "score": 0, "message": format!(
                    "Value {}: expected {}, got {} (diff: {:.2e})", i + 1, exp, act, (exp - act).abs())})
            );
            return;
        }
    }

    println!(
        "{}",
        json!({"verdict": "AC", "passed": true, "score": 1.0, "message": format!(
            "All {} value(s) within tolerance", expected_values.len())})
    );
}
