//! Standalone special judge: normalised line-based exact comparison.
//!
//! Invoked as `exact-match <input> <expected> <actual> [test_id]`, per the
//! Special Judge Invoker's argv contract.

use serde_json::json;

fn normalize(text: &str) -> String {
    let mut lines: Vec<&str> = text.split('\n').map(str::trim_end).collect();
    while matches!(lines.last(), Some(&"")) {
        lines.pop();
    }
    lines.join("\n")
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 4 {
        println!(
            "{}",
            json!({"verdict": "IE", "score": 0, "message": "Usage: exact-match <input> <expected> <actual> [test_id]"})
        );
        std::process::exit(1);
    }

    let expected_path = &args[2];
    let actual_path = &args[3];

    let expected = match std::fs::read_to_string(expected_path) {
        Ok(text) => normalize(&text),
        Err(e) => return report_ie(&format!("Judge error: {}", e)),
    };
    let actual = match std::fs::read_to_string(actual_path) {
        Ok(text) => normalize(&text),
        Err(e) => return report_ie(&format!("Judge error: {}", e)),
    };

    if expected == actual {
        println!("{}", json!({"verdict": "AC", "passed": true, "score": 1.0, "message": "Output matches expected"}));
        return;
    }

    let exp_lines: Vec<&str> = expected.split('\n').collect();
    let act_lines: Vec<&str> = actual.split('\n').collect();

    let message = if exp_lines.len() != act_lines.len() {
        format!("Line count mismatch: expected {}, got {}", exp_lines.len(), act_lines.len())
    } else {
        match exp_lines.iter().zip(act_lines.iter()).position(|(e, a)| e != a) {
            Some(i) => format!("Difference at line {}", i + 1),
            None => "Output differs".to_owned(),
        }
    };

    println!("{}", json!({"verdict": "WA", "passed": false, "score": 0.0, "message": message}));
}

fn report_ie(message: &str) {
    println!("{}", json!({"verdict": "IE", "score": 0, "message": message}));
    std::process::exit(1);
}
