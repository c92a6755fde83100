//! Standalone special judge: per-line partial credit with a 10%-per-extra-line
//! penalty. Opt-in only — never wired into the default comparison-mode
//! hierarchy; a problem selects it explicitly via `special_judge_path`.

use serde_json::json;

fn read_nonblank_lines(path: &str) -> std::io::Result<Vec<String>> {
    let text = std::fs::read_to_string(path)?;
    Ok(text.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_owned).collect())
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 4 {
        println!(
            "{}",
            json!({"verdict": "IE", "score": 0, "message": "Usage: partial-score <input> <expected> <actual> [test_id]"})
        );
        std::process::exit(1);
    }

    let expected_lines = match read_nonblank_lines(&args[2]) {
        Ok(lines) => lines,
        Err(e) => {
            println!("{}", json!({"verdict": "IE", "score": 0, "message": format!("Judge error: {}", e)}));
            std::process::exit(1);
        }
    };
    let mut actual_lines = match read_nonblank_lines(&args[3]) {
        Ok(lines) => lines,
        Err(e) => {
            println!("{}", json!({"verdict": "IE", "score": 0, "message": format!("Judge error: {}", e)}));
            std::process::exit(1);
        }
    };

    if expected_lines.is_empty() {
        if actual_lines.is_empty() {
            println!("{}", json!({"verdict": "AC", "score": 1.0, "message": "Both empty (correct)"}));
        } else {
            println!(
                "{}",
                json!({"verdict": "WA", "score": 0, "message": format!(
                    "Expected empty output, got {} lines", actual_lines.len())})
            );
        }
        return;
    }

    while actual_lines.len() < expected_lines.len() {
        actual_lines.push(String::new());
    }

    let mut correct_count = 0usize;
    let mut wrong_indices = Vec::new();
    for (i, (exp, act)) in expected_lines.iter().zip(actual_lines.iter()).enumerate() {
        if exp == act {
            correct_count += 1;
        } else {
            wrong_indices.push(i + 1);
        }
    }

    let total = expected_lines.len();
    let mut score = correct_count as f64 / total as f64;

    let extra_lines = actual_lines.len() as i64 - expected_lines.len() as i64;
    if extra_lines > 0 {
        score = (score - 0.1 * extra_lines as f64).max(0.0);
    }

    let rounded_score = (score * 10000.0).round() / 10000.0;

    if correct_count == total && extra_lines == 0 {
        println!(
            "{}",
            json!({"verdict": "AC", "passed": true, "score": rounded_score, "message": format!("All {} answers correct", total)})
        );
    } else if score > 0.0 {
        let message = if wrong_indices.len() <= 5 {
            format!("{}/{} correct. Wrong at: {:?}", correct_count, total, wrong_indices)
        } else {
            format!("{}/{} correct ({:.1}%)", correct_count, total, score * 100.0)
        };
        println!("{}", json!({"verdict": "WA", "passed": false, "score": rounded_score, "message": message}));
    } else {
        println!("{}", json!({"verdict": "WA", "passed": false, "score": rounded_score, "message": "No correct answers"}));
    }
}
