#[macro_use]
extern crate error_chain;
extern crate clap;
extern crate judge;

use std::path::PathBuf;

use error_chain::ChainedError;

use judge::config::{ComparisonMode, ProblemConfig};
use judge::document::{parse_expected_outputs, parse_harness_output};
use judge::VerdictEngine;

error_chain! {
    types {
        Error, ErrorKind, ResultExt, Result;
    }

    links {
        Judge(::judge::Error, ::judge::ErrorKind);
    }

    foreign_links {
        Io(::std::io::Error);
        Json(::serde_json::Error);
    }
}

fn get_arg_matches() -> clap::ArgMatches<'static> {
    clap::App::new("judge-bin")
        .version("0.1.0")
        .about("Applies a problem's comparison rules to a harness-output document and emits a verdict.")
        .arg(clap::Arg::with_name("harness_output")
            .required(true)
            .takes_value(true)
            .value_name("HARNESS_OUTPUT")
            .help("path to the harness-output document"))
        .arg(clap::Arg::with_name("expected")
            .long("expected")
            .short("e")
            .takes_value(true)
            .help("path to the expected-outputs document"))
        .arg(clap::Arg::with_name("special_judge")
            .long("special-judge")
            .short("s")
            .takes_value(true)
            .help("path to a special judge executable"))
        .arg(clap::Arg::with_name("problem_config")
            .long("problem-config")
            .short("p")
            .takes_value(true)
            .help("path to the problem-config document"))
        .arg(clap::Arg::with_name("output")
            .long("output")
            .short("o")
            .takes_value(true))
        .arg(clap::Arg::with_name("comparison")
            .long("comparison")
            .short("c")
            .takes_value(true)
            .possible_values(&["exact", "token", "float", "special"])
            .default_value("exact"))
        .arg(clap::Arg::with_name("tolerance")
            .long("tolerance")
            .short("t")
            .takes_value(true)
            .default_value("0.000001"))
        .arg(clap::Arg::with_name("case_insensitive")
            .long("case-insensitive"))
        .get_matches()
}

fn load_config(matches: &clap::ArgMatches) -> Result<ProblemConfig> {
    let mut config = match matches.value_of("problem_config") {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            judge::config::parse_problem_config(&text)?
        }
        None => ProblemConfig {
            comparison_mode: parse_comparison_mode(matches.value_of("comparison").unwrap())?,
            float_tolerance: matches.value_of("tolerance").unwrap().parse()
                .chain_err(|| "invalid --tolerance")?,
            case_sensitive: !matches.is_present("case_insensitive"),
            ..ProblemConfig::default()
        },
    };

    if let Some(path) = matches.value_of("special_judge") {
        config.special_judge_path = Some(PathBuf::from(path));
        config.comparison_mode = ComparisonMode::Special;
    }

    config.validate()?;
    Ok(config)
}

fn parse_comparison_mode(s: &str) -> Result<ComparisonMode> {
    match s {
        "exact" => Ok(ComparisonMode::Exact),
        "token" => Ok(ComparisonMode::Token),
        "float" => Ok(ComparisonMode::Float),
        "special" => Ok(ComparisonMode::Special),
        other => Err(format!("unsupported comparison mode: {}", other).into()),
    }
}

fn do_main() -> Result<bool> {
    let matches = get_arg_matches();

    sandbox::cancellation::install_handler()
        .chain_err(|| "failed to install cancellation signal handler")?;

    let harness_output_path = matches.value_of("harness_output").unwrap();
    let harness_output_text = std::fs::read_to_string(harness_output_path)?;
    let harness_output = parse_harness_output(&harness_output_text)?;

    let expected_outputs = matches
        .value_of("expected")
        .map(std::fs::read_to_string)
        .transpose()?
        .map(|text| parse_expected_outputs(&text))
        .transpose()?;

    let config = load_config(&matches)?;
    let engine = VerdictEngine::new(&config);
    let result = engine.judge(&harness_output, expected_outputs.as_ref())?;

    let rendered = serde_json::to_string_pretty(&result)
        .chain_err(|| "failed to serialize judge result")?;

    match matches.value_of("output") {
        Some(path) => std::fs::write(path, &rendered)?,
        None => println!("{}", rendered),
    }

    Ok(result.final_verdict == "AC")
}

fn main() {
    match do_main() {
        Ok(accepted) => std::process::exit(if accepted { 0 } else { 1 }),
        Err(e) => {
            eprintln!("error: {}", e.display_chain());
            std::process::exit(1);
        }
    }
}
