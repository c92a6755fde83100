#[macro_use]
extern crate error_chain;
extern crate clap;
extern crate harness;

use std::io::Write;
use std::path::PathBuf;

use error_chain::ChainedError;

use harness::{RunnerConfig, TestRunner};

error_chain! {
    types {
        Error, ErrorKind, ResultExt, Result;
    }

    links {
        Harness(::harness::Error, ::harness::ErrorKind);
    }

    foreign_links {
        Io(::std::io::Error);
    }
}

fn get_arg_matches() -> clap::ArgMatches<'static> {
    clap::App::new("harness-bin")
        .version("0.1.0")
        .about("Runs a command under test against a suite of test cases inside the sandbox.")
        .arg(clap::Arg::with_name("test_cases_file")
            .required(true)
            .takes_value(true)
            .value_name("TEST_CASES_FILE")
            .help("path to the test-case document"))
        .arg(clap::Arg::with_name("command")
            .long("command")
            .required(true)
            .takes_value(true)
            .value_name("COMMAND")
            .help("the program under test, e.g. \"./solution\" or \"python3 solution.py\""))
        .arg(clap::Arg::with_name("time_limit_ms")
            .long("time-limit-ms")
            .takes_value(true)
            .default_value("5000"))
        .arg(clap::Arg::with_name("memory_limit_kb")
            .long("memory-limit-kb")
            .takes_value(true)
            .default_value("262144"))
        .arg(clap::Arg::with_name("workdir")
            .long("workdir")
            .takes_value(true))
        .arg(clap::Arg::with_name("no_network_isolation")
            .long("no-network-isolation"))
        .arg(clap::Arg::with_name("output")
            .long("output")
            .short("o")
            .takes_value(true))
        .arg(clap::Arg::with_name("verbose")
            .long("verbose")
            .short("v"))
        .get_matches()
}

fn do_main() -> Result<()> {
    let matches = get_arg_matches();

    stderrlog::new()
        .quiet(!matches.is_present("verbose"))
        .verbosity(3)
        .init()
        .unwrap();

    sandbox::cancellation::install_handler()
        .chain_err(|| "failed to install cancellation signal handler")?;

    let test_cases_file = matches.value_of("test_cases_file").unwrap();
    let text = std::fs::read_to_string(test_cases_file)?;
    let cases = harness::document::parse_test_cases(&text)?;

    let command = matches.value_of("command").unwrap()
        .split_whitespace()
        .map(str::to_owned)
        .collect::<Vec<_>>();
    if command.is_empty() {
        return Err(Error::from("--command must not be empty"));
    }

    let network_isolation = !matches.is_present("no_network_isolation")
        && sandbox::Sandbox::probe_network_unshare();

    let config = RunnerConfig {
        command,
        working_dir: matches.value_of("workdir").map(PathBuf::from),
        time_limit_ms: matches.value_of("time_limit_ms").unwrap().parse()
            .chain_err(|| "invalid --time-limit-ms")?,
        memory_limit_kb: matches.value_of("memory_limit_kb").unwrap().parse()
            .chain_err(|| "invalid --memory-limit-kb")?,
        network_isolation,
    };

    let runner = TestRunner::new(config);
    let summary = runner.run(&cases)?;

    let rendered = serde_json::to_string_pretty(&summary)
        .chain_err(|| "failed to serialize execution summary")?;

    match matches.value_of("output") {
        Some(path) => std::fs::write(path, rendered)?,
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            lock.write_all(rendered.as_bytes())?;
            lock.write_all(b"\n")?;
        }
    }

    Ok(())
}

fn main() {
    match do_main() {
        Ok(()) => (),
        Err(e) => {
            eprintln!("error: {}", e.display_chain());
            std::process::exit(1);
        }
    }
}
