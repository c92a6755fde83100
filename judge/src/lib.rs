//! The Judging & Verdict Engine: reads a harness-output document and an
//! expected-outputs document, applies a problem's comparison rules, and
//! produces a final verdict with a weighted score.
//!
//! This crate parses the harness-output document independently rather than
//! depending on the `harness` crate's types — in production the two run as
//! separate processes communicating over a JSON file, and the schema is the
//! actual contract between them, not the Rust types on either side. It does
//! depend on `sandbox` directly, to launch special judge programs through the
//! same execution envelope the harness uses for the program under test.

#[macro_use]
extern crate error_chain;
extern crate sandbox;

pub mod comparator;
pub mod config;
pub mod document;
pub mod special_judge;
pub mod verdict;

pub use config::{ComparisonMode, ProblemConfig};
pub use verdict::{JudgeResult, TestCaseVerdict, Verdict, VerdictEngine};

error_chain! {
    types {
        Error, ErrorKind, ResultExt, Result;
    }

    links {
        Sandbox(::sandbox::Error, ::sandbox::ErrorKind);
    }

    foreign_links {
        Io(::std::io::Error);
        Json(::serde_json::Error);
    }

    errors {
        InvalidDocument(detail: String) {
            description("malformed judge input document")
            display("malformed judge input document: {}", detail)
        }

        SpecialJudgeNotExecutable(path: String) {
            description("special judge program is missing or not executable")
            display("special judge program is missing or not executable: {}", path)
        }

        UnsupportedComparisonMode(mode: String) {
            description("unsupported comparison mode")
            display("unsupported comparison mode: {}", mode)
        }
    }
}
