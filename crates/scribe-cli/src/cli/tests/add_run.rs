//! Tests for add and run subcommands.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;

#[test]
fn cli_parse_add_defaults() {
    match parse(&["scribe", "add", "talk.mp3"]) {
        CliCommand::Add {
            source,
            engines,
            priority,
            options,
        } => {
            assert_eq!(source, "talk.mp3");
            assert!(engines.is_empty());
            assert_eq!(priority, 0);
            assert!(options.is_empty());
        }
        _ => panic!("expected Add"),
    }
}

#[test]
fn cli_parse_add_engines_priority_options() {
    match parse(&[
        "scribe",
        "add",
        "https://example.com/lecture.mp4",
        "--engine",
        "whisper-cpp",
        "--engine",
        "whisper-api",
        "--priority",
        "-2",
        "--option",
        "language=de",
        "--option",
        "prompt=a=b",
    ]) {
        CliCommand::Add {
            source,
            engines,
            priority,
            options,
        } => {
            assert_eq!(source, "https://example.com/lecture.mp4");
            assert_eq!(engines, vec!["whisper-cpp", "whisper-api"]);
            assert_eq!(priority, -2);
            assert_eq!(
                options,
                vec![
                    ("language".to_string(), "de".to_string()),
                    ("prompt".to_string(), "a=b".to_string()),
                ]
            );
        }
        _ => panic!("expected Add with engines"),
    }
}

#[test]
fn cli_parse_add_rejects_bad_option() {
    assert!(Cli::try_parse_from(["scribe", "add", "x.wav", "--option", "novalue"]).is_err());
    assert!(Cli::try_parse_from(["scribe", "add", "x.wav", "--option", "=v"]).is_err());
}

#[test]
fn cli_parse_run() {
    match parse(&["scribe", "run"]) {
        CliCommand::Run { jobs, serve } => {
            assert!(jobs.is_none());
            assert!(!serve);
        }
        _ => panic!("expected Run"),
    }
}

#[test]
fn cli_parse_run_jobs_serve() {
    match parse(&["scribe", "run", "--jobs", "4", "--serve"]) {
        CliCommand::Run { jobs, serve } => {
            assert_eq!(jobs, Some(4));
            assert!(serve);
        }
        _ => panic!("expected Run with --jobs and --serve"),
    }
}
