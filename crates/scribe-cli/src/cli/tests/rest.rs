//! Tests for status, cancel, remove and plan.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;

#[test]
fn cli_parse_status() {
    match parse(&["scribe", "status"]) {
        CliCommand::Status { id } => assert!(id.is_none()),
        _ => panic!("expected Status"),
    }
    match parse(&["scribe", "status", "7"]) {
        CliCommand::Status { id } => assert_eq!(id, Some(7)),
        _ => panic!("expected Status with id"),
    }
}

#[test]
fn cli_parse_cancel() {
    match parse(&["scribe", "cancel", "42"]) {
        CliCommand::Cancel { id } => assert_eq!(id, 42),
        _ => panic!("expected Cancel"),
    }
}

#[test]
fn cli_parse_cancel_requires_id() {
    assert!(Cli::try_parse_from(["scribe", "cancel"]).is_err());
}

#[test]
fn cli_parse_remove() {
    match parse(&["scribe", "remove", "99"]) {
        CliCommand::Remove { id, keep_files } => {
            assert_eq!(id, 99);
            assert!(!keep_files);
        }
        _ => panic!("expected Remove"),
    }
}

#[test]
fn cli_parse_remove_keep_files() {
    match parse(&["scribe", "remove", "3", "--keep-files"]) {
        CliCommand::Remove { id, keep_files } => {
            assert_eq!(id, 3);
            assert!(keep_files);
        }
        _ => panic!("expected Remove with --keep-files"),
    }
}

#[test]
fn cli_parse_plan() {
    match parse(&["scribe", "plan", "972", "--engine", "whisper-cpp", "--workers", "4"]) {
        CliCommand::Plan {
            duration,
            engine,
            workers,
        } => {
            assert_eq!(duration, 972.0);
            assert_eq!(engine.as_deref(), Some("whisper-cpp"));
            assert_eq!(workers, Some(4));
        }
        _ => panic!("expected Plan"),
    }
}

#[test]
fn cli_parse_unknown_subcommand_fails() {
    assert!(Cli::try_parse_from(["scribe", "pause", "1"]).is_err());
}
