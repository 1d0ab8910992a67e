//! CLI parse tests.

use super::{Cli, CliCommand};
use clap::Parser;
use std::path::PathBuf;

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(args).unwrap()
}

#[test]
fn cli_parse_fetch() {
    let cli = parse(&["pagefetch", "fetch", "http://a.example/", "http://b.example/"]);
    match cli.command {
        CliCommand::Fetch { urls, workers } => {
            assert_eq!(urls, vec!["http://a.example/", "http://b.example/"]);
            assert_eq!(workers, 1);
        }
        _ => panic!("expected Fetch"),
    }
    assert!(cli.config.is_none());
}

#[test]
fn cli_parse_fetch_workers_and_config() {
    let cli = parse(&[
        "pagefetch",
        "fetch",
        "--workers",
        "4",
        "http://a.example/",
        "--config",
        "/tmp/pf.toml",
    ]);
    match cli.command {
        CliCommand::Fetch { workers, .. } => assert_eq!(workers, 4),
        _ => panic!("expected Fetch"),
    }
    assert_eq!(cli.config, Some(PathBuf::from("/tmp/pf.toml")));
}

#[test]
fn cli_fetch_requires_a_url() {
    assert!(Cli::try_parse_from(["pagefetch", "fetch"]).is_err());
}

#[test]
fn cli_parse_canonicalize() {
    match parse(&["pagefetch", "canonicalize", "page2.html", "--base", "http://example.com/dir/page1.html"]).command {
        CliCommand::Canonicalize { url, base } => {
            assert_eq!(url, "page2.html");
            assert_eq!(base.as_deref(), Some("http://example.com/dir/page1.html"));
        }
        _ => panic!("expected Canonicalize"),
    }
}

#[test]
fn cli_parse_config() {
    assert!(matches!(parse(&["pagefetch", "config"]).command, CliCommand::Config));
}
