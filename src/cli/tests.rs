//! Unit tests for CLI commands

use crate::cli::{run_cli, Cli, Commands};
use clap::Parser;
use std::io::Write;

#[test]
fn test_serve_command_defaults() {
    let cli = Cli::try_parse_from(["tokengate", "serve", "--config", "gate.yaml"]).unwrap();

    match cli.command {
        Commands::Serve { config, addr } => {
            assert_eq!(config.to_string_lossy(), "gate.yaml");
            assert_eq!(addr, "0.0.0.0:8080");
        }
        _ => panic!("Expected Serve command"),
    }
}

#[test]
fn test_serve_command_with_addr() {
    let cli = Cli::try_parse_from([
        "tokengate",
        "serve",
        "-c",
        "gate.yaml",
        "--addr",
        "127.0.0.1:9000",
    ])
    .unwrap();

    match cli.command {
        Commands::Serve { addr, .. } => assert_eq!(addr, "127.0.0.1:9000"),
        _ => panic!("Expected Serve command"),
    }
}

#[test]
fn test_check_command_parses() {
    let cli = Cli::try_parse_from(["tokengate", "check", "--config", "gate.yaml"]).unwrap();
    assert!(matches!(cli.command, Commands::Check { .. }));
}

#[test]
fn test_check_accepts_valid_config() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "introspection:\n  url: https://dev.okta.com/oauth2/default/v1/introspect\n  client_id: c\n  client_secret: s"
    )
    .unwrap();
    let cli = Cli::try_parse_from([
        "tokengate",
        "check",
        "--config",
        file.path().to_str().unwrap(),
    ])
    .unwrap();
    assert!(run_cli(cli).is_ok());
}

#[test]
fn test_check_rejects_missing_file() {
    let cli = Cli::try_parse_from(["tokengate", "check", "--config", "/nonexistent/gate.yaml"])
        .unwrap();
    assert!(run_cli(cli).is_err());
}
