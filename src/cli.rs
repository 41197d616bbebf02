// Copyright (c) 2025 the devmux authors. Licensed under Apache License, Version 2.0.

//! Command-line surface.

use std::path::PathBuf;

use clap::Parser;

/// Default config file looked up in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = "devmux.yaml";

/// Terminal multiplexer for development workflows: run, supervise, and
/// switch between declared processes in one TUI.
#[derive(Debug, Parser)]
#[command(name = "devmux", version, about)]
pub struct Cli {
    /// Ad-hoc processes to run (each argument is one shell command).
    pub cmds: Vec<String>,

    /// Config file path (default: ./devmux.yaml when present).
    #[arg(short = 'c', long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Comma-separated names for the ad-hoc processes.
    #[arg(long, value_name = "n1,n2,...")]
    pub names: Option<String>,

    /// Load processes from package.json scripts.
    #[arg(long)]
    pub npm: bool,

    /// Listen address for the remote control socket.
    #[arg(long, value_name = "ADDR")]
    pub server: Option<String>,

    /// Send one control command (a YAML document) to a running instance
    /// and exit.
    #[arg(long, value_name = "YAML")]
    pub ctl: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_adhoc_cmds() {
        let cli = Cli::parse_from(["devmux", "npm run dev", "cargo watch"]);
        assert_eq!(cli.cmds, vec!["npm run dev", "cargo watch"]);
        assert!(cli.config.is_none());
        assert!(!cli.npm);
    }

    #[test]
    fn test_parse_flags() {
        let cli = Cli::parse_from([
            "devmux",
            "-c",
            "procs.yaml",
            "--names",
            "a,b",
            "--server",
            "127.0.0.1:4051",
        ]);
        assert_eq!(cli.config.unwrap(), PathBuf::from("procs.yaml"));
        assert_eq!(cli.names.as_deref(), Some("a,b"));
        assert_eq!(cli.server.as_deref(), Some("127.0.0.1:4051"));
    }

    #[test]
    fn test_parse_ctl() {
        let cli = Cli::parse_from(["devmux", "--ctl", "{c: quit}"]);
        assert_eq!(cli.ctl.as_deref(), Some("{c: quit}"));
    }
}
