// Copyright (c) 2025 the devmux authors. Licensed under Apache License, Version 2.0.

use clap::Parser;
use devmux::{app,
             cli::{Cli, DEFAULT_CONFIG_FILE},
             config::Config,
             package_json, server};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging();

    // Client mode: deliver one command to a running instance and exit.
    if let Some(yaml) = &cli.ctl {
        let addr = cli.server.as_deref().unwrap_or(server::DEFAULT_ADDR);
        return server::send_command(addr, yaml).await;
    }

    let mut config = load_config(&cli)?;
    if cli.server.is_some() {
        config.server = cli.server.clone();
    }
    if config.procs.is_empty() {
        miette::bail!(
            "No processes to run. Give commands as arguments, or declare them in {}.",
            DEFAULT_CONFIG_FILE
        );
    }

    app::run(config).await
}

/// Config precedence: ad-hoc commands beat `--npm`, which beats `-c`; with
/// no source given, `./devmux.yaml` is used when it exists.
fn load_config(cli: &Cli) -> miette::Result<Config> {
    if !cli.cmds.is_empty() {
        return Config::from_cli_cmds(&cli.cmds, cli.names.as_deref());
    }
    if cli.npm {
        return package_json::load_npm_procs(".");
    }
    if let Some(path) = &cli.config {
        return Config::from_file(path);
    }
    if std::path::Path::new(DEFAULT_CONFIG_FILE).exists() {
        return Config::from_file(DEFAULT_CONFIG_FILE);
    }
    Ok(Config::default())
}

/// The TUI owns the terminal, so logs go to the file named by
/// `DEVMUX_LOG`; without it, logging is off.
fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let path = std::env::var("DEVMUX_LOG").ok()?;
    let file = match std::fs::File::create(&path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Cannot open log file '{path}': {e}");
            return None;
        }
    };
    let (writer, guard) = tracing_appender::non_blocking(file);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("devmux=debug")),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Some(guard)
}
