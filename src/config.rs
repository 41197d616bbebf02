// Copyright (c) 2025 the devmux authors. Licensed under Apache License, Version 2.0.

//! Configuration: the declared process list and global options.
//!
//! Config files are YAML (a JSON superset, so JSON configs parse
//! unchanged). A process declaration is either a bare shell string, a bare
//! argv array, or a full mapping:
//!
//! ```yaml
//! procs:
//!   web: npm run dev
//!   worker: ["cargo", "run", "--bin", "worker"]
//!   db:
//!     shell: docker compose up db
//!     env:
//!       RUST_LOG: debug
//!       UNSET_ME: null
//!     autorestart: true
//!     stop: SIGTERM
//! server: 127.0.0.1:4050
//! ```

use std::path::Path;

use indexmap::IndexMap;
use miette::IntoDiagnostic;
use portable_pty::CommandBuilder;
use serde::{Deserialize, Serialize};

use crate::key::Key;

/// Bound for the per-process scrollback ring when the config does not
/// override it.
pub const DEFAULT_SCROLLBACK_LEN: usize = 1000;

/// How a process is asked to stop.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum StopSignal {
    #[serde(rename = "SIGINT")]
    Sigint,
    #[serde(rename = "SIGTERM")]
    Sigterm,
    #[serde(rename = "SIGKILL")]
    Sigkill,
    #[serde(rename = "hard-kill")]
    HardKill,
    #[serde(rename = "send-keys")]
    SendKeys(Vec<Key>),
}

impl Default for StopSignal {
    fn default() -> Self { StopSignal::Sigterm }
}

/// The command a declaration runs: an argv vector or a shell line.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CmdSpec {
    Cmd(Vec<String>),
    Shell(String),
}

/// One declared process; immutable after load.
#[derive(Clone, Debug)]
pub struct ProcDecl {
    pub name: String,
    pub cmd: CmdSpec,
    /// `Some(None)` for a variable means "unset it in the child".
    pub env: Option<IndexMap<String, Option<String>>>,
    pub cwd: Option<String>,
    pub tty: bool,
    pub autostart: bool,
    pub autorestart: bool,
    pub stop: StopSignal,
}

impl ProcDecl {
    /// A declaration for an ad-hoc command given on the command line.
    #[must_use]
    pub fn from_shell(name: impl Into<String>, shell: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cmd: CmdSpec::Shell(shell.into()),
            env: None,
            cwd: None,
            tty: true,
            autostart: true,
            autorestart: false,
            stop: StopSignal::default(),
        }
    }

    /// Resolve the declaration to a concrete program and argument list.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty argv.
    pub fn program_and_args(&self) -> miette::Result<(String, Vec<String>)> {
        match &self.cmd {
            CmdSpec::Cmd(argv) => match argv.split_first() {
                Some((program, args)) => Ok((program.clone(), args.to_vec())),
                None => miette::bail!("Process '{}' has an empty cmd array", self.name),
            },
            CmdSpec::Shell(line) => {
                if cfg!(target_os = "windows") {
                    Ok(("cmd".into(), vec!["/C".into(), line.clone()]))
                } else {
                    Ok(("sh".into(), vec!["-c".into(), line.clone()]))
                }
            }
        }
    }

    /// Build the PTY command: program, args, env overrides (inheriting the
    /// parent's environment otherwise), and a working directory that always
    /// ends up set.
    ///
    /// # Errors
    ///
    /// Returns an error when the argv is empty or no working directory can
    /// be determined.
    pub fn command_builder(&self) -> miette::Result<CommandBuilder> {
        let (program, args) = self.program_and_args()?;
        let mut cmd = CommandBuilder::new(program);
        cmd.args(args);

        if let Some(env) = &self.env {
            for (name, value) in env {
                match value {
                    Some(value) => cmd.env(name, value),
                    None => cmd.env_remove(name),
                }
            }
        }

        // The PTY layer defaults to $HOME; pin the cwd so children start
        // where the multiplexer was launched.
        match &self.cwd {
            Some(cwd) => cmd.cwd(cwd),
            None => cmd.cwd(std::env::current_dir().into_diagnostic()?),
        }

        Ok(cmd)
    }
}

#[derive(Debug)]
pub struct Config {
    pub procs: Vec<ProcDecl>,
    /// Remote control listen address (`--server` overrides).
    pub server: Option<String>,
    pub scrollback_len: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            procs: Vec::new(),
            server: None,
            scrollback_len: DEFAULT_SCROLLBACK_LEN,
        }
    }
}

// Serde surface: declarations accept three shapes.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawDecl {
    Shell(String),
    Argv(Vec<String>),
    Full(Box<RawFullDecl>),
}

fn default_true() -> bool { true }

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFullDecl {
    cmd: Option<Vec<String>>,
    shell: Option<String>,
    env: Option<IndexMap<String, Option<String>>>,
    cwd: Option<String>,
    #[serde(default = "default_true")]
    tty: bool,
    #[serde(default = "default_true")]
    autostart: bool,
    #[serde(default)]
    autorestart: bool,
    #[serde(default)]
    stop: StopSignal,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    procs: IndexMap<String, RawDecl>,
    #[serde(default)]
    server: Option<String>,
    #[serde(default)]
    scrollback: Option<usize>,
}

impl Config {
    /// Load a config file. Errors here are fatal and reported before the
    /// TUI starts.
    ///
    /// # Errors
    ///
    /// Returns an error when the file is missing, unreadable, or invalid.
    pub fn from_file(path: impl AsRef<Path>) -> miette::Result<Config> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            miette::miette!("Cannot read config file '{}': {}", path.display(), e)
        })?;
        Self::from_str(&text)
            .map_err(|e| miette::miette!("Invalid config '{}': {}", path.display(), e))
    }

    /// Parse a config document from a string.
    ///
    /// # Errors
    ///
    /// Returns an error when the document is not valid YAML/JSON or a
    /// declaration is contradictory.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(text: &str) -> miette::Result<Config> {
        let raw: RawConfig = serde_yaml::from_str(text).into_diagnostic()?;

        let mut procs = Vec::with_capacity(raw.procs.len());
        for (name, decl) in raw.procs {
            procs.push(resolve_decl(name, decl)?);
        }

        Ok(Config {
            procs,
            server: raw.server,
            scrollback_len: raw.scrollback.unwrap_or(DEFAULT_SCROLLBACK_LEN),
        })
    }

    /// Build a config from ad-hoc shell commands given on the command line,
    /// optionally renamed via `--names`.
    ///
    /// # Errors
    ///
    /// Returns an error when more names than commands are given.
    pub fn from_cli_cmds(cmds: &[String], names: Option<&str>) -> miette::Result<Config> {
        let names: Vec<&str> = names
            .map(|list| list.split(',').map(str::trim).collect())
            .unwrap_or_default();
        if names.len() > cmds.len() {
            miette::bail!(
                "--names lists {} names for {} commands",
                names.len(),
                cmds.len()
            );
        }

        let procs = cmds
            .iter()
            .enumerate()
            .map(|(i, cmd)| {
                let name = names.get(i).copied().unwrap_or(cmd.as_str());
                ProcDecl::from_shell(name, cmd.clone())
            })
            .collect();

        Ok(Config {
            procs,
            ..Config::default()
        })
    }
}

fn resolve_decl(name: String, raw: RawDecl) -> miette::Result<ProcDecl> {
    match raw {
        RawDecl::Shell(shell) => Ok(ProcDecl::from_shell(name, shell)),
        RawDecl::Argv(argv) => {
            if argv.is_empty() {
                miette::bail!("Process '{}': cmd array is empty", name);
            }
            Ok(ProcDecl {
                cmd: CmdSpec::Cmd(argv),
                ..ProcDecl::from_shell(name, "")
            })
        }
        RawDecl::Full(full) => {
            let cmd = match (full.cmd, full.shell) {
                (Some(argv), None) if !argv.is_empty() => CmdSpec::Cmd(argv),
                (Some(_), None) => {
                    miette::bail!("Process '{}': cmd array is empty", name)
                }
                (None, Some(shell)) => CmdSpec::Shell(shell),
                (None, None) => {
                    miette::bail!("Process '{}': either 'cmd' or 'shell' is required", name)
                }
                (Some(_), Some(_)) => {
                    miette::bail!("Process '{}': 'cmd' and 'shell' are exclusive", name)
                }
            };
            Ok(ProcDecl {
                name,
                cmd,
                env: full.env,
                cwd: full.cwd,
                tty: full.tty,
                autostart: full.autostart,
                autorestart: full.autorestart,
                stop: full.stop,
            })
        }
    }
}
