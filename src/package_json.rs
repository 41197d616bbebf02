// Copyright (c) 2025 the devmux authors. Licensed under Apache License, Version 2.0.

//! `--npm` support: turn the scripts of a `package.json` into process
//! declarations (`npm run <script>`), none of them autostarted.

use std::{collections::BTreeMap, path::Path};

use serde::Deserialize;

use crate::config::{Config, ProcDecl};

#[derive(Deserialize)]
struct PackageJson {
    #[serde(default)]
    scripts: BTreeMap<String, String>,
}

/// Load declarations from `package.json` in `dir`.
///
/// # Errors
///
/// Returns an error when the file is missing or not valid JSON.
pub fn load_npm_procs(dir: impl AsRef<Path>) -> miette::Result<Config> {
    let path = dir.as_ref().join("package.json");
    let text = std::fs::read_to_string(&path)
        .map_err(|e| miette::miette!("Cannot read '{}': {}", path.display(), e))?;
    let package: PackageJson = serde_json::from_str(&text)
        .map_err(|e| miette::miette!("Invalid '{}': {}", path.display(), e))?;

    if package.scripts.is_empty() {
        miette::bail!("'{}' has no scripts", path.display());
    }

    let procs = package
        .scripts
        .keys()
        .map(|name| ProcDecl {
            autostart: false,
            ..ProcDecl::from_shell(name, format!("npm run {name}"))
        })
        .collect();

    Ok(Config {
        procs,
        ..Config::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripts_become_procs() {
        let dir = std::env::temp_dir().join(format!("devmux-npm-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("package.json"),
            r#"{"name": "x", "scripts": {"dev": "vite", "test": "vitest"}}"#,
        )
        .unwrap();

        let config = load_npm_procs(&dir).unwrap();
        assert_eq!(config.procs.len(), 2);
        assert_eq!(config.procs[0].name, "dev");
        assert!(!config.procs[0].autostart);
        assert_eq!(
            config.procs[0].cmd,
            crate::config::CmdSpec::Shell("npm run dev".into())
        );

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_scripts_rejected() {
        let dir = std::env::temp_dir().join(format!("devmux-npm2-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("package.json"), r#"{"name": "x"}"#).unwrap();
        assert!(load_npm_procs(&dir).is_err());
        std::fs::remove_dir_all(&dir).ok();
    }
}
