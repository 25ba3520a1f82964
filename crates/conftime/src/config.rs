//! CLI configuration: thin wrapper around `conftime_config`.
//!
//! Loads the file + environment layers and applies `GlobalOpts` flag
//! overrides on top (--port, --username, --key, ...).

use std::path::PathBuf;

pub use conftime_config::{Config, config_path, save_config_to, validate_amqp_url};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// The file this invocation reads and writes.
pub fn active_path(global: &GlobalOpts) -> PathBuf {
    global.config.clone().unwrap_or_else(config_path)
}

/// File + env, then flags. Validated.
pub fn resolve(global: &GlobalOpts) -> Result<Config, CliError> {
    let mut cfg = conftime_config::load_config_from(&active_path(global))?;
    apply_overrides(&mut cfg, global);
    cfg.validate()?;
    Ok(cfg)
}

fn apply_overrides(cfg: &mut Config, global: &GlobalOpts) {
    if let Some(port) = global.port {
        cfg.connection.port = port;
    }
    if let Some(ref username) = global.username {
        cfg.connection.username.clone_from(username);
    }
    if let Some(ref key) = global.key {
        cfg.connection.key.clone_from(key);
    }
    if global.verify_hostkey {
        cfg.connection.verify_hostkey = true;
    }
    if let Some(timeout) = global.timeout {
        cfg.connection.timeout = timeout;
    }
    if let Some(ref dir) = global.templates {
        cfg.templates.dir = Some(dir.clone());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::cli::Cli;

    fn global(args: &[&str]) -> GlobalOpts {
        let mut argv = vec!["conftime"];
        argv.extend_from_slice(args);
        argv.push("config");
        argv.push("path");
        Cli::try_parse_from(argv).unwrap().global
    }

    #[test]
    fn flags_override_file_values() {
        let mut cfg = Config::default();
        let g = global(&[
            "--port",
            "830",
            "-u",
            "netops",
            "--key",
            "/keys/id",
            "--verify-hostkey",
            "-t",
            "12",
            "--templates",
            "tpl",
        ]);
        apply_overrides(&mut cfg, &g);

        assert_eq!(cfg.connection.port, 830);
        assert_eq!(cfg.connection.username, "netops");
        assert_eq!(cfg.connection.key, PathBuf::from("/keys/id"));
        assert!(cfg.connection.verify_hostkey);
        assert_eq!(cfg.connection.timeout, 12);
        assert_eq!(cfg.templates.dir, Some(PathBuf::from("tpl")));
    }

    #[test]
    fn absent_flags_keep_file_values() {
        let mut cfg = Config::default();
        cfg.connection.username = "netops".into();
        apply_overrides(&mut cfg, &global(&[]));
        assert_eq!(cfg.connection.username, "netops");
        assert_eq!(cfg.connection.port, 22);
        assert!(cfg.templates.dir.is_none());
    }

    #[test]
    fn zero_timeout_flag_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let path_arg = path.to_str().unwrap();
        let g = global(&["--config", path_arg, "--timeout", "0"]);
        assert!(matches!(resolve(&g), Err(CliError::Validation { .. })));
    }
}
