//! CLI argument definitions for the Vaultflow binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Vaultflow: approval-gated automation over a folder vault.
#[derive(Parser, Debug)]
#[command(name = "vaultflow", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Vault root, overriding `general.vault_root`.
    #[arg(short = 'v', long = "vault", global = true)]
    pub vault: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create the vault folders and write a default config if none exists.
    Init,
    /// Run one reasoning pass (plan tasks, execute approved plans) and exit.
    RunOnce,
    /// Run the folder watchers and periodic reasoning until Ctrl-C.
    Watch,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > VAULTFLOW_CONFIG env var > ~/.vaultflow/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("VAULTFLOW_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the vault root.
    ///
    /// Priority: --vault flag > config file value (with `~` expanded).
    pub fn resolve_vault_root(&self, config_root: &str) -> PathBuf {
        match self.vault {
            Some(ref p) => p.clone(),
            None => expand_home(config_root),
        }
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }
}

fn home_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    let home = std::env::var("USERPROFILE");
    #[cfg(not(target_os = "windows"))]
    let home = std::env::var("HOME");
    home.ok().map(PathBuf::from)
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        if let Some(home) = home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    match home_dir() {
        Some(home) => home.join(".vaultflow").join("config.toml"),
        None => PathBuf::from("config.toml"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_subcommands() {
        let args = CliArgs::parse_from(["vaultflow", "run-once"]);
        assert_eq!(args.command, Command::RunOnce);
        let args = CliArgs::parse_from(["vaultflow", "watch", "--vault", "/srv/vault"]);
        assert_eq!(args.command, Command::Watch);
        assert_eq!(args.vault, Some(PathBuf::from("/srv/vault")));
    }

    #[test]
    fn test_config_flag_wins() {
        let args = CliArgs::parse_from(["vaultflow", "--config", "/etc/vf.toml", "init"]);
        assert_eq!(args.resolve_config_path(), PathBuf::from("/etc/vf.toml"));
    }

    #[test]
    fn test_vault_and_log_level_fallbacks() {
        let args = CliArgs::parse_from(["vaultflow", "init"]);
        assert_eq!(args.resolve_vault_root("/data/vault"), PathBuf::from("/data/vault"));
        assert_eq!(args.resolve_log_level("warn"), "warn");

        let args = CliArgs::parse_from(["vaultflow", "-l", "debug", "init"]);
        assert_eq!(args.resolve_log_level("warn"), "debug");
    }

    #[test]
    fn test_expand_home_leaves_absolute_paths() {
        assert_eq!(expand_home("/abs/path"), PathBuf::from("/abs/path"));
    }
}
