//! Config subcommand implementation.

use crate::config::{AppSettings, Paths};
use crate::error::{CliResult, ConfigError};
use crate::output;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

/// Inspect or initialise the settings file.
#[derive(Parser, Debug)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective settings as JSON (file plus environment)
    Show,

    /// Print the settings file location
    Path,

    /// Write a settings file populated with defaults
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl ConfigCommand {
    /// Execute the config command. `custom` is the global `--config` path.
    pub fn execute(&self, custom: Option<&Path>, quiet: bool) -> CliResult<()> {
        match &self.action {
            ConfigAction::Show => {
                let settings = AppSettings::load_or_default(custom)?;
                println!("{}", serde_json::to_string_pretty(&settings)?);
            }
            ConfigAction::Path => {
                println!("{}", settings_path(custom)?.display());
            }
            ConfigAction::Init { force } => {
                let path = settings_path(custom)?;
                init(&path, *force)?;
                if !quiet {
                    output::print_success(&format!("Wrote default settings to {}", path.display()));
                }
            }
        }
        Ok(())
    }
}

fn settings_path(custom: Option<&Path>) -> CliResult<PathBuf> {
    match custom {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(Paths::get()?.settings_file()),
    }
}

fn init(path: &Path, force: bool) -> CliResult<()> {
    if path.exists() && !force {
        return Err(ConfigError::WriteFailed {
            path: path.to_path_buf(),
            reason: "file already exists (use --force to overwrite)".to_string(),
        }
        .into());
    }
    AppSettings::default().save_to(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_writes_loadable_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        init(&path, false).unwrap();
        assert_eq!(AppSettings::load_from(&path).unwrap(), AppSettings::default());
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"max_workers": 3}"#).unwrap();

        assert!(init(&path, false).is_err());
        assert_eq!(AppSettings::load_from(&path).unwrap().max_workers, 3);

        init(&path, true).unwrap();
        assert_eq!(AppSettings::load_from(&path).unwrap().max_workers, 6);
    }

    #[test]
    fn test_custom_path_wins() {
        let custom = Path::new("/tmp/perimeter.json");
        assert_eq!(settings_path(Some(custom)).unwrap(), custom);
    }
}
