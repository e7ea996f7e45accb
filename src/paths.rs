//! Configuration file location
//!
//! The config file is looked up in this order:
//!
//! 1. An explicit `--config` path, used as is
//! 2. `companion.yaml` in the current working directory
//! 3. `companion.yaml` next to the executable (portable installs)
//! 4. `companion.yaml` in the per-user config directory
//!    (`%APPDATA%\OSC MIDI Companion` on Windows)
//!
//! When no candidate exists, the per-user location is returned so the caller
//! can report where a config would be read from.

use std::path::{Path, PathBuf};
use tracing::debug;

/// Application name used for the per-user config directory
const APP_NAME: &str = "OSC MIDI Companion";

/// Config file name
pub const CONFIG_FILE_NAME: &str = "companion.yaml";

/// Where the configuration came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    CommandLine,
    WorkingDirectory,
    ExecutableDirectory,
    UserConfigDirectory,
}

/// Resolved configuration path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLocation {
    pub path: PathBuf,
    pub source: ConfigSource,
}

/// Directory containing the running executable
fn exe_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()))
}

/// Resolve the config file location for this process
pub fn resolve_config(explicit: Option<&Path>) -> ConfigLocation {
    let cwd = std::env::current_dir().ok();
    let user_dir = dirs::config_dir().map(|dir| dir.join(APP_NAME));
    resolve_config_in(explicit, cwd.as_deref(), exe_dir().as_deref(), user_dir.as_deref())
}

/// Resolve against explicit search directories
pub fn resolve_config_in(
    explicit: Option<&Path>,
    cwd: Option<&Path>,
    exe_dir: Option<&Path>,
    user_dir: Option<&Path>,
) -> ConfigLocation {
    if let Some(path) = explicit {
        return ConfigLocation {
            path: path.to_path_buf(),
            source: ConfigSource::CommandLine,
        };
    }

    let candidates = [
        (cwd, ConfigSource::WorkingDirectory),
        (exe_dir, ConfigSource::ExecutableDirectory),
        (user_dir, ConfigSource::UserConfigDirectory),
    ];

    for (dir, source) in candidates {
        let Some(dir) = dir else { continue };
        let path = dir.join(CONFIG_FILE_NAME);
        debug!("Looking for config at {}", path.display());
        if path.is_file() {
            return ConfigLocation { path, source };
        }
    }

    let fallback = user_dir
        .or(cwd)
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));

    ConfigLocation {
        path: fallback,
        source: ConfigSource::UserConfigDirectory,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::TempDir;

    #[test]
    fn test_explicit_path_wins() {
        let location = resolve_config_in(
            Some(Path::new("custom.yaml")),
            Some(Path::new("/nonexistent")),
            None,
            None,
        );

        assert_eq!(location.path, PathBuf::from("custom.yaml"));
        assert_eq!(location.source, ConfigSource::CommandLine);
    }

    #[test]
    fn test_search_order() -> Result<()> {
        let cwd = TempDir::new()?;
        let exe = TempDir::new()?;
        let user = TempDir::new()?;

        std::fs::write(exe.path().join(CONFIG_FILE_NAME), "settings: {}\n")?;
        std::fs::write(user.path().join(CONFIG_FILE_NAME), "settings: {}\n")?;

        let location =
            resolve_config_in(None, Some(cwd.path()), Some(exe.path()), Some(user.path()));
        assert_eq!(location.source, ConfigSource::ExecutableDirectory);
        assert_eq!(location.path, exe.path().join(CONFIG_FILE_NAME));

        std::fs::write(cwd.path().join(CONFIG_FILE_NAME), "settings: {}\n")?;
        let location =
            resolve_config_in(None, Some(cwd.path()), Some(exe.path()), Some(user.path()));
        assert_eq!(location.source, ConfigSource::WorkingDirectory);

        Ok(())
    }

    #[test]
    fn test_missing_everywhere_points_at_user_dir() -> Result<()> {
        let cwd = TempDir::new()?;
        let user = TempDir::new()?;

        let location = resolve_config_in(None, Some(cwd.path()), None, Some(user.path()));

        assert_eq!(location.source, ConfigSource::UserConfigDirectory);
        assert_eq!(location.path, user.path().join(CONFIG_FILE_NAME));
        assert!(!location.path.exists());
        Ok(())
    }
}
