//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings):
//!   Windows: %APPDATA%\persona-preview\
//!   macOS:   ~/Library/Application Support/persona-preview/
//!   Linux:   ~/.config/persona-preview/
//!
//! Data dir (artifacts + generated outputs):
//!   Windows: %LOCALAPPDATA%\persona-preview\
//!   macOS:   ~/Library/Application Support/persona-preview/
//!   Linux:   ~/.local/share/persona-preview/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Directory for uploaded persona artifacts (face images, voice refs).
    pub artifacts_dir: PathBuf,
    /// Directory for generated previews and their metadata documents.
    pub outputs_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "persona-preview";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path (should be extremely rare in practice).
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let settings_file = config_dir.join("settings.toml");
        let artifacts_dir = data_dir.join("artifacts");
        let outputs_dir = data_dir.join("outputs");

        Self {
            config_dir,
            settings_file,
            artifacts_dir,
            outputs_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_non_empty() {
        let paths = AppPaths::new();
        assert!(paths.config_dir.to_str().is_some_and(|s| !s.is_empty()));
        assert!(paths.outputs_dir.to_str().is_some_and(|s| !s.is_empty()));
        assert!(paths
            .settings_file
            .file_name()
            .is_some_and(|n| n == "settings.toml"));
        assert!(paths
            .artifacts_dir
            .file_name()
            .is_some_and(|n| n == "artifacts"));
    }
}
