// Application settings
// Loaded from ~/.config/capsheet/settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // API
    #[serde(rename = "api.baseUrl")]
    pub api_base: String,

    #[serde(rename = "api.timeoutSecs")]
    pub api_timeout_secs: u64,

    // Worksheet
    #[serde(rename = "worksheet.autosaveDebounceMs")]
    pub autosave_debounce_ms: u64,

    #[serde(rename = "worksheet.draftDir")]
    pub draft_dir: Option<PathBuf>, // None = <data_dir>/capsheet/drafts

    // User
    #[serde(rename = "user.userId")]
    pub user_id: Option<i64>, // None = ask /api/current-user
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:5000".to_string(),
            api_timeout_secs: 10,
            autosave_debounce_ms: 2000,
            draft_dir: None,
            user_id: None,
        }
    }
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("capsheet")
            .join("settings.json")
    }

    /// Load settings from the default location, falling back to defaults
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load settings from `path`. A missing or unreadable file yields defaults.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => {
                // Strip comments (lines starting with //)
                let cleaned: String = contents
                    .lines()
                    .filter(|line| !line.trim().starts_with("//"))
                    .collect::<Vec<_>>()
                    .join("\n");

                match serde_json::from_str(&cleaned) {
                    Ok(settings) => settings,
                    Err(e) => {
                        log::warn!("Error parsing {}: {}. Using default settings", path.display(), e);
                        Self::default()
                    }
                }
            }
            Err(e) => {
                log::warn!("Error reading {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Save current settings to the default location
    pub fn save(&self) -> Result<(), String> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        // Ensure directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| e.to_string())?;

        // Atomic: write .tmp then rename
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, json).map_err(|e| e.to_string())?;
        fs::rename(&tmp_path, path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            e.to_string()
        })
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs.max(1))
    }

    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }

    /// Directory holding per-user draft files
    pub fn effective_draft_dir(&self) -> PathBuf {
        self.draft_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("capsheet")
                .join("drafts")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("nope.json"));
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.autosave_debounce(), Duration::from_secs(2));
        assert_eq!(settings.api_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_dotted_keys_and_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{
    // Point at staging
    "api.baseUrl": "http://dashboard.internal:8080",
    "worksheet.autosaveDebounceMs": 500,
    "user.userId": 42
}"#,
        )
        .unwrap();

        let settings = Settings::load_from(&path);
        assert_eq!(settings.api_base, "http://dashboard.internal:8080");
        assert_eq!(settings.autosave_debounce_ms, 500);
        assert_eq!(settings.user_id, Some(42));
        // Unset keys keep their defaults
        assert_eq!(settings.api_timeout_secs, 10);
    }

    #[test]
    fn test_corrupt_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(Settings::load_from(&path), Settings::default());
    }

    #[test]
    fn test_save_round_trip_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = Settings {
            draft_dir: Some(dir.path().join("drafts")),
            ..Settings::default()
        };
        settings.save_to(&path).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("\"worksheet.draftDir\""));
        assert_eq!(Settings::load_from(&path), settings);
        assert_eq!(settings.effective_draft_dir(), dir.path().join("drafts"));
    }

    #[test]
    fn test_save_replaces_existing_file_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ stale").unwrap();

        let settings = Settings {
            user_id: Some(7),
            ..Settings::default()
        };
        settings.save_to(&path).unwrap();

        assert_eq!(Settings::load_from(&path), settings);
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["settings.json".to_string()]);
    }
}
