use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

use crate::catalog::Category;

pub const CONFIG_FILE_NAME: &str = "wallpaper_config.json";
pub const DEFAULT_FREQUENCY_MINUTES: u32 = 60;
pub const DEFAULT_DOWNLOAD_DIR: &str = "wallpapers";

const KEY_FREQUENCY: &str = "frequency_minutes";
const KEY_WALLPAPER_TYPE: &str = "wallpaper_type";
const KEY_RUN_ON_STARTUP: &str = "run_on_startup";
const KEY_DOWNLOAD_DIR: &str = "download_dir";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub frequency_minutes: u32,
    pub wallpaper_type: Category,
    pub run_on_startup: bool,
    pub download_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            frequency_minutes: DEFAULT_FREQUENCY_MINUTES,
            wallpaper_type: Category::default(),
            run_on_startup: false,
            download_dir: PathBuf::from(DEFAULT_DOWNLOAD_DIR),
        }
    }
}

/// A single change accepted by [`ConfigStore::set`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Setting {
    FrequencyMinutes(u32),
    WallpaperType(Category),
    RunOnStartup(bool),
    DownloadDir(PathBuf),
}

/// File-backed settings. Every successful `set` rewrites the file.
///
/// Keys the store does not understand are carried through untouched so a
/// newer or hand-edited file survives a save.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    settings: Settings,
    extra: Map<String, Value>,
}

impl ConfigStore {
    /// `<config dir>/wallpaper_config.json` for the current user.
    pub fn default_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "wallcycle", "wallcycle")
            .context("Failed to get project directories")?;
        Ok(proj_dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    pub fn open_default() -> Result<Self> {
        Ok(Self::load(Self::default_path()?))
    }

    /// Reads the file at `path`. A missing or unreadable file yields defaults;
    /// nothing is written until the first `set` or `save`.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let document = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Value>(&content) {
                Ok(Value::Object(map)) => map,
                Ok(_) => {
                    log::warn!("Config {} is not a JSON object, using defaults", path.display());
                    Map::new()
                }
                Err(e) => {
                    log::warn!("Error parsing config {}: {}", path.display(), e);
                    Map::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => {
                log::warn!("Error loading config {}: {}", path.display(), e);
                Map::new()
            }
        };

        let (settings, extra) = settings_from_document(document);
        Self { path, settings, extra }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Download directory with relative paths anchored at the config file's
    /// directory.
    pub fn download_dir(&self) -> PathBuf {
        let dir = &self.settings.download_dir;
        if dir.is_absolute() {
            return dir.clone();
        }
        match self.path.parent() {
            Some(parent) => parent.join(dir),
            None => dir.clone(),
        }
    }

    pub fn set(&mut self, setting: Setting) -> Result<()> {
        match setting {
            Setting::FrequencyMinutes(0) => bail!("Frequency must be at least 1 minute"),
            Setting::FrequencyMinutes(minutes) => self.settings.frequency_minutes = minutes,
            Setting::WallpaperType(category) => self.settings.wallpaper_type = category,
            Setting::RunOnStartup(enabled) => self.settings.run_on_startup = enabled,
            Setting::DownloadDir(dir) => self.settings.download_dir = dir,
        }
        self.save()
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        let mut document = self.extra.clone();
        document.insert(KEY_FREQUENCY.into(), Value::from(self.settings.frequency_minutes));
        document.insert(
            KEY_WALLPAPER_TYPE.into(),
            Value::from(self.settings.wallpaper_type.as_str()),
        );
        document.insert(KEY_RUN_ON_STARTUP.into(), Value::from(self.settings.run_on_startup));
        document.insert(
            KEY_DOWNLOAD_DIR.into(),
            Value::from(self.settings.download_dir.to_string_lossy().into_owned()),
        );

        let content = serde_json::to_string_pretty(&Value::Object(document))?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write config {}", self.path.display()))?;
        log::debug!("Saved config to {}", self.path.display());
        Ok(())
    }
}

fn settings_from_document(mut document: Map<String, Value>) -> (Settings, Map<String, Value>) {
    let defaults = Settings::default();

    let frequency_minutes = document
        .remove(KEY_FREQUENCY)
        .and_then(|v| v.as_u64())
        .and_then(|v| u32::try_from(v).ok())
        .filter(|&v| v >= 1)
        .unwrap_or(defaults.frequency_minutes);

    let wallpaper_type = document
        .remove(KEY_WALLPAPER_TYPE)
        .and_then(|v| v.as_str().map(Category::from_name_or_default))
        .unwrap_or(defaults.wallpaper_type);

    let run_on_startup = document
        .remove(KEY_RUN_ON_STARTUP)
        .and_then(|v| v.as_bool())
        .unwrap_or(defaults.run_on_startup);

    let download_dir = document
        .remove(KEY_DOWNLOAD_DIR)
        .and_then(|v| v.as_str().filter(|s| !s.trim().is_empty()).map(PathBuf::from))
        .unwrap_or(defaults.download_dir);

    let settings = Settings {
        frequency_minutes,
        wallpaper_type,
        run_on_startup,
        download_dir,
    };
    (settings, document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> ConfigStore {
        ConfigStore::load(dir.path().join(CONFIG_FILE_NAME))
    }

    #[test]
    fn missing_file_gives_defaults_without_writing() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert_eq!(store.settings(), &Settings::default());
        assert!(!store.path().exists());
    }

    #[test]
    fn set_persists_each_key() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);

        store.set(Setting::FrequencyMinutes(15)).unwrap();
        store.set(Setting::WallpaperType(Category::Anime)).unwrap();
        store.set(Setting::RunOnStartup(true)).unwrap();
        store.set(Setting::DownloadDir(PathBuf::from("pics"))).unwrap();

        let reloaded = store_in(&dir);
        assert_eq!(reloaded.settings().frequency_minutes, 15);
        assert_eq!(reloaded.settings().wallpaper_type, Category::Anime);
        assert!(reloaded.settings().run_on_startup);
        assert_eq!(reloaded.settings().download_dir, PathBuf::from("pics"));
    }

    #[test]
    fn zero_frequency_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        assert!(store.set(Setting::FrequencyMinutes(0)).is_err());
        assert_eq!(store.settings().frequency_minutes, DEFAULT_FREQUENCY_MINUTES);
        assert!(!store.path().exists());
    }

    #[test]
    fn invalid_values_fall_back_and_unknown_keys_survive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(
            &path,
            r#"{"frequency_minutes": 0, "wallpaper_type": "cars", "run_on_startup": "yes", "theme": "dark"}"#,
        )
        .unwrap();

        let mut store = ConfigStore::load(&path);
        assert_eq!(store.settings(), &Settings::default());

        store.set(Setting::RunOnStartup(true)).unwrap();
        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["theme"], "dark");
        assert_eq!(raw["run_on_startup"], true);
        assert_eq!(raw["wallpaper_type"], "video_games");
    }

    #[test]
    fn garbage_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "not json at all").unwrap();
        assert_eq!(ConfigStore::load(&path).settings(), &Settings::default());
    }

    #[test]
    fn relative_download_dir_resolves_next_to_config() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        assert_eq!(store.download_dir(), dir.path().join(DEFAULT_DOWNLOAD_DIR));

        let absolute = dir.path().join("elsewhere");
        store.set(Setting::DownloadDir(absolute.clone())).unwrap();
        assert_eq!(store.download_dir(), absolute);
    }
}
