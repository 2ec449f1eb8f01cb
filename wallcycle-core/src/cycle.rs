use anyhow::Result;
use rand::seq::SliceRandom;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use crate::catalog::Category;
use crate::cleanup::cleanup;
use crate::config::{ConfigStore, Setting, Settings};
use crate::downloader::{HttpDownloader, ImageDownloader};
use crate::fetcher::{CandidateSource, GalleryFetcher};
use crate::scheduler::Scheduler;
use crate::wallpaper::{platform_service, WallpaperService};

/// Extra fetch-and-download attempts after the first one fails.
pub const MAX_RETRIES: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Set as background; older files were cleaned up.
    Applied(PathBuf),
    /// Downloaded but the platform call failed. Nothing was cleaned up.
    ApplyFailed(PathBuf),
    /// No candidate survived any attempt.
    NoWallpaper,
}

/// Owns the configuration and the components a cycle needs. Shared behind an
/// `Arc` by the scheduler and manual triggers.
pub struct WallpaperChanger {
    config: RwLock<ConfigStore>,
    fetcher: Box<dyn CandidateSource>,
    downloader: Box<dyn ImageDownloader>,
    wallpaper: Box<dyn WallpaperService>,
}

impl WallpaperChanger {
    /// Live components: gallery scraping over HTTP and the platform's
    /// wallpaper service.
    pub fn new(config: ConfigStore) -> Self {
        Self::with_components(
            config,
            Box::new(GalleryFetcher::new()),
            Box::new(HttpDownloader::new()),
            platform_service(),
        )
    }

    pub fn with_components(
        config: ConfigStore,
        fetcher: Box<dyn CandidateSource>,
        downloader: Box<dyn ImageDownloader>,
        wallpaper: Box<dyn WallpaperService>,
    ) -> Self {
        let download_dir = config.download_dir();
        if !download_dir.exists() {
            match std::fs::create_dir_all(&download_dir) {
                Ok(()) => log::info!("Created directory: {}", download_dir.display()),
                Err(e) => log::warn!("Failed to create {}: {}", download_dir.display(), e),
            }
        }

        Self {
            config: RwLock::new(config),
            fetcher,
            downloader,
            wallpaper,
        }
    }

    fn config(&self) -> RwLockReadGuard<'_, ConfigStore> {
        self.config.read().unwrap_or_else(|e| e.into_inner())
    }

    fn config_mut(&self) -> RwLockWriteGuard<'_, ConfigStore> {
        self.config.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn settings(&self) -> Settings {
        self.config().settings().clone()
    }

    pub fn config_path(&self) -> PathBuf {
        self.config().path().to_path_buf()
    }

    pub fn download_dir(&self) -> PathBuf {
        self.config().download_dir()
    }

    pub fn frequency(&self) -> Duration {
        Duration::from_secs(u64::from(self.config().settings().frequency_minutes) * 60)
    }

    pub fn set(&self, setting: Setting) -> Result<()> {
        self.config_mut().set(setting)
    }

    /// Writes the current settings, creating the file on first use.
    pub fn save_config(&self) -> Result<()> {
        self.config().save()
    }

    /// Re-reads the configuration file, picking up external edits.
    pub fn reload_config(&self) {
        let mut config = self.config_mut();
        let path = config.path().to_path_buf();
        *config = ConfigStore::load(path);
        log::info!("Reloaded settings from {}", config.path().display());
    }

    /// One cycle: fetch, download, apply, clean up. Never fails; the outcome
    /// is reported for display only.
    pub fn change_wallpaper(&self) -> CycleOutcome {
        let (category, dir) = {
            let config = self.config();
            (config.settings().wallpaper_type, config.download_dir())
        };

        let mut wallpaper_path = self.download_new_wallpaper(category, &dir);
        let mut attempts = 0;
        while wallpaper_path.is_none() && attempts < MAX_RETRIES {
            attempts += 1;
            log::warn!("Attempt {} failed. Trying again...", attempts);
            wallpaper_path = self.download_new_wallpaper(category, &dir);
        }

        let Some(wallpaper_path) = wallpaper_path else {
            log::error!("Failed to download a new wallpaper after {} attempts", MAX_RETRIES + 1);
            return CycleOutcome::NoWallpaper;
        };

        log::info!("Setting new wallpaper: {}", wallpaper_path.display());
        if let Err(e) = self.wallpaper.set_wallpaper_from_path(&wallpaper_path) {
            log::error!("Error setting wallpaper: {:#}", e);
            return CycleOutcome::ApplyFailed(wallpaper_path);
        }
        log::info!("Wallpaper set successfully");

        cleanup(&dir, &wallpaper_path);
        CycleOutcome::Applied(wallpaper_path)
    }

    fn download_new_wallpaper(&self, category: Category, dir: &Path) -> Option<PathBuf> {
        log::info!("Downloading a new {} wallpaper...", category);
        let mut candidates = self.fetcher.fetch_candidates(category);
        candidates.shuffle(&mut rand::thread_rng());

        let found = candidates
            .iter()
            .find_map(|url| self.downloader.download(url, dir));
        if found.is_none() {
            log::warn!("Failed to find suitable wallpaper from this source");
        }
        found
    }

    /// Scheduler that runs a cycle every `frequency_minutes`.
    pub fn scheduler(self: &Arc<Self>) -> Scheduler {
        let job_changer = Arc::clone(self);
        let interval_changer = Arc::clone(self);
        Scheduler::new(
            Arc::new(move || {
                job_changer.change_wallpaper();
            }),
            Arc::new(move || interval_changer.frequency()),
        )
    }
}
