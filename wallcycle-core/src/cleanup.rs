use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Every format the downloader can decode is listed here.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "webp"];

pub fn is_wallpaper_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Removes every wallpaper image in `dir` except `keep`. Returns how many
/// files were deleted. Failures on individual files are logged and skipped.
pub fn cleanup(dir: &Path, keep: &Path) -> usize {
    cleanup_with(dir, keep, |path| fs::remove_file(path))
}

fn cleanup_with<F>(dir: &Path, keep: &Path, mut remove: F) -> usize
where
    F: FnMut(&Path) -> io::Result<()>,
{
    let keep = canonical(keep);
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::error!("Error during cleanup of {}: {}", dir.display(), e);
            return 0;
        }
    };

    let mut removed = 0;
    for path in entries.filter_map(|entry| entry.ok()).map(|entry| entry.path()) {
        if !path.is_file() || !is_wallpaper_file(&path) || canonical(&path) == keep {
            continue;
        }
        match remove(&path) {
            Ok(()) => {
                log::info!("Removed old wallpaper: {}", path.display());
                removed += 1;
            }
            Err(e) => log::warn!("Failed to remove {}: {}", path.display(), e),
        }
    }
    removed
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}
