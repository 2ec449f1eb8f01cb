//! Run-at-login registration for the current user.

use anyhow::{Context, Result};
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
use directories::BaseDirs;
use std::fs;
use std::path::Path;

pub const APP_NAME: &str = "Wallcycle";
pub const DESKTOP_FILE_NAME: &str = "wallcycle.desktop";

pub fn set_run_on_startup(enable: bool) -> Result<()> {
    let exe = std::env::current_exe().context("Failed to locate the running executable")?;
    set_run_on_startup_for(&exe, enable)
}

#[cfg(target_os = "windows")]
fn set_run_on_startup_for(exe: &Path, enable: bool) -> Result<()> {
    use winreg::enums::{HKEY_CURRENT_USER, KEY_QUERY_VALUE, KEY_SET_VALUE};
    use winreg::RegKey;

    let hkcu = RegKey::predef(HKEY_CURRENT_USER);
    let key = hkcu
        .open_subkey_with_flags(
            "Software\\Microsoft\\Windows\\CurrentVersion\\Run",
            KEY_SET_VALUE | KEY_QUERY_VALUE,
        )
        .context("Failed to open registry key for run on login")?;

    if enable {
        key.set_value(APP_NAME, &format!("\"{}\"", exe.display()))
            .context("Failed to set run on login")?;
        log::info!("Added to startup: {}", exe.display());
    } else {
        match key.delete_value(APP_NAME) {
            Ok(()) => log::info!("Removed from startup"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e).context("Failed to remove run on login"),
        }
    }
    Ok(())
}

#[cfg(target_os = "macos")]
fn set_run_on_startup_for(_exe: &Path, enable: bool) -> Result<()> {
    if enable {
        log::warn!("Run on startup is not supported on macOS");
    }
    Ok(())
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn set_run_on_startup_for(exe: &Path, enable: bool) -> Result<()> {
    let base_dirs = BaseDirs::new().context("Failed to get home directory")?;
    write_xdg_autostart(&base_dirs.config_dir().join("autostart"), exe, enable)
}

/// Freedesktop autostart entry launching `exe`.
pub fn desktop_entry(exe: &Path) -> String {
    format!(
        "[Desktop Entry]\n\
         Type=Application\n\
         Name={}\n\
         Comment=Rotates the desktop wallpaper\n\
         Exec=\"{}\"\n\
         Terminal=false\n\
         X-GNOME-Autostart-enabled=true\n",
        APP_NAME,
        exe.display()
    )
}

/// Creates or removes `<autostart_dir>/wallcycle.desktop`.
pub fn write_xdg_autostart(autostart_dir: &Path, exe: &Path, enable: bool) -> Result<()> {
    let entry = autostart_dir.join(DESKTOP_FILE_NAME);
    if enable {
        fs::create_dir_all(autostart_dir)
            .with_context(|| format!("Failed to create {}", autostart_dir.display()))?;
        fs::write(&entry, desktop_entry(exe))
            .with_context(|| format!("Failed to write {}", entry.display()))?;
        log::info!("Added to startup: {}", entry.display());
    } else if entry.exists() {
        fs::remove_file(&entry).with_context(|| format!("Failed to remove {}", entry.display()))?;
        log::info!("Removed from startup: {}", entry.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn enabling_writes_entry_and_disabling_removes_it() {
        let dir = TempDir::new().unwrap();
        let autostart = dir.path().join("autostart");
        let exe = Path::new("/opt/wallcycle/wallcycle-gui");

        write_xdg_autostart(&autostart, exe, true).unwrap();
        let content = fs::read_to_string(autostart.join(DESKTOP_FILE_NAME)).unwrap();
        assert!(content.starts_with("[Desktop Entry]"));
        assert!(content.contains("Exec=\"/opt/wallcycle/wallcycle-gui\""));

        write_xdg_autostart(&autostart, exe, false).unwrap();
        assert!(!autostart.join(DESKTOP_FILE_NAME).exists());
    }

    #[test]
    fn disabling_without_entry_is_fine() {
        let dir = TempDir::new().unwrap();
        write_xdg_autostart(dir.path(), Path::new("/bin/true"), false).unwrap();
    }
}
