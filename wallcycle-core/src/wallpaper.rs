use anyhow::{anyhow, bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Sets the desktop background. One implementation per platform, chosen once
/// by [`platform_service`].
pub trait WallpaperService: Send + Sync {
    fn set_wallpaper_from_path(&self, file_path: &Path) -> Result<()>;
}

pub fn platform_service() -> Box<dyn WallpaperService> {
    #[cfg(target_os = "windows")]
    {
        Box::new(WindowsWallpaper)
    }

    #[cfg(target_os = "macos")]
    {
        Box::new(MacWallpaper)
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        let desktop = DesktopEnvironment::detect();
        log::info!("Detected desktop environment: {}", desktop);
        Box::new(LinuxWallpaper::new(desktop))
    }
}

fn absolute_path(path: &Path) -> Result<PathBuf> {
    std::fs::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .with_context(|| format!("Failed to resolve {}", path.display()))
}

/// Native `SystemParametersInfoW(SPI_SETDESKWALLPAPER)` through the
/// `wallpaper` crate.
#[derive(Debug, Default)]
pub struct WindowsWallpaper;

impl WallpaperService for WindowsWallpaper {
    fn set_wallpaper_from_path(&self, file_path: &Path) -> Result<()> {
        let path = absolute_path(file_path)?;
        wallpaper::set_from_path(&path.to_string_lossy())
            .map_err(|e| anyhow!("Failed to set wallpaper {}: {}", path.display(), e))
    }
}

#[derive(Debug, Default)]
pub struct MacWallpaper;

impl MacWallpaper {
    pub fn script(path: &Path) -> String {
        let escaped = path
            .to_string_lossy()
            .replace('\\', "\\\\")
            .replace('"', "\\\"");
        format!(
            "tell application \"System Events\" to tell every desktop to set picture to POSIX file \"{}\"",
            escaped
        )
    }
}

impl WallpaperService for MacWallpaper {
    fn set_wallpaper_from_path(&self, file_path: &Path) -> Result<()> {
        let path = absolute_path(file_path)?;
        run(&ShellCommand::required("osascript", vec!["-e".into(), Self::script(&path)]))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DesktopEnvironment {
    Gnome,
    Kde,
    Mate,
    Xfce,
    Lxde,
    Fluxbox,
    IceWm,
    Blackbox,
    Unknown(String),
}

impl std::fmt::Display for DesktopEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DesktopEnvironment::Gnome => f.write_str("gnome"),
            DesktopEnvironment::Kde => f.write_str("kde"),
            DesktopEnvironment::Mate => f.write_str("mate"),
            DesktopEnvironment::Xfce => f.write_str("xfce4"),
            DesktopEnvironment::Lxde => f.write_str("lxde"),
            DesktopEnvironment::Fluxbox => f.write_str("fluxbox"),
            DesktopEnvironment::IceWm => f.write_str("icewm"),
            DesktopEnvironment::Blackbox => f.write_str("blackbox"),
            DesktopEnvironment::Unknown(name) => write!(f, "unknown ({})", name),
        }
    }
}

/// Session variables consulted when detecting the desktop.
#[derive(Debug, Clone, Default)]
pub struct SessionEnv {
    pub xdg_current_desktop: Option<String>,
    pub desktop_session: Option<String>,
    pub kde_full_session: bool,
    pub gnome_desktop_session_id: bool,
}

impl SessionEnv {
    pub fn from_env() -> Self {
        Self {
            xdg_current_desktop: std::env::var("XDG_CURRENT_DESKTOP").ok(),
            desktop_session: std::env::var("DESKTOP_SESSION").ok(),
            kde_full_session: std::env::var("KDE_FULL_SESSION").unwrap_or_default() == "true",
            gnome_desktop_session_id: std::env::var("GNOME_DESKTOP_SESSION_ID").is_ok(),
        }
    }
}

impl DesktopEnvironment {
    pub fn detect() -> Self {
        Self::from_session(&SessionEnv::from_env())
    }

    pub fn from_session(env: &SessionEnv) -> Self {
        if let Some(current) = &env.xdg_current_desktop {
            if let Some(desktop) = current.split(':').find_map(Self::from_name) {
                return desktop;
            }
        }
        if let Some(session) = &env.desktop_session {
            if let Some(desktop) = Self::from_name(session) {
                return desktop;
            }
        }
        if env.kde_full_session {
            return DesktopEnvironment::Kde;
        }
        if env.gnome_desktop_session_id {
            return DesktopEnvironment::Gnome;
        }

        let name = env
            .xdg_current_desktop
            .clone()
            .or_else(|| env.desktop_session.clone())
            .unwrap_or_default();
        DesktopEnvironment::Unknown(name)
    }

    fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_lowercase();
        let desktop = match name.as_str() {
            "gnome" | "unity" | "cinnamon" | "x-cinnamon" | "budgie" | "budgie-desktop" | "pop"
            | "gnome-classic" | "gnome-xorg" => DesktopEnvironment::Gnome,
            "kde" | "plasma" | "plasmawayland" | "trinity" => DesktopEnvironment::Kde,
            "mate" => DesktopEnvironment::Mate,
            "lxde" => DesktopEnvironment::Lxde,
            "fluxbox" | "openbox" | "jwm" | "afterstep" => DesktopEnvironment::Fluxbox,
            "icewm" => DesktopEnvironment::IceWm,
            "blackbox" => DesktopEnvironment::Blackbox,
            n if n.contains("xfce") || n.starts_with("xubuntu") => DesktopEnvironment::Xfce,
            n if n.starts_with("ubuntustudio") || n.starts_with("kubuntu") => DesktopEnvironment::Kde,
            n if n.starts_with("lubuntu") => DesktopEnvironment::Lxde,
            n if n.starts_with("ubuntu") => DesktopEnvironment::Gnome,
            _ => return None,
        };
        Some(desktop)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    pub program: &'static str,
    pub args: Vec<String>,
    /// A failing optional command is logged and ignored.
    pub required: bool,
}

impl ShellCommand {
    fn required(program: &'static str, args: Vec<String>) -> Self {
        Self { program, args, required: true }
    }

    fn optional(program: &'static str, args: Vec<String>) -> Self {
        Self { program, args, required: false }
    }
}

fn run(command: &ShellCommand) -> Result<()> {
    let output = Command::new(command.program)
        .args(&command.args)
        .output()
        .with_context(|| format!("Failed to run {}", command.program))?;
    if !output.status.success() {
        bail!(
            "{} exited with {}: {}",
            command.program,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}

pub fn kde_script(path: &Path) -> String {
    format!(
        "var allDesktops = desktops();\
         for (i = 0; i < allDesktops.length; i++) {{\
         d = allDesktops[i];\
         d.wallpaperPlugin = \"org.kde.image\";\
         d.currentConfigGroup = Array(\"Wallpaper\", \"org.kde.image\", \"General\");\
         d.writeConfig(\"Image\", \"file://{}\");\
         }}",
        path.to_string_lossy().replace('"', "\\\"")
    )
}

/// Commands that set `path` on `desktop`. XFCE and unknown desktops are
/// handled separately and yield nothing here.
pub fn desktop_commands(desktop: &DesktopEnvironment, path: &Path) -> Vec<ShellCommand> {
    let file_loc = path.to_string_lossy().into_owned();
    match desktop {
        DesktopEnvironment::Gnome => {
            let uri = format!("file://{}", file_loc);
            vec![
                ShellCommand::required(
                    "gsettings",
                    vec!["set".into(), "org.gnome.desktop.background".into(), "picture-uri".into(), uri.clone()],
                ),
                // Only present on GNOME 42 and later.
                ShellCommand::optional(
                    "gsettings",
                    vec!["set".into(), "org.gnome.desktop.background".into(), "picture-uri-dark".into(), uri],
                ),
            ]
        }
        DesktopEnvironment::Kde => vec![ShellCommand::required(
            "qdbus",
            vec![
                "org.kde.plasmashell".into(),
                "/PlasmaShell".into(),
                "org.kde.PlasmaShell.evaluateScript".into(),
                kde_script(path),
            ],
        )],
        DesktopEnvironment::Mate => vec![ShellCommand::required(
            "gsettings",
            vec!["set".into(), "org.mate.background".into(), "picture-filename".into(), file_loc],
        )],
        DesktopEnvironment::Lxde => vec![ShellCommand::required(
            "pcmanfm",
            vec!["--set-wallpaper".into(), file_loc, "--wallpaper-mode=scaled".into()],
        )],
        DesktopEnvironment::Fluxbox => vec![ShellCommand::required("fbsetbg", vec![file_loc])],
        DesktopEnvironment::IceWm => vec![ShellCommand::required("icewmbg", vec![file_loc])],
        DesktopEnvironment::Blackbox => {
            vec![ShellCommand::required("bsetbg", vec!["-full".into(), file_loc])]
        }
        DesktopEnvironment::Xfce | DesktopEnvironment::Unknown(_) => Vec::new(),
    }
}

#[derive(Debug)]
pub struct LinuxWallpaper {
    desktop: DesktopEnvironment,
}

impl LinuxWallpaper {
    pub fn new(desktop: DesktopEnvironment) -> Self {
        Self { desktop }
    }

    pub fn desktop(&self) -> &DesktopEnvironment {
        &self.desktop
    }

    fn set_xfce(path: &str) -> Result<()> {
        let list_output = Command::new("xfconf-query")
            .args(["-c", "xfce4-desktop", "-l"])
            .output()
            .context("Failed to run xfconf-query")?;

        if list_output.status.success() {
            let properties = String::from_utf8_lossy(&list_output.stdout);
            for property in properties
                .lines()
                .map(str::trim)
                .filter(|line| line.contains("workspace0/last-image"))
            {
                run(&ShellCommand::optional(
                    "xfconf-query",
                    vec!["-c".into(), "xfce4-desktop".into(), "-p".into(), property.into(), "-s".into(), path.into()],
                ))
                .unwrap_or_else(|e| log::warn!("{}", e));
            }
        }

        // Primary monitor defaults for older xfdesktop versions
        for (property, value) in [
            ("/backdrop/screen0/monitor0/image-path", path),
            ("/backdrop/screen0/monitor0/image-style", "3"),
            ("/backdrop/screen0/monitor0/image-show", "true"),
        ] {
            if let Err(e) = run(&ShellCommand::optional(
                "xfconf-query",
                vec!["-c".into(), "xfce4-desktop".into(), "-p".into(), property.into(), "-s".into(), value.into()],
            )) {
                log::debug!("{}", e);
            }
        }

        run(&ShellCommand::required("xfdesktop", vec!["--reload".into()]))
    }
}

impl WallpaperService for LinuxWallpaper {
    fn set_wallpaper_from_path(&self, file_path: &Path) -> Result<()> {
        let path = absolute_path(file_path)?;
        match &self.desktop {
            DesktopEnvironment::Xfce => Self::set_xfce(&path.to_string_lossy()),
            DesktopEnvironment::Unknown(name) => {
                log::warn!("Desktop environment '{}' not recognised, using generic setter", name);
                wallpaper::set_from_path(&path.to_string_lossy())
                    .map_err(|e| anyhow!("Failed to set wallpaper {}: {}", path.display(), e))
            }
            desktop => {
                for command in desktop_commands(desktop, &path) {
                    match run(&command) {
                        Ok(()) => {}
                        Err(e) if !command.required => log::debug!("Ignoring optional step: {}", e),
                        Err(e) => return Err(e),
                    }
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(xdg: Option<&str>, desktop_session: Option<&str>) -> SessionEnv {
        SessionEnv {
            xdg_current_desktop: xdg.map(String::from),
            desktop_session: desktop_session.map(String::from),
            ..SessionEnv::default()
        }
    }

    #[test]
    fn detects_from_xdg_current_desktop() {
        assert_eq!(DesktopEnvironment::from_session(&session(Some("ubuntu:GNOME"), None)), DesktopEnvironment::Gnome);
        assert_eq!(DesktopEnvironment::from_session(&session(Some("KDE"), Some("gnome"))), DesktopEnvironment::Kde);
        assert_eq!(DesktopEnvironment::from_session(&session(Some("X-Cinnamon"), None)), DesktopEnvironment::Gnome);
        assert_eq!(DesktopEnvironment::from_session(&session(Some("XFCE"), None)), DesktopEnvironment::Xfce);
    }

    #[test]
    fn detects_from_desktop_session_prefixes() {
        assert_eq!(DesktopEnvironment::from_session(&session(None, Some("kubuntu"))), DesktopEnvironment::Kde);
        assert_eq!(DesktopEnvironment::from_session(&session(None, Some("ubuntustudio"))), DesktopEnvironment::Kde);
        assert_eq!(DesktopEnvironment::from_session(&session(None, Some("lubuntu"))), DesktopEnvironment::Lxde);
        assert_eq!(DesktopEnvironment::from_session(&session(None, Some("ubuntu"))), DesktopEnvironment::Gnome);
        assert_eq!(DesktopEnvironment::from_session(&session(None, Some("xubuntu"))), DesktopEnvironment::Xfce);
        assert_eq!(DesktopEnvironment::from_session(&session(None, Some("openbox"))), DesktopEnvironment::Fluxbox);
    }

    #[test]
    fn falls_back_to_session_flags_then_unknown() {
        let kde = SessionEnv { kde_full_session: true, ..session(Some("sway"), None) };
        assert_eq!(DesktopEnvironment::from_session(&kde), DesktopEnvironment::Kde);

        let gnome = SessionEnv { gnome_desktop_session_id: true, ..SessionEnv::default() };
        assert_eq!(DesktopEnvironment::from_session(&gnome), DesktopEnvironment::Gnome);

        assert_eq!(
            DesktopEnvironment::from_session(&session(Some("sway"), None)),
            DesktopEnvironment::Unknown("sway".into())
        );
    }

    #[test]
    fn gnome_sets_light_and_dark_uris() {
        let commands = desktop_commands(&DesktopEnvironment::Gnome, Path::new("/tmp/w/b.jpg"));
        assert_eq!(commands.len(), 2);
        assert!(commands[0].required);
        assert!(!commands[1].required);
        assert_eq!(commands[0].args.last().unwrap(), "file:///tmp/w/b.jpg");
        assert_eq!(commands[1].args[2], "picture-uri-dark");
    }

    #[test]
    fn kde_dispatches_only_the_plasma_script() {
        let commands = desktop_commands(&DesktopEnvironment::Kde, Path::new("/tmp/w/b.jpg"));
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].program, "qdbus");
        assert!(commands[0].args[3].contains("\"file:///tmp/w/b.jpg\""));
        assert!(commands.iter().all(|c| c.program != "gsettings"));
    }

    #[test]
    fn mac_script_escapes_quotes() {
        let script = MacWallpaper::script(Path::new("/Users/me/say \"hi\".jpg"));
        assert!(script.contains("POSIX file \"/Users/me/say \\\"hi\\\".jpg\""));
    }
}
