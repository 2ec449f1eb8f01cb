#![cfg_attr(target_os = "windows", windows_subsystem = "windows")]

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tao::{
    event::Event,
    event_loop::{ControlFlow, EventLoopBuilder},
};
use tray_icon::{
    menu::{CheckMenuItem, Menu, MenuEvent, MenuId, MenuItem, PredefinedMenuItem, Submenu},
    TrayIcon, TrayIconBuilder, TrayIconEvent,
};
use wallcycle_cli::{describe, frequency_label, SettingsChoice, WallcycleApp, FREQUENCY_PRESETS};
use wallcycle_core::{Category, Settings};

#[cfg(target_os = "windows")]
use windows_sys::Win32::{
    System::Console::{AllocConsole, GetConsoleWindow},
    UI::WindowsAndMessaging::{ShowWindow, SW_HIDE, SW_SHOW},
};

#[derive(Parser)]
#[command(name = "wallcycle-gui")]
#[command(about = "Wallcycle - wallpaper changer in the system tray")]
#[command(version)]
struct Cli {
    /// Run in CLI mode (text-based interface)
    #[arg(long)]
    cli: bool,

    /// Show debug console (Windows only)
    #[arg(long)]
    debug: bool,

    /// Path to the settings file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,
}

enum UserEvent {
    TrayIconEvent(tray_icon::TrayIconEvent),
    MenuEvent(tray_icon::menu::MenuEvent),
    CycleFinished(String),
}

/// Settings submenu: category selector, frequency presets and the startup
/// toggle. Custom intervals go through the settings file.
struct SettingsMenu {
    submenu: Submenu,
    categories: Vec<(CheckMenuItem, Category)>,
    frequencies: Vec<(CheckMenuItem, u32)>,
    run_on_startup: CheckMenuItem,
    edit_file: MenuId,
}

impl SettingsMenu {
    fn new(settings: &Settings) -> Result<Self> {
        let type_menu = Submenu::new("Wallpaper Type", true);
        let mut categories = Vec::new();
        for category in Category::ALL {
            let item = CheckMenuItem::new(category.to_string(), true, false, None);
            type_menu.append(&item)?;
            categories.push((item, category));
        }

        let frequency_menu = Submenu::new("Change Frequency", true);
        let mut frequencies = Vec::new();
        for &minutes in FREQUENCY_PRESETS {
            let item = CheckMenuItem::new(frequency_label(minutes), true, false, None);
            frequency_menu.append(&item)?;
            frequencies.push((item, minutes));
        }

        let run_on_startup = CheckMenuItem::new("Run on Startup", true, false, None);
        let edit_item = MenuItem::new("Edit Settings File...", true, None);

        let submenu = Submenu::new("Settings", true);
        submenu.append_items(&[
            &type_menu,
            &frequency_menu,
            &run_on_startup,
            &PredefinedMenuItem::separator(),
            &edit_item,
        ])?;

        let menu = Self {
            submenu,
            categories,
            frequencies,
            run_on_startup,
            edit_file: edit_item.id().clone(),
        };
        menu.sync(settings);
        Ok(menu)
    }

    /// Check marks mirror the stored settings, undoing the toggle a click
    /// makes when applying fails.
    fn sync(&self, settings: &Settings) {
        for (item, category) in &self.categories {
            item.set_checked(*category == settings.wallpaper_type);
        }
        for (item, minutes) in &self.frequencies {
            item.set_checked(*minutes == settings.frequency_minutes);
        }
        self.run_on_startup.set_checked(settings.run_on_startup);
    }

    fn choice_for(&self, id: &MenuId) -> Option<SettingsChoice> {
        if let Some((_, category)) = self.categories.iter().find(|(item, _)| item.id() == id) {
            return Some(SettingsChoice::WallpaperType(*category));
        }
        if let Some((_, minutes)) = self.frequencies.iter().find(|(item, _)| item.id() == id) {
            return Some(SettingsChoice::FrequencyMinutes(*minutes));
        }
        if self.run_on_startup.id() == id {
            return Some(SettingsChoice::RunOnStartup(self.run_on_startup.is_checked()));
        }
        None
    }
}

struct TrayMenu {
    menu: Menu,
    status_item: MenuItem,
    last_item: MenuItem,
    settings: SettingsMenu,
    change_now: MenuId,
    reload: MenuId,
    exit: MenuId,
}

impl TrayMenu {
    fn new(app: &WallcycleApp) -> Result<Self> {
        let menu = Menu::new();

        // Info items (non-clickable)
        let status_item = MenuItem::new(app.status_line(), false, None);
        let last_item = MenuItem::new(format!("Last: {}", app.last_outcome_text()), false, None);

        let change_item = MenuItem::new("Change Now", true, None);
        let settings = SettingsMenu::new(&app.changer().settings())?;
        let reload_item = MenuItem::new("Reload Settings", true, None);
        let exit_item = MenuItem::new("Exit", true, None);

        menu.append_items(&[
            &status_item,
            &last_item,
            &PredefinedMenuItem::separator(),
            &change_item,
            &settings.submenu,
            &reload_item,
            &PredefinedMenuItem::separator(),
            &exit_item,
        ])?;

        Ok(Self {
            menu,
            status_item,
            last_item,
            settings,
            change_now: change_item.id().clone(),
            reload: reload_item.id().clone(),
            exit: exit_item.id().clone(),
        })
    }

    fn refresh(&self, app: &WallcycleApp) {
        self.status_item.set_text(app.status_line());
        self.last_item.set_text(format!("Last: {}", app.last_outcome_text()));
        self.settings.sync(&app.changer().settings());
    }
}

fn load_icon() -> Result<tray_icon::Icon> {
    let icon_size = 32;
    let mut icon_rgba = vec![0u8; (icon_size * icon_size * 4) as usize];

    for y in 0..icon_size {
        for x in 0..icon_size {
            let idx = ((y * icon_size + x) * 4) as usize;
            let border = x < 3 || y < 3 || x >= icon_size - 3 || y >= icon_size - 3;
            let (r, g, b) = if border { (236, 240, 241) } else { (41, 128, 185) };
            icon_rgba[idx] = r;
            icon_rgba[idx + 1] = g;
            icon_rgba[idx + 2] = b;
            icon_rgba[idx + 3] = 255;
        }
    }

    Ok(tray_icon::Icon::from_rgba(icon_rgba, icon_size, icon_size)?)
}

#[cfg(target_os = "windows")]
fn hide_console() {
    unsafe {
        let console_window = GetConsoleWindow();
        if !console_window.is_null() {
            ShowWindow(console_window, SW_HIDE);
        }
    }
}

#[cfg(target_os = "windows")]
fn show_console() {
    unsafe {
        let console_window = GetConsoleWindow();
        if !console_window.is_null() {
            ShowWindow(console_window, SW_SHOW);
        } else {
            AllocConsole();
        }
    }
}

fn build_tray(app: &WallcycleApp) -> Result<(TrayIcon, TrayMenu)> {
    let tray_menu = TrayMenu::new(app)?;
    let tray_icon = TrayIconBuilder::new()
        .with_menu(Box::new(tray_menu.menu.clone()))
        .with_tooltip("Wallcycle - Wallpaper Changer")
        .with_icon(load_icon()?)
        .build()?;
    Ok((tray_icon, tray_menu))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    #[cfg(target_os = "windows")]
    {
        if cli.debug || cli.cli {
            show_console();
        } else {
            hide_console();
        }
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let app = WallcycleApp::new(cli.config)?;

    if cli.cli {
        app.initialize(|outcome| log::info!("{}", describe(outcome)));
        println!("Wallcycle CLI mode started successfully!");
        return app.run();
    }

    let event_loop = EventLoopBuilder::<UserEvent>::with_user_event().build();

    let proxy = event_loop.create_proxy();
    TrayIconEvent::set_event_handler(Some(move |event| {
        let _ = proxy.send_event(UserEvent::TrayIconEvent(event));
    }));

    let proxy = event_loop.create_proxy();
    MenuEvent::set_event_handler(Some(move |event| {
        let _ = proxy.send_event(UserEvent::MenuEvent(event));
    }));

    let cycle_proxy = event_loop.create_proxy();
    let notify = move |outcome: &wallcycle_core::CycleOutcome| {
        let _ = cycle_proxy.send_event(UserEvent::CycleFinished(describe(outcome)));
    };

    let mut tray: Option<(TrayIcon, TrayMenu)> = None;

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Wait;

        match event {
            Event::NewEvents(tao::event::StartCause::Init) => {
                match build_tray(&app) {
                    Ok(built) => tray = Some(built),
                    Err(e) => {
                        log::error!("Failed to create tray icon: {:#}", e);
                        *control_flow = ControlFlow::Exit;
                        return;
                    }
                }

                if let Some((icon, _)) = &tray {
                    let _ = icon.set_tooltip(Some("Downloading your first wallpaper..."));
                }
                app.initialize(notify.clone());

                // Request redraw for macOS
                #[cfg(target_os = "macos")]
                unsafe {
                    use objc2_core_foundation::CFRunLoop;
                    if let Some(rl) = CFRunLoop::main() {
                        rl.wake_up();
                    }
                }
            }

            Event::UserEvent(UserEvent::TrayIconEvent(event)) => {
                log::trace!("Tray event: {:?}", event);
            }

            Event::UserEvent(UserEvent::CycleFinished(message)) => {
                log::info!("{}", message);
                if let Some((icon, menu)) = &tray {
                    let tooltip = format!(
                        "{}\nNext change in {} minutes",
                        message,
                        app.changer().settings().frequency_minutes
                    );
                    let _ = icon.set_tooltip(Some(tooltip));
                    menu.refresh(&app);
                }
            }

            Event::UserEvent(UserEvent::MenuEvent(event)) => {
                let Some((_, menu)) = &tray else {
                    return;
                };

                if event.id == menu.change_now {
                    if let Some((icon, _)) = &tray {
                        let _ = icon.set_tooltip(Some("Changing wallpaper..."));
                    }
                    app.change_now(notify.clone());
                } else if let Some(choice) = menu.settings.choice_for(&event.id) {
                    match app.apply_choice(choice) {
                        Ok(()) => log::info!("Settings applied successfully"),
                        Err(e) => log::error!("Error applying settings: {:#}", e),
                    }
                    menu.refresh(&app);
                } else if event.id == menu.settings.edit_file {
                    if let Err(e) = app.open_settings_file() {
                        log::error!("Failed to open settings: {:#}", e);
                    }
                } else if event.id == menu.reload {
                    match app.reload_settings() {
                        Ok(()) => log::info!("Settings applied successfully"),
                        Err(e) => log::error!("Error applying settings: {:#}", e),
                    }
                    menu.refresh(&app);
                } else if event.id == menu.exit {
                    app.shutdown();
                    tray = None;
                    *control_flow = ControlFlow::Exit;
                } else {
                    log::debug!("Unknown menu item clicked: {:?}", event.id);
                }
            }

            _ => {}
        }
    })
}
