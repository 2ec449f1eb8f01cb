pub use crate::app::{
    describe, frequency_label, prompt_settings, SettingsChoice, SettingsUpdate, WallcycleApp,
    FREQUENCY_PRESETS,
};

mod app {
    use anyhow::{bail, Result};
    use std::io::{self, BufRead, Write};
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use std::thread;
    use wallcycle_core::autostart::set_run_on_startup;
    use wallcycle_core::*;

    /// Values edited together in the settings surface.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct SettingsUpdate {
        pub wallpaper_type: Category,
        pub frequency_minutes: u32,
        pub run_on_startup: bool,
    }

    impl From<&Settings> for SettingsUpdate {
        fn from(settings: &Settings) -> Self {
            Self {
                wallpaper_type: settings.wallpaper_type,
                frequency_minutes: settings.frequency_minutes,
                run_on_startup: settings.run_on_startup,
            }
        }
    }

    /// Intervals offered by the tray's frequency submenu.
    pub const FREQUENCY_PRESETS: &[u32] = &[15, 30, 60, 120, 240, 720, 1440];

    pub fn frequency_label(minutes: u32) -> String {
        match minutes {
            1 => "Every minute".to_string(),
            m if m % 60 == 0 && m > 60 => format!("Every {} hours", m / 60),
            60 => "Every hour".to_string(),
            m => format!("Every {} minutes", m),
        }
    }

    /// A single field changed from a menu.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum SettingsChoice {
        WallpaperType(Category),
        FrequencyMinutes(u32),
        RunOnStartup(bool),
    }

    impl SettingsChoice {
        /// `current` with this one field replaced.
        pub fn apply_to(self, current: &Settings) -> SettingsUpdate {
            let mut update = SettingsUpdate::from(current);
            match self {
                SettingsChoice::WallpaperType(category) => update.wallpaper_type = category,
                SettingsChoice::FrequencyMinutes(minutes) => update.frequency_minutes = minutes,
                SettingsChoice::RunOnStartup(enable) => update.run_on_startup = enable,
            }
            update
        }
    }

    /// Shell-facing facade over the changer and its scheduler, shared by the
    /// text menu and the tray.
    pub struct WallcycleApp {
        changer: Arc<WallpaperChanger>,
        scheduler: Arc<Scheduler>,
        last_outcome: Arc<Mutex<Option<CycleOutcome>>>,
        autostart: fn(bool) -> Result<()>,
    }

    impl WallcycleApp {
        pub fn new(config_path: Option<PathBuf>) -> Result<Self> {
            let config = match config_path {
                Some(path) => ConfigStore::load(path),
                None => ConfigStore::open_default()?,
            };
            log::info!("Using config {}", config.path().display());
            Ok(Self::with_changer(Arc::new(WallpaperChanger::new(config))))
        }

        pub fn with_changer(changer: Arc<WallpaperChanger>) -> Self {
            let scheduler = Arc::new(changer.scheduler());
            Self {
                changer,
                scheduler,
                last_outcome: Arc::new(Mutex::new(None)),
                autostart: set_run_on_startup,
            }
        }

        pub fn changer(&self) -> &Arc<WallpaperChanger> {
            &self.changer
        }

        /// Registers autostart if configured, then changes the wallpaper on
        /// a worker thread and starts the timer once that first cycle ends.
        pub fn initialize<F>(&self, on_done: F)
        where
            F: FnOnce(&CycleOutcome) + Send + 'static,
        {
            if self.changer.settings().run_on_startup {
                if let Err(e) = (self.autostart)(true) {
                    log::error!("Error updating startup registration: {:#}", e);
                }
            }

            let scheduler = Arc::clone(&self.scheduler);
            self.spawn_cycle(move |outcome| {
                if let Err(e) = scheduler.start() {
                    log::error!("Failed to start scheduler: {:#}", e);
                }
                on_done(outcome);
            });
        }

        /// Fire-and-forget manual change.
        pub fn change_now<F>(&self, on_done: F)
        where
            F: FnOnce(&CycleOutcome) + Send + 'static,
        {
            self.spawn_cycle(on_done);
        }

        pub fn change_blocking(&self) -> CycleOutcome {
            let outcome = self.changer.change_wallpaper();
            self.record(&outcome);
            outcome
        }

        fn spawn_cycle<F>(&self, on_done: F)
        where
            F: FnOnce(&CycleOutcome) + Send + 'static,
        {
            let changer = Arc::clone(&self.changer);
            let last_outcome = Arc::clone(&self.last_outcome);
            let spawned = thread::Builder::new()
                .name("wallcycle-change".into())
                .spawn(move || {
                    let outcome = changer.change_wallpaper();
                    *last_outcome.lock().unwrap_or_else(|e| e.into_inner()) = Some(outcome.clone());
                    on_done(&outcome);
                });
            if let Err(e) = spawned {
                log::error!("Failed to start wallpaper change: {}", e);
            }
        }

        fn record(&self, outcome: &CycleOutcome) {
            *self.last_outcome.lock().unwrap_or_else(|e| e.into_inner()) = Some(outcome.clone());
        }

        /// Persists the edited values, restarts the timer so a new frequency
        /// takes effect, then reports any autostart failure.
        pub fn apply_settings(&self, update: &SettingsUpdate) -> Result<()> {
            if update.frequency_minutes < 1 {
                bail!("Frequency must be at least 1 minute");
            }
            self.changer.set(Setting::WallpaperType(update.wallpaper_type))?;
            self.changer.set(Setting::FrequencyMinutes(update.frequency_minutes))?;
            self.changer.set(Setting::RunOnStartup(update.run_on_startup))?;

            let autostart = (self.autostart)(update.run_on_startup);
            self.scheduler.restart()?;
            autostart?;
            log::info!("Settings applied");
            Ok(())
        }

        /// Applies one menu choice through the same path as the full form.
        pub fn apply_choice(&self, choice: SettingsChoice) -> Result<()> {
            self.apply_settings(&choice.apply_to(&self.changer.settings()))
        }

        /// Picks up edits made to the config file outside the app.
        pub fn reload_settings(&self) -> Result<()> {
            self.changer.reload_config();
            let autostart = (self.autostart)(self.changer.settings().run_on_startup);
            self.scheduler.restart()?;
            autostart
        }

        pub fn open_settings_file(&self) -> Result<()> {
            let path = self.changer.config_path();
            if !path.exists() {
                self.changer.save_config()?;
            }
            open::that(&path)?;
            Ok(())
        }

        pub fn is_running(&self) -> bool {
            self.scheduler.is_running()
        }

        pub fn shutdown(&self) {
            self.scheduler.stop();
        }

        pub fn status_line(&self) -> String {
            let settings = self.changer.settings();
            format!(
                "Status: {} | {} every {} min",
                if self.is_running() { "Running" } else { "Stopped" },
                settings.wallpaper_type,
                settings.frequency_minutes
            )
        }

        pub fn last_outcome_text(&self) -> String {
            match &*self.last_outcome.lock().unwrap_or_else(|e| e.into_inner()) {
                Some(outcome) => describe(outcome),
                None => "(no wallpaper yet)".to_string(),
            }
        }

        pub fn show_menu(&self) {
            println!("\n=== Wallcycle - Wallpaper Changer ===");
            println!("{}", self.status_line());
            println!("Last change: {}", self.last_outcome_text());
            println!();
            println!("1. Change wallpaper now");
            println!("2. Settings");
            println!("3. Open config file");
            println!("4. Exit");
            print!("\nSelect an option (1-4): ");
            let _ = io::stdout().flush();
        }

        pub fn run(&self) -> Result<()> {
            let stdin = io::stdin();
            loop {
                self.show_menu();

                let mut input = String::new();
                if stdin.lock().read_line(&mut input)? == 0 {
                    break;
                }

                match input.trim() {
                    "1" => self.change_now(|outcome| println!("\n{}", describe(outcome))),
                    "2" => {
                        let settings = self.changer.settings();
                        let mut stdout = io::stdout();
                        match prompt_settings(&mut stdin.lock(), &mut stdout, &settings)? {
                            Some(update) => match self.apply_settings(&update) {
                                Ok(()) => println!("Settings applied successfully!"),
                                Err(e) => eprintln!("Error applying settings: {:#}", e),
                            },
                            None => println!("Settings unchanged."),
                        }
                    }
                    "3" => {
                        if let Err(e) = self.open_settings_file() {
                            eprintln!("Failed to open config file: {:#}", e);
                        }
                    }
                    "4" => {
                        println!("Exiting Wallcycle...");
                        break;
                    }
                    _ => println!("Invalid option. Please select 1-4."),
                }
            }

            self.shutdown();
            Ok(())
        }
    }

    pub fn describe(outcome: &CycleOutcome) -> String {
        match outcome {
            CycleOutcome::Applied(path) => format!("Wallpaper set: {}", file_label(path)),
            CycleOutcome::ApplyFailed(path) => {
                format!("Downloaded {} but could not set it", file_label(path))
            }
            CycleOutcome::NoWallpaper => "No suitable wallpaper found".to_string(),
        }
    }

    fn file_label(path: &std::path::Path) -> String {
        path.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string())
    }

    fn ask<R: BufRead, W: Write>(input: &mut R, output: &mut W, prompt: &str) -> Result<Option<String>> {
        write!(output, "{}", prompt)?;
        output.flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    /// Interactive settings form. Empty answers keep the current value;
    /// `None` means the form was abandoned or rejected.
    pub fn prompt_settings<R: BufRead, W: Write>(
        input: &mut R,
        output: &mut W,
        current: &Settings,
    ) -> Result<Option<SettingsUpdate>> {
        writeln!(output, "Wallpaper Type:")?;
        for (i, category) in Category::ALL.iter().enumerate() {
            let marker = if *category == current.wallpaper_type { "*" } else { " " };
            writeln!(output, " {} {}. {}", marker, i + 1, category)?;
        }

        let Some(answer) = ask(input, output, "Select type (Enter to keep): ")? else {
            return Ok(None);
        };
        let wallpaper_type = if answer.is_empty() {
            current.wallpaper_type
        } else if let Some(category) = answer
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| Category::ALL.get(i).copied())
        {
            category
        } else if let Ok(category) = answer.parse::<Category>() {
            category
        } else {
            writeln!(output, "Invalid Input: unknown wallpaper type '{}'", answer)?;
            return Ok(None);
        };

        let prompt = format!("Change Frequency in minutes [{}]: ", current.frequency_minutes);
        let Some(answer) = ask(input, output, &prompt)? else {
            return Ok(None);
        };
        let frequency_minutes = if answer.is_empty() {
            current.frequency_minutes
        } else {
            match answer.parse::<u32>() {
                Ok(minutes) if minutes >= 1 => minutes,
                _ => {
                    writeln!(output, "Invalid Input: Frequency must be at least 1 minute")?;
                    return Ok(None);
                }
            }
        };

        let default = if current.run_on_startup { "y" } else { "n" };
        let prompt = format!("Run on system startup (y/n) [{}]: ", default);
        let Some(answer) = ask(input, output, &prompt)? else {
            return Ok(None);
        };
        let run_on_startup = match answer.to_lowercase().as_str() {
            "" => current.run_on_startup,
            "y" | "yes" => true,
            "n" | "no" => false,
            _ => {
                writeln!(output, "Invalid Input: answer y or n")?;
                return Ok(None);
            }
        };

        Ok(Some(SettingsUpdate {
            wallpaper_type,
            frequency_minutes,
            run_on_startup,
        }))
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use std::io::Cursor;
        use std::path::Path;
        use std::time::Duration;
        use tempfile::TempDir;

        fn run_form(answers: &str) -> (Option<SettingsUpdate>, String) {
            let mut input = Cursor::new(answers.as_bytes().to_vec());
            let mut output = Vec::new();
            let update = prompt_settings(&mut input, &mut output, &Settings::default()).unwrap();
            (update, String::from_utf8(output).unwrap())
        }

        #[test]
        fn form_accepts_numbers_and_names() {
            let (update, _) = run_form("2\n15\ny\n");
            assert_eq!(
                update,
                Some(SettingsUpdate {
                    wallpaper_type: Category::Nature,
                    frequency_minutes: 15,
                    run_on_startup: true,
                })
            );

            let (update, _) = run_form("sci_fi\n\n\n");
            assert_eq!(update.unwrap().wallpaper_type, Category::SciFi);
        }

        #[test]
        fn empty_answers_keep_current_values() {
            let (update, output) = run_form("\n\n\n");
            let defaults = Settings::default();
            assert_eq!(
                update,
                Some(SettingsUpdate {
                    wallpaper_type: defaults.wallpaper_type,
                    frequency_minutes: defaults.frequency_minutes,
                    run_on_startup: defaults.run_on_startup,
                })
            );
            assert!(output.contains(" * 1. video_games"));
        }

        #[test]
        fn zero_frequency_is_refused() {
            let (update, output) = run_form("1\n0\nn\n");
            assert_eq!(update, None);
            assert!(output.contains("Frequency must be at least 1 minute"));
        }

        #[test]
        fn unknown_type_and_eof_abandon_the_form() {
            assert_eq!(run_form("9\n").0, None);
            assert_eq!(run_form("1\n").0, None);
        }

        struct Idle;

        impl CandidateSource for Idle {
            fn fetch_candidates(&self, _category: Category) -> Vec<String> {
                Vec::new()
            }
        }

        impl ImageDownloader for Idle {
            fn download(&self, _url: &str, _dir: &Path) -> Option<PathBuf> {
                None
            }
        }

        impl WallpaperService for Idle {
            fn set_wallpaper_from_path(&self, _file_path: &Path) -> Result<()> {
                Ok(())
            }
        }

        fn unavailable_autostart(_enable: bool) -> Result<()> {
            bail!("startup registration unavailable")
        }

        fn accepted_autostart(_enable: bool) -> Result<()> {
            Ok(())
        }

        fn idle_app(dir: &TempDir, autostart: fn(bool) -> Result<()>) -> WallcycleApp {
            let config = ConfigStore::load(dir.path().join(config::CONFIG_FILE_NAME));
            let changer = WallpaperChanger::with_components(
                config,
                Box::new(Idle),
                Box::new(Idle),
                Box::new(Idle),
            );
            let mut app = WallcycleApp::with_changer(Arc::new(changer));
            app.autostart = autostart;
            app
        }

        #[test]
        fn timer_restarts_even_when_autostart_fails() {
            let dir = TempDir::new().unwrap();
            let app = idle_app(&dir, unavailable_autostart);
            app.scheduler.start().unwrap();
            assert_eq!(app.scheduler.armed_delay(), Some(Duration::from_secs(3600)));

            let update = SettingsUpdate {
                wallpaper_type: Category::Anime,
                frequency_minutes: 5,
                run_on_startup: true,
            };
            assert!(app.apply_settings(&update).is_err());
            assert!(app.is_running());
            assert_eq!(app.scheduler.armed_delay(), Some(Duration::from_secs(300)));
            assert_eq!(app.changer().settings().frequency_minutes, 5);
            app.shutdown();
        }

        #[test]
        fn reload_restarts_timer_even_when_autostart_fails() {
            let dir = TempDir::new().unwrap();
            let app = idle_app(&dir, unavailable_autostart);
            app.scheduler.start().unwrap();
            std::fs::write(app.changer().config_path(), r#"{"frequency_minutes": 2}"#).unwrap();

            assert!(app.reload_settings().is_err());
            assert_eq!(app.scheduler.armed_delay(), Some(Duration::from_secs(120)));
            app.shutdown();
        }

        #[test]
        fn menu_choice_changes_one_field_and_rearms() {
            let dir = TempDir::new().unwrap();
            let app = idle_app(&dir, accepted_autostart);
            app.scheduler.start().unwrap();

            app.apply_choice(SettingsChoice::FrequencyMinutes(30)).unwrap();
            app.apply_choice(SettingsChoice::WallpaperType(Category::Abstract)).unwrap();
            app.apply_choice(SettingsChoice::RunOnStartup(true)).unwrap();

            let settings = app.changer().settings();
            assert_eq!(settings.frequency_minutes, 30);
            assert_eq!(settings.wallpaper_type, Category::Abstract);
            assert!(settings.run_on_startup);
            assert_eq!(app.scheduler.armed_delay(), Some(Duration::from_secs(1800)));

            assert!(app.apply_choice(SettingsChoice::FrequencyMinutes(0)).is_err());
            assert_eq!(app.changer().settings().frequency_minutes, 30);
            app.shutdown();
        }

        #[test]
        fn frequency_labels_read_naturally() {
            assert_eq!(frequency_label(15), "Every 15 minutes");
            assert_eq!(frequency_label(60), "Every hour");
            assert_eq!(frequency_label(90), "Every 90 minutes");
            assert_eq!(frequency_label(1440), "Every 24 hours");
            assert!(FREQUENCY_PRESETS.contains(&wallcycle_core::config::DEFAULT_FREQUENCY_MINUTES));
        }

        #[test]
        fn outcomes_are_described_by_file_name() {
            let outcome = CycleOutcome::Applied(PathBuf::from("/tmp/wallpapers/b.jpg"));
            assert_eq!(describe(&outcome), "Wallpaper set: b.jpg");
            assert_eq!(describe(&CycleOutcome::NoWallpaper), "No suitable wallpaper found");
        }
    }
}
