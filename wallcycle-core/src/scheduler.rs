use anyhow::{Context, Result};
use chrono::Local;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::thread;
use std::time::Duration;

/// Cancels a task created by [`schedule`]. Dropping the handle cancels too.
#[derive(Debug)]
pub struct TaskHandle {
    cancel_tx: Sender<()>,
}

impl TaskHandle {
    /// No effect once the callback has started.
    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(());
    }
}

/// Runs `callback` on its own thread after `delay` unless cancelled first.
pub fn schedule<F>(delay: Duration, callback: F) -> Result<TaskHandle>
where
    F: FnOnce() + Send + 'static,
{
    let (cancel_tx, cancel_rx) = mpsc::channel::<()>();
    thread::Builder::new()
        .name("wallcycle-timer".into())
        .spawn(move || {
            if let Err(RecvTimeoutError::Timeout) = cancel_rx.recv_timeout(delay) {
                callback();
            }
        })
        .context("Failed to spawn timer thread")?;
    Ok(TaskHandle { cancel_tx })
}

pub type Job = Arc<dyn Fn() + Send + Sync>;
pub type IntervalFn = Arc<dyn Fn() -> Duration + Send + Sync>;

struct Armed {
    handle: TaskHandle,
    delay: Duration,
}

#[derive(Default)]
struct State {
    running: bool,
    // Bumped on every start so timers from an earlier run never re-arm.
    generation: u64,
    pending: Option<Armed>,
}

struct Shared {
    job: Job,
    interval: IntervalFn,
    state: Mutex<State>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Self-rescheduling one-shot timer. Each firing runs `job` and then arms a
/// fresh timer using whatever `interval` returns at that moment.
pub struct Scheduler {
    shared: Arc<Shared>,
}

impl Scheduler {
    pub fn new(job: Job, interval: IntervalFn) -> Self {
        Self {
            shared: Arc::new(Shared {
                job,
                interval,
                state: Mutex::new(State::default()),
            }),
        }
    }

    /// Arms the first timer. Does nothing when already running.
    pub fn start(&self) -> Result<()> {
        let mut state = self.shared.lock();
        if state.running {
            return Ok(());
        }
        state.running = true;
        state.generation += 1;
        if let Err(e) = arm(&self.shared, &mut state) {
            state.running = false;
            return Err(e);
        }
        Ok(())
    }

    pub fn stop(&self) {
        let mut state = self.shared.lock();
        if state.running {
            log::info!("Scheduler stopped");
        }
        state.running = false;
        if let Some(armed) = state.pending.take() {
            armed.handle.cancel();
        }
    }

    pub fn restart(&self) -> Result<()> {
        self.stop();
        self.start()
    }

    pub fn is_running(&self) -> bool {
        self.shared.lock().running
    }

    /// Delay of the currently armed timer.
    pub fn armed_delay(&self) -> Option<Duration> {
        self.shared.lock().pending.as_ref().map(|armed| armed.delay)
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn arm(shared: &Arc<Shared>, state: &mut State) -> Result<()> {
    let delay = (shared.interval)();
    let generation = state.generation;
    let weak: Weak<Shared> = Arc::downgrade(shared);
    let handle = schedule(delay, move || {
        if let Some(shared) = weak.upgrade() {
            fire(&shared, generation);
        }
    })?;

    if let Some(previous) = state.pending.replace(Armed { handle, delay }) {
        previous.handle.cancel();
    }
    if let Ok(offset) = chrono::Duration::from_std(delay) {
        log::info!(
            "Next wallpaper change scheduled at {}",
            (Local::now() + offset).format("%H:%M:%S")
        );
    }
    Ok(())
}

fn fire(shared: &Arc<Shared>, generation: u64) {
    {
        let mut state = shared.lock();
        if !state.running || state.generation != generation {
            return;
        }
        state.pending = None;
    }

    log::info!("Timer triggered, changing wallpaper...");
    (shared.job)();

    let mut state = shared.lock();
    if state.running && state.generation == generation && state.pending.is_none() {
        if let Err(e) = arm(shared, &mut state) {
            log::error!("Failed to re-arm scheduler: {:#}", e);
            state.running = false;
        }
    }
}
