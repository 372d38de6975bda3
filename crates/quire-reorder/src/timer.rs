//! Cancellable single-shot timers.
//!
//! A timer is created around one callback and can be armed repeatedly;
//! arming replaces whatever was armed before.

use crate::error::{ReorderError, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Callback run when a timer expires.
pub type TimerCallback = Arc<dyn Fn() + Send + Sync>;

/// A single-shot timer bound to one callback.
pub trait Timer: Send {
    /// Arm the timer to fire after `delay`, replacing any armed deadline.
    fn schedule(&mut self, delay: Duration);

    /// Disarm the timer. Does nothing if it is not armed.
    fn cancel(&mut self);
}

/// Creates timers bound to a callback.
pub trait TimerFactory {
    fn create_timer(&self, callback: TimerCallback) -> Box<dyn Timer>;
}

/// Timers driven by the Tokio runtime.
#[derive(Clone, Debug)]
pub struct TokioTimerFactory {
    handle: Handle,
}

impl TokioTimerFactory {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Use the runtime of the calling context.
    pub fn current() -> Result<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|_| ReorderError::NoRuntime)
    }
}

impl TimerFactory for TokioTimerFactory {
    fn create_timer(&self, callback: TimerCallback) -> Box<dyn Timer> {
        Box::new(TokioTimer {
            handle: self.handle.clone(),
            callback,
            task: None,
        })
    }
}

struct TokioTimer {
    handle: Handle,
    callback: TimerCallback,
    task: Option<JoinHandle<()>>,
}

impl Timer for TokioTimer {
    fn schedule(&mut self, delay: Duration) {
        self.cancel();
        let callback = self.callback.clone();
        self.task = Some(self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            callback();
        }));
    }

    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for TokioTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[derive(Default)]
struct ManualState {
    armed: Option<Duration>,
    schedule_count: usize,
}

/// Timers that only fire when a test says so.
#[derive(Clone, Default)]
pub struct ManualTimerFactory {
    timers: Arc<Mutex<Vec<ManualTimer>>>,
}

impl ManualTimerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently created timer.
    pub fn last_timer(&self) -> Option<ManualTimer> {
        self.timers.lock().last().cloned()
    }

    pub fn timer_count(&self) -> usize {
        self.timers.lock().len()
    }
}

impl TimerFactory for ManualTimerFactory {
    fn create_timer(&self, callback: TimerCallback) -> Box<dyn Timer> {
        let timer = ManualTimer {
            callback,
            state: Arc::new(Mutex::new(ManualState::default())),
        };
        self.timers.lock().push(timer.clone());
        Box::new(timer)
    }
}

/// A timer handle shared between the owner and the test driving it.
#[derive(Clone)]
pub struct ManualTimer {
    callback: TimerCallback,
    state: Arc<Mutex<ManualState>>,
}

impl ManualTimer {
    pub fn is_armed(&self) -> bool {
        self.state.lock().armed.is_some()
    }

    /// The delay the timer was last armed with, if it is armed.
    pub fn armed_delay(&self) -> Option<Duration> {
        self.state.lock().armed
    }

    /// How many times the timer has been armed.
    pub fn schedule_count(&self) -> usize {
        self.state.lock().schedule_count
    }

    /// Fire the timer if it is armed. Returns whether the callback ran.
    pub fn fire(&self) -> bool {
        let armed = self.state.lock().armed.take().is_some();
        if armed {
            (self.callback)();
        }
        armed
    }
}

impl Timer for ManualTimer {
    fn schedule(&mut self, delay: Duration) {
        let mut state = self.state.lock();
        state.armed = Some(delay);
        state.schedule_count += 1;
    }

    fn cancel(&mut self) {
        self.state.lock().armed = None;
    }
}
