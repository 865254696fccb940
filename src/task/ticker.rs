// src/task/ticker.rs
// Elapsed-time readout for an in-flight task

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::{interval_at, Instant};

use super::surface::TaskSurface;

const TICK: Duration = Duration::from_millis(100);

/// Repeating 100ms tick that renders the time since its base instant as
/// `"1.2s"` into the bound surface. The base can be reset mid-run (cancel
/// restarts the readout from zero); dropping the ticker aborts the tick task.
pub(crate) struct Ticker {
    base: Arc<Mutex<Instant>>,
    handle: tokio::task::JoinHandle<()>,
}

impl Ticker {
    pub fn spawn(surface: Arc<dyn TaskSurface>) -> Self {
        let base = Arc::new(Mutex::new(Instant::now()));
        surface.set_elapsed(Some("0.0s"));

        let tick_base = base.clone();
        let handle = tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + TICK, TICK);
            loop {
                ticks.tick().await;
                let elapsed = tick_base.lock().unwrap().elapsed();
                surface.set_elapsed(Some(&format_elapsed(elapsed)));
            }
        });

        Self { base, handle }
    }

    /// Restart the readout from zero. The caller renders the immediate
    /// `"0.0s"` itself so the reset is visible before the next tick.
    pub fn reset(&self) {
        *self.base.lock().unwrap() = Instant::now();
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub(crate) fn format_elapsed(elapsed: Duration) -> String {
    format!("{:.1}s", elapsed.as_secs_f64())
}
