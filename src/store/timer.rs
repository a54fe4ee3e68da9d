use crate::error::Result;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Default)]
struct TimerShared {
    stopped: Mutex<bool>,
    wake: Condvar,
}

/// Background thread running a save task at a fixed interval until stopped
pub struct SaveTimer {
    shared: Arc<TimerShared>,
    handle: Option<JoinHandle<()>>,
}

impl SaveTimer {
    pub fn start<F>(interval: Duration, task: F) -> Result<Self>
    where
        F: Fn() -> Result<()> + Send + 'static,
    {
        let shared = Arc::new(TimerShared::default());
        let thread_shared = Arc::clone(&shared);

        let handle = thread::Builder::new()
            .name("hoot-save".to_string())
            .spawn(move || run(&thread_shared, interval, task))?;

        debug!(interval_secs = interval.as_secs(), "save timer started");
        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    /// Stop the thread and wait for it; a save in progress completes first
    pub fn stop(&mut self) {
        {
            let mut stopped = self.shared.stopped.lock();
            *stopped = true;
            self.shared.wake.notify_all();
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("save timer thread panicked");
            }
            debug!("save timer stopped");
        }
    }
}

fn run<F>(shared: &TimerShared, interval: Duration, task: F)
where
    F: Fn() -> Result<()>,
{
    loop {
        let deadline = Instant::now() + interval;
        {
            let mut stopped = shared.stopped.lock();
            while !*stopped && Instant::now() < deadline {
                shared.wake.wait_until(&mut stopped, deadline);
            }
            if *stopped {
                return;
            }
        }

        if let Err(e) = task() {
            warn!(error = %e, "periodic save failed");
        }
    }
}

impl Drop for SaveTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_runs_periodically() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let mut timer = SaveTimer::start(Duration::from_millis(10), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();

        thread::sleep(Duration::from_millis(200));
        timer.stop();
        let seen = ticks.load(Ordering::SeqCst);
        assert!(seen >= 2);

        thread::sleep(Duration::from_millis(50));
        assert_eq!(ticks.load(Ordering::SeqCst), seen);
    }

    #[test]
    fn test_stop_wakes_sleeping_thread() {
        let start = Instant::now();
        let mut timer = SaveTimer::start(Duration::from_secs(3600), || Ok(())).unwrap();
        timer.stop();
        timer.stop();
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
