//! Drain-then-swap coordination for exclusive maintenance.
//!
//! Regular operations enter the gate shared; an exclusive holder closes the
//! gate to newcomers, sleeps until every in-flight operation has left, and
//! reopens it when dropped. Waiting is condition based, nothing spins.

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct GateState {
    /// New operations must wait while set
    stopped: bool,
    /// Operations currently inside the gate
    active: usize,
}

/// Counts in-flight operations and lets one exclusive holder drain them
#[derive(Debug, Default)]
pub struct OperationGate {
    state: Mutex<GateState>,
    changed: Condvar,
}

/// Held for the duration of a regular operation
pub struct SharedPass<'a> {
    gate: &'a OperationGate,
}

/// Held for the duration of an exclusive operation
pub struct ExclusivePass<'a> {
    gate: &'a OperationGate,
}

impl OperationGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter as a regular operation, waiting while an exclusive holder runs
    pub fn enter(&self) -> SharedPass<'_> {
        let mut state = self.state.lock();
        while state.stopped {
            self.changed.wait(&mut state);
        }
        state.active += 1;
        SharedPass { gate: self }
    }

    /// Stop new operations, then wait for in-flight ones to finish
    pub fn exclusive(&self) -> ExclusivePass<'_> {
        let mut state = self.state.lock();
        while state.stopped {
            self.changed.wait(&mut state);
        }
        state.stopped = true;
        while state.active > 0 {
            self.changed.wait(&mut state);
        }
        ExclusivePass { gate: self }
    }

    /// Operations currently inside the gate
    pub fn active(&self) -> usize {
        self.state.lock().active
    }
}

impl Drop for SharedPass<'_> {
    fn drop(&mut self) {
        let mut state = self.gate.state.lock();
        state.active -= 1;
        if state.active == 0 {
            self.gate.changed.notify_all();
        }
    }
}

impl Drop for ExclusivePass<'_> {
    fn drop(&mut self) {
        let mut state = self.gate.state.lock();
        state.stopped = false;
        self.gate.changed.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_shared_passes_count() {
        let gate = OperationGate::new();
        let a = gate.enter();
        let b = gate.enter();
        assert_eq!(gate.active(), 2);
        drop(a);
        drop(b);
        assert_eq!(gate.active(), 0);
        let _x = gate.exclusive();
    }

    #[test]
    fn test_exclusive_waits_for_in_flight() {
        let gate = Arc::new(OperationGate::new());
        let released = Arc::new(AtomicBool::new(false));

        let pass = gate.enter();

        let handle = {
            let gate = Arc::clone(&gate);
            let released = Arc::clone(&released);
            thread::spawn(move || {
                let _x = gate.exclusive();
                assert!(released.load(Ordering::SeqCst));
            })
        };

        thread::sleep(Duration::from_millis(50));
        released.store(true, Ordering::SeqCst);
        drop(pass);
        handle.join().unwrap();
    }

    #[test]
    fn test_enter_blocks_during_exclusive() {
        let gate = Arc::new(OperationGate::new());
        let finished = Arc::new(AtomicBool::new(false));

        let exclusive = gate.exclusive();

        let handle = {
            let gate = Arc::clone(&gate);
            let finished = Arc::clone(&finished);
            thread::spawn(move || {
                let _pass = gate.enter();
                assert!(finished.load(Ordering::SeqCst));
            })
        };

        thread::sleep(Duration::from_millis(50));
        finished.store(true, Ordering::SeqCst);
        drop(exclusive);
        handle.join().unwrap();
    }
}
