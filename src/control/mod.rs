//! Cooperative pause/resume/stop signal shared between the orchestrator and a worker.
//!
//! The worker never gets interrupted; it calls [`ControlSignal::wait_checkpoint`] at the
//! end of every unit of work (one file, one compared path, one copy). The orchestrator
//! flips the signal from the command path. A pause blocks the worker on a condvar at
//! its next checkpoint; a cancel wakes a paused worker immediately.

use std::sync::{Condvar, Mutex, PoisonError};

/// Requested mode for the active worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlMode {
    Run,
    Pause,
    Cancel,
}

/// Result of polling the signal at a checkpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Checkpoint {
    Continue,
    PauseWait,
    Cancel,
}

/// What the worker should do after a checkpoint has been fully handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Cancel,
}

#[derive(Debug)]
pub struct ControlSignal {
    mode: Mutex<ControlMode>,
    changed: Condvar,
}

impl Default for ControlSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlSignal {
    pub fn new() -> Self {
        Self {
            mode: Mutex::new(ControlMode::Run),
            changed: Condvar::new(),
        }
    }

    pub fn mode(&self) -> ControlMode {
        *self.mode.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Non-blocking poll.
    pub fn poll(&self) -> Checkpoint {
        match self.mode() {
            ControlMode::Run => Checkpoint::Continue,
            ControlMode::Pause => Checkpoint::PauseWait,
            ControlMode::Cancel => Checkpoint::Cancel,
        }
    }

    /// Poll, and if paused block until resumed or cancelled.
    ///
    /// Holds only the signal's own mutex while waiting, and the condvar releases it.
    pub fn wait_checkpoint(&self) -> Flow {
        let guard = self.mode.lock().unwrap_or_else(PoisonError::into_inner);
        let guard = self
            .changed
            .wait_while(guard, |mode| *mode == ControlMode::Pause)
            .unwrap_or_else(PoisonError::into_inner);
        match *guard {
            ControlMode::Cancel => Flow::Cancel,
            _ => Flow::Continue,
        }
    }

    /// Ask the worker to block at its next checkpoint. Ignored once cancelled.
    pub fn pause(&self) {
        self.set(|mode| {
            if *mode == ControlMode::Run {
                *mode = ControlMode::Pause;
            }
        });
    }

    /// Release a paused worker. Ignored once cancelled.
    pub fn resume(&self) {
        self.set(|mode| {
            if *mode == ControlMode::Pause {
                *mode = ControlMode::Run;
            }
        });
    }

    /// Ask the worker to unwind; wakes it if paused.
    pub fn cancel(&self) {
        self.set(|mode| *mode = ControlMode::Cancel);
    }

    /// Arm the signal for a new operation.
    pub fn reset(&self) {
        self.set(|mode| *mode = ControlMode::Run);
    }

    fn set<F: FnOnce(&mut ControlMode)>(&self, f: F) {
        let mut mode = self.mode.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut mode);
        self.changed.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_poll_reflects_mode() {
        let signal = ControlSignal::new();
        assert_eq!(signal.poll(), Checkpoint::Continue);

        signal.pause();
        assert_eq!(signal.poll(), Checkpoint::PauseWait);

        signal.resume();
        assert_eq!(signal.poll(), Checkpoint::Continue);

        signal.cancel();
        assert_eq!(signal.poll(), Checkpoint::Cancel);
    }

    #[test]
    fn test_cancel_is_sticky() {
        let signal = ControlSignal::new();
        signal.cancel();
        signal.resume();
        signal.pause();
        assert_eq!(signal.mode(), ControlMode::Cancel);

        signal.reset();
        assert_eq!(signal.mode(), ControlMode::Run);
    }

    #[test]
    fn test_running_checkpoint_does_not_block() {
        let signal = ControlSignal::new();
        assert_eq!(signal.wait_checkpoint(), Flow::Continue);
    }

    #[test]
    fn test_paused_worker_blocks_until_resumed() {
        let signal = Arc::new(ControlSignal::new());
        signal.pause();

        let (tx, rx) = mpsc::channel();
        let worker_signal = Arc::clone(&signal);
        let worker = thread::spawn(move || {
            let flow = worker_signal.wait_checkpoint();
            tx.send(flow).unwrap();
        });

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

        signal.resume();
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(2)).unwrap(),
            Flow::Continue
        );
        worker.join().unwrap();
    }

    #[test]
    fn test_cancel_wakes_paused_worker() {
        let signal = Arc::new(ControlSignal::new());
        signal.pause();

        let worker_signal = Arc::clone(&signal);
        let worker = thread::spawn(move || worker_signal.wait_checkpoint());

        thread::sleep(Duration::from_millis(50));
        signal.cancel();

        assert_eq!(worker.join().unwrap(), Flow::Cancel);
    }
}
