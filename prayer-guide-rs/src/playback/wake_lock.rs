//! Screen wake-lock during playback.
//!
//! On Linux the lock is a `systemd-inhibit` child process holding an
//! idle/sleep inhibitor; killing the child releases it.

use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use tracing::{info, warn};

use crate::error::WakeLockError;
use crate::notifier::Notifier;

pub trait WakeLock: Send + Sync {
    fn acquire(&self) -> Result<(), WakeLockError>;
    fn release(&self);
    fn is_held(&self) -> bool;
}

const INHIBIT_ARGS: [&str; 6] = [
    "--what=idle:sleep",
    "--who=prayer-guide",
    "--why=Prayer playback",
    "--mode=block",
    "sleep",
    "infinity",
];

pub struct InhibitWakeLock {
    program: String,
    args: Vec<String>,
    child: Mutex<Option<Child>>,
    notifier: Arc<Notifier>,
}

impl InhibitWakeLock {
    pub fn new(notifier: Arc<Notifier>) -> Self {
        Self::with_command(notifier, "systemd-inhibit", &INHIBIT_ARGS)
    }

    /// Hold the lock by keeping `program args..` running.
    pub fn with_command(notifier: Arc<Notifier>, program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            child: Mutex::new(None),
            notifier,
        }
    }
}

impl WakeLock for InhibitWakeLock {
    fn acquire(&self) -> Result<(), WakeLockError> {
        let mut guard = self.child.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.is_some() {
            return Ok(());
        }

        let spawned = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        match spawned {
            Ok(child) => {
                info!("Screen wake lock active");
                *guard = Some(child);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.notifier.notify_once(
                    "wake-lock-unsupported",
                    "Keep screen awake unavailable",
                    "This system cannot keep the screen awake during playback.",
                );
                Err(WakeLockError::Unsupported)
            }
            Err(e) => Err(WakeLockError::Acquire(e.to_string())),
        }
    }

    fn release(&self) {
        let current = self
            .child
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut child) = current {
            if let Err(e) = child.kill() {
                warn!("Failed to release wake lock: {e}");
            }
            // Reap without blocking the caller.
            if !matches!(child.try_wait(), Ok(Some(_))) {
                thread::spawn(move || {
                    let _ = child.wait();
                });
            }
            info!("Screen wake lock released");
        }
    }

    fn is_held(&self) -> bool {
        self.child
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl Drop for InhibitWakeLock {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn quiet() -> Arc<Notifier> {
        Arc::new(Notifier::new(false))
    }

    #[test]
    fn release_stops_the_holder_promptly() {
        let lock = InhibitWakeLock::with_command(quiet(), "sleep", &["30"]);
        lock.acquire().unwrap();
        assert!(lock.is_held());
        lock.acquire().unwrap();

        let started = Instant::now();
        lock.release();
        assert!(!lock.is_held());
        assert!(started.elapsed() < Duration::from_secs(2));
        lock.release();
    }

    #[test]
    fn missing_inhibitor_is_unsupported() {
        let lock = InhibitWakeLock::with_command(quiet(), "prayer-guide-no-such-inhibitor", &[]);
        assert!(matches!(lock.acquire(), Err(WakeLockError::Unsupported)));
        assert!(!lock.is_held());
    }
}
