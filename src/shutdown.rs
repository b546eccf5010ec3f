//! Interruptible waits.
//!
//! The monitor only ever suspends in timed pauses, so cancellation is handled
//! there: a watcher thread listens for SIGINT/SIGTERM and wakes the pause early.

use log::{debug, warn};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::thread;
use std::time::Duration;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

impl Flow {
    pub fn is_stop(self) -> bool {
        self == Flow::Stop
    }
}

/// A timed pause that may be cut short by a shutdown request.
pub trait Pause {
    fn pause(&mut self, duration: Duration) -> Flow;

    /// Non-blocking check between steps.
    fn stop_requested(&mut self) -> bool {
        self.pause(Duration::ZERO).is_stop()
    }
}

pub struct Shutdown {
    signals: Receiver<&'static str>,
    requested: bool,
    watcher_lost: bool,
}

impl Shutdown {
    /// Spawn the signal watcher thread.
    pub fn install() -> Result<Self, String> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| format!("signal runtime init failed: {}", e))?;
        let (tx, rx) = mpsc::channel();

        thread::Builder::new()
            .name("signal-watcher".into())
            .spawn(move || {
                if let Some(signal) = runtime.block_on(wait_for_signal()) {
                    // receiver gone means main is already exiting
                    let _ = tx.send(signal);
                }
            })
            .map_err(|e| format!("spawning signal watcher failed: {}", e))?;

        Ok(Shutdown {
            signals: rx,
            requested: false,
            watcher_lost: false,
        })
    }

    fn record(&mut self, signal: &'static str) -> Flow {
        debug!("Received {}", signal);
        self.requested = true;
        Flow::Stop
    }

    fn degrade(&mut self) {
        if !self.watcher_lost {
            warn!("Signal watcher stopped; interrupts will not be handled gracefully");
            self.watcher_lost = true;
        }
    }
}

impl Pause for Shutdown {
    fn pause(&mut self, duration: Duration) -> Flow {
        if self.requested {
            return Flow::Stop;
        }
        if self.watcher_lost {
            thread::sleep(duration);
            return Flow::Continue;
        }
        if duration.is_zero() {
            return match self.signals.try_recv() {
                Ok(signal) => self.record(signal),
                Err(TryRecvError::Empty) => Flow::Continue,
                Err(TryRecvError::Disconnected) => {
                    self.degrade();
                    Flow::Continue
                }
            };
        }
        match self.signals.recv_timeout(duration) {
            Ok(signal) => self.record(signal),
            Err(RecvTimeoutError::Timeout) => Flow::Continue,
            Err(RecvTimeoutError::Disconnected) => {
                self.degrade();
                thread::sleep(duration);
                Flow::Continue
            }
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> Option<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => tokio::select! {
            res = tokio::signal::ctrl_c() => res.ok().map(|_| "SIGINT"),
            _ = term.recv() => Some("SIGTERM"),
        },
        Err(_) => tokio::signal::ctrl_c().await.ok().map(|_| "SIGINT"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> Option<&'static str> {
    tokio::signal::ctrl_c().await.ok().map(|_| "Ctrl+C")
}
