//! Render/worker handshake cell.
//!
//! One atomic integer carries a binary protocol: `0` = idle, `1` = armed.
//! The render thread arms it after depositing a full processing frame; the
//! worker blocks while it is idle and clears it after each cycle:
//!
//! ```text
//! Idle --arm() by AudioBridge--> Armed --clear() by WorkerLoop--> Idle
//! ```
//!
//! The arming side never takes a lock: `arm()` is a compare-exchange plus a
//! condvar notify, both bounded-time, so it is safe inside a real-time audio
//! callback. Only the worker ever blocks, and `stop()` unblocks it for
//! teardown independently of data readiness.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

const IDLE: u32 = 0;
const ARMED: u32 = 1;

/// Upper bound between wakeup re-checks. `arm()` notifies without holding
/// the waiter mutex, so a notify can race a waiter between its state check
/// and its sleep; the bounded wait turns that lost wakeup into a short,
/// protocol-tolerated spurious delay instead of a hang.
const WAIT_RECHECK: Duration = Duration::from_millis(10);

/// Why `SyncCell::wait` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// A processing frame is ready; run one cycle.
    Armed,
    /// The session is tearing down; exit the loop.
    Stopped,
}

/// The shared handshake cell.
#[derive(Debug, Default)]
pub struct SyncCell {
    /// `IDLE` or `ARMED`.
    state: AtomicU32,
    /// Cancellation flag, distinct from the data-ready signal.
    stopped: AtomicBool,
    waiter: Mutex<()>,
    wake: Condvar,
}

impl SyncCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request one worker cycle. Returns `true` if the cell transitioned
    /// `Idle -> Armed`; `false` if a cycle is still in flight (the caller
    /// should retry on a later quantum).
    ///
    /// Read-before-write: the compare-exchange only fires when the worker
    /// has cleared the previous arming, so a cycle can never be double-armed.
    pub fn arm(&self) -> bool {
        if self
            .state
            .compare_exchange(IDLE, ARMED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.wake.notify_one();
            true
        } else {
            false
        }
    }

    /// Mark the current cycle complete (`Armed -> Idle`). Worker-side only.
    pub fn clear(&self) {
        self.state.store(IDLE, Ordering::Release);
    }

    pub fn is_armed(&self) -> bool {
        self.state.load(Ordering::Acquire) == ARMED
    }

    /// Raise the cancellation signal and wake any waiter.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
        self.wake.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Block until the cell is armed or the session is stopped.
    ///
    /// Worker-side only; this is the one blocking call in the system.
    pub fn wait(&self) -> Wake {
        let mut guard = self.waiter.lock();
        loop {
            if self.stopped.load(Ordering::Acquire) {
                return Wake::Stopped;
            }
            if self.state.load(Ordering::Acquire) == ARMED {
                return Wake::Armed;
            }
            let _ = self.wake.wait_for(&mut guard, WAIT_RECHECK);
        }
    }
}
