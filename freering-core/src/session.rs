//! `AudioSession`: lifecycle controller and startup handoff.
//!
//! ## Lifecycle
//!
//! ```text
//! AudioSession::new(config, processor)
//!   -> start()   queues + SyncCell built, worker spawned,
//!                AudioBridge + injection producer handed back
//!     -> stop()  stop signal raised, worker joined
//! ```
//!
//! Calling `start`/`stop` in the wrong state returns an error rather than
//! panicking. A session is single-shot: queues and the handshake cell live
//! for exactly one streaming run.
//!
//! ## Threading
//!
//! The worker receives everything it needs (the three queue handles, the
//! SyncCell, the sample rate) as one `WorkerInit` message over a bounded
//! channel, sent once before the steady-state loop begins. Ownership of the
//! worker-side halves moves with the message; nothing is shared beyond the
//! `Arc`'d cell, flag and counters.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    bridge::{AudioBridge, BridgeDiagnostics, BridgeSnapshot},
    error::{BridgeError, Result},
    process::FrameProcessor,
    queue::{FrameQueue, QueueConsumer, QueueProducer, DEFAULT_QUEUE_CAPACITY},
    sync::SyncCell,
    worker::{self, InjectionPolicy, WorkerContext, WorkerDiagnostics, WorkerSnapshot},
};

/// Configuration for one streaming session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Active sample rate in Hz. Default: 48000.
    pub sample_rate: u32,
    /// Independent sample lanes per queue. Default: 1.
    pub channel_count: usize,
    /// Frames per render callback invocation. Default: 128.
    pub quantum_frames: usize,
    /// Frames per worker processing batch; must be a multiple of
    /// `quantum_frames`. Default: 768 (six quanta).
    pub frame_size: usize,
    /// Frame capacity of each queue; must be a power of two no smaller than
    /// `frame_size`. Default: 4096.
    pub queue_capacity: usize,
    /// How injected data merges with captured input. Default: `Replace`.
    pub injection_policy: InjectionPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            channel_count: 1,
            quantum_frames: 128,
            frame_size: 768,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            injection_policy: InjectionPolicy::default(),
        }
    }
}

impl SessionConfig {
    /// Fail-fast validation. Misconfiguration cannot be recovered
    /// mid-stream, so every constraint is checked before any thread spawns.
    pub fn validate(&self) -> Result<()> {
        if self.channel_count == 0 {
            return Err(BridgeError::ZeroChannels);
        }
        if self.quantum_frames == 0 {
            return Err(BridgeError::ZeroQuantum);
        }
        if self.frame_size == 0 || self.frame_size % self.quantum_frames != 0 {
            return Err(BridgeError::FrameSizeMisaligned {
                frame_size: self.frame_size,
                quantum_frames: self.quantum_frames,
            });
        }
        if !self.queue_capacity.is_power_of_two() {
            return Err(BridgeError::CapacityNotPowerOfTwo(self.queue_capacity));
        }
        if self.frame_size > self.queue_capacity {
            return Err(BridgeError::FrameSizeExceedsCapacity {
                frame_size: self.frame_size,
                capacity: self.queue_capacity,
            });
        }
        Ok(())
    }
}

/// The single initialization message handed to the worker thread.
struct WorkerInit {
    input: QueueConsumer,
    output: QueueProducer,
    injection: QueueConsumer,
    sync: Arc<SyncCell>,
    running: Arc<AtomicBool>,
    processor: Box<dyn FrameProcessor>,
    policy: InjectionPolicy,
    frame_size: usize,
    sample_rate: u32,
    diagnostics: Arc<WorkerDiagnostics>,
}

/// Handles returned by `start()` for the two external parties.
pub struct SessionHandles {
    /// Moves to the real-time rendering thread.
    pub bridge: AudioBridge,
    /// Moves to the external injection producer (e.g. a UI generator).
    pub injection: QueueProducer,
}

/// Top-level session controller. Owns the worker thread and the shared
/// control plane (stop flag, handshake cell, diagnostics).
pub struct AudioSession {
    config: SessionConfig,
    /// Consumed by `start()`; a session runs at most once.
    processor: Option<Box<dyn FrameProcessor>>,
    running: Arc<AtomicBool>,
    sync: Arc<SyncCell>,
    worker: Option<thread::JoinHandle<()>>,
    bridge_diagnostics: Arc<BridgeDiagnostics>,
    worker_diagnostics: Arc<WorkerDiagnostics>,
}

impl AudioSession {
    /// Create a session. Does not spawn anything until `start()`.
    ///
    /// # Errors
    /// Any `SessionConfig` constraint violation, surfaced before the
    /// session exists.
    pub fn new(config: SessionConfig, processor: Box<dyn FrameProcessor>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            processor: Some(processor),
            running: Arc::new(AtomicBool::new(false)),
            sync: Arc::new(SyncCell::new()),
            worker: None,
            bridge_diagnostics: Arc::new(BridgeDiagnostics::default()),
            worker_diagnostics: Arc::new(WorkerDiagnostics::default()),
        })
    }

    /// Build the three queues, spawn the worker, and hand back the
    /// render-side and injection-side handles.
    ///
    /// # Errors
    /// - [`BridgeError::AlreadyRunning`] if `start()` already ran.
    pub fn start(&mut self) -> Result<SessionHandles> {
        let processor = self.processor.take().ok_or(BridgeError::AlreadyRunning)?;
        let cfg = &self.config;

        let (input_prod, input_cons) =
            FrameQueue::with_capacity(cfg.queue_capacity, cfg.channel_count)?;
        let (output_prod, output_cons) =
            FrameQueue::with_capacity(cfg.queue_capacity, cfg.channel_count)?;
        let (injection_prod, injection_cons) =
            FrameQueue::with_capacity(cfg.queue_capacity, cfg.channel_count)?;

        self.bridge_diagnostics.reset();
        self.worker_diagnostics.reset();
        self.running.store(true, Ordering::SeqCst);

        let init = WorkerInit {
            input: input_cons,
            output: output_prod,
            injection: injection_cons,
            sync: Arc::clone(&self.sync),
            running: Arc::clone(&self.running),
            processor,
            policy: cfg.injection_policy,
            frame_size: cfg.frame_size,
            sample_rate: cfg.sample_rate,
            diagnostics: Arc::clone(&self.worker_diagnostics),
        };

        // One-shot startup handoff: ownership of the worker-side queue
        // halves moves with this message.
        let (init_tx, init_rx) = crossbeam_channel::bounded::<WorkerInit>(1);

        let handle = thread::Builder::new()
            .name("freering-worker".into())
            .spawn(move || {
                let Ok(init) = init_rx.recv() else {
                    return;
                };
                worker::run(WorkerContext {
                    input: init.input,
                    output: init.output,
                    injection: init.injection,
                    sync: init.sync,
                    running: init.running,
                    processor: init.processor,
                    policy: init.policy,
                    frame_size: init.frame_size,
                    sample_rate: init.sample_rate,
                    diagnostics: init.diagnostics,
                });
            })
            .map_err(|e| BridgeError::Other(anyhow!("failed to spawn worker thread: {e}")))?;

        init_tx
            .send(init)
            .map_err(|_| BridgeError::Other(anyhow!("worker thread exited before init")))?;
        self.worker = Some(handle);

        info!(
            sample_rate = cfg.sample_rate,
            channel_count = cfg.channel_count,
            quantum_frames = cfg.quantum_frames,
            frame_size = cfg.frame_size,
            queue_capacity = cfg.queue_capacity,
            "session started"
        );

        Ok(SessionHandles {
            bridge: AudioBridge::new(
                input_prod,
                output_cons,
                Arc::clone(&self.sync),
                cfg.quantum_frames,
                cfg.frame_size,
                Arc::clone(&self.bridge_diagnostics),
            ),
            injection: injection_prod,
        })
    }

    /// Raise the stop signal and join the worker thread.
    ///
    /// Teardown ordering matters: both loops must have exited before the
    /// queues can be considered retired, which joining guarantees for the
    /// worker side. The caller is responsible for parking its render
    /// callback first.
    ///
    /// # Errors
    /// - [`BridgeError::NotRunning`] if the session is not running.
    /// - [`BridgeError::WorkerPanicked`] if the worker thread panicked.
    pub fn stop(&mut self) -> Result<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(BridgeError::NotRunning);
        }
        self.sync.stop();
        if let Some(handle) = self.worker.take() {
            handle.join().map_err(|_| BridgeError::WorkerPanicked)?;
        }
        info!("session stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Snapshot of the render-side counters.
    pub fn bridge_diagnostics_snapshot(&self) -> BridgeSnapshot {
        self.bridge_diagnostics.snapshot()
    }

    /// Snapshot of the worker-side counters.
    pub fn worker_diagnostics_snapshot(&self) -> WorkerSnapshot {
        self.worker_diagnostics.snapshot()
    }
}

impl Drop for AudioSession {
    fn drop(&mut self) {
        // Best-effort teardown so a dropped session never leaks a blocked
        // worker thread.
        if self.running.swap(false, Ordering::SeqCst) {
            self.sync.stop();
            if let Some(handle) = self.worker.take() {
                let _ = handle.join();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::GainProcessor;

    fn default_session() -> AudioSession {
        AudioSession::new(SessionConfig::default(), Box::<GainProcessor>::default())
            .expect("default config is valid")
    }

    #[test]
    fn default_config_is_valid() {
        assert!(SessionConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_non_power_of_two_capacity() {
        let cfg = SessionConfig {
            queue_capacity: 1000,
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(BridgeError::CapacityNotPowerOfTwo(1000))
        ));
    }

    #[test]
    fn rejects_frame_size_not_multiple_of_quantum() {
        let cfg = SessionConfig {
            quantum_frames: 128,
            frame_size: 700,
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(BridgeError::FrameSizeMisaligned { .. })
        ));
    }

    #[test]
    fn rejects_frame_size_larger_than_capacity() {
        let cfg = SessionConfig {
            quantum_frames: 128,
            frame_size: 8192,
            queue_capacity: 4096,
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(BridgeError::FrameSizeExceedsCapacity { .. })
        ));
    }

    #[test]
    fn rejects_zero_channels_and_zero_quantum() {
        let cfg = SessionConfig {
            channel_count: 0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(BridgeError::ZeroChannels)));

        let cfg = SessionConfig {
            quantum_frames: 0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(BridgeError::ZeroQuantum)));
    }

    #[test]
    fn start_stop_round_trip() {
        let mut session = default_session();
        assert!(!session.is_running());

        let handles = session.start().expect("start");
        assert!(session.is_running());
        assert_eq!(handles.bridge.quantum_frames(), 128);
        assert_eq!(handles.bridge.frame_size(), 768);

        session.stop().expect("stop");
        assert!(!session.is_running());
    }

    #[test]
    fn double_start_and_stale_stop_are_errors() {
        let mut session = default_session();
        let _handles = session.start().expect("start");
        assert!(matches!(session.start(), Err(BridgeError::AlreadyRunning)));

        session.stop().expect("stop");
        assert!(matches!(session.stop(), Err(BridgeError::NotRunning)));
    }

    #[test]
    fn drop_tears_down_a_running_session() {
        let mut session = default_session();
        let _handles = session.start().expect("start");
        // Dropping without stop() must join the worker, not hang or leak.
        drop(session);
    }

    #[test]
    fn invalid_config_fails_before_construction() {
        let cfg = SessionConfig {
            queue_capacity: 6,
            ..Default::default()
        };
        assert!(AudioSession::new(cfg, Box::<GainProcessor>::default()).is_err());
    }
}
