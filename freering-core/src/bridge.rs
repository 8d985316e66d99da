//! Real-time side of the exchange.
//!
//! # Design constraints
//!
//! `render_quantum` runs inside a hard-real-time audio callback with a
//! per-quantum deadline (~2.7 ms for 128 frames at 48 kHz). It **must not**:
//! - Allocate heap memory
//! - Block on a mutex or condvar
//! - Perform I/O
//!
//! Every queue operation here is a bounded-time copy or an immediate
//! failure, and arming the handshake is a single compare-exchange. Underrun
//! and overrun are reportable counters, never errors: the callback always
//! meets its deadline, substituting silence or dropping a quantum instead.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use serde::Serialize;
use tracing::debug;

use crate::{
    queue::{QueueConsumer, QueueProducer},
    sync::SyncCell,
};

/// Streaming counters for the render side.
#[derive(Debug, Default)]
pub struct BridgeDiagnostics {
    pub quanta_rendered: AtomicUsize,
    pub input_overruns: AtomicUsize,
    pub output_underruns: AtomicUsize,
    pub armings: AtomicUsize,
    pub armings_deferred: AtomicUsize,
}

impl BridgeDiagnostics {
    pub fn reset(&self) {
        self.quanta_rendered.store(0, Ordering::Relaxed);
        self.input_overruns.store(0, Ordering::Relaxed);
        self.output_underruns.store(0, Ordering::Relaxed);
        self.armings.store(0, Ordering::Relaxed);
        self.armings_deferred.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> BridgeSnapshot {
        BridgeSnapshot {
            quanta_rendered: self.quanta_rendered.load(Ordering::Relaxed),
            input_overruns: self.input_overruns.load(Ordering::Relaxed),
            output_underruns: self.output_underruns.load(Ordering::Relaxed),
            armings: self.armings.load(Ordering::Relaxed),
            armings_deferred: self.armings_deferred.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct BridgeSnapshot {
    pub quanta_rendered: usize,
    pub input_overruns: usize,
    pub output_underruns: usize,
    pub armings: usize,
    pub armings_deferred: usize,
}

/// What happened during one quantum. Returned for observability and tests;
/// the render callback is free to ignore it.
#[derive(Debug, Clone, Copy)]
pub struct QuantumOutcome {
    /// Captured input was accepted by the input queue.
    pub pushed: bool,
    /// Playback was filled from the output queue (`false` = silence).
    pub drained: bool,
    /// The handshake cell was armed this quantum.
    pub armed: bool,
}

/// Runs on the real-time rendering thread; one instance per session.
///
/// Exchanges one quantum per call: drains the worker's processed output into
/// the playback buffers and deposits newly captured input, arming the
/// handshake once a full processing frame has accumulated.
pub struct AudioBridge {
    /// Producer half of the input queue (render -> worker).
    input: QueueProducer,
    /// Consumer half of the output queue (worker -> render).
    output: QueueConsumer,
    sync: Arc<SyncCell>,
    quantum_frames: usize,
    frame_size: usize,
    /// Frames accepted by the input queue since the last successful arming.
    pending_frames: usize,
    diagnostics: Arc<BridgeDiagnostics>,
}

impl AudioBridge {
    pub(crate) fn new(
        input: QueueProducer,
        output: QueueConsumer,
        sync: Arc<SyncCell>,
        quantum_frames: usize,
        frame_size: usize,
        diagnostics: Arc<BridgeDiagnostics>,
    ) -> Self {
        Self {
            input,
            output,
            sync,
            quantum_frames,
            frame_size,
            pending_frames: 0,
            diagnostics,
        }
    }

    /// Exchange one render quantum.
    ///
    /// - `captured`: one quantum of new input per channel, copied into the
    ///   input queue. On overrun the quantum is dropped (counted).
    /// - `playback`: filled with one quantum of processed output per
    ///   channel. On underrun it is filled with silence (counted).
    ///
    /// Wait-free; safe to call from the audio callback.
    pub fn render_quantum(
        &mut self,
        captured: &[impl AsRef<[f32]>],
        playback: &mut [impl AsMut<[f32]>],
    ) -> QuantumOutcome {
        let quantum = self.quantum_frames;
        self.diagnostics
            .quanta_rendered
            .fetch_add(1, Ordering::Relaxed);

        // 1. Drain processed output; silence on underrun.
        let drained = self.output.pull(playback, quantum);
        if !drained {
            for lane in playback.iter_mut() {
                let lane = lane.as_mut();
                let n = quantum.min(lane.len());
                lane[..n].fill(0.0);
            }
            self.diagnostics
                .output_underruns
                .fetch_add(1, Ordering::Relaxed);
            debug!("output queue underrun, substituting silence");
        }

        // 2. Deposit captured input; drop the quantum on overrun.
        let pushed = self.input.push(captured, quantum);
        if pushed {
            self.pending_frames += quantum;
        } else {
            self.diagnostics
                .input_overruns
                .fetch_add(1, Ordering::Relaxed);
            debug!("input queue overrun, dropping quantum");
        }

        // 3. Arm once a full processing frame has accumulated.
        let mut armed = false;
        if self.pending_frames >= self.frame_size {
            if self.sync.arm() {
                self.pending_frames -= self.frame_size;
                self.diagnostics.armings.fetch_add(1, Ordering::Relaxed);
                armed = true;
            } else {
                // Previous cycle still in flight; retry next quantum.
                self.diagnostics
                    .armings_deferred
                    .fetch_add(1, Ordering::Relaxed);
            }
        }

        QuantumOutcome {
            pushed,
            drained,
            armed,
        }
    }

    /// Frames accepted since the last successful arming.
    pub fn pending_frames(&self) -> usize {
        self.pending_frames
    }

    pub fn quantum_frames(&self) -> usize {
        self.quantum_frames
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn diagnostics_snapshot(&self) -> BridgeSnapshot {
        self.diagnostics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::FrameQueue;

    const QUANTUM: usize = 128;
    const FRAME: usize = 6 * QUANTUM;

    struct Rig {
        bridge: AudioBridge,
        /// Worker-side handles, driven manually by the tests.
        worker_input: crate::queue::QueueConsumer,
        worker_output: crate::queue::QueueProducer,
        sync: Arc<SyncCell>,
    }

    fn rig() -> Rig {
        let (in_prod, in_cons) = FrameQueue::with_capacity(4096, 1).expect("input queue");
        let (out_prod, out_cons) = FrameQueue::with_capacity(4096, 1).expect("output queue");
        let sync = Arc::new(SyncCell::new());
        let bridge = AudioBridge::new(
            in_prod,
            out_cons,
            Arc::clone(&sync),
            QUANTUM,
            FRAME,
            Arc::new(BridgeDiagnostics::default()),
        );
        Rig {
            bridge,
            worker_input: in_cons,
            worker_output: out_prod,
            sync,
        }
    }

    #[test]
    fn underrun_substitutes_silence_and_counts() {
        let mut rig = rig();
        let captured = [[0.25f32; QUANTUM]];
        let mut playback = [[0.7f32; QUANTUM]];

        let outcome = rig.bridge.render_quantum(&captured, &mut playback);
        assert!(!outcome.drained);
        assert!(outcome.pushed);
        assert!(playback[0].iter().all(|s| *s == 0.0), "silence on underrun");
        assert_eq!(rig.bridge.diagnostics_snapshot().output_underruns, 1);
    }

    #[test]
    fn drains_processed_output_when_available() {
        let mut rig = rig();
        assert!(rig.worker_output.push(&[[0.5f32; QUANTUM]], QUANTUM));

        let captured = [[0.0f32; QUANTUM]];
        let mut playback = [[0.0f32; QUANTUM]];
        let outcome = rig.bridge.render_quantum(&captured, &mut playback);
        assert!(outcome.drained);
        assert!(playback[0].iter().all(|s| *s == 0.5));
        assert_eq!(rig.bridge.diagnostics_snapshot().output_underruns, 0);
    }

    #[test]
    fn arms_exactly_once_after_six_quanta() {
        // FRAME = 768 = 6 * 128, the default session shape.
        let mut rig = rig();
        let captured = [[0.1f32; QUANTUM]];
        let mut playback = [[0.0f32; QUANTUM]];

        for n in 1..=5 {
            let outcome = rig.bridge.render_quantum(&captured, &mut playback);
            assert!(!outcome.armed, "no arming on quantum {n}");
            assert!(!rig.sync.is_armed());
        }
        let outcome = rig.bridge.render_quantum(&captured, &mut playback);
        assert!(outcome.armed, "sixth quantum completes the frame");
        assert!(rig.sync.is_armed());
        assert_eq!(rig.bridge.diagnostics_snapshot().armings, 1);
        assert_eq!(rig.worker_input.available_read(), FRAME);
    }

    #[test]
    fn arming_is_deferred_while_previous_cycle_in_flight() {
        let mut rig = rig();
        let captured = [[0.1f32; QUANTUM]];
        let mut playback = [[0.0f32; QUANTUM]];

        for _ in 0..6 {
            rig.bridge.render_quantum(&captured, &mut playback);
        }
        assert!(rig.sync.is_armed());

        // Six more quanta with the worker stalled: the bridge must not
        // double-arm, but keeps the accumulated frames pending.
        for _ in 0..6 {
            let outcome = rig.bridge.render_quantum(&captured, &mut playback);
            assert!(!outcome.armed);
        }
        let snap = rig.bridge.diagnostics_snapshot();
        assert_eq!(snap.armings, 1);
        assert!(snap.armings_deferred >= 1);
        assert!(rig.bridge.pending_frames() >= FRAME);

        // Worker completes; the very next quantum re-arms from the backlog.
        rig.sync.clear();
        let outcome = rig.bridge.render_quantum(&captured, &mut playback);
        assert!(outcome.armed);
        assert_eq!(rig.bridge.diagnostics_snapshot().armings, 2);
    }

    #[test]
    fn overrun_drops_quantum_and_counts() {
        let (in_prod, _in_cons) = FrameQueue::with_capacity(128, 1).expect("input queue");
        let (_out_prod, out_cons) = FrameQueue::with_capacity(128, 1).expect("output queue");
        let mut bridge = AudioBridge::new(
            in_prod,
            out_cons,
            Arc::new(SyncCell::new()),
            QUANTUM,
            FRAME,
            Arc::new(BridgeDiagnostics::default()),
        );

        let captured = [[0.1f32; QUANTUM]];
        let mut playback = [[0.0f32; QUANTUM]];

        // Capacity 128 holds exactly one quantum; the second push overruns.
        assert!(bridge.render_quantum(&captured, &mut playback).pushed);
        let outcome = bridge.render_quantum(&captured, &mut playback);
        assert!(!outcome.pushed);
        assert_eq!(bridge.diagnostics_snapshot().input_overruns, 1);
        // Dropped quanta do not count toward the arming threshold.
        assert_eq!(bridge.pending_frames(), QUANTUM);
    }
}
