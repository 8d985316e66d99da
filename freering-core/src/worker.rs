//! Best-effort worker loop.
//!
//! ## Cycle (per wake)
//!
//! ```text
//! 1. Block on SyncCell until Armed (or Stopped: exit)
//! 2. Pull one processing frame from the input queue
//!    (unavailable despite arming: spurious wake, clear, re-loop)
//! 3. Injection queue holds a full frame? overlay per InjectionPolicy
//! 4. FrameProcessor::process(input) -> output frame
//! 5. Push output frame (queue full: frame dropped, counted)
//! 6. Clear SyncCell (Armed -> Idle)
//! ```
//!
//! The loop allocates its three scratch frames once, before entering
//! steady state. It is the only thread in the system permitted to block,
//! and it blocks solely on the handshake cell.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    process::FrameProcessor,
    queue::{frame::Frame, QueueConsumer, QueueProducer},
    sync::{SyncCell, Wake},
};

/// How injected data combines with the captured input frame.
///
/// The injection queue is fed by an external, independently-timed producer
/// (e.g. a UI-driven generator); whichever policy is active only applies on
/// cycles where a full frame of injected data is available.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InjectionPolicy {
    /// Injected frame replaces the captured input outright.
    #[default]
    Replace,
    /// Injected frame is summed into the captured input.
    Mix,
}

/// Streaming counters for the worker side.
#[derive(Debug, Default)]
pub struct WorkerDiagnostics {
    pub cycles: AtomicUsize,
    pub spurious_wakes: AtomicUsize,
    pub injected_frames: AtomicUsize,
    pub output_drops: AtomicUsize,
}

impl WorkerDiagnostics {
    pub fn reset(&self) {
        self.cycles.store(0, Ordering::Relaxed);
        self.spurious_wakes.store(0, Ordering::Relaxed);
        self.injected_frames.store(0, Ordering::Relaxed);
        self.output_drops.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> WorkerSnapshot {
        WorkerSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            spurious_wakes: self.spurious_wakes.load(Ordering::Relaxed),
            injected_frames: self.injected_frames.load(Ordering::Relaxed),
            output_drops: self.output_drops.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct WorkerSnapshot {
    pub cycles: usize,
    pub spurious_wakes: usize,
    pub injected_frames: usize,
    pub output_drops: usize,
}

/// All context the worker loop needs, passed as one struct so the thread
/// closure stays tidy. Built by the session from its startup handoff.
pub struct WorkerContext {
    /// Consumer half of the input queue (render -> worker).
    pub input: QueueConsumer,
    /// Producer half of the output queue (worker -> render).
    pub output: QueueProducer,
    /// Consumer half of the injection queue (external producer -> worker).
    pub injection: QueueConsumer,
    pub sync: Arc<SyncCell>,
    pub running: Arc<AtomicBool>,
    pub processor: Box<dyn FrameProcessor>,
    pub policy: InjectionPolicy,
    /// Samples per processing frame (a multiple of the render quantum).
    pub frame_size: usize,
    /// Active sample rate, for processors that need wall-clock context.
    pub sample_rate: u32,
    pub diagnostics: Arc<WorkerDiagnostics>,
}

/// Run the worker loop until the stop signal is raised.
pub fn run(mut ctx: WorkerContext) {
    let channel_count = ctx.input.channel_count();
    info!(
        frame_size = ctx.frame_size,
        channel_count,
        sample_rate = ctx.sample_rate,
        policy = ?ctx.policy,
        "worker started"
    );

    // Scratch frames, allocated once. The steady loop is allocation-free.
    let mut input = Frame::new(channel_count, ctx.frame_size);
    let mut injected = Frame::new(channel_count, ctx.frame_size);
    let mut output = Frame::new(channel_count, ctx.frame_size);

    ctx.processor.reset();

    loop {
        if !ctx.running.load(Ordering::Relaxed) {
            break;
        }

        // 1. Block until armed.
        match ctx.sync.wait() {
            Wake::Stopped => break,
            Wake::Armed => {}
        }

        // 2. Pull one processing frame.
        if !ctx.input.pull(input.channels_mut(), ctx.frame_size) {
            // Armed but no full frame buffered. Benign: clear and re-loop.
            ctx.diagnostics
                .spurious_wakes
                .fetch_add(1, Ordering::Relaxed);
            debug!("armed with no full frame available, spurious wake");
            ctx.sync.clear();
            continue;
        }

        // 3. Overlay injected data when a full frame is waiting.
        if ctx.injection.available_read() >= ctx.frame_size {
            match ctx.policy {
                InjectionPolicy::Replace => {
                    if ctx.injection.pull(input.channels_mut(), ctx.frame_size) {
                        ctx.diagnostics
                            .injected_frames
                            .fetch_add(1, Ordering::Relaxed);
                    }
                }
                InjectionPolicy::Mix => {
                    if ctx.injection.pull(injected.channels_mut(), ctx.frame_size) {
                        input.mix_in(&injected);
                        ctx.diagnostics
                            .injected_frames
                            .fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        }

        // 4. Transform.
        ctx.processor.process(&input, &mut output);

        // 5. Publish the output frame.
        if !ctx.output.push(output.channels(), ctx.frame_size) {
            ctx.diagnostics.output_drops.fetch_add(1, Ordering::Relaxed);
            debug!("output queue full, dropping processed frame");
        }

        ctx.diagnostics.cycles.fetch_add(1, Ordering::Relaxed);

        // 6. Hand the cell back.
        ctx.sync.clear();
    }

    let snap = ctx.diagnostics.snapshot();
    info!(
        cycles = snap.cycles,
        spurious_wakes = snap.spurious_wakes,
        injected_frames = snap.injected_frames,
        output_drops = snap.output_drops,
        "worker stopped"
    );
}
