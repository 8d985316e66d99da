//! Per-frame processing policy.
//!
//! The `FrameProcessor` trait is the worker's extensibility point: swap in
//! `GainProcessor` (default), a synth voice, or an effect chain without
//! touching the queue or handshake mechanics.

pub mod gain;

pub use gain::GainProcessor;

use crate::queue::frame::Frame;

/// Contract for the worker's transform step.
///
/// `&mut self` intentionally permits stateful processors (filter memories,
/// oscillator phases). The worker owns its processor exclusively, so no
/// locking is involved.
pub trait FrameProcessor: Send + 'static {
    /// Compute one output frame from one input frame.
    ///
    /// `input` and `output` always have the session's channel count and
    /// frame size. Implementations must not block, perform I/O, or assume
    /// anything about inter-frame timing.
    fn process(&mut self, input: &Frame, output: &mut Frame);

    /// Reset internal state at session boundaries.
    fn reset(&mut self) {}
}
