//! Reference processor: fixed-gain scale.

use super::FrameProcessor;
use crate::queue::frame::Frame;

/// Scales every sample by a fixed factor.
///
/// This is the reference processing policy. It is stateless and trivially
/// verifiable, which makes it the baseline for worker-loop tests as well as
/// a usable volume stage.
#[derive(Debug, Clone)]
pub struct GainProcessor {
    gain: f32,
}

impl GainProcessor {
    pub fn new(gain: f32) -> Self {
        Self { gain }
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }
}

impl Default for GainProcessor {
    fn default() -> Self {
        // Headroom-preserving default, matching the reference worker policy.
        Self::new(0.5)
    }
}

impl FrameProcessor for GainProcessor {
    fn process(&mut self, input: &Frame, output: &mut Frame) {
        debug_assert_eq!(input.channel_count(), output.channel_count());
        debug_assert_eq!(input.len(), output.len());
        for (dst, src) in output.channels_mut().iter_mut().zip(input.channels()) {
            for (d, s) in dst.iter_mut().zip(src) {
                *d = *s * self.gain;
            }
        }
    }
}
