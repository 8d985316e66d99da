//! Planar scratch block for one processing frame.

/// A fixed-size, multi-channel batch of samples.
///
/// Allocated once when the worker starts; the steady-state loop pulls into
/// and pushes from it without further allocation.
#[derive(Debug, Clone)]
pub struct Frame {
    /// One `len`-sized lane per channel.
    channels: Vec<Vec<f32>>,
    /// Samples per channel.
    len: usize,
}

impl Frame {
    /// Create a silent frame of `len` samples across `channel_count` lanes.
    pub fn new(channel_count: usize, len: usize) -> Self {
        Self {
            channels: vec![vec![0.0; len]; channel_count],
            len,
        }
    }

    /// Samples per channel.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Per-channel lanes, shaped for `QueueProducer::push`.
    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Per-channel lanes, shaped for `QueueConsumer::pull`.
    pub fn channels_mut(&mut self) -> &mut [Vec<f32>] {
        &mut self.channels
    }

    /// Zero every sample.
    pub fn silence(&mut self) {
        for lane in &mut self.channels {
            lane.fill(0.0);
        }
    }

    /// Add `other` into this frame sample-by-sample.
    ///
    /// Lanes and lengths must match; enforced by construction in the worker,
    /// asserted in debug builds.
    pub fn mix_in(&mut self, other: &Frame) {
        debug_assert_eq!(self.channel_count(), other.channel_count());
        debug_assert_eq!(self.len, other.len);
        for (dst, src) in self.channels.iter_mut().zip(&other.channels) {
            for (d, s) in dst.iter_mut().zip(src) {
                *d += *s;
            }
        }
    }
}
