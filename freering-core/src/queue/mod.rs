//! Lock-free SPSC frame queue over shared storage.
//!
//! `FrameQueue` is a fixed-capacity, multi-channel circular buffer of f32
//! samples. It is split at construction into a [`QueueProducer`] and a
//! [`QueueConsumer`]; exactly one thread may hold each half, which is what
//! makes the queue lock-free without any further coordination.
//!
//! ## Index protocol
//!
//! `write_index` and `read_index` are monotonically increasing logical
//! positions, wrapped modulo `capacity` only when addressing storage. The
//! unsigned difference `write - read` is always in `[0, capacity]`:
//!
//! - `available_read  = write - read`
//! - `available_write = capacity - available_read`
//!
//! A producer advances `write_index` with a release store after copying
//! sample data; a consumer's acquire load of `write_index` therefore
//! guarantees it observes that data. The mirror argument holds for
//! `read_index` and space reuse.
//!
//! Sample words are `AtomicU32` bit patterns (`f32::to_bits`) with relaxed
//! element ordering; the index stores carry the synchronisation, and the
//! crate stays `#![forbid(unsafe_code)]`.

pub mod frame;

use std::sync::{
    atomic::{AtomicU32, AtomicUsize, Ordering},
    Arc,
};

use crate::error::{BridgeError, Result};

/// Queue capacity used by default sessions: 4096 frames per channel
/// (~85 ms at 48 kHz), comfortably above the 768-frame processing batch.
pub const DEFAULT_QUEUE_CAPACITY: usize = 4096;

/// Shared backing state for one queue. Both handles hold an `Arc` to this,
/// so the storage outlives whichever thread exits last.
#[derive(Debug)]
pub struct FrameQueue {
    /// Frame capacity per channel. Power of two, fixed at construction.
    capacity: usize,
    /// `capacity - 1`, for cheap index wrapping.
    mask: usize,
    /// Planar storage: one `capacity`-sized lane per channel.
    storage: Vec<Box<[AtomicU32]>>,
    /// Monotonically increasing logical write position.
    write_index: AtomicUsize,
    /// Monotonically increasing logical read position.
    read_index: AtomicUsize,
}

impl FrameQueue {
    /// Create a queue and split it into its producer/consumer halves.
    ///
    /// # Errors
    /// - [`BridgeError::CapacityNotPowerOfTwo`] if `capacity` is zero or not
    ///   a power of two.
    /// - [`BridgeError::ZeroChannels`] if `channel_count` is zero.
    pub fn with_capacity(
        capacity: usize,
        channel_count: usize,
    ) -> Result<(QueueProducer, QueueConsumer)> {
        if !capacity.is_power_of_two() {
            return Err(BridgeError::CapacityNotPowerOfTwo(capacity));
        }
        if channel_count == 0 {
            return Err(BridgeError::ZeroChannels);
        }

        let storage = (0..channel_count)
            .map(|_| {
                (0..capacity)
                    .map(|_| AtomicU32::new(0))
                    .collect::<Vec<_>>()
                    .into_boxed_slice()
            })
            .collect();

        let shared = Arc::new(Self {
            capacity,
            mask: capacity - 1,
            storage,
            write_index: AtomicUsize::new(0),
            read_index: AtomicUsize::new(0),
        });

        Ok((
            QueueProducer {
                shared: Arc::clone(&shared),
            },
            QueueConsumer { shared },
        ))
    }

    fn channel_count(&self) -> usize {
        self.storage.len()
    }
}

/// Writing half of a [`FrameQueue`]. Exactly one thread may own this.
#[derive(Debug)]
pub struct QueueProducer {
    shared: Arc<FrameQueue>,
}

impl QueueProducer {
    /// Copy `frames` samples per channel into the queue.
    ///
    /// All-or-nothing: if fewer than `frames` slots are free, nothing is
    /// written and `false` is returned. Dropping the rejected samples (or
    /// retrying later) is the caller's policy.
    ///
    /// Wait-free: a bounded copy or an immediate failure. Safe to call from
    /// a real-time audio callback.
    pub fn push(&mut self, channels: &[impl AsRef<[f32]>], frames: usize) -> bool {
        let q = &*self.shared;
        debug_assert_eq!(channels.len(), q.channel_count(), "channel count mismatch");

        let write = q.write_index.load(Ordering::Relaxed);
        let read = q.read_index.load(Ordering::Acquire);
        let available_write = q.capacity - write.wrapping_sub(read);
        if frames > available_write {
            return false;
        }

        for (lane, src) in q.storage.iter().zip(channels) {
            let src = src.as_ref();
            debug_assert!(src.len() >= frames, "source slice shorter than frame count");
            for (i, sample) in src[..frames].iter().enumerate() {
                lane[write.wrapping_add(i) & q.mask].store(sample.to_bits(), Ordering::Relaxed);
            }
        }

        q.write_index
            .store(write.wrapping_add(frames), Ordering::Release);
        true
    }

    /// Free space in frames. May be stale by the time the caller acts;
    /// `push` re-validates before writing.
    pub fn available_write(&self) -> usize {
        let q = &*self.shared;
        let write = q.write_index.load(Ordering::Relaxed);
        let read = q.read_index.load(Ordering::Acquire);
        q.capacity - write.wrapping_sub(read)
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn channel_count(&self) -> usize {
        self.shared.channel_count()
    }
}

/// Reading half of a [`FrameQueue`]. Exactly one thread may own this.
#[derive(Debug)]
pub struct QueueConsumer {
    shared: Arc<FrameQueue>,
}

impl QueueConsumer {
    /// Copy `frames` samples per channel out of the queue.
    ///
    /// All-or-nothing: if fewer than `frames` samples are buffered, the
    /// destination is untouched and `false` is returned.
    pub fn pull(&mut self, channels: &mut [impl AsMut<[f32]>], frames: usize) -> bool {
        let q = &*self.shared;
        debug_assert_eq!(channels.len(), q.channel_count(), "channel count mismatch");

        let read = q.read_index.load(Ordering::Relaxed);
        let write = q.write_index.load(Ordering::Acquire);
        let available_read = write.wrapping_sub(read);
        if frames > available_read {
            return false;
        }

        for (lane, dst) in q.storage.iter().zip(channels) {
            let dst = dst.as_mut();
            debug_assert!(dst.len() >= frames, "destination slice shorter than frame count");
            for (i, sample) in dst[..frames].iter_mut().enumerate() {
                *sample =
                    f32::from_bits(lane[read.wrapping_add(i) & q.mask].load(Ordering::Relaxed));
            }
        }

        q.read_index
            .store(read.wrapping_add(frames), Ordering::Release);
        true
    }

    /// Buffered frames available to read. May be stale; `pull` re-validates.
    pub fn available_read(&self) -> usize {
        let q = &*self.shared;
        let read = q.read_index.load(Ordering::Relaxed);
        let write = q.write_index.load(Ordering::Acquire);
        write.wrapping_sub(read)
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn channel_count(&self) -> usize {
        self.shared.channel_count()
    }

    /// Reset both indices to zero, emptying the queue.
    ///
    /// Session boundaries only: the caller must guarantee no concurrent
    /// `push`/`pull` while this runs. Never call during active streaming.
    pub fn reset(&mut self) {
        let q = &*self.shared;
        q.read_index.store(0, Ordering::SeqCst);
        q.write_index.store(0, Ordering::SeqCst);
    }
}
