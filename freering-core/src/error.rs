use thiserror::Error;

/// All errors produced by freering-core.
///
/// Streaming-path conditions (overrun, underrun, spurious wake) are *not*
/// errors; they are diagnostics counters. Everything here is either a
/// construction-time misconfiguration or a lifecycle misuse, both of which
/// fail fast before any samples flow.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("queue capacity must be a non-zero power of two, got {0}")]
    CapacityNotPowerOfTwo(usize),

    #[error("channel count must be at least 1")]
    ZeroChannels,

    #[error("render quantum must be at least 1 frame")]
    ZeroQuantum,

    #[error("frame size {frame_size} is not a multiple of the render quantum {quantum_frames}")]
    FrameSizeMisaligned {
        frame_size: usize,
        quantum_frames: usize,
    },

    #[error("frame size {frame_size} exceeds queue capacity {capacity}")]
    FrameSizeExceedsCapacity { frame_size: usize, capacity: usize },

    #[error("session is already started")]
    AlreadyRunning,

    #[error("session is not running")]
    NotRunning,

    #[error("worker thread panicked")]
    WorkerPanicked,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
