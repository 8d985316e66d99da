//! # freering-core
//!
//! Lock-free exchange of fixed-size audio sample blocks between a
//! hard-real-time render callback and a best-effort worker thread.
//!
//! ## Architecture
//!
//! ```text
//! render thread --> input FrameQueue --[SyncCell arm]--> worker thread
//!      ^                                                     |
//!      +--------------- output FrameQueue <-- FrameProcessor +
//!                                                            ^
//!                  injection FrameQueue <--- external producer
//! ```
//!
//! The render side never blocks, locks, or allocates: queue operations are
//! bounded-time copies or immediate failures, and arming the handshake is a
//! compare-exchange. The worker is the only blocking party, parked on the
//! `SyncCell` until a full processing frame (several render quanta) has
//! accumulated, which amortizes the wake cost, and woken separately for
//! teardown.
//!
//! Streaming faults (overrun, underrun, spurious wake) are counters, never
//! errors; misconfiguration fails fast at construction.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod bridge;
pub mod error;
pub mod process;
pub mod queue;
pub mod session;
pub mod sync;
pub mod worker;

// Convenience re-exports for downstream crates
pub use bridge::{AudioBridge, BridgeSnapshot, QuantumOutcome};
pub use error::{BridgeError, Result};
pub use process::{FrameProcessor, GainProcessor};
pub use queue::{frame::Frame, FrameQueue, QueueConsumer, QueueProducer};
pub use session::{AudioSession, SessionConfig, SessionHandles};
pub use sync::{SyncCell, Wake};
pub use worker::{InjectionPolicy, WorkerSnapshot};
