//! Runtime support for content-addressed memoization.
//!
//! The evaluator allocates a binding frame per lambda/binding invocation
//! and fills its argument futures as values resolve. This crate owns that
//! machinery plus the closure hasher: a continuation-passing subsystem
//! that derives a deterministic 128-bit code for every frame whose
//! arguments have resolved, used as the memoization key for job outputs.
//!
//! Everything is single-threaded and cooperative. `hash` never blocks;
//! continuations either fire synchronously (when the value is already
//! there) or are queued and driven by the [`queue::Runtime`] thunk queue.
//!
//! - [`value`]: the minimal runtime value the hasher observes
//! - [`frame`]: the frame arena with parent/invoker back-indices
//! - [`future`]: one-shot cells with FIFO waiter lists
//! - [`queue`]: the thunk queue and the hashing entry points

pub mod frame;
pub mod future;
pub mod queue;
pub mod value;

pub use frame::{Frame, FrameArena, FrameId, FrameKind};
pub use future::Future;
pub use queue::{HashReceiver, Runtime, Thunk, ValueReceiver};
pub use value::Value;
