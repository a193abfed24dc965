//! ringmpmc - a bounded MPMC ring buffer that grows under pressure.
//!
//! One shared cell array, four modular indices, any number of producer and
//! consumer threads. Batches are claimed by CAS on a head counter, written
//! in place, and committed in claim order, so the visible prefix on either
//! side grows contiguously. When occupancy crosses a high-water mark, one
//! producer is elected to rehost the live elements into an array twice the
//! size (up to a ceiling) while everyone else parks briefly.
//!
//! # Key properties
//!
//! - Batch push/pop with FIFO ordering of committed batches
//! - Lock-free claim/commit on both sides; blocking only during expansion
//!   and on an empty pop
//! - Producer and consumer index pairs on separate cache lines
//! - Capacity grows by doubling, never shrinks, and never passes the
//!   configured ceiling
//!
//! # Example
//!
//! ```
//! use ringmpmc::{Config, Queue};
//!
//! let queue = Queue::<u64>::new(Config::new(16));
//!
//! queue.push(&[1, 2, 3, 4, 5]).unwrap();
//!
//! let mut out = [0u64; 5];
//! let taken = queue.pop(&mut out).unwrap();
//! assert_eq!(&out[..taken], &[1, 2, 3, 4, 5]);
//! ```

mod backoff;
mod config;
mod copy;
mod expand;
mod gate;
mod invariants;
mod metrics;
mod queue;
mod ring;

pub use backoff::Backoff;
pub use config::{
    Config, BURST_MAX, EXPANSION_FACTOR, EXPANSION_THRESHOLD, MAX_CAPACITY, MIN_CAPACITY,
    POP_TIMEOUT,
};
pub use metrics::{Metrics, MetricsSnapshot};
pub use queue::Queue;
pub use ring::{Ring, RingError, RingState};
