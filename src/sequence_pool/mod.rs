/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The aggregator that turns the certified entries of many per-replica logs into cross-author
//! batches for global commitment.
//!
//! ## Components
//!
//! - [`QCWindow`](qc_window::QCWindow): tracks the cached, proposed, and stable certificates of one
//!   author.
//! - [`CommandTracker`](command_tracker::CommandTracker): counts how many proposed certificates
//!   reference each command.
//! - [`SequencePool`](pool::SequencePool): owns a window per author, the tracker, and the command
//!   cache, and exposes the batch operations.
//!
//! ## Quorum
//!
//! With `n` replicas and `f = (n - 1) / 3` (rounded down) of them possibly faulty, a quorum is
//! `n - f`. A batch filter is only valid with certificates from at least a quorum of authors, and
//! a command is considered certified once a quorum of proposed certificates reference it.

pub mod command_tracker;

pub mod pool;

pub mod qc_window;

pub use pool::{SequencePool, SequencePoolError};
