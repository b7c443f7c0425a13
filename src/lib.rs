/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! A multi-log sequencing engine for Byzantine fault tolerant state machine replication.
//!
//! Every replica runs its own append-only log of client commands. Other replicas vote on each entry,
//! and a quorum of votes turns the entry into a [quorum certificate](types::messages::QuorumCert).
//! The certified entries of all logs are then aggregated into [batches](types::messages::QCBatch)
//! which a global-ordering protocol, running on top of this crate, commits.
//!
//! See [`replica`] to get started.

pub mod crypto;

pub(crate) mod event_bus;

pub mod events;

pub mod local_log;

pub mod logging;

pub mod networking;

pub mod ordered_index;

pub mod replica;

pub mod replica_log;

pub mod sequence_pool;

pub mod types;
