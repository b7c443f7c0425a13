/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions of the events emitted by the sequencing engine, for event handling and logging.
//!
//! An event for a given action indicates that the action has been completed. Events are sent over
//! an optional channel to the [event bus](crate::event_bus), which fires the user-defined handlers
//! registered on the [replica spec](crate::replica::ReplicaSpec), and the default
//! [loggers](crate::logging) if logging is enabled.
//!
//! Events fall into three groups:
//! 1. Events emitted while verifying remote logs: [`ReceivePreOrderEvent`], [`VoteEvent`],
//!    [`ReceivePartialOrderEvent`], [`AcceptPartialOrderEvent`], [`DropPartialOrderEvent`].
//! 2. Events emitted while growing the local log: [`GeneratePreOrderEvent`], [`CollectQCEvent`].
//! 3. Events emitted by the sequence pool: [`InsertQCEvent`], [`PullBatchEvent`],
//!    [`VerifyBatchEvent`], [`StabilizeQCEvent`], [`RestoreQCsEvent`], [`BecomeLeaderEvent`].

use std::sync::mpsc::Sender;
use std::time::SystemTime;

use crate::types::basic::{CryptoHash, ReplicaID, SequenceNumber};
use crate::types::messages::{PreOrder, QCBatch, QuorumCert, Vote};

pub enum Event {
    // Remote log events.
    ReceivePreOrder(ReceivePreOrderEvent),
    Vote(VoteEvent),
    ReceivePartialOrder(ReceivePartialOrderEvent),
    AcceptPartialOrder(AcceptPartialOrderEvent),
    DropPartialOrder(DropPartialOrderEvent),
    // Local log events.
    GeneratePreOrder(GeneratePreOrderEvent),
    CollectQC(CollectQCEvent),
    // Sequence pool events.
    InsertQC(InsertQCEvent),
    PullBatch(PullBatchEvent),
    VerifyBatch(VerifyBatchEvent),
    StabilizeQC(StabilizeQCEvent),
    RestoreQCs(RestoreQCsEvent),
    BecomeLeader(BecomeLeaderEvent),
}

impl Event {
    /// Send the event to the event bus, if there is one. A disconnected event bus is not an error:
    /// it only means the replica is shutting down.
    pub(crate) fn publish(self, event_publisher: &Option<Sender<Event>>) {
        if let Some(event_publisher) = event_publisher {
            let _ = event_publisher.send(self);
        }
    }
}

/// A pre-order from a remote author passed the entry checks and was buffered.
pub struct ReceivePreOrderEvent {
    pub timestamp: SystemTime,
    pub pre_order: PreOrder,
}

/// The replica voted for a pre-order and sent the vote to its author, `recipient`.
pub struct VoteEvent {
    pub timestamp: SystemTime,
    pub recipient: ReplicaID,
    pub vote: Vote,
}

/// A quorum certificate from a remote author passed signature verification and was buffered.
pub struct ReceivePartialOrderEvent {
    pub timestamp: SystemTime,
    pub qc: QuorumCert,
}

/// A quorum certificate was replayed in sequence order and forwarded to the sequence pool.
pub struct AcceptPartialOrderEvent {
    pub timestamp: SystemTime,
    pub qc: QuorumCert,
}

/// A quorum certificate was dropped because its parent digest does not match the digest of the
/// previous certified entry of the same log. This can be evidence of equivocation by its author.
pub struct DropPartialOrderEvent {
    pub timestamp: SystemTime,
    pub qc: QuorumCert,
    pub expected_parent: Option<CryptoHash>,
}

/// The replica appended a pre-order to its own log.
pub struct GeneratePreOrderEvent {
    pub timestamp: SystemTime,
    pub pre_order: PreOrder,
}

/// The replica collected a quorum of votes for one of its own pre-orders.
pub struct CollectQCEvent {
    pub timestamp: SystemTime,
    pub qc: QuorumCert,
}

/// A quorum certificate was admitted into the cached partition of its author's window.
pub struct InsertQCEvent {
    pub timestamp: SystemTime,
    pub qc: QuorumCert,
}

/// The replica assembled a batch from its windows.
pub struct PullBatchEvent {
    pub timestamp: SystemTime,
    pub batch: QCBatch,
}

/// A batch passed verification and its certificates moved to the proposed partitions.
pub struct VerifyBatchEvent {
    pub timestamp: SystemTime,
    pub batch: QCBatch,
}

/// The stable sequence number of `author`'s window advanced to `sequence`.
pub struct StabilizeQCEvent {
    pub timestamp: SystemTime,
    pub author: ReplicaID,
    pub sequence: SequenceNumber,
}

/// Proposed-but-unstable certificates were moved back to the cached partitions.
pub struct RestoreQCsEvent {
    pub timestamp: SystemTime,
    pub restored: usize,
}

/// Every window's proposal cursor was reset to just after its stable sequence number.
pub struct BecomeLeaderEvent {
    pub timestamp: SystemTime,
}
