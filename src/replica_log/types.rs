/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types used by the [log verifiers](super::verifier) and their [workers](super::worker).

use crate::ordered_index::Sequenced;
use crate::types::{
    basic::SequenceNumber,
    messages::{PreOrder, QuorumCert},
};

/// An entry of the reorder buffer of a [`ReplicaLogVerifier`](super::verifier::ReplicaLogVerifier).
///
/// The buffer holds at most one event per sequence number. A `QuorumCert` event supersedes the
/// `PreOrder` event at the same sequence number, since certifying an entry is the step after voting
/// for it.
#[derive(Clone, Debug)]
pub enum OrderEvent {
    PreOrder {
        pre_order: PreOrder,
        /// Whether the local replica has already sent its vote for `pre_order`.
        voted: bool,
    },
    QuorumCert(QuorumCert),
}

impl Sequenced for OrderEvent {
    fn sequence(&self) -> SequenceNumber {
        match self {
            OrderEvent::PreOrder { pre_order, .. } => pre_order.sequence,
            OrderEvent::QuorumCert(qc) => qc.sequence(),
        }
    }
}

/// Messages consumed by a log worker, all from the same author.
#[derive(Clone, Debug)]
pub enum LogMessage {
    PreOrder(PreOrder),
    PartialOrder(QuorumCert),
}

impl From<PreOrder> for LogMessage {
    fn from(value: PreOrder) -> Self {
        LogMessage::PreOrder(value)
    }
}

impl From<QuorumCert> for LogMessage {
    fn from(value: QuorumCert) -> Self {
        LogMessage::PartialOrder(value)
    }
}
