/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The local replica's own log.
//!
//! The [`LocalLog`] assigns the next sequence number to every command it is given and wraps the
//! command's digest in a [`PreOrder`]. It then collects the other replicas'
//! [votes](crate::types::messages::Vote) for the pre-order until a quorum of signatures (the local
//! replica's own included) forms a [`QuorumCert`].
//!
//! Certificates are chained: each one carries the digest of the pre-order generated right before it.

use std::collections::HashMap;
use std::sync::mpsc::Sender;
use std::time::SystemTime;

use crate::crypto::Crypto;
use crate::events::*;
use crate::types::{
    basic::{CryptoHash, ProofCerts, ReplicaID, SequenceNumber},
    messages::{PreOrder, QuorumCert, Vote},
};

pub struct LocalLog<C: Crypto> {
    me: ReplicaID,
    quorum: usize,

    /// Sequence number of the last generated pre-order.
    sequence: SequenceNumber,

    /// Digest of the last generated pre-order.
    last_digest: Option<CryptoHash>,

    /// Certificates being assembled, keyed by pre-order digest.
    pending: HashMap<CryptoHash, QuorumCert>,

    crypto: C,
    event_publisher: Option<Sender<Event>>,
}

impl<C: Crypto> LocalLog<C> {
    pub fn new(
        me: ReplicaID,
        quorum: usize,
        crypto: C,
        event_publisher: Option<Sender<Event>>,
    ) -> Self {
        Self {
            me,
            quorum,
            sequence: SequenceNumber::init(),
            last_digest: None,
            pending: HashMap::new(),
            crypto,
            event_publisher,
        }
    }

    /// Append `command_digest` to the log, and start collecting votes for it with the local
    /// replica's own signature.
    pub fn generate_pre_order(&mut self, command_digest: CryptoHash) -> PreOrder {
        self.sequence += 1;
        let pre_order = PreOrder::new(self.me, self.sequence, command_digest, &self.crypto);

        let mut proof_certs = ProofCerts::new();
        proof_certs.insert(self.me, self.crypto.sign(&pre_order.digest.bytes()));

        let qc = QuorumCert {
            pre_order: pre_order.clone(),
            proof_certs,
            parent_digest: self.last_digest,
        };
        self.last_digest = Some(pre_order.digest);
        self.pending.insert(pre_order.digest, qc);

        Event::GeneratePreOrder(GeneratePreOrderEvent {
            timestamp: SystemTime::now(),
            pre_order: pre_order.clone(),
        })
        .publish(&self.event_publisher);

        pre_order
    }

    /// Add `vote` to the certificate it endorses. Returns the certificate once it has gathered a
    /// quorum of signatures.
    ///
    /// Votes for unknown digests are ignored: either the pre-order was never generated, or its
    /// certificate is already complete.
    pub fn collect_vote(&mut self, vote: Vote) -> Result<Option<QuorumCert>, LocalLogError> {
        let Some(qc) = self.pending.get_mut(&vote.digest) else {
            return Ok(None);
        };

        if !vote.is_correct(&self.crypto) {
            return Err(LocalLogError::InvalidSignature {
                voter: vote.author,
                sequence: qc.sequence(),
            });
        }

        qc.proof_certs.insert(vote.author, vote.signature);
        if qc.proof_certs.len() < self.quorum {
            return Ok(None);
        }

        let qc = self.pending.remove(&vote.digest);
        if let Some(qc) = &qc {
            Event::CollectQC(CollectQCEvent {
                timestamp: SystemTime::now(),
                qc: qc.clone(),
            })
            .publish(&self.event_publisher);
        }

        Ok(qc)
    }

    pub fn me(&self) -> ReplicaID {
        self.me
    }

    /// Sequence number of the last generated pre-order.
    pub fn sequence(&self) -> SequenceNumber {
        self.sequence
    }

    /// Number of pre-orders still waiting for a quorum of votes.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// The different ways a [vote](LocalLog::collect_vote) can be rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalLogError {
    /// The vote's signature does not verify against the voter's key, or the voter is not in the
    /// replica set.
    InvalidSignature {
        voter: ReplicaID,
        sequence: SequenceNumber,
    },
}
