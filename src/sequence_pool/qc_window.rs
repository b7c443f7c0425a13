/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The admission window over one author's certified log entries.
//!
//! A [`QCWindow`] splits the certificates of its author into:
//! 1. **Cached**: received from the author's [log verifier](crate::replica_log::verifier), not yet
//!    included in any proposal this replica has seen.
//! 2. **Proposed**: included in a verified batch that has not been committed yet.
//! 3. **Stable**: everything at or below `stable_no`. Stable certificates are discarded.
//!
//! Certificates that were [pulled](QCWindow::pull) into a local proposal attempt are held by the
//! caller and sit in neither partition until they are either [pushed back](QCWindow::back) or the
//! proposal is verified.
//!
//! ## Proposal cursor
//!
//! `seq_no` is the next sequence number this replica may pull. It only moves forward on a
//! successful pull, moves back when certificates are pushed back, and is reset to
//! `stable_no + 1` when the replica [becomes a leader](QCWindow::become_leader).

use std::collections::HashSet;

use crate::crypto::{Crypto, ProofCertsError};
use crate::ordered_index::OrderedIndex;
use crate::types::{
    basic::{ReplicaID, SequenceNumber},
    messages::QuorumCert,
};

pub struct QCWindow {
    /// The author whose log this window tracks.
    author: ReplicaID,

    /// The local replica.
    me: ReplicaID,

    quorum: usize,

    /// Highest sequence number committed through a stable batch.
    stable_no: SequenceNumber,

    /// Next sequence number to pull into a local proposal.
    seq_no: SequenceNumber,

    /// Sequence numbers of the certificates currently in `proposed`.
    proposed_no: HashSet<SequenceNumber>,

    cached: OrderedIndex<QuorumCert>,

    proposed: OrderedIndex<QuorumCert>,
}

impl QCWindow {
    pub fn new(author: ReplicaID, me: ReplicaID, quorum: usize) -> Self {
        Self {
            author,
            me,
            quorum,
            stable_no: SequenceNumber::init(),
            seq_no: SequenceNumber::new(1),
            proposed_no: HashSet::new(),
            cached: OrderedIndex::new(),
            proposed: OrderedIndex::new(),
        }
    }

    /// Cache a certificate received from this window's author. The certificate must be above the
    /// stable sequence number and must not have been proposed already.
    pub fn insert(&mut self, qc: QuorumCert) -> Result<(), QCWindowError> {
        if qc.sequence() <= self.stable_no {
            return Err(QCWindowError::Expired {
                stable: self.stable_no,
                received: qc.sequence(),
            });
        }

        if self.proposed_no.contains(&qc.sequence()) {
            return Err(QCWindowError::AlreadyProposed {
                sequence: qc.sequence(),
            });
        }

        self.cached.insert(qc);
        Ok(())
    }

    /// Take the lowest cached certificate if it is exactly the one the proposal cursor expects, and
    /// advance the cursor. Otherwise, leave the cache untouched and return `None`.
    pub fn pull(&mut self) -> Option<QuorumCert> {
        let min_qc = self.cached.pop_min()?;

        if min_qc.sequence() != self.seq_no {
            self.cached.insert(min_qc);
            return None;
        }

        self.seq_no += 1;
        Some(min_qc)
    }

    /// Return a pulled certificate to the cache, rewinding the proposal cursor to it if the cursor
    /// has already moved past it.
    pub fn back(&mut self, qc: QuorumCert) {
        if qc.sequence() < self.seq_no {
            self.seq_no = qc.sequence();
        }

        self.cached.insert(qc);
    }

    /// Check `qc`, found in a batch proposed by `proposer`, and record it as proposed.
    ///
    /// Certificates at or below the stable sequence number are always rejected. Otherwise,
    /// certificates in batches proposed by the local replica were checked when they were created or
    /// received, so they are recorded without further checks.
    pub fn verify(
        &mut self,
        proposer: ReplicaID,
        qc: &QuorumCert,
        crypto: &impl Crypto,
    ) -> Result<(), QCWindowError> {
        self.check(proposer, qc, crypto)?;
        self.mark_proposed(qc.clone());
        Ok(())
    }

    /// The read-only half of [`verify`](Self::verify).
    pub(crate) fn check(
        &self,
        proposer: ReplicaID,
        qc: &QuorumCert,
        crypto: &impl Crypto,
    ) -> Result<(), QCWindowError> {
        if qc.sequence() <= self.stable_no {
            return Err(QCWindowError::Expired {
                stable: self.stable_no,
                received: qc.sequence(),
            });
        }

        if proposer == self.me {
            return Ok(());
        }

        if self.proposed_no.contains(&qc.sequence()) {
            return Err(QCWindowError::AlreadyProposed {
                sequence: qc.sequence(),
            });
        }

        // The proof-certs sign the digest, so the digest must bind the header it travels with.
        if !qc.pre_order.is_digest_correct(crypto) {
            return Err(QCWindowError::MalformedDigest {
                sequence: qc.sequence(),
            });
        }

        crypto
            .verify_proof_certs(&qc.digest().bytes(), &qc.proof_certs, self.quorum)
            .map_err(|err| QCWindowError::InvalidCertificate {
                sequence: qc.sequence(),
                cause: err,
            })
    }

    /// The mutating half of [`verify`](Self::verify): move `qc` from cached to proposed.
    pub(crate) fn mark_proposed(&mut self, qc: QuorumCert) {
        self.cached.remove(&qc);
        self.proposed_no.insert(qc.sequence());
        self.proposed.insert(qc);
    }

    /// Advance the stable sequence number to `qc`'s, which must be exactly one above the current
    /// one, and discard every certificate at or below it.
    pub fn set_stable(&mut self, qc: &QuorumCert) -> Result<(), QCWindowError> {
        if qc.sequence() != self.stable_no + 1 {
            return Err(QCWindowError::OutOfOrder {
                expected: self.stable_no + 1,
                received: qc.sequence(),
            });
        }

        self.stable_no = qc.sequence();

        self.cached.remove_up_to(self.stable_no);
        for expired in self.proposed.remove_up_to(self.stable_no) {
            self.proposed_no.remove(&expired.sequence());
        }

        Ok(())
    }

    /// Reset the proposal cursor to the first unstable sequence number.
    pub fn become_leader(&mut self) {
        self.seq_no = self.stable_no + 1;
    }

    /// Move every proposed certificate above the stable sequence number back into the cache so that
    /// it can be proposed again, and return the certificates that were moved.
    pub fn restore_qcs(&mut self) -> Vec<QuorumCert> {
        let mut restored = Vec::new();

        for qc in self.proposed.drain() {
            self.proposed_no.remove(&qc.sequence());

            // Certificates at or below the stable sequence number are already committed.
            if qc.sequence() <= self.stable_no {
                continue;
            }

            self.cached.insert(qc.clone());
            restored.push(qc);
        }

        restored
    }

    pub fn author(&self) -> ReplicaID {
        self.author
    }

    pub fn stable_no(&self) -> SequenceNumber {
        self.stable_no
    }

    pub fn seq_no(&self) -> SequenceNumber {
        self.seq_no
    }

    pub fn is_cached(&self, sequence: &SequenceNumber) -> bool {
        self.cached.contains_sequence(sequence)
    }

    pub fn is_proposed(&self, sequence: &SequenceNumber) -> bool {
        self.proposed_no.contains(sequence)
    }

    pub fn cached_len(&self) -> usize {
        self.cached.len()
    }

    pub fn proposed_len(&self) -> usize {
        self.proposed.len()
    }
}

/// The different ways a call to a method of [`QCWindow`] can fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QCWindowError {
    /// The certificate is at or below the stable sequence number.
    Expired {
        stable: SequenceNumber,
        received: SequenceNumber,
    },

    /// A certificate with the same sequence number has already been proposed.
    AlreadyProposed { sequence: SequenceNumber },

    /// The pre-order digest is not the hash of its header.
    MalformedDigest { sequence: SequenceNumber },

    /// The certificate's proof-certs do not form a valid quorum.
    InvalidCertificate {
        sequence: SequenceNumber,
        cause: ProofCertsError,
    },

    /// Stabilization was attempted out of sequence.
    OutOfOrder {
        expected: SequenceNumber,
        received: SequenceNumber,
    },
}
