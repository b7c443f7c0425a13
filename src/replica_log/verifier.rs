/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The [`ReplicaLogVerifier`], which replays one remote author's log in strict sequence order.
//!
//! Pre-orders and quorum certificates may arrive out of order. The verifier parks them in a reorder
//! buffer and drains the buffer whenever the entry at the next expected sequence number (the
//! "cursor") becomes available:
//! 1. A pre-order at the cursor is voted for, once. Voting does not move the cursor. Until the cursor
//!    moves, no other pre-order for the same sequence number is signed, even if the slot it was
//!    buffered in has been cleared by a dropped certificate.
//! 2. A quorum certificate at the cursor is checked against the digest of the previous certified
//!    entry. If it chains, it is [delivered](CertificateSink::deliver) and the cursor advances. If
//!    it does not, it is dropped and the cursor stays put, waiting for a certificate that does.
//!
//! Entries behind the cursor are [stale](LogVerifierError::StaleEntry).

use std::sync::mpsc::Sender;
use std::time::SystemTime;

use crate::crypto::{Crypto, ProofCertsError};
use crate::events::*;
use crate::networking::Network;
use crate::ordered_index::OrderedIndex;
use crate::types::{
    basic::{CryptoHash, ReplicaID, SequenceNumber},
    messages::{PreOrder, QuorumCert, Vote},
};

use super::types::OrderEvent;

/// Where a [`ReplicaLogVerifier`] sends the certificates it accepts, in sequence order.
pub trait CertificateSink: Send {
    fn deliver(&mut self, qc: QuorumCert);
}

impl CertificateSink for Vec<QuorumCert> {
    fn deliver(&mut self, qc: QuorumCert) {
        self.push(qc)
    }
}

pub struct ReplicaLogVerifier<C: Crypto, N: Network, S: CertificateSink> {
    me: ReplicaID,
    author: ReplicaID,
    quorum: usize,

    /// The next sequence number expected from `author`.
    sequence: SequenceNumber,

    /// Digest of the last certificate delivered to the sink.
    high_cert_digest: Option<CryptoHash>,

    /// Digest of the pre-order voted for at `sequence`, if any.
    voted_digest: Option<CryptoHash>,

    buffer: OrderedIndex<OrderEvent>,

    crypto: C,
    network: N,
    sink: S,
    event_publisher: Option<Sender<Event>>,
}

impl<C: Crypto, N: Network, S: CertificateSink> ReplicaLogVerifier<C, N, S> {
    pub fn new(
        me: ReplicaID,
        author: ReplicaID,
        quorum: usize,
        crypto: C,
        network: N,
        sink: S,
        event_publisher: Option<Sender<Event>>,
    ) -> Self {
        Self {
            me,
            author,
            quorum,
            sequence: SequenceNumber::new(1),
            high_cert_digest: None,
            voted_digest: None,
            buffer: OrderedIndex::new(),
            crypto,
            network,
            sink,
            event_publisher,
        }
    }

    pub fn receive_pre_order(&mut self, pre_order: PreOrder) -> Result<(), LogVerifierError> {
        if pre_order.author != self.author {
            return Err(LogVerifierError::WrongAuthor {
                expected: self.author,
                received: pre_order.author,
            });
        }

        if pre_order.sequence < self.sequence {
            return Err(LogVerifierError::StaleEntry {
                expected: self.sequence,
                received: pre_order.sequence,
            });
        }

        if pre_order.sequence == self.sequence {
            if let Some(voted) = self.voted_digest {
                if voted != pre_order.digest {
                    return Err(LogVerifierError::ConflictingPreOrder {
                        sequence: pre_order.sequence,
                        voted,
                    });
                }
            }
        }

        // Already voted for, or already certified.
        if self.buffer.contains_sequence(&pre_order.sequence) {
            self.drain();
            return Ok(());
        }

        if !pre_order.is_digest_correct(&self.crypto) {
            return Err(LogVerifierError::MalformedDigest {
                sequence: pre_order.sequence,
            });
        }

        Event::ReceivePreOrder(ReceivePreOrderEvent {
            timestamp: SystemTime::now(),
            pre_order: pre_order.clone(),
        })
        .publish(&self.event_publisher);

        self.buffer.insert(OrderEvent::PreOrder {
            pre_order,
            voted: false,
        });
        self.drain();

        Ok(())
    }

    pub fn receive_partial_order(&mut self, qc: QuorumCert) -> Result<(), LogVerifierError> {
        if qc.author() != self.author {
            return Err(LogVerifierError::WrongAuthor {
                expected: self.author,
                received: qc.author(),
            });
        }

        self.crypto
            .verify_proof_certs(&qc.digest().bytes(), &qc.proof_certs, self.quorum)?;

        if !qc.pre_order.is_digest_correct(&self.crypto) {
            return Err(LogVerifierError::MalformedDigest {
                sequence: qc.sequence(),
            });
        }

        if qc.sequence() < self.sequence {
            return Err(LogVerifierError::StaleEntry {
                expected: self.sequence,
                received: qc.sequence(),
            });
        }

        Event::ReceivePartialOrder(ReceivePartialOrderEvent {
            timestamp: SystemTime::now(),
            qc: qc.clone(),
        })
        .publish(&self.event_publisher);

        self.buffer.insert(OrderEvent::QuorumCert(qc));
        self.drain();

        Ok(())
    }

    /// Process buffered events at the cursor until the cursor's event is missing, or is a pre-order.
    fn drain(&mut self) {
        loop {
            let sequence = self.sequence;

            match self.buffer.get_mut(&sequence) {
                None | Some(OrderEvent::PreOrder { voted: true, .. }) => return,
                Some(OrderEvent::PreOrder { pre_order, voted }) => {
                    *voted = true;
                    if self.voted_digest.is_none() {
                        let pre_order = pre_order.clone();
                        self.vote(&pre_order);
                    }
                    return;
                }
                Some(OrderEvent::QuorumCert(_)) => (),
            }

            if let Some(OrderEvent::QuorumCert(qc)) = self.buffer.remove_sequence(&sequence) {
                self.resolve(qc);
            }
        }
    }

    fn vote(&mut self, pre_order: &PreOrder) {
        let vote = Vote {
            author: self.me,
            digest: pre_order.digest,
            signature: self.crypto.sign(&pre_order.digest.bytes()),
        };

        self.voted_digest = Some(pre_order.digest);
        self.network.send(pre_order.author, vote.clone().into());

        Event::Vote(VoteEvent {
            timestamp: SystemTime::now(),
            recipient: pre_order.author,
            vote,
        })
        .publish(&self.event_publisher);
    }

    /// Deliver `qc` if it extends the chain of certified entries, or drop it if it does not.
    fn resolve(&mut self, qc: QuorumCert) {
        let chained = qc.sequence().is_first() || qc.parent_digest == self.high_cert_digest;
        if !chained {
            Event::DropPartialOrder(DropPartialOrderEvent {
                timestamp: SystemTime::now(),
                qc,
                expected_parent: self.high_cert_digest,
            })
            .publish(&self.event_publisher);
            return;
        }

        self.high_cert_digest = Some(qc.digest());
        self.voted_digest = None;
        self.sequence += 1;

        Event::AcceptPartialOrder(AcceptPartialOrderEvent {
            timestamp: SystemTime::now(),
            qc: qc.clone(),
        })
        .publish(&self.event_publisher);

        self.sink.deliver(qc);
    }

    pub fn author(&self) -> ReplicaID {
        self.author
    }

    /// The next sequence number expected from the author.
    pub fn sequence(&self) -> SequenceNumber {
        self.sequence
    }

    pub fn high_cert_digest(&self) -> Option<CryptoHash> {
        self.high_cert_digest
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

/// The different ways a message can be rejected by a [`ReplicaLogVerifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogVerifierError {
    /// The message belongs to another author's log.
    WrongAuthor {
        expected: ReplicaID,
        received: ReplicaID,
    },

    /// The entry is behind the cursor, so it has already been resolved.
    StaleEntry {
        expected: SequenceNumber,
        received: SequenceNumber,
    },

    /// The pre-order digest is not the hash of its header.
    MalformedDigest { sequence: SequenceNumber },

    /// A different pre-order was already voted for at this sequence number.
    ConflictingPreOrder {
        sequence: SequenceNumber,
        voted: CryptoHash,
    },

    InvalidCertificate(ProofCertsError),
}

impl From<ProofCertsError> for LogVerifierError {
    fn from(value: ProofCertsError) -> Self {
        LogVerifierError::InvalidCertificate(value)
    }
}
