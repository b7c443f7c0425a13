/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types that replicas exchange to build, certify, and aggregate their logs.
//!
//! The wire-encodings of these types (Borsh) are part of the protocol: every implementation that
//! wishes to exchange [`Message`]s with this crate needs to encode them in the exact same way.
//!
//! The life of a log entry goes:
//! 1. An author wraps a [`Command`] digest in a [`PreOrder`] and broadcasts it.
//! 2. Every replica answers with a [`Vote`], a signature over the pre-order's digest.
//! 3. Once the author holds a quorum of votes it broadcasts a [`QuorumCert`].
//! 4. Some replica bundles quorum certificates from a quorum of authors into a [`QCBatch`].

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};

use crate::crypto::Crypto;
use crate::ordered_index::Sequenced;

use super::basic::{CryptoHash, ProofCerts, ReplicaID, SequenceNumber, SignatureBytes};

/// A client command. Only its digest travels inside the logs; the payload travels alongside in
/// [`QCBatch::commands`].
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Command {
    pub payload: Vec<u8>,
    pub digest: CryptoHash,
}

impl Command {
    pub fn new(payload: Vec<u8>, crypto: &impl Crypto) -> Self {
        let digest = crypto.hash(&payload);
        Self { payload, digest }
    }

    pub fn is_digest_correct(&self, crypto: &impl Crypto) -> bool {
        crypto.hash(&self.payload) == self.digest
    }
}

/// An unsigned claim by `author` that `command_digest` occupies position `sequence` in its log.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct PreOrder {
    pub author: ReplicaID,
    pub sequence: SequenceNumber,
    pub command_digest: CryptoHash,
    /// Hash of `(author, sequence, command_digest)`. Votes are signatures over these bytes.
    pub digest: CryptoHash,
}

impl PreOrder {
    pub fn new(
        author: ReplicaID,
        sequence: SequenceNumber,
        command_digest: CryptoHash,
        crypto: &impl Crypto,
    ) -> Self {
        let digest = crypto.hash(&Self::header_bytes(author, sequence, command_digest));
        Self {
            author,
            sequence,
            command_digest,
            digest,
        }
    }

    /// Check that `digest` is really the hash of the other three fields.
    pub fn is_digest_correct(&self, crypto: &impl Crypto) -> bool {
        crypto.hash(&Self::header_bytes(
            self.author,
            self.sequence,
            self.command_digest,
        )) == self.digest
    }

    fn header_bytes(
        author: ReplicaID,
        sequence: SequenceNumber,
        command_digest: CryptoHash,
    ) -> Vec<u8> {
        (author, sequence, command_digest).try_to_vec().unwrap()
    }
}

/// A single signature by `author` over a pre-order's `digest`.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Vote {
    pub author: ReplicaID,
    pub digest: CryptoHash,
    pub signature: SignatureBytes,
}

impl Vote {
    pub fn is_correct(&self, crypto: &impl Crypto) -> bool {
        crypto.verify(self.author, &self.digest.bytes(), &self.signature)
    }
}

/// A [`PreOrder`] plus signatures from a quorum of distinct replicas, chained to the certified entry
/// right before it in the same author's log. Also called a "partial order".
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct QuorumCert {
    pub pre_order: PreOrder,
    pub proof_certs: ProofCerts,
    /// Digest of the certified entry at `sequence - 1`. `None` for the first entry of a log.
    pub parent_digest: Option<CryptoHash>,
}

impl QuorumCert {
    pub fn author(&self) -> ReplicaID {
        self.pre_order.author
    }

    pub fn sequence(&self) -> SequenceNumber {
        self.pre_order.sequence
    }

    pub fn digest(&self) -> CryptoHash {
        self.pre_order.digest
    }

    pub fn command_digest(&self) -> CryptoHash {
        self.pre_order.command_digest
    }

    /// Check that `proof_certs` holds at least `quorum` valid signatures over the pre-order digest.
    pub fn is_correct(&self, crypto: &impl Crypto, quorum: usize) -> bool {
        crypto
            .verify_proof_certs(&self.digest().bytes(), &self.proof_certs, quorum)
            .is_ok()
    }
}

impl Sequenced for QuorumCert {
    fn sequence(&self) -> SequenceNumber {
        self.pre_order.sequence
    }
}

/// A set of quorum certificates that is valid only if it contains at least a quorum of them.
#[derive(Clone, Debug, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct QCFilter {
    pub qcs: Vec<QuorumCert>,
}

/// A cross-author bundle of quorum certificates and the commands they reference, proposed by
/// `author` for global commitment.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct QCBatch {
    pub author: ReplicaID,
    pub filters: Vec<QCFilter>,
    pub commands: BTreeMap<CryptoHash, Command>,
}

impl QCBatch {
    pub fn new(author: ReplicaID) -> Self {
        Self {
            author,
            filters: Vec::new(),
            commands: BTreeMap::new(),
        }
    }

    /// Iterate over every quorum certificate in the batch, filter by filter.
    pub fn qcs(&self) -> impl Iterator<Item = &QuorumCert> {
        self.filters.iter().flat_map(|filter| filter.qcs.iter())
    }

    pub fn qc_count(&self) -> usize {
        self.filters.iter().map(|filter| filter.qcs.len()).sum()
    }
}

/// Every message this crate sends through, or expects to receive from, a [`Network`](crate::networking::Network).
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum Message {
    Command(Command),
    PreOrder(PreOrder),
    Vote(Vote),
    PartialOrder(QuorumCert),
    Batch(QCBatch),
}

impl From<Command> for Message {
    fn from(value: Command) -> Self {
        Message::Command(value)
    }
}

impl From<PreOrder> for Message {
    fn from(value: PreOrder) -> Self {
        Message::PreOrder(value)
    }
}

impl From<Vote> for Message {
    fn from(value: Vote) -> Self {
        Message::Vote(value)
    }
}

impl From<QuorumCert> for Message {
    fn from(value: QuorumCert) -> Self {
        Message::PartialOrder(value)
    }
}

impl From<QCBatch> for Message {
    fn from(value: QCBatch) -> Self {
        Message::Batch(value)
    }
}
