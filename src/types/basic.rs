/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! "Inert" types that are sent around and inspected, but have no active behavior.
//!
//! These types follow the newtype pattern, and the API for using them is defined in this module.

use borsh::{BorshDeserialize, BorshSerialize};
use std::{
    collections::{btree_map, BTreeMap},
    fmt::{self, Debug, Display, Formatter},
    ops::{Add, AddAssign, Sub},
};

/// Identifier of a replica. Replicas in a [replica set](super::replica_set::ReplicaSet) are numbered
/// from `1` to `n`.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshSerialize, BorshDeserialize,
)]
pub struct ReplicaID(u64);

impl ReplicaID {
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    pub const fn int(&self) -> u64 {
        self.0
    }
}

impl Display for ReplicaID {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Position of an entry in one author's log. The first entry of every log has sequence number `1`.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshSerialize, BorshDeserialize,
)]
pub struct SequenceNumber(u64);

impl SequenceNumber {
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    /// The sequence number that precedes every log, i.e., "nothing is stable yet".
    pub const fn init() -> Self {
        Self(0)
    }

    pub const fn int(&self) -> u64 {
        self.0
    }

    pub fn is_first(&self) -> bool {
        self.0 == 1
    }
}

impl Display for SequenceNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Add<u64> for SequenceNumber {
    type Output = SequenceNumber;

    fn add(self, rhs: u64) -> Self::Output {
        SequenceNumber(self.0.add(rhs))
    }
}

impl AddAssign<u64> for SequenceNumber {
    fn add_assign(&mut self, rhs: u64) {
        self.0.add_assign(rhs)
    }
}

impl Sub<u64> for SequenceNumber {
    type Output = SequenceNumber;

    fn sub(self, rhs: u64) -> Self::Output {
        SequenceNumber(self.0.sub(rhs))
    }
}

/// A SHA-256 digest, e.g., of a [command](super::messages::Command) payload or of a
/// [pre-order](super::messages::PreOrder) header.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, BorshSerialize, BorshDeserialize,
)]
pub struct CryptoHash([u8; 32]);

impl CryptoHash {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn bytes(&self) -> [u8; 32] {
        self.0
    }
}

impl Display for CryptoHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Debug for CryptoHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Signature represented in bytes.
#[derive(Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct SignatureBytes([u8; 64]);

impl SignatureBytes {
    pub const fn new(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    pub const fn bytes(&self) -> [u8; 64] {
        self.0
    }
}

impl Debug for SignatureBytes {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0[..8].fmt(f)
    }
}

/// Signatures over the same digest, keyed by the replica that produced them. A replica can
/// appear at most once, so the number of entries is the number of distinct signers.
#[derive(Clone, Debug, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ProofCerts(BTreeMap<ReplicaID, SignatureBytes>);

impl ProofCerts {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Record `signature` for `signer`, returning `false` if `signer` had already signed.
    pub fn insert(&mut self, signer: ReplicaID, signature: SignatureBytes) -> bool {
        match self.0.entry(signer) {
            btree_map::Entry::Vacant(entry) => {
                entry.insert(signature);
                true
            }
            btree_map::Entry::Occupied(_) => false,
        }
    }

    pub fn contains(&self, signer: &ReplicaID) -> bool {
        self.0.contains_key(signer)
    }

    pub fn get(&self, signer: &ReplicaID) -> Option<&SignatureBytes> {
        self.0.get(signer)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, ReplicaID, SignatureBytes> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(ReplicaID, SignatureBytes)> for ProofCerts {
    fn from_iter<T: IntoIterator<Item = (ReplicaID, SignatureBytes)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
