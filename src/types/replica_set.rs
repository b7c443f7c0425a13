/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The fixed set of replicas that own logs and sign each other's pre-orders.
//!
//! Every replica in the set is an *author*: it runs its own log, and every other replica verifies
//! that log. The size of the set, `n`, determines the fault tolerance `f = ⌊(n − 1) / 3⌋` and the
//! quorum `n − f` that every certificate and every batch filter must reach.

use std::collections::{btree_map, BTreeMap};

use ed25519_dalek::VerifyingKey;

use super::basic::ReplicaID;

/// Identities of the replicas participating in sequencing, keyed by [`ReplicaID`].
#[derive(Clone, PartialEq, Eq)]
pub struct ReplicaSet {
    replicas: BTreeMap<ReplicaID, VerifyingKey>,
}

impl ReplicaSet {
    /// Create an empty replica set.
    pub fn new() -> Self {
        Self {
            replicas: BTreeMap::new(),
        }
    }

    /// Create a replica set in which the `i`-th verifying key (counting from zero) belongs to
    /// the replica with ID `i + 1`.
    pub fn from_verifying_keys(verifying_keys: impl IntoIterator<Item = VerifyingKey>) -> Self {
        Self {
            replicas: verifying_keys
                .into_iter()
                .enumerate()
                .map(|(i, key)| (ReplicaID::new(i as u64 + 1), key))
                .collect(),
        }
    }

    /// Add or replace the verifying key of `replica`.
    pub fn put(&mut self, replica: ReplicaID, verifying_key: VerifyingKey) {
        self.replicas.insert(replica, verifying_key);
    }

    pub fn contains(&self, replica: &ReplicaID) -> bool {
        self.replicas.contains_key(replica)
    }

    pub fn verifying_key(&self, replica: &ReplicaID) -> Option<&VerifyingKey> {
        self.replicas.get(replica)
    }

    /// Get the ID that belongs to `verifying_key`, if it is in the set.
    pub fn position(&self, verifying_key: &VerifyingKey) -> Option<ReplicaID> {
        self.replicas
            .iter()
            .find(|(_, key)| *key == verifying_key)
            .map(|(replica, _)| *replica)
    }

    pub fn replicas(&self) -> btree_map::Keys<'_, ReplicaID, VerifyingKey> {
        self.replicas.keys()
    }

    pub fn len(&self) -> usize {
        self.replicas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replicas.is_empty()
    }

    /// The number of Byzantine replicas the set tolerates.
    pub fn fault_tolerance(&self) -> usize {
        fault_tolerance(self.len())
    }

    /// The minimum number of distinct signers, or distinct authors, that forms a quorum.
    pub fn quorum(&self) -> usize {
        quorum(self.len())
    }
}

impl Default for ReplicaSet {
    fn default() -> Self {
        Self::new()
    }
}

/// `f = ⌊(n − 1) / 3⌋`.
pub fn fault_tolerance(n: usize) -> usize {
    n.saturating_sub(1) / 3
}

/// `n − f`.
pub fn quorum(n: usize) -> usize {
    n - fault_tolerance(n)
}
