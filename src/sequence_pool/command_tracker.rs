/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Counts, per command digest, how many proposed quorum certificates reference the command.
//!
//! The same command may be ordered by several authors. Once a quorum of proposed certificates
//! references it, the command is known to be certified by enough logs, and the
//! [sequence pool](super::pool::SequencePool) stops re-checking further certificates that reference
//! it. This only saves work: a pool that never consulted the tracker would behave identically.

use std::collections::{hash_map, HashMap};

use crate::types::basic::CryptoHash;

pub struct CommandTracker {
    quorum: usize,
    proposed: HashMap<CryptoHash, usize>,
}

impl CommandTracker {
    pub fn new(quorum: usize) -> Self {
        Self {
            quorum,
            proposed: HashMap::new(),
        }
    }

    pub fn add(&mut self, command_digest: CryptoHash) {
        *self.proposed.entry(command_digest).or_insert(0) += 1;
    }

    /// Decrement the counter of `command_digest`, forgetting it once it reaches zero.
    pub fn del(&mut self, command_digest: CryptoHash) {
        if let hash_map::Entry::Occupied(mut entry) = self.proposed.entry(command_digest) {
            *entry.get_mut() -= 1;
            if *entry.get() == 0 {
                entry.remove();
            }
        }
    }

    pub fn count(&self, command_digest: &CryptoHash) -> usize {
        self.proposed.get(command_digest).copied().unwrap_or(0)
    }

    pub fn is_quorum(&self, command_digest: &CryptoHash) -> bool {
        self.count(command_digest) >= self.quorum
    }

    pub fn non_quorum(&self, command_digest: &CryptoHash) -> bool {
        !self.is_quorum(command_digest)
    }
}
