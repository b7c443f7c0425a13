/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! A container that keeps items of a single author's log sorted by [`SequenceNumber`].
//!
//! Every place that needs to walk one log in strict ascending order uses an [`OrderedIndex`]: the
//! reorder buffer of a [replica log verifier](crate::replica_log::verifier), and the cached and
//! proposed partitions of a [QC window](crate::sequence_pool::qc_window). Because each index only
//! ever holds entries of one author, the sequence number alone is a unique key.
//!
//! The index has no interior locking. It is `Send + Sync` whenever its items are, and its owners
//! serialize access to it (a single worker thread, or the sequence pool's mutex).

use std::collections::{btree_map, BTreeMap};

use crate::types::basic::SequenceNumber;

/// Implemented by the items that can be stored in an [`OrderedIndex`].
pub trait Sequenced {
    fn sequence(&self) -> SequenceNumber;
}

/// Items sorted by their sequence number, with at most one item per sequence number.
#[derive(Clone, Debug)]
pub struct OrderedIndex<T: Sequenced> {
    items: BTreeMap<SequenceNumber, T>,
}

impl<T: Sequenced> OrderedIndex<T> {
    pub fn new() -> Self {
        Self {
            items: BTreeMap::new(),
        }
    }

    /// Insert `item`, returning the item it replaced at the same sequence number, if any.
    pub fn insert(&mut self, item: T) -> Option<T> {
        self.items.insert(item.sequence(), item)
    }

    /// Whether an item with the same sequence number as `item` is in the index.
    pub fn contains(&self, item: &T) -> bool {
        self.items.contains_key(&item.sequence())
    }

    pub fn contains_sequence(&self, sequence: &SequenceNumber) -> bool {
        self.items.contains_key(sequence)
    }

    pub fn get(&self, sequence: &SequenceNumber) -> Option<&T> {
        self.items.get(sequence)
    }

    pub fn get_mut(&mut self, sequence: &SequenceNumber) -> Option<&mut T> {
        self.items.get_mut(sequence)
    }

    /// The item with the lowest sequence number.
    pub fn peek_min(&self) -> Option<&T> {
        self.items.first_key_value().map(|(_, item)| item)
    }

    /// Remove and return the item with the lowest sequence number.
    pub fn pop_min(&mut self) -> Option<T> {
        self.items.pop_first().map(|(_, item)| item)
    }

    /// Remove the item with the same sequence number as `item`.
    pub fn remove(&mut self, item: &T) -> Option<T> {
        self.items.remove(&item.sequence())
    }

    pub fn remove_sequence(&mut self, sequence: &SequenceNumber) -> Option<T> {
        self.items.remove(sequence)
    }

    /// Remove every item whose sequence number is at most `sequence`, returning them in ascending
    /// order.
    pub fn remove_up_to(&mut self, sequence: SequenceNumber) -> Vec<T> {
        let retained = self.items.split_off(&(sequence + 1));
        let removed = std::mem::replace(&mut self.items, retained);
        removed.into_values().collect()
    }

    /// Remove every item, returning them in ascending order.
    pub fn drain(&mut self) -> Vec<T> {
        std::mem::take(&mut self.items).into_values().collect()
    }

    pub fn iter(&self) -> btree_map::Values<'_, SequenceNumber, T> {
        self.items.values()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T: Sequenced> Default for OrderedIndex<T> {
    fn default() -> Self {
        Self::new()
    }
}
