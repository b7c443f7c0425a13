/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! [Trait definition](Network) for pluggable peer-to-peer networking.
//!
//! Peers are reachable by their [`ReplicaID`]. The engine only ever *sends* through this trait:
//! votes are unicast to the author of the pre-order they endorse, and the local log's pre-orders,
//! commands, and quorum certificates are broadcast. Inbound messages are pushed into the engine by
//! the networking provider through [`Replica::receive`](crate::replica::Replica::receive).

use crate::types::{basic::ReplicaID, messages::Message};

pub trait Network: Clone + Send {
    /// Send a message to all peers (excluding the local replica) without blocking.
    fn broadcast(&mut self, message: Message);

    /// Send a message to the specified peer without blocking.
    fn send(&mut self, peer: ReplicaID, message: Message);
}
