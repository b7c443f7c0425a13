//! Types and traits that are used across multiple components of the sequencing engine.
//!
//! Types specific to a single component, e.g., the reorder events of a replica log verifier, can be
//! found in the "types" submodules of their components, e.g., [`crate::replica_log::types`].

pub mod basic;

pub mod messages;

pub mod replica_set;
