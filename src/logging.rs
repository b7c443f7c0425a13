/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Default handlers that print [events](crate::events) through the [log](https://docs.rs/log/latest/log/)
//! facade.
//!
//! These handlers are registered on the event bus when
//! [`Configuration::log_events`](crate::replica::Configuration) is set. Nothing is printed unless the
//! application installs a
//! [logger implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
//!
//! Events about remote logs that the replica merely buffered are printed at the `debug` level.
//! Certificates dropped for breaking their log's chain are printed at the `warn` level. Everything
//! else is printed at the `info` level.
//!
//! ## Line format
//!
//! Every line is a list of comma separated values that starts with the event name (one of the
//! constants below) and the number of seconds since the Unix Epoch at which the event was emitted.
//! An [AcceptPartialOrder](crate::events::AcceptPartialOrderEvent), for example, is printed as:
//!
//! ```text
//! AcceptPartialOrder, 1701329264, 2, 17, fNGCJyk, 3
//! ```
//!
//! where the remaining values are the log's author, the entry's sequence number, the first seven
//! Base64 characters of the pre-order digest, and the number of signatures in the certificate.

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use std::time::SystemTime;

use crate::events::*;
use crate::types::{basic::CryptoHash, messages::QCBatch};

// Event names, as printed.
pub const RECEIVE_PRE_ORDER: &str = "ReceivePreOrder";
pub const VOTE: &str = "Vote";
pub const RECEIVE_PARTIAL_ORDER: &str = "ReceivePartialOrder";
pub const ACCEPT_PARTIAL_ORDER: &str = "AcceptPartialOrder";
pub const DROP_PARTIAL_ORDER: &str = "DropPartialOrder";

pub const GENERATE_PRE_ORDER: &str = "GeneratePreOrder";
pub const COLLECT_QC: &str = "CollectQC";

pub const INSERT_QC: &str = "InsertQC";
pub const PULL_BATCH: &str = "PullBatch";
pub const VERIFY_BATCH: &str = "VerifyBatch";
pub const STABILIZE_QC: &str = "StabilizeQC";
pub const RESTORE_QCS: &str = "RestoreQCs";
pub const BECOME_LEADER: &str = "BecomeLeader";

/// Implemented by event types. Used to get a closure that logs the event.
pub(crate) trait Logger {
    /// Returns a pointer to the default logging handler for a given event type.
    fn get_logger() -> Box<dyn Fn(&Self) + Send>;
}

impl Logger for ReceivePreOrderEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |receive_pre_order_event: &ReceivePreOrderEvent| {
            log::debug!(
                "{}, {}, {}, {}, {}",
                RECEIVE_PRE_ORDER,
                secs_since_unix_epoch(receive_pre_order_event.timestamp),
                receive_pre_order_event.pre_order.author,
                receive_pre_order_event.pre_order.sequence,
                first_seven_base64_chars(&receive_pre_order_event.pre_order.digest.bytes())
            )
        };
        Box::new(logger)
    }
}

impl Logger for VoteEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |vote_event: &VoteEvent| {
            log::debug!(
                "{}, {}, {}, {}",
                VOTE,
                secs_since_unix_epoch(vote_event.timestamp),
                vote_event.recipient,
                first_seven_base64_chars(&vote_event.vote.digest.bytes())
            )
        };
        Box::new(logger)
    }
}

impl Logger for ReceivePartialOrderEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |receive_partial_order_event: &ReceivePartialOrderEvent| {
            log::debug!(
                "{}, {}, {}, {}, {}",
                RECEIVE_PARTIAL_ORDER,
                secs_since_unix_epoch(receive_partial_order_event.timestamp),
                receive_partial_order_event.qc.author(),
                receive_partial_order_event.qc.sequence(),
                first_seven_base64_chars(&receive_partial_order_event.qc.digest().bytes())
            )
        };
        Box::new(logger)
    }
}

impl Logger for AcceptPartialOrderEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |accept_partial_order_event: &AcceptPartialOrderEvent| {
            log::info!(
                "{}, {}, {}, {}, {}, {}",
                ACCEPT_PARTIAL_ORDER,
                secs_since_unix_epoch(accept_partial_order_event.timestamp),
                accept_partial_order_event.qc.author(),
                accept_partial_order_event.qc.sequence(),
                first_seven_base64_chars(&accept_partial_order_event.qc.digest().bytes()),
                accept_partial_order_event.qc.proof_certs.len()
            )
        };
        Box::new(logger)
    }
}

impl Logger for DropPartialOrderEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |drop_partial_order_event: &DropPartialOrderEvent| {
            log::warn!(
                "{}, {}, {}, {}, {}, {}",
                DROP_PARTIAL_ORDER,
                secs_since_unix_epoch(drop_partial_order_event.timestamp),
                drop_partial_order_event.qc.author(),
                drop_partial_order_event.qc.sequence(),
                optional_digest(&drop_partial_order_event.qc.parent_digest),
                optional_digest(&drop_partial_order_event.expected_parent)
            )
        };
        Box::new(logger)
    }
}

impl Logger for GeneratePreOrderEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |generate_pre_order_event: &GeneratePreOrderEvent| {
            log::info!(
                "{}, {}, {}, {}",
                GENERATE_PRE_ORDER,
                secs_since_unix_epoch(generate_pre_order_event.timestamp),
                generate_pre_order_event.pre_order.sequence,
                first_seven_base64_chars(&generate_pre_order_event.pre_order.command_digest.bytes())
            )
        };
        Box::new(logger)
    }
}

impl Logger for CollectQCEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |collect_qc_event: &CollectQCEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                COLLECT_QC,
                secs_since_unix_epoch(collect_qc_event.timestamp),
                collect_qc_event.qc.sequence(),
                first_seven_base64_chars(&collect_qc_event.qc.digest().bytes()),
                collect_qc_event.qc.proof_certs.len()
            )
        };
        Box::new(logger)
    }
}

impl Logger for InsertQCEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |insert_qc_event: &InsertQCEvent| {
            log::debug!(
                "{}, {}, {}, {}",
                INSERT_QC,
                secs_since_unix_epoch(insert_qc_event.timestamp),
                insert_qc_event.qc.author(),
                insert_qc_event.qc.sequence()
            )
        };
        Box::new(logger)
    }
}

impl Logger for PullBatchEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |pull_batch_event: &PullBatchEvent| {
            log::info!(
                "{}, {}, {}",
                PULL_BATCH,
                secs_since_unix_epoch(pull_batch_event.timestamp),
                batch_info(&pull_batch_event.batch)
            )
        };
        Box::new(logger)
    }
}

impl Logger for VerifyBatchEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |verify_batch_event: &VerifyBatchEvent| {
            log::info!(
                "{}, {}, {}",
                VERIFY_BATCH,
                secs_since_unix_epoch(verify_batch_event.timestamp),
                batch_info(&verify_batch_event.batch)
            )
        };
        Box::new(logger)
    }
}

impl Logger for StabilizeQCEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |stabilize_qc_event: &StabilizeQCEvent| {
            log::info!(
                "{}, {}, {}, {}",
                STABILIZE_QC,
                secs_since_unix_epoch(stabilize_qc_event.timestamp),
                stabilize_qc_event.author,
                stabilize_qc_event.sequence
            )
        };
        Box::new(logger)
    }
}

impl Logger for RestoreQCsEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |restore_qcs_event: &RestoreQCsEvent| {
            log::info!(
                "{}, {}, {}",
                RESTORE_QCS,
                secs_since_unix_epoch(restore_qcs_event.timestamp),
                restore_qcs_event.restored
            )
        };
        Box::new(logger)
    }
}

impl Logger for BecomeLeaderEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |become_leader_event: &BecomeLeaderEvent| {
            log::info!(
                "{}, {}",
                BECOME_LEADER,
                secs_since_unix_epoch(become_leader_event.timestamp)
            )
        };
        Box::new(logger)
    }
}

/// Abbreviate a digest to the first seven characters of its Base64 encoding.
fn first_seven_base64_chars(bytes: &[u8]) -> String {
    let encoded = STANDARD_NO_PAD.encode(bytes);
    if encoded.len() > 7 {
        encoded[0..7].to_string()
    } else {
        encoded
    }
}

fn optional_digest(digest: &Option<CryptoHash>) -> String {
    match digest {
        Some(digest) => first_seven_base64_chars(&digest.bytes()),
        None => String::from("None"),
    }
}

fn secs_since_unix_epoch(timestamp: SystemTime) -> u64 {
    timestamp
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|since_epoch| since_epoch.as_secs())
        .unwrap_or(0)
}

fn batch_info(batch: &QCBatch) -> String {
    format!(
        "proposer: {}, no. of filters: {}, no. of qcs: {}, no. of commands: {}",
        batch.author,
        batch.filters.len(),
        batch.qc_count(),
        batch.commands.len()
    )
}
