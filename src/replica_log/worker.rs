/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The log worker thread, which owns the [`ReplicaLogVerifier`] of one remote author and feeds it
//! that author's messages one at a time.

use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::crypto::Crypto;
use crate::networking::Network;

use super::types::LogMessage;
use super::verifier::{CertificateSink, LogVerifierError, ReplicaLogVerifier};

/// How long a worker waits for a message before checking for a shutdown signal again.
const MESSAGE_POLL_INTERVAL: Duration = Duration::from_millis(10);

pub(crate) fn start_log_worker<C, N, S>(
    mut verifier: ReplicaLogVerifier<C, N, S>,
    messages: Receiver<LogMessage>,
    shutdown_signal: Receiver<()>,
) -> JoinHandle<()>
where
    C: Crypto + 'static,
    N: Network + 'static,
    S: CertificateSink + 'static,
{
    thread::spawn(move || loop {
        match shutdown_signal.try_recv() {
            Ok(()) => return,
            Err(TryRecvError::Empty) => (),
            Err(TryRecvError::Disconnected) => {
                panic!("Log worker thread disconnected from main thread")
            }
        }

        let result = match messages.recv_timeout(MESSAGE_POLL_INTERVAL) {
            Ok(LogMessage::PreOrder(pre_order)) => verifier.receive_pre_order(pre_order),
            Ok(LogMessage::PartialOrder(qc)) => verifier.receive_partial_order(qc),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return,
        };

        match result {
            Ok(()) => (),
            Err(err @ LogVerifierError::StaleEntry { .. }) => {
                log::debug!("Ignored message from {}: {:?}", verifier.author(), err)
            }
            Err(err) => log::warn!("Rejected message from {}: {:?}", verifier.author(), err),
        }
    })
}
