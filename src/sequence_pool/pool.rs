/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The [`SequencePool`]: one [`QCWindow`] per author, plus the command cache and the
//! [`CommandTracker`] shared by all of them.
//!
//! The pool is driven by the layer above it (the global-ordering protocol):
//! 1. Certificates flow in from the log verifiers through [`insert_quorum_cert`](SequencePool::insert_quorum_cert).
//! 2. A leader assembles a proposal with [`pull_batch`](SequencePool::pull_batch).
//! 3. Every replica, the leader included, checks the proposal with
//!    [`verify_batch`](SequencePool::verify_batch).
//! 4. Once the proposal is committed, every replica calls [`set_stable`](SequencePool::set_stable).
//! 5. On a leadership change, the new leader calls [`restore_qcs`](SequencePool::restore_qcs) and
//!    then [`become_leader`](SequencePool::become_leader).

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;

use crate::crypto::Crypto;
use crate::events::*;
use crate::replica_log::verifier::CertificateSink;
use crate::types::{
    basic::{CryptoHash, ReplicaID, SequenceNumber},
    messages::{Command, QCBatch, QCFilter, QuorumCert},
    replica_set::ReplicaSet,
};

use super::command_tracker::CommandTracker;
use super::qc_window::{QCWindow, QCWindowError};

pub struct SequencePool<C: Crypto> {
    me: ReplicaID,
    quorum: usize,

    /// Maximum number of filters in a batch produced by [`pull_batch`](Self::pull_batch).
    rotation: usize,

    windows: BTreeMap<ReplicaID, QCWindow>,
    commands: HashMap<CryptoHash, Command>,
    tracker: CommandTracker,
    crypto: C,
    event_publisher: Option<Sender<Event>>,
}

impl<C: Crypto> SequencePool<C> {
    /// Create a pool with one window for every replica in `replica_set`, the local replica included.
    pub fn new(
        me: ReplicaID,
        replica_set: &ReplicaSet,
        rotation: usize,
        crypto: C,
        event_publisher: Option<Sender<Event>>,
    ) -> Self {
        let quorum = replica_set.quorum();
        let windows = replica_set
            .replicas()
            .map(|author| (*author, QCWindow::new(*author, me, quorum)))
            .collect();

        Self {
            me,
            quorum,
            rotation: rotation.max(1),
            windows,
            commands: HashMap::new(),
            tracker: CommandTracker::new(quorum),
            crypto,
            event_publisher,
        }
    }

    pub fn insert_command(&mut self, command: Command) {
        self.commands.entry(command.digest).or_insert(command);
    }

    /// Admit a certificate delivered by its author's log verifier (or by the local log) into the
    /// cached partition of the author's window.
    pub fn insert_quorum_cert(&mut self, qc: QuorumCert) -> Result<(), SequencePoolError> {
        let window = self
            .windows
            .get_mut(&qc.author())
            .ok_or(SequencePoolError::UnknownAuthor {
                author: qc.author(),
            })?;

        window.insert(qc.clone())?;

        Event::InsertQC(InsertQCEvent {
            timestamp: SystemTime::now(),
            qc,
        })
        .publish(&self.event_publisher);

        Ok(())
    }

    /// Assemble a batch of up to `rotation` filters, each holding certificates from at least a
    /// quorum of authors.
    ///
    /// If even the first filter cannot reach a quorum of authors, every pull is pushed back and
    /// [`InsufficientCertificates`](SequencePoolError::InsufficientCertificates) is returned. A
    /// later filter that falls short is pushed back on its own and ends the batch.
    pub fn pull_batch(&mut self) -> Result<QCBatch, SequencePoolError> {
        let mut batch = QCBatch::new(self.me);

        for round in 0..self.rotation {
            let mut filter = QCFilter::default();
            let mut contributors = 0;

            for window in self.windows.values_mut() {
                let partials = pull_partials(window, &self.tracker, &self.commands);
                if !partials.is_empty() {
                    contributors += 1;
                    filter.qcs.extend(partials);
                }
            }

            if contributors < self.quorum {
                for qc in filter.qcs {
                    if let Some(window) = self.windows.get_mut(&qc.author()) {
                        window.back(qc);
                    }
                }

                if round == 0 {
                    return Err(SequencePoolError::InsufficientCertificates {
                        collected: contributors,
                        required: self.quorum,
                    });
                }
                break;
            }

            for qc in &filter.qcs {
                if let Some(command) = self.commands.get(&qc.command_digest()) {
                    batch.commands.insert(command.digest, command.clone());
                }
            }
            batch.filters.push(filter);
        }

        Event::PullBatch(PullBatchEvent {
            timestamp: SystemTime::now(),
            batch: batch.clone(),
        })
        .publish(&self.event_publisher);

        Ok(batch)
    }

    /// Check every certificate of a proposed batch and, only if all of them pass, move them to the
    /// proposed partitions of their windows.
    ///
    /// A failed verification leaves the pool untouched.
    pub fn verify_batch(&mut self, batch: &QCBatch) -> Result<(), SequencePoolError> {
        if batch.filters.is_empty() {
            return Err(SequencePoolError::InsufficientCertificates {
                collected: 0,
                required: self.quorum,
            });
        }

        for filter in &batch.filters {
            if filter.qcs.len() < self.quorum {
                return Err(SequencePoolError::InsufficientCertificates {
                    collected: filter.qcs.len(),
                    required: self.quorum,
                });
            }
        }

        let mut seen: HashSet<(ReplicaID, SequenceNumber)> = HashSet::new();
        for qc in batch.qcs() {
            if !seen.insert((qc.author(), qc.sequence())) {
                return Err(QCWindowError::AlreadyProposed {
                    sequence: qc.sequence(),
                }
                .into());
            }

            let window = self
                .windows
                .get(&qc.author())
                .ok_or(SequencePoolError::UnknownAuthor {
                    author: qc.author(),
                })?;

            // A command already certified by enough logs need not travel with the batch.
            let command_is_present = self.tracker.is_quorum(&qc.command_digest())
                || batch
                    .commands
                    .get(&qc.command_digest())
                    .is_some_and(|command| command.is_digest_correct(&self.crypto));
            if !command_is_present {
                return Err(SequencePoolError::MissingCommand {
                    author: qc.author(),
                    sequence: qc.sequence(),
                    command: qc.command_digest(),
                });
            }

            window.check(batch.author, qc, &self.crypto)?;
        }

        for qc in batch.qcs() {
            if let Some(window) = self.windows.get_mut(&qc.author()) {
                // Batches proposed by the local replica skip the proposed check.
                if window.is_proposed(&qc.sequence()) {
                    continue;
                }
                window.mark_proposed(qc.clone());
                self.tracker.add(qc.command_digest());
            }
        }

        for command in batch.commands.values() {
            self.insert_command(command.clone());
        }

        Event::VerifyBatch(VerifyBatchEvent {
            timestamp: SystemTime::now(),
            batch: batch.clone(),
        })
        .publish(&self.event_publisher);

        Ok(())
    }

    /// Advance the stable sequence number of every window with a certificate in the committed
    /// `batch`, in batch order. Stops at the first certificate that is out of order.
    pub fn set_stable(&mut self, batch: &QCBatch) -> Result<(), SequencePoolError> {
        for qc in batch.qcs() {
            let window = self
                .windows
                .get_mut(&qc.author())
                .ok_or(SequencePoolError::UnknownAuthor {
                    author: qc.author(),
                })?;

            window.set_stable(qc)?;

            Event::StabilizeQC(StabilizeQCEvent {
                timestamp: SystemTime::now(),
                author: qc.author(),
                sequence: qc.sequence(),
            })
            .publish(&self.event_publisher);
        }

        Ok(())
    }

    pub fn become_leader(&mut self) {
        self.windows
            .values_mut()
            .for_each(|window| window.become_leader());

        Event::BecomeLeader(BecomeLeaderEvent {
            timestamp: SystemTime::now(),
        })
        .publish(&self.event_publisher);
    }

    /// Move every proposed but unstable certificate back to the cached partitions, and forget the
    /// proposals of the commands they reference. Returns the number of certificates restored.
    pub fn restore_qcs(&mut self) -> usize {
        let mut restored = 0;

        for window in self.windows.values_mut() {
            for qc in window.restore_qcs() {
                self.tracker.del(qc.command_digest());
                restored += 1;
            }
        }

        Event::RestoreQCs(RestoreQCsEvent {
            timestamp: SystemTime::now(),
            restored,
        })
        .publish(&self.event_publisher);

        restored
    }

    pub fn me(&self) -> ReplicaID {
        self.me
    }

    pub fn quorum(&self) -> usize {
        self.quorum
    }

    pub fn window(&self, author: &ReplicaID) -> Option<&QCWindow> {
        self.windows.get(author)
    }

    pub fn tracker(&self) -> &CommandTracker {
        &self.tracker
    }

    pub fn command(&self, digest: &CryptoHash) -> Option<&Command> {
        self.commands.get(digest)
    }
}

/// Pull the next run of certificates from `window` for a filter.
///
/// Certificates whose command is already at quorum are taken and the pull continues, since they
/// still have to stabilize in order. The run ends at the first certificate whose command is not at
/// quorum, which must have its command in the cache. If the window runs dry first, or the command is
/// not cached, everything pulled is pushed back and the run is empty.
fn pull_partials(
    window: &mut QCWindow,
    tracker: &CommandTracker,
    commands: &HashMap<CryptoHash, Command>,
) -> Vec<QuorumCert> {
    let mut pulled = Vec::new();

    let last_is_resolved = loop {
        match window.pull() {
            Some(qc) => {
                let at_quorum = tracker.is_quorum(&qc.command_digest());
                let command_is_cached = commands.contains_key(&qc.command_digest());
                pulled.push(qc);
                if !at_quorum {
                    break command_is_cached;
                }
            }
            None => break false,
        }
    };

    if !last_is_resolved {
        for qc in pulled.drain(..) {
            window.back(qc);
        }
    }

    pulled
}

/// Log verifiers deliver their certificates straight into the shared pool.
impl<C: Crypto> CertificateSink for Arc<Mutex<SequencePool<C>>> {
    fn deliver(&mut self, qc: QuorumCert) {
        let author = qc.author();
        let sequence = qc.sequence();
        let mut pool = self.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(err) = pool.insert_quorum_cert(qc) {
            log::debug!(
                "Rejected quorum certificate, author: {}, sequence: {}, error: {:?}",
                author,
                sequence,
                err
            );
        }
    }
}

/// The different ways a call to a method of [`SequencePool`] can fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequencePoolError {
    /// No window exists for the certificate's author.
    UnknownAuthor { author: ReplicaID },

    /// A filter has fewer certificates (or contributing authors) than the quorum.
    InsufficientCertificates { collected: usize, required: usize },

    /// A certificate references a command that is neither at quorum nor carried by the batch.
    MissingCommand {
        author: ReplicaID,
        sequence: SequenceNumber,
        command: CryptoHash,
    },

    QCWindowError(QCWindowError),
}

impl From<QCWindowError> for SequencePoolError {
    fn from(value: QCWindowError) -> Self {
        SequencePoolError::QCWindowError(value)
    }
}
