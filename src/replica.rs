/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Methods to build and run a replica of the sequencing engine.
//!
//! A replica runs its own log, verifies the logs of every other replica in the
//! [replica set](crate::types::replica_set::ReplicaSet), and aggregates the certified entries of all
//! logs in a [sequence pool](crate::sequence_pool). It does not decide on a global order by itself:
//! a global-ordering protocol running on top of the replica drives the pool through
//! [`pull_batch`](Replica::pull_batch), [`verify_batch`](Replica::verify_batch),
//! [`set_stable`](Replica::set_stable), [`restore_qcs`](Replica::restore_qcs), and
//! [`become_leader`](Replica::become_leader).
//!
//! The key components of this module are:
//! - The builder-pattern interface to construct a [specification of the replica](ReplicaSpec) with:
//!   1. `ReplicaSpec::builder` to construct a `ReplicaSpecBuilder`,
//!   2. The setters of the `ReplicaSpecBuilder`, and
//!   3. The `ReplicaSpecBuilder::build` method to construct a [ReplicaSpec],
//! - The function to [start](ReplicaSpec::start) a [Replica] given its specification,
//! - [The type](Replica) which keeps the replica's threads alive.
//!
//! ## Starting a replica
//!
//! ```ignore
//! let replica =
//!     ReplicaSpec::builder()
//!     .network(network)
//!     .crypto(crypto)
//!     .configuration(configuration)
//!     .on_accept_partial_order(accept_handler)
//!     .build()
//!     .start()
//! ```
//!
//! ### Required setters
//!
//! - `.network(...)`
//! - `.crypto(...)`
//! - `.configuration(...)`
//!
//! ### Optional setters
//!
//! The optional setters register user-defined event handlers for events from [crate::events]:
//! - `.on_receive_pre_order(...)`
//! - `.on_vote(...)`
//! - `.on_receive_partial_order(...)`
//! - `.on_accept_partial_order(...)`
//! - `.on_drop_partial_order(...)`
//! - `.on_generate_pre_order(...)`
//! - `.on_collect_qc(...)`
//! - `.on_insert_qc(...)`
//! - `.on_pull_batch(...)`
//! - `.on_verify_batch(...)`
//! - `.on_stabilize_qc(...)`
//! - `.on_restore_qcs(...)`
//! - `.on_become_leader(...)`
//!
//! The replica's [configuration](Configuration) is also built using the builder pattern:
//!
//! ```ignore
//! let configuration =
//!     Configuration::builder()
//!     .me(ReplicaID::new(1))
//!     .replica_set(replica_set)
//!     .rotation(2)
//!     .log_events(true)
//!     .build()
//! ```
//!
//! ## Threads
//!
//! Starting a replica spawns one log worker thread per remote author, and an event bus thread if
//! logging is enabled or any handler is registered. All of them are shut down when the [`Replica`] is
//! dropped.

use std::collections::BTreeMap;
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use typed_builder::TypedBuilder;

use crate::crypto::Crypto;
use crate::event_bus::*;
use crate::events::*;
use crate::local_log::LocalLog;
use crate::networking::Network;
use crate::replica_log::{
    types::LogMessage, verifier::ReplicaLogVerifier, worker::start_log_worker,
};
use crate::sequence_pool::{SequencePool, SequencePoolError};
use crate::types::{
    basic::ReplicaID,
    messages::{Command, Message, PreOrder, QCBatch, QuorumCert, Vote},
    replica_set::ReplicaSet,
};

/// Stores the user-defined parameters required to start the replica, that is:
/// 1. The replica's own [ID](ReplicaID).
/// 2. The [replica set](ReplicaSet), which determines the authors and the quorum size.
/// 3. The rotation, i.e., the maximum number of filters in a batch produced by
///    [`pull_batch`](Replica::pull_batch).
/// 4. The "Log Events" flag, if set to "true" then logs should be printed.
#[derive(TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [Configuration]. On the builder call the following methods to construct a valid [Configuration].

    Required:
    - `.me(...)`
    - `.replica_set(...)`
    - `.log_events(...)`

    Optional:
    - `.rotation(...)`
"))]
pub struct Configuration {
    #[builder(setter(doc = "Set the ID of the local replica. Required."))]
    pub me: ReplicaID,
    #[builder(setter(doc = "Set the replica set. Required."))]
    pub replica_set: ReplicaSet,
    #[builder(
        default = 1,
        setter(doc = "Set the maximum number of filters in a pulled batch. Defaults to 1.")
    )]
    pub rotation: usize,
    #[builder(setter(doc = "Enable logging? Required."))]
    pub log_events: bool,
}

/// Stores all necessary parameters and trait implementations required to run the [Replica].
#[derive(TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [ReplicaSpec]. On the builder call the following methods to construct a valid [ReplicaSpec].

    Required:
    - `.network(...)`
    - `.crypto(...)`
    - `.configuration(...)`

    Optional:
    - `.on_receive_pre_order(...)`
    - `.on_vote(...)`
    - `.on_receive_partial_order(...)`
    - `.on_accept_partial_order(...)`
    - `.on_drop_partial_order(...)`
    - `.on_generate_pre_order(...)`
    - `.on_collect_qc(...)`
    - `.on_insert_qc(...)`
    - `.on_pull_batch(...)`
    - `.on_verify_batch(...)`
    - `.on_stabilize_qc(...)`
    - `.on_restore_qcs(...)`
    - `.on_become_leader(...)`
"))]
pub struct ReplicaSpec<N: Network + 'static, C: Crypto + 'static> {
    // Required parameters
    #[builder(setter(
        doc = "Set the implementation of peer-to-peer networking. The argument must implement the [Network](crate::networking::Network) trait. Required."
    ))]
    network: N,
    #[builder(setter(
        doc = "Set the signing, verification, and hashing capability. The argument must implement the [Crypto](crate::crypto::Crypto) trait. Required."
    ))]
    crypto: C,
    #[builder(setter(
        doc = "Set the [configuration](Configuration), which contains the necessary parameters to run a replica. Required."
    ))]
    configuration: Configuration,
    // Optional parameters
    #[builder(default, setter(transform = |handler: impl Fn(&ReceivePreOrderEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ReceivePreOrderEvent>),
    doc = "Register a handler closure to be invoked after the replica buffers a pre-order from a remote author. Optional."))]
    on_receive_pre_order: Option<HandlerPtr<ReceivePreOrderEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&VoteEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<VoteEvent>),
    doc = "Register a handler closure to be invoked after the replica sends a vote. Optional."))]
    on_vote: Option<HandlerPtr<VoteEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ReceivePartialOrderEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ReceivePartialOrderEvent>),
    doc = "Register a handler closure to be invoked after the replica buffers a quorum certificate from a remote author. Optional."))]
    on_receive_partial_order: Option<HandlerPtr<ReceivePartialOrderEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&AcceptPartialOrderEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<AcceptPartialOrderEvent>),
    doc = "Register a handler closure to be invoked after a remote quorum certificate is accepted in sequence order. Optional."))]
    on_accept_partial_order: Option<HandlerPtr<AcceptPartialOrderEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&DropPartialOrderEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<DropPartialOrderEvent>),
    doc = "Register a handler closure to be invoked after a remote quorum certificate is dropped for breaking its log's chain. Optional."))]
    on_drop_partial_order: Option<HandlerPtr<DropPartialOrderEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&GeneratePreOrderEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<GeneratePreOrderEvent>),
    doc = "Register a handler closure to be invoked after the replica appends a pre-order to its own log. Optional."))]
    on_generate_pre_order: Option<HandlerPtr<GeneratePreOrderEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&CollectQCEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<CollectQCEvent>),
    doc = "Register a handler closure to be invoked after the replica collects a quorum certificate for its own log. Optional."))]
    on_collect_qc: Option<HandlerPtr<CollectQCEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&InsertQCEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<InsertQCEvent>),
    doc = "Register a handler closure to be invoked after a quorum certificate is admitted into the sequence pool. Optional."))]
    on_insert_qc: Option<HandlerPtr<InsertQCEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&PullBatchEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<PullBatchEvent>),
    doc = "Register a handler closure to be invoked after the replica assembles a batch. Optional."))]
    on_pull_batch: Option<HandlerPtr<PullBatchEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&VerifyBatchEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<VerifyBatchEvent>),
    doc = "Register a handler closure to be invoked after a batch passes verification. Optional."))]
    on_verify_batch: Option<HandlerPtr<VerifyBatchEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&StabilizeQCEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<StabilizeQCEvent>),
    doc = "Register a handler closure to be invoked after a quorum certificate becomes stable. Optional."))]
    on_stabilize_qc: Option<HandlerPtr<StabilizeQCEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&RestoreQCsEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<RestoreQCsEvent>),
    doc = "Register a handler closure to be invoked after proposed quorum certificates are restored. Optional."))]
    on_restore_qcs: Option<HandlerPtr<RestoreQCsEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&BecomeLeaderEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<BecomeLeaderEvent>),
    doc = "Register a handler closure to be invoked after the replica resets its proposal cursors to lead. Optional."))]
    on_become_leader: Option<HandlerPtr<BecomeLeaderEvent>>,
}

impl<N: Network + 'static, C: Crypto + 'static> ReplicaSpec<N, C> {
    /// Starts all threads and channels associated with running a replica, and returns the handles to
    /// them in a [Replica] struct.
    pub fn start(self) -> Replica<N, C> {
        let Configuration {
            me,
            replica_set,
            rotation,
            log_events,
        } = self.configuration;
        let quorum = replica_set.quorum();

        let event_handlers = EventHandlers::new(
            log_events,
            UserHandlers {
                on_receive_pre_order: self.on_receive_pre_order,
                on_vote: self.on_vote,
                on_receive_partial_order: self.on_receive_partial_order,
                on_accept_partial_order: self.on_accept_partial_order,
                on_drop_partial_order: self.on_drop_partial_order,
                on_generate_pre_order: self.on_generate_pre_order,
                on_collect_qc: self.on_collect_qc,
                on_insert_qc: self.on_insert_qc,
                on_pull_batch: self.on_pull_batch,
                on_verify_batch: self.on_verify_batch,
                on_stabilize_qc: self.on_stabilize_qc,
                on_restore_qcs: self.on_restore_qcs,
                on_become_leader: self.on_become_leader,
            },
        );

        let (event_publisher, event_subscriber) = if !event_handlers.is_empty() {
            Some(mpsc::channel()).unzip()
        } else {
            (None, None)
        };

        let pool = Arc::new(Mutex::new(SequencePool::new(
            me,
            &replica_set,
            rotation,
            self.crypto.clone(),
            event_publisher.clone(),
        )));

        let local_log = LocalLog::new(me, quorum, self.crypto.clone(), event_publisher.clone());

        let log_workers = replica_set
            .replicas()
            .filter(|author| **author != me)
            .map(|author| {
                let verifier = ReplicaLogVerifier::new(
                    me,
                    *author,
                    quorum,
                    self.crypto.clone(),
                    self.network.clone(),
                    Arc::clone(&pool),
                    event_publisher.clone(),
                );
                let (messages, messages_receiver) = mpsc::channel();
                let (shutdown, shutdown_receiver) = mpsc::channel();
                let thread = start_log_worker(verifier, messages_receiver, shutdown_receiver);

                (
                    *author,
                    LogWorkerHandle {
                        messages,
                        shutdown,
                        thread: Some(thread),
                    },
                )
            })
            .collect();

        let (event_bus, event_bus_shutdown) = match event_subscriber {
            Some(event_subscriber) => {
                let (shutdown, shutdown_receiver) = mpsc::channel();
                let event_bus = start_event_bus(event_handlers, event_subscriber, shutdown_receiver);
                (Some(event_bus), Some(shutdown))
            }
            None => (None, None),
        };

        Replica {
            me,
            quorum,
            crypto: self.crypto,
            network: Mutex::new(self.network),
            pool,
            local_log: Mutex::new(local_log),
            log_workers,
            event_bus,
            event_bus_shutdown,
        }
    }
}

struct LogWorkerHandle {
    messages: Sender<LogMessage>,
    shutdown: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

/// A handle to a running replica. When this value is dropped, all background threads are gracefully
/// shut down.
pub struct Replica<N: Network, C: Crypto> {
    me: ReplicaID,
    quorum: usize,
    crypto: C,
    network: Mutex<N>,
    pool: Arc<Mutex<SequencePool<C>>>,
    local_log: Mutex<LocalLog<C>>,
    log_workers: BTreeMap<ReplicaID, LogWorkerHandle>,
    event_bus: Option<JoinHandle<()>>,
    event_bus_shutdown: Option<Sender<()>>,
}

impl<N: Network, C: Crypto> Replica<N, C> {
    /// Process a message received from `origin`.
    ///
    /// Batches are not processed: they are returned for the global-ordering protocol, which decides
    /// when to [verify](Self::verify_batch) them.
    pub fn receive(&self, origin: ReplicaID, message: Message) -> Option<QCBatch> {
        match message {
            Message::Command(command) => self.lock_pool().insert_command(command),
            Message::PreOrder(pre_order) => self.receive_pre_order(pre_order),
            Message::Vote(vote) => self.receive_vote(origin, vote),
            Message::PartialOrder(qc) => self.receive_partial_order(qc),
            Message::Batch(batch) => return Some(batch),
        }

        None
    }

    /// Hand a pre-order to the log worker of its author.
    pub fn receive_pre_order(&self, pre_order: PreOrder) {
        self.forward(pre_order.author, LogMessage::PreOrder(pre_order))
    }

    /// Hand a quorum certificate to the log worker of its author.
    pub fn receive_partial_order(&self, qc: QuorumCert) {
        self.forward(qc.author(), LogMessage::PartialOrder(qc))
    }

    fn forward(&self, author: ReplicaID, message: LogMessage) {
        match self.log_workers.get(&author) {
            Some(worker) => {
                let _ = worker.messages.send(message);
            }
            None => log::debug!("Ignored log message of non-remote author {}", author),
        }
    }

    /// Add a vote to the local log. Once a pre-order of the local log is certified, its certificate
    /// is admitted into the local sequence pool and broadcast.
    pub fn receive_vote(&self, origin: ReplicaID, vote: Vote) {
        let collected = self
            .local_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .collect_vote(vote);

        match collected {
            Ok(Some(qc)) => {
                if let Err(err) = self.lock_pool().insert_quorum_cert(qc.clone()) {
                    log::warn!("Own quorum certificate was rejected: {:?}", err);
                }
                self.lock_network().broadcast(qc.into());
            }
            Ok(None) => (),
            Err(err) => log::warn!("Rejected vote from {}: {:?}", origin, err),
        }
    }

    /// Append a command to the local log: cache it, then broadcast it along with the pre-order that
    /// assigns it a sequence number.
    pub fn order_command(&self, payload: Vec<u8>) -> PreOrder {
        let command = Command::new(payload, &self.crypto);
        self.lock_pool().insert_command(command.clone());

        let pre_order = self
            .local_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generate_pre_order(command.digest);

        {
            let mut network = self.lock_network();
            network.broadcast(command.into());
            network.broadcast(pre_order.clone().into());
        }

        // In a replica set of one, the local signature is already a quorum.
        if self.quorum <= 1 {
            let vote = Vote {
                author: self.me,
                digest: pre_order.digest,
                signature: self.crypto.sign(&pre_order.digest.bytes()),
            };
            self.receive_vote(self.me, vote);
        }

        pre_order
    }

    pub fn pull_batch(&self) -> Result<QCBatch, SequencePoolError> {
        self.lock_pool().pull_batch()
    }

    pub fn verify_batch(&self, batch: &QCBatch) -> Result<(), SequencePoolError> {
        self.lock_pool().verify_batch(batch)
    }

    pub fn set_stable(&self, batch: &QCBatch) -> Result<(), SequencePoolError> {
        self.lock_pool().set_stable(batch)
    }

    pub fn become_leader(&self) {
        self.lock_pool().become_leader()
    }

    pub fn restore_qcs(&self) -> usize {
        self.lock_pool().restore_qcs()
    }

    /// Inspect the sequence pool while holding its lock.
    pub fn with_pool<R>(&self, f: impl FnOnce(&SequencePool<C>) -> R) -> R {
        f(&self.lock_pool())
    }

    pub fn me(&self) -> ReplicaID {
        self.me
    }

    fn lock_pool(&self) -> MutexGuard<'_, SequencePool<C>> {
        self.pool.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_network(&self) -> MutexGuard<'_, N> {
        self.network.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<N: Network, C: Crypto> Drop for Replica<N, C> {
    fn drop(&mut self) {
        // The log workers publish events, so they are shut down before the event bus.
        for worker in self.log_workers.values_mut() {
            worker.shutdown.send(()).unwrap();
            if let Some(thread) = worker.thread.take() {
                thread.join().unwrap();
            }
        }

        self.event_bus_shutdown
            .iter()
            .for_each(|shutdown| shutdown.send(()).unwrap());
        if let Some(event_bus) = self.event_bus.take() {
            event_bus.join().unwrap();
        }
    }
}
