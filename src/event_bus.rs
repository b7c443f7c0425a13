/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The event bus thread, which receives [events](crate::events) from the log workers, the local log,
//! and the sequence pool, and fires the handlers registered for each event type.
//!
//! Handlers run on the event bus thread, never on the thread that emitted the event, so a slow
//! handler cannot stall verification or batch assembly.

use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::events::*;
use crate::logging::Logger;

pub(crate) type HandlerPtr<T> = Box<dyn Fn(&T) + Send>;

/// How long the event bus waits for an event before checking for a shutdown signal again.
const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// The handlers for every event type. If logging is enabled, the first handler of every type is its
/// default [logger](crate::logging).
pub(crate) struct EventHandlers {
    pub(crate) receive_pre_order_handlers: Vec<HandlerPtr<ReceivePreOrderEvent>>,
    pub(crate) vote_handlers: Vec<HandlerPtr<VoteEvent>>,
    pub(crate) receive_partial_order_handlers: Vec<HandlerPtr<ReceivePartialOrderEvent>>,
    pub(crate) accept_partial_order_handlers: Vec<HandlerPtr<AcceptPartialOrderEvent>>,
    pub(crate) drop_partial_order_handlers: Vec<HandlerPtr<DropPartialOrderEvent>>,
    pub(crate) generate_pre_order_handlers: Vec<HandlerPtr<GeneratePreOrderEvent>>,
    pub(crate) collect_qc_handlers: Vec<HandlerPtr<CollectQCEvent>>,
    pub(crate) insert_qc_handlers: Vec<HandlerPtr<InsertQCEvent>>,
    pub(crate) pull_batch_handlers: Vec<HandlerPtr<PullBatchEvent>>,
    pub(crate) verify_batch_handlers: Vec<HandlerPtr<VerifyBatchEvent>>,
    pub(crate) stabilize_qc_handlers: Vec<HandlerPtr<StabilizeQCEvent>>,
    pub(crate) restore_qcs_handlers: Vec<HandlerPtr<RestoreQCsEvent>>,
    pub(crate) become_leader_handlers: Vec<HandlerPtr<BecomeLeaderEvent>>,
}

/// The user-defined handlers registered on a [`ReplicaSpec`](crate::replica::ReplicaSpec), at most
/// one per event type.
#[derive(Default)]
pub(crate) struct UserHandlers {
    pub(crate) on_receive_pre_order: Option<HandlerPtr<ReceivePreOrderEvent>>,
    pub(crate) on_vote: Option<HandlerPtr<VoteEvent>>,
    pub(crate) on_receive_partial_order: Option<HandlerPtr<ReceivePartialOrderEvent>>,
    pub(crate) on_accept_partial_order: Option<HandlerPtr<AcceptPartialOrderEvent>>,
    pub(crate) on_drop_partial_order: Option<HandlerPtr<DropPartialOrderEvent>>,
    pub(crate) on_generate_pre_order: Option<HandlerPtr<GeneratePreOrderEvent>>,
    pub(crate) on_collect_qc: Option<HandlerPtr<CollectQCEvent>>,
    pub(crate) on_insert_qc: Option<HandlerPtr<InsertQCEvent>>,
    pub(crate) on_pull_batch: Option<HandlerPtr<PullBatchEvent>>,
    pub(crate) on_verify_batch: Option<HandlerPtr<VerifyBatchEvent>>,
    pub(crate) on_stabilize_qc: Option<HandlerPtr<StabilizeQCEvent>>,
    pub(crate) on_restore_qcs: Option<HandlerPtr<RestoreQCsEvent>>,
    pub(crate) on_become_leader: Option<HandlerPtr<BecomeLeaderEvent>>,
}

impl EventHandlers {
    pub(crate) fn new(log_events: bool, user_handlers: UserHandlers) -> EventHandlers {
        fn handlers<T: Logger + 'static>(
            log_events: bool,
            user_handler: Option<HandlerPtr<T>>,
        ) -> Vec<HandlerPtr<T>> {
            let mut handlers = Vec::new();
            if log_events {
                handlers.push(T::get_logger())
            }
            handlers.extend(user_handler);
            handlers
        }

        EventHandlers {
            receive_pre_order_handlers: handlers(log_events, user_handlers.on_receive_pre_order),
            vote_handlers: handlers(log_events, user_handlers.on_vote),
            receive_partial_order_handlers: handlers(
                log_events,
                user_handlers.on_receive_partial_order,
            ),
            accept_partial_order_handlers: handlers(
                log_events,
                user_handlers.on_accept_partial_order,
            ),
            drop_partial_order_handlers: handlers(log_events, user_handlers.on_drop_partial_order),
            generate_pre_order_handlers: handlers(log_events, user_handlers.on_generate_pre_order),
            collect_qc_handlers: handlers(log_events, user_handlers.on_collect_qc),
            insert_qc_handlers: handlers(log_events, user_handlers.on_insert_qc),
            pull_batch_handlers: handlers(log_events, user_handlers.on_pull_batch),
            verify_batch_handlers: handlers(log_events, user_handlers.on_verify_batch),
            stabilize_qc_handlers: handlers(log_events, user_handlers.on_stabilize_qc),
            restore_qcs_handlers: handlers(log_events, user_handlers.on_restore_qcs),
            become_leader_handlers: handlers(log_events, user_handlers.on_become_leader),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.receive_pre_order_handlers.is_empty()
            && self.vote_handlers.is_empty()
            && self.receive_partial_order_handlers.is_empty()
            && self.accept_partial_order_handlers.is_empty()
            && self.drop_partial_order_handlers.is_empty()
            && self.generate_pre_order_handlers.is_empty()
            && self.collect_qc_handlers.is_empty()
            && self.insert_qc_handlers.is_empty()
            && self.pull_batch_handlers.is_empty()
            && self.verify_batch_handlers.is_empty()
            && self.stabilize_qc_handlers.is_empty()
            && self.restore_qcs_handlers.is_empty()
            && self.become_leader_handlers.is_empty()
    }

    pub(crate) fn fire_handlers(&self, event: Event) {
        match event {
            Event::ReceivePreOrder(receive_pre_order_event) => self
                .receive_pre_order_handlers
                .iter()
                .for_each(|handler| handler(&receive_pre_order_event)),

            Event::Vote(vote_event) => self
                .vote_handlers
                .iter()
                .for_each(|handler| handler(&vote_event)),

            Event::ReceivePartialOrder(receive_partial_order_event) => self
                .receive_partial_order_handlers
                .iter()
                .for_each(|handler| handler(&receive_partial_order_event)),

            Event::AcceptPartialOrder(accept_partial_order_event) => self
                .accept_partial_order_handlers
                .iter()
                .for_each(|handler| handler(&accept_partial_order_event)),

            Event::DropPartialOrder(drop_partial_order_event) => self
                .drop_partial_order_handlers
                .iter()
                .for_each(|handler| handler(&drop_partial_order_event)),

            Event::GeneratePreOrder(generate_pre_order_event) => self
                .generate_pre_order_handlers
                .iter()
                .for_each(|handler| handler(&generate_pre_order_event)),

            Event::CollectQC(collect_qc_event) => self
                .collect_qc_handlers
                .iter()
                .for_each(|handler| handler(&collect_qc_event)),

            Event::InsertQC(insert_qc_event) => self
                .insert_qc_handlers
                .iter()
                .for_each(|handler| handler(&insert_qc_event)),

            Event::PullBatch(pull_batch_event) => self
                .pull_batch_handlers
                .iter()
                .for_each(|handler| handler(&pull_batch_event)),

            Event::VerifyBatch(verify_batch_event) => self
                .verify_batch_handlers
                .iter()
                .for_each(|handler| handler(&verify_batch_event)),

            Event::StabilizeQC(stabilize_qc_event) => self
                .stabilize_qc_handlers
                .iter()
                .for_each(|handler| handler(&stabilize_qc_event)),

            Event::RestoreQCs(restore_qcs_event) => self
                .restore_qcs_handlers
                .iter()
                .for_each(|handler| handler(&restore_qcs_event)),

            Event::BecomeLeader(become_leader_event) => self
                .become_leader_handlers
                .iter()
                .for_each(|handler| handler(&become_leader_event)),
        }
    }
}

pub(crate) fn start_event_bus(
    event_handlers: EventHandlers,
    event_subscriber: Receiver<Event>,
    shutdown_signal: Receiver<()>,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        match shutdown_signal.try_recv() {
            Ok(()) => return,
            Err(TryRecvError::Empty) => (),
            Err(TryRecvError::Disconnected) => {
                panic!("event_bus thread disconnected from main thread")
            }
        }

        match event_subscriber.recv_timeout(EVENT_POLL_INTERVAL) {
            Ok(event) => event_handlers.fire_handlers(event),
            Err(RecvTimeoutError::Timeout) => (),
            // Every publisher is gone; keep waiting for the shutdown signal.
            Err(RecvTimeoutError::Disconnected) => thread::sleep(EVENT_POLL_INTERVAL),
        }
    })
}
