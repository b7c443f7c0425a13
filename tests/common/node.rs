use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        mpsc::{Receiver, TryRecvError},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use multilog_rs::{
    crypto::Ed25519Crypto,
    events::CollectQCEvent,
    replica::{Configuration, Replica, ReplicaSpec},
    types::{
        basic::{ReplicaID, SequenceNumber},
        messages::{Message, QCBatch},
    },
};

use super::{cluster::Cluster, network::NetworkStub};

/// A running replica together with the inbox its network stub delivers into.
pub(crate) struct Node {
    replica: Replica<NetworkStub, Ed25519Crypto>,
    inbox: Receiver<(ReplicaID, Message)>,
    collected_qcs: Arc<AtomicUsize>,
}

impl Node {
    pub(crate) fn new(
        cluster: &Cluster,
        me: ReplicaID,
        network: NetworkStub,
        inbox: Receiver<(ReplicaID, Message)>,
    ) -> Node {
        let configuration = Configuration::builder()
            .me(me)
            .replica_set(cluster.replica_set().clone())
            .log_events(true)
            .build();

        let collected_qcs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&collected_qcs);

        let replica = ReplicaSpec::builder()
            .network(network)
            .crypto(cluster.crypto(me))
            .configuration(configuration)
            .on_collect_qc(move |_: &CollectQCEvent| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .start();

        Node {
            replica,
            inbox,
            collected_qcs,
        }
    }

    pub(crate) fn replica(&self) -> &Replica<NetworkStub, Ed25519Crypto> {
        &self.replica
    }

    /// Feed every message waiting in the inbox to the replica. Returns the batches received.
    pub(crate) fn deliver_inbox(&self) -> Vec<QCBatch> {
        let mut batches = Vec::new();
        loop {
            match self.inbox.try_recv() {
                Ok((origin, message)) => batches.extend(self.replica.receive(origin, message)),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return batches,
            }
        }
    }

    pub(crate) fn collected_qcs(&self) -> usize {
        self.collected_qcs.load(Ordering::SeqCst)
    }

    pub(crate) fn is_cached(&self, author: ReplicaID, sequence: SequenceNumber) -> bool {
        self.replica.with_pool(|pool| {
            pool.window(&author)
                .map(|window| window.is_cached(&sequence))
                .unwrap_or(false)
        })
    }
}

/// Keep delivering messages to every node until `condition` holds. Panics after `timeout`.
pub(crate) fn deliver_until(nodes: &[Node], timeout: Duration, condition: impl Fn(&[Node]) -> bool) {
    let start = Instant::now();
    while !condition(nodes) {
        if start.elapsed() > timeout {
            panic!("Condition did not hold within {:?}", timeout);
        }
        for node in nodes {
            node.deliver_inbox();
        }
        thread::sleep(Duration::from_millis(10));
    }
}
