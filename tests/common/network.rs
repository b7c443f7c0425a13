use std::{
    collections::HashMap,
    sync::{
        mpsc::{self, Receiver, Sender},
        Arc, Mutex,
    },
};

use multilog_rs::{
    networking::Network,
    types::{basic::ReplicaID, messages::Message},
};

/// A mock network stub which passes messages from and to replicas using channels.
#[derive(Clone)]
pub(crate) struct NetworkStub {
    me: ReplicaID,
    all_peers: HashMap<ReplicaID, Sender<(ReplicaID, Message)>>,
}

impl Network for NetworkStub {
    fn send(&mut self, peer: ReplicaID, message: Message) {
        if let Some(peer) = self.all_peers.get(&peer) {
            let _ = peer.send((self.me, message));
        }
    }

    fn broadcast(&mut self, message: Message) {
        for (peer, inbox) in &self.all_peers {
            if *peer != self.me {
                let _ = inbox.send((self.me, message.clone()));
            }
        }
    }
}

/// Create one network stub per replica, each paired with the inbox of its replica.
pub(crate) fn mock_network(
    replicas: impl Iterator<Item = ReplicaID>,
) -> Vec<(NetworkStub, Receiver<(ReplicaID, Message)>)> {
    let mut all_peers = HashMap::new();
    let inboxes: Vec<(ReplicaID, Receiver<(ReplicaID, Message)>)> = replicas
        .map(|replica| {
            let (sender, receiver) = mpsc::channel();
            all_peers.insert(replica, sender);
            (replica, receiver)
        })
        .collect();

    inboxes
        .into_iter()
        .map(|(me, inbox)| {
            (
                NetworkStub {
                    me,
                    all_peers: all_peers.clone(),
                },
                inbox,
            )
        })
        .collect()
}

/// A network that only records what is sent through it. `None` marks a broadcast.
#[derive(Clone, Default)]
pub(crate) struct RecordingNetwork {
    sent: Arc<Mutex<Vec<(Option<ReplicaID>, Message)>>>,
}

impl RecordingNetwork {
    pub(crate) fn sent(&self) -> Vec<(Option<ReplicaID>, Message)> {
        self.sent.lock().unwrap().clone()
    }
}

impl Network for RecordingNetwork {
    fn send(&mut self, peer: ReplicaID, message: Message) {
        self.sent.lock().unwrap().push((Some(peer), message));
    }

    fn broadcast(&mut self, message: Message) {
        self.sent.lock().unwrap().push((None, message));
    }
}
