use std::sync::mpsc;

use multilog_rs::{
    crypto::{Crypto, Ed25519Crypto, ProofCertsError},
    events::Event,
    replica_log::verifier::{LogVerifierError, ReplicaLogVerifier},
    types::{
        basic::{CryptoHash, SequenceNumber},
        messages::{Message, QuorumCert},
    },
};

mod common;

use crate::common::{
    cluster::{id, seq, Cluster},
    network::RecordingNetwork,
};

type Verifier = ReplicaLogVerifier<Ed25519Crypto, RecordingNetwork, Vec<QuorumCert>>;

// Replica 1's verifier of replica 2's log, in a replica set of four.
fn verifier(cluster: &Cluster) -> (Verifier, RecordingNetwork) {
    let network = RecordingNetwork::default();
    let verifier = ReplicaLogVerifier::new(
        id(1),
        id(2),
        cluster.quorum(),
        cluster.crypto(id(1)),
        network.clone(),
        Vec::new(),
        None,
    );
    (verifier, network)
}

fn log(cluster: &Cluster, entries: usize) -> Vec<QuorumCert> {
    let commands: Vec<_> = (0..entries)
        .map(|i| cluster.command(&format!("command {}", i)))
        .collect();
    cluster.log(id(2), &commands)
}

fn delivered(verifier: &Verifier) -> Vec<SequenceNumber> {
    verifier.sink().iter().map(|qc| qc.sequence()).collect()
}

fn votes_sent(network: &RecordingNetwork) -> Vec<CryptoHash> {
    network
        .sent()
        .into_iter()
        .filter_map(|(peer, message)| match message {
            Message::Vote(vote) => {
                assert_eq!(peer, Some(id(2)));
                assert_eq!(vote.author, id(1));
                Some(vote.digest)
            }
            _ => None,
        })
        .collect()
}

#[test]
fn out_of_order_certificates_are_delivered_in_sequence_test() {
    let cluster = Cluster::new(4);
    let (mut verifier, network) = verifier(&cluster);
    let log = log(&cluster, 5);

    for qc in &log[0..3] {
        verifier.receive_partial_order(qc.clone()).unwrap();
    }
    assert_eq!(delivered(&verifier), vec![seq(1), seq(2), seq(3)]);

    // Entry 5 is certified before entry 4 is even seen.
    verifier.receive_partial_order(log[4].clone()).unwrap();
    assert_eq!(verifier.sequence(), seq(4));
    assert_eq!(verifier.buffered_len(), 1);

    verifier.receive_pre_order(log[3].pre_order.clone()).unwrap();
    assert_eq!(votes_sent(&network), vec![log[3].digest()]);
    let vote = match network.sent().pop() {
        Some((_, Message::Vote(vote))) => vote,
        _ => panic!("expected a vote"),
    };
    assert!(vote.is_correct(&cluster.crypto(id(3))));

    verifier.receive_partial_order(log[3].clone()).unwrap();
    assert_eq!(
        delivered(&verifier),
        vec![seq(1), seq(2), seq(3), seq(4), seq(5)]
    );
    assert_eq!(verifier.sequence(), seq(6));
    assert_eq!(verifier.high_cert_digest(), Some(log[4].digest()));
    assert_eq!(verifier.buffered_len(), 0);
}

#[test]
fn each_pre_order_is_voted_for_once_test() {
    let cluster = Cluster::new(4);
    let (mut verifier, network) = verifier(&cluster);
    let log = log(&cluster, 2);

    // Not at the cursor yet.
    verifier.receive_pre_order(log[1].pre_order.clone()).unwrap();
    assert_eq!(votes_sent(&network).len(), 0);

    verifier.receive_pre_order(log[0].pre_order.clone()).unwrap();
    verifier.receive_pre_order(log[0].pre_order.clone()).unwrap();
    assert_eq!(votes_sent(&network).len(), 1);

    // Resolving entry 1 moves the cursor onto the buffered pre-order of entry 2.
    verifier.receive_partial_order(log[0].clone()).unwrap();
    assert_eq!(votes_sent(&network).len(), 2);
    assert_eq!(verifier.sequence(), seq(2));
}

#[test]
fn resolved_entries_are_stale_test() {
    let cluster = Cluster::new(4);
    let (mut verifier, _) = verifier(&cluster);
    let log = log(&cluster, 1);
    verifier.receive_partial_order(log[0].clone()).unwrap();

    assert_eq!(
        verifier.receive_pre_order(log[0].pre_order.clone()),
        Err(LogVerifierError::StaleEntry {
            expected: seq(2),
            received: seq(1)
        })
    );
    assert_eq!(
        verifier.receive_partial_order(log[0].clone()),
        Err(LogVerifierError::StaleEntry {
            expected: seq(2),
            received: seq(1)
        })
    );
    assert_eq!(delivered(&verifier), vec![seq(1)]);
}

#[test]
fn malformed_messages_are_rejected_test() {
    let cluster = Cluster::new(4);
    let (mut verifier, network) = verifier(&cluster);
    let log = log(&cluster, 1);

    let foreign = cluster.log(id(3), &[cluster.command("foreign")]);
    assert_eq!(
        verifier.receive_partial_order(foreign[0].clone()),
        Err(LogVerifierError::WrongAuthor {
            expected: id(2),
            received: id(3)
        })
    );

    let mut tampered = log[0].pre_order.clone();
    tampered.command_digest = cluster.command("tampered").digest;
    assert_eq!(
        verifier.receive_pre_order(tampered),
        Err(LogVerifierError::MalformedDigest { sequence: seq(1) })
    );

    let underweight = cluster.certify(&log[0].pre_order, None, 2);
    assert_eq!(
        verifier.receive_partial_order(underweight),
        Err(LogVerifierError::InvalidCertificate(
            ProofCertsError::NotEnoughSignatures {
                collected: 2,
                required: 3
            }
        ))
    );

    // Replica 1's signature is replaced by its signature over something else.
    let mut forged = log[0].clone();
    let signer = id(1);
    forged.proof_certs = log[0]
        .proof_certs
        .iter()
        .map(|(s, signature)| {
            if *s == signer {
                (*s, cluster.crypto(signer).sign(b"something else"))
            } else {
                (*s, *signature)
            }
        })
        .collect();
    assert_eq!(
        verifier.receive_partial_order(forged),
        Err(LogVerifierError::InvalidCertificate(
            ProofCertsError::InvalidSignature { signer }
        ))
    );

    assert!(network.sent().is_empty());
    assert!(delivered(&verifier).is_empty());
    assert_eq!(verifier.buffered_len(), 0);
}

#[test]
fn broken_chain_link_is_dropped_test() {
    let cluster = Cluster::new(4);
    let (event_publisher, event_subscriber) = mpsc::channel();
    let mut verifier: Verifier = ReplicaLogVerifier::new(
        id(1),
        id(2),
        cluster.quorum(),
        cluster.crypto(id(1)),
        RecordingNetwork::default(),
        Vec::new(),
        Some(event_publisher),
    );
    let log = log(&cluster, 3);
    verifier.receive_partial_order(log[0].clone()).unwrap();

    // Entry 2 claims a parent that is not entry 1.
    let unchained = cluster.certify(&log[1].pre_order, Some(log[2].digest()), cluster.quorum());
    verifier.receive_partial_order(unchained).unwrap();
    verifier.receive_partial_order(log[2].clone()).unwrap();

    assert_eq!(delivered(&verifier), vec![seq(1)]);
    assert_eq!(verifier.sequence(), seq(2));
    assert_eq!(verifier.buffered_len(), 1);

    let dropped: Vec<_> = event_subscriber
        .try_iter()
        .filter_map(|event| match event {
            Event::DropPartialOrder(drop_event) => Some(drop_event),
            _ => None,
        })
        .collect();
    assert_eq!(dropped.len(), 1);
    assert_eq!(dropped[0].qc.sequence(), seq(2));
    assert_eq!(dropped[0].expected_parent, Some(log[0].digest()));

    // The honest certificate of entry 2 unblocks the log.
    verifier.receive_partial_order(log[1].clone()).unwrap();
    assert_eq!(delivered(&verifier), vec![seq(1), seq(2), seq(3)]);
}

#[test]
fn dropped_certificate_does_not_allow_a_second_vote_test() {
    let cluster = Cluster::new(4);
    let (mut verifier, network) = verifier(&cluster);
    let log = log(&cluster, 2);
    verifier.receive_partial_order(log[0].clone()).unwrap();

    verifier.receive_pre_order(log[1].pre_order.clone()).unwrap();
    assert_eq!(votes_sent(&network), vec![log[1].digest()]);

    // The certificate of the voted pre-order breaks the chain and clears its slot.
    let unchained = cluster.certify(&log[1].pre_order, None, cluster.quorum());
    verifier.receive_partial_order(unchained).unwrap();
    assert_eq!(verifier.buffered_len(), 0);
    assert_eq!(verifier.sequence(), seq(2));

    let other = cluster.pre_order(id(2), 2, &cluster.command("other"));
    assert_eq!(
        verifier.receive_pre_order(other),
        Err(LogVerifierError::ConflictingPreOrder {
            sequence: seq(2),
            voted: log[1].digest()
        })
    );

    // The pre-order already voted for is accepted again, but not signed again.
    verifier.receive_pre_order(log[1].pre_order.clone()).unwrap();
    assert_eq!(votes_sent(&network), vec![log[1].digest()]);

    verifier.receive_partial_order(log[1].clone()).unwrap();
    assert_eq!(delivered(&verifier), vec![seq(1), seq(2)]);

    // The next sequence number can be voted for.
    let next = cluster.pre_order(id(2), 3, &cluster.command("next"));
    verifier.receive_pre_order(next.clone()).unwrap();
    assert_eq!(votes_sent(&network), vec![log[1].digest(), next.digest]);
}
