use multilog_rs::{
    crypto::ProofCertsError,
    sequence_pool::qc_window::{QCWindow, QCWindowError},
    types::messages::QuorumCert,
};

mod common;

use crate::common::cluster::{id, seq, Cluster};

// Replica 1's window over the log of replica 2, in a replica set of four.
fn window_and_log(entries: usize) -> (Cluster, QCWindow, Vec<QuorumCert>) {
    let cluster = Cluster::new(4);
    let commands: Vec<_> = (0..entries)
        .map(|i| cluster.command(&format!("command {}", i)))
        .collect();
    let log = cluster.log(id(2), &commands);
    let window = QCWindow::new(id(2), id(1), cluster.quorum());
    (cluster, window, log)
}

#[test]
fn pull_follows_the_cursor_test() {
    let (_, mut window, log) = window_and_log(3);

    window.insert(log[1].clone()).unwrap();
    window.insert(log[2].clone()).unwrap();

    // Entry 1 has not arrived, so entry 2 is not ready.
    assert_eq!(window.pull(), None);
    assert_eq!(window.cached_len(), 2);
    assert_eq!(window.seq_no(), seq(1));

    window.insert(log[0].clone()).unwrap();
    for expected in &log {
        assert_eq!(window.pull().as_ref(), Some(expected));
    }
    assert_eq!(window.pull(), None);
    assert_eq!(window.seq_no(), seq(4));
    assert_eq!(window.cached_len(), 0);
}

#[test]
fn back_rewinds_the_cursor_test() {
    let (_, mut window, log) = window_and_log(3);
    for qc in &log {
        window.insert(qc.clone()).unwrap();
    }

    let first = window.pull().unwrap();
    let second = window.pull().unwrap();
    assert_eq!(window.seq_no(), seq(3));

    window.back(second);
    assert_eq!(window.seq_no(), seq(2));
    window.back(first);
    assert_eq!(window.seq_no(), seq(1));
    assert_eq!(window.cached_len(), 3);

    assert_eq!(window.pull().map(|qc| qc.sequence()), Some(seq(1)));
}

#[test]
fn verify_moves_certificate_to_proposed_exactly_once_test() {
    let (cluster, mut window, log) = window_and_log(1);
    let crypto = cluster.crypto(id(1));
    window.insert(log[0].clone()).unwrap();

    window.verify(id(3), &log[0], &crypto).unwrap();
    assert!(window.is_proposed(&seq(1)));
    assert!(!window.is_cached(&seq(1)));
    assert_eq!(window.proposed_len(), 1);

    assert_eq!(
        window.verify(id(3), &log[0], &crypto),
        Err(QCWindowError::AlreadyProposed { sequence: seq(1) })
    );
    assert_eq!(
        window.insert(log[0].clone()),
        Err(QCWindowError::AlreadyProposed { sequence: seq(1) })
    );
}

#[test]
fn verify_rejects_certificate_without_quorum_test() {
    let (cluster, mut window, _) = window_and_log(0);
    let crypto = cluster.crypto(id(1));
    let command = cluster.command("underweight");
    let pre_order = cluster.pre_order(id(2), 1, &command);
    let qc = cluster.certify(&pre_order, None, 2);

    assert_eq!(
        window.verify(id(3), &qc, &crypto),
        Err(QCWindowError::InvalidCertificate {
            sequence: seq(1),
            cause: ProofCertsError::NotEnoughSignatures {
                collected: 2,
                required: 3
            }
        })
    );
    assert!(!window.is_proposed(&seq(1)));

    // Batches proposed by the local replica are not checked again.
    window.verify(id(1), &qc, &crypto).unwrap();
    assert!(window.is_proposed(&seq(1)));
}

#[test]
fn set_stable_advances_one_at_a_time_test() {
    let (cluster, mut window, log) = window_and_log(3);
    let crypto = cluster.crypto(id(1));
    for qc in &log {
        window.insert(qc.clone()).unwrap();
    }
    window.verify(id(3), &log[0], &crypto).unwrap();

    assert_eq!(
        window.set_stable(&log[1]),
        Err(QCWindowError::OutOfOrder {
            expected: seq(1),
            received: seq(2)
        })
    );
    assert_eq!(window.stable_no(), seq(0));
    assert_eq!(window.proposed_len(), 1);

    window.set_stable(&log[0]).unwrap();
    assert_eq!(window.stable_no(), seq(1));
    assert_eq!(window.proposed_len(), 0);
    assert!(!window.is_proposed(&seq(1)));

    // Stable entries can never be cached again.
    assert_eq!(
        window.insert(log[0].clone()),
        Err(QCWindowError::Expired {
            stable: seq(1),
            received: seq(1)
        })
    );

    // Stabilizing an entry that was never proposed purges it from the cache.
    window.set_stable(&log[1]).unwrap();
    assert!(!window.is_cached(&seq(2)));
    assert!(window.is_cached(&seq(3)));
}

#[test]
fn restore_qcs_recovers_unstable_proposals_test() {
    let (cluster, mut window, log) = window_and_log(3);
    let crypto = cluster.crypto(id(1));
    for qc in &log {
        window.insert(qc.clone()).unwrap();
    }
    for qc in &log {
        window.verify(id(3), qc, &crypto).unwrap();
    }
    window.set_stable(&log[0]).unwrap();

    let restored: Vec<_> = window.restore_qcs().iter().map(|qc| qc.sequence()).collect();
    assert_eq!(restored, vec![seq(2), seq(3)]);
    assert_eq!(window.proposed_len(), 0);
    assert!(window.is_cached(&seq(2)) && window.is_cached(&seq(3)));

    // Restoring twice is the same as restoring once.
    assert!(window.restore_qcs().is_empty());
    assert_eq!(window.cached_len(), 2);

    // Leading again starts right after the stable entry.
    window.become_leader();
    assert_eq!(window.seq_no(), seq(2));
    assert_eq!(window.pull().map(|qc| qc.sequence()), Some(seq(2)));
}

#[test]
fn verify_rejects_tampered_and_stable_certificates_test() {
    let (cluster, mut window, log) = window_and_log(2);
    let crypto = cluster.crypto(id(1));
    for qc in &log {
        window.insert(qc.clone()).unwrap();
    }

    let mut tampered = log[1].clone();
    tampered.pre_order.command_digest = cluster.command("tampered").digest;
    assert_eq!(
        window.verify(id(3), &tampered, &crypto),
        Err(QCWindowError::MalformedDigest { sequence: seq(2) })
    );
    assert!(window.is_cached(&seq(2)));
    assert!(!window.is_proposed(&seq(2)));

    window.verify(id(3), &log[0], &crypto).unwrap();
    window.set_stable(&log[0]).unwrap();

    // Neither another replica's batch nor the local replica's own can bring it back.
    for proposer in [id(3), id(1)] {
        assert_eq!(
            window.verify(proposer, &log[0], &crypto),
            Err(QCWindowError::Expired {
                stable: seq(1),
                received: seq(1)
            })
        );
    }
    assert_eq!(window.proposed_len(), 0);
}
