use multilog_rs::{
    crypto::Crypto,
    local_log::{LocalLog, LocalLogError},
    types::{
        basic::ReplicaID,
        messages::{PreOrder, Vote},
    },
};

mod common;

use crate::common::cluster::{id, seq, Cluster};

fn vote(cluster: &Cluster, voter: ReplicaID, pre_order: &PreOrder) -> Vote {
    Vote {
        author: voter,
        digest: pre_order.digest,
        signature: cluster.crypto(voter).sign(&pre_order.digest.bytes()),
    }
}

#[test]
fn pre_orders_are_numbered_and_chained_test() {
    let cluster = Cluster::new(4);
    let mut local_log = LocalLog::new(id(1), cluster.quorum(), cluster.crypto(id(1)), None);

    let first = local_log.generate_pre_order(cluster.command("first").digest);
    let second = local_log.generate_pre_order(cluster.command("second").digest);

    assert_eq!(first.sequence, seq(1));
    assert_eq!(second.sequence, seq(2));
    assert_eq!(first.author, id(1));
    assert!(first.is_digest_correct(&cluster.crypto(id(2))));
    assert_eq!(local_log.pending_len(), 2);

    for voter in 2..=3 {
        local_log.collect_vote(vote(&cluster, id(voter), &first)).unwrap();
    }
    let mut second_qc = None;
    for voter in 2..=3 {
        second_qc = local_log.collect_vote(vote(&cluster, id(voter), &second)).unwrap();
    }

    let second_qc = second_qc.unwrap();
    assert_eq!(second_qc.parent_digest, Some(first.digest));
}

#[test]
fn certificate_forms_at_quorum_test() {
    let cluster = Cluster::new(4);
    let mut local_log = LocalLog::new(id(1), cluster.quorum(), cluster.crypto(id(1)), None);
    let pre_order = local_log.generate_pre_order(cluster.command("command").digest);

    // The local signature counts towards the quorum of three.
    assert_eq!(local_log.collect_vote(vote(&cluster, id(2), &pre_order)), Ok(None));
    // Duplicate votes do not.
    assert_eq!(local_log.collect_vote(vote(&cluster, id(2), &pre_order)), Ok(None));

    let qc = local_log
        .collect_vote(vote(&cluster, id(4), &pre_order))
        .unwrap()
        .unwrap();
    assert_eq!(qc.pre_order, pre_order);
    assert_eq!(qc.parent_digest, None);
    assert_eq!(qc.proof_certs.len(), 3);
    assert!(qc.proof_certs.contains(&id(1)));
    assert!(qc.is_correct(&cluster.crypto(id(3)), cluster.quorum()));
    assert_eq!(local_log.pending_len(), 0);

    // Late votes are ignored once the certificate is complete.
    assert_eq!(local_log.collect_vote(vote(&cluster, id(3), &pre_order)), Ok(None));
}

#[test]
fn invalid_votes_are_rejected_test() {
    let cluster = Cluster::new(4);
    let mut local_log = LocalLog::new(id(1), cluster.quorum(), cluster.crypto(id(1)), None);
    let pre_order = local_log.generate_pre_order(cluster.command("command").digest);

    let mut forged = vote(&cluster, id(2), &pre_order);
    forged.author = id(3);
    assert_eq!(
        local_log.collect_vote(forged),
        Err(LocalLogError::InvalidSignature {
            voter: id(3),
            sequence: seq(1)
        })
    );

    let mut unknown = vote(&cluster, id(2), &pre_order);
    unknown.author = id(7);
    assert_eq!(
        local_log.collect_vote(unknown),
        Err(LocalLogError::InvalidSignature {
            voter: id(7),
            sequence: seq(1)
        })
    );

    // Votes for pre-orders that were never generated are ignored.
    let elsewhere = cluster.pre_order(id(2), 1, &cluster.command("elsewhere"));
    assert_eq!(local_log.collect_vote(vote(&cluster, id(3), &elsewhere)), Ok(None));
}
