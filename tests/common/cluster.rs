use ed25519_dalek::SigningKey;
use multilog_rs::{
    crypto::{Crypto, Ed25519Crypto},
    types::{
        basic::{CryptoHash, ProofCerts, ReplicaID, SequenceNumber},
        messages::{Command, PreOrder, QuorumCert},
        replica_set::ReplicaSet,
    },
};
use rand_core::OsRng;

/// Signing keys of `n` replicas, with replica `i + 1` holding the `i`-th key.
pub(crate) struct Cluster {
    signing_keys: Vec<SigningKey>,
    replica_set: ReplicaSet,
}

impl Cluster {
    pub(crate) fn new(n: usize) -> Cluster {
        let mut csprg = OsRng {};
        let signing_keys: Vec<SigningKey> = (0..n).map(|_| SigningKey::generate(&mut csprg)).collect();
        let replica_set =
            ReplicaSet::from_verifying_keys(signing_keys.iter().map(|key| key.verifying_key()));

        Cluster {
            signing_keys,
            replica_set,
        }
    }

    pub(crate) fn replica_set(&self) -> &ReplicaSet {
        &self.replica_set
    }

    pub(crate) fn quorum(&self) -> usize {
        self.replica_set.quorum()
    }

    pub(crate) fn signing_key(&self, replica: ReplicaID) -> SigningKey {
        self.signing_keys[replica.int() as usize - 1].clone()
    }

    pub(crate) fn crypto(&self, replica: ReplicaID) -> Ed25519Crypto {
        Ed25519Crypto::new(self.signing_key(replica), self.replica_set.clone())
    }

    pub(crate) fn command(&self, payload: &str) -> Command {
        Command::new(payload.as_bytes().to_vec(), &self.crypto(id(1)))
    }

    pub(crate) fn pre_order(&self, author: ReplicaID, sequence: u64, command: &Command) -> PreOrder {
        PreOrder::new(
            author,
            SequenceNumber::new(sequence),
            command.digest,
            &self.crypto(author),
        )
    }

    /// Certify `pre_order` with the signatures of the first `signers` replicas.
    pub(crate) fn certify(
        &self,
        pre_order: &PreOrder,
        parent_digest: Option<CryptoHash>,
        signers: usize,
    ) -> QuorumCert {
        let proof_certs: ProofCerts = (1..=signers as u64)
            .map(|signer| {
                let signer = id(signer);
                (signer, self.crypto(signer).sign(&pre_order.digest.bytes()))
            })
            .collect();

        QuorumCert {
            pre_order: pre_order.clone(),
            proof_certs,
            parent_digest,
        }
    }

    /// The certified log of `author` with one entry per command, in order.
    pub(crate) fn log(&self, author: ReplicaID, commands: &[Command]) -> Vec<QuorumCert> {
        let mut parent_digest = None;
        commands
            .iter()
            .enumerate()
            .map(|(i, command)| {
                let pre_order = self.pre_order(author, i as u64 + 1, command);
                let qc = self.certify(&pre_order, parent_digest, self.quorum());
                parent_digest = Some(qc.digest());
                qc
            })
            .collect()
    }
}

pub(crate) fn id(int: u64) -> ReplicaID {
    ReplicaID::new(int)
}

pub(crate) fn seq(int: u64) -> SequenceNumber {
    SequenceNumber::new(int)
}
