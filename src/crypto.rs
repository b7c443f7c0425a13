/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! [Trait definition](Crypto) for the pluggable signing, verification, and hashing capability, plus
//! the default [ed25519 + SHA-256 implementation](Ed25519Crypto).
//!
//! The sequencing engine never implements cryptography itself. It signs pre-order digests when it
//! votes, verifies votes and proof-certs, and hashes commands and pre-order headers, all through
//! this trait. Every call is assumed to be synchronous and CPU-bound.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier};
use sha2::{Digest, Sha256};

use crate::types::{
    basic::{CryptoHash, ProofCerts, ReplicaID, SignatureBytes},
    replica_set::ReplicaSet,
};

pub trait Crypto: Clone + Send {
    /// Digest arbitrary bytes.
    fn hash(&self, bytes: &[u8]) -> CryptoHash;

    /// Sign `message` as the local replica.
    fn sign(&self, message: &[u8]) -> SignatureBytes;

    /// Check that `signature` is `signer`'s signature over `message`. Returns `false` if `signer`
    /// is unknown.
    fn verify(&self, signer: ReplicaID, message: &[u8], signature: &SignatureBytes) -> bool;

    /// Check that `proof_certs` holds at least `quorum` signatures over `message`, and that every
    /// one of them is valid.
    fn verify_proof_certs(
        &self,
        message: &[u8],
        proof_certs: &ProofCerts,
        quorum: usize,
    ) -> Result<(), ProofCertsError> {
        if proof_certs.len() < quorum {
            return Err(ProofCertsError::NotEnoughSignatures {
                collected: proof_certs.len(),
                required: quorum,
            });
        }

        for (signer, signature) in proof_certs.iter() {
            if !self.verify(*signer, message, signature) {
                return Err(ProofCertsError::InvalidSignature { signer: *signer });
            }
        }

        Ok(())
    }
}

/// The different ways a set of proof-certs can fail verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProofCertsError {
    /// Fewer distinct signers than the quorum.
    NotEnoughSignatures { collected: usize, required: usize },

    /// The signature of `signer` does not verify, or `signer` is not in the replica set.
    InvalidSignature { signer: ReplicaID },
}

/// Signs with an ed25519 [`SigningKey`] and hashes with SHA-256. Verifying keys of the other
/// replicas come from a [`ReplicaSet`].
#[derive(Clone)]
pub struct Ed25519Crypto {
    signing_key: SigningKey,
    replica_set: ReplicaSet,
}

impl Ed25519Crypto {
    pub fn new(signing_key: SigningKey, replica_set: ReplicaSet) -> Self {
        Self {
            signing_key,
            replica_set,
        }
    }

    /// The ID under which the local signing key is registered in the replica set, if it is.
    pub fn me(&self) -> Option<ReplicaID> {
        self.replica_set.position(&self.signing_key.verifying_key())
    }

    pub fn replica_set(&self) -> &ReplicaSet {
        &self.replica_set
    }
}

impl Crypto for Ed25519Crypto {
    fn hash(&self, bytes: &[u8]) -> CryptoHash {
        CryptoHash::new(Sha256::digest(bytes).into())
    }

    fn sign(&self, message: &[u8]) -> SignatureBytes {
        SignatureBytes::new(self.signing_key.sign(message).to_bytes())
    }

    fn verify(&self, signer: ReplicaID, message: &[u8], signature: &SignatureBytes) -> bool {
        match self.replica_set.verifying_key(&signer) {
            Some(verifying_key) => verifying_key
                .verify(message, &Signature::from_bytes(&signature.bytes()))
                .is_ok(),
            None => false,
        }
    }
}
