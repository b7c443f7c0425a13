/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Verification of remote replicas' logs.
//!
//! Every remote author gets its own [`ReplicaLogVerifier`](verifier::ReplicaLogVerifier), owned by
//! a dedicated [worker thread](worker). The verifier votes for the author's pre-orders, checks the
//! author's quorum certificates, and forwards the certificates to a
//! [`CertificateSink`](verifier::CertificateSink) (normally the
//! [sequence pool](crate::sequence_pool)) strictly in sequence order.

pub mod types;

pub mod verifier;

pub(crate) mod worker;
