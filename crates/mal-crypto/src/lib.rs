//! Cryptographic core for the Merkle Anchor Ledger.
//!
//! Provides the leaf/node hash primitive, the sorted-pair binary Merkle tree
//! with inclusion proofs, and the codec that turns proof paths into storable
//! rows and back.
//!
//! All hashing wraps established libraries (`sha2`, `blake3`); no custom
//! cryptography.

pub mod codec;
pub mod hasher;
pub mod merkle;

pub use codec::{CodecError, ProofCodec};
pub use hasher::{Blake3Hash, HashAlgorithm, HashPrimitive, Sha256Hash};
pub use merkle::{fold_path, MerkleError, MerkleProof, MerkleTree, ProofStep};
