//! External Signature Finalization
//!
//! This module turns an opaque threshold signature into something a chain
//! will accept:
//! 1. Build the digest the backend signs (message or legacy transaction)
//! 2. Obtain `(r, s)` from a signing backend
//! 3. Recover the missing recovery id against the expected signer

pub mod backend;
pub mod preimage;
pub mod recovery;
pub mod rlp;

pub use backend::{LocalKeySigner, RemoteSigner, SigningPort};
pub use preimage::{build_message_digest, build_transaction_digest};
pub use recovery::{resolve, resolve_unverified, Recovery};
