//! Transaction Module
//!
//! Assembles signed legacy transactions and, optionally, broadcasts them.

pub mod assembler;
pub mod broadcaster;

pub use assembler::{
    apply_signature, assemble_transaction, chain_v, extract_sender, finalize_message, serialize,
    AssembledTransaction,
};
pub use broadcaster::{explorer_url, BroadcastPort, RpcBroadcaster};
