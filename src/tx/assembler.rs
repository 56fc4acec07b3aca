//! Signed Artifact Assembly
//!
//! Binds a resolved signature to its payload. Message mode is a plain
//! `r || s || v` proof. Transaction mode re-encodes `v` for the chain,
//! serializes the legacy RLP, and then reads the sender back out of those
//! bytes with an independent decoder so that what is reported is what the
//! network will see.

use crate::error::{Stage, TssError, TssResult};
use crate::signing::preimage::unsigned_fields;
use crate::signing::rlp;
use crate::signing::Recovery;
use crate::types::{
    Digest, FinalizedSignature, MessageArtifact, RawSignature, RecoveryId, SignedTransaction,
    TransactionArtifact, UnsignedTransaction,
};
use crate::utils::{keccak256, to_checksum_address};
use ethers_core::types::transaction::eip2718::TypedTransaction;
use ethers_core::types::Address;
use ethers_core::utils::rlp::Rlp;

/// Build the message-mode artifact.
pub fn finalize_message(digest: &Digest, raw: RawSignature, recovery: &Recovery) -> MessageArtifact {
    let finalized = recovery.finalize(raw);
    MessageArtifact {
        signature: finalized.to_hex(),
        recovered_address: to_checksum_address(recovery.address().as_bytes()),
        digest_hash: digest.to_hex(),
        recovery_id: recovery.recovery_id().as_u8(),
        verified: recovery.is_verified(),
    }
}

/// Chain-bound `v` for a legacy transaction.
///
/// EIP-155: `35 + 2 * chainId + recoveryId`. Chain id 0 carries no replay
/// protection and uses the Homestead `27 + recoveryId`.
pub fn chain_v(chain_id: u64, recovery_id: RecoveryId) -> TssResult<u64> {
    let id = u64::from(recovery_id.as_u8());
    if chain_id == 0 {
        return Ok(27 + id);
    }
    chain_id
        .checked_mul(2)
        .and_then(|v| v.checked_add(35))
        .and_then(|v| v.checked_add(id))
        .ok_or_else(|| {
            TssError::encoding(format!("Chain id {} is too large to encode v", chain_id))
                .at_stage(Stage::ApplySignature)
        })
}

/// Attach a finalized signature to a transaction.
pub fn apply_signature(
    tx: &UnsignedTransaction,
    signature: &FinalizedSignature,
) -> TssResult<SignedTransaction> {
    let v = chain_v(tx.chain_id, signature.recovery_id)?;
    Ok(SignedTransaction {
        tx: tx.clone(),
        v,
        signature: signature.raw,
    })
}

/// Canonical legacy encoding:
/// `RLP([nonce, gasPrice, gasLimit, to, value, data, v, r, s])`.
pub fn serialize(signed: &SignedTransaction) -> Vec<u8> {
    let mut items = unsigned_fields(&signed.tx);
    items.push(rlp::encode_u64(signed.v));
    items.push(rlp::encode_uint_bytes(signed.signature.r()));
    items.push(rlp::encode_uint_bytes(signed.signature.s()));
    rlp::encode_list(&items)
}

/// Decode an encoded legacy transaction and recover its sender.
///
/// Uses the ethers decoder rather than our encoder's inverse, and derives
/// the sighash rule from `v` the way a node does.
pub fn extract_sender(encoded: &[u8]) -> TssResult<Address> {
    let rlp = Rlp::new(encoded);
    let (mut typed, signature) = TypedTransaction::decode_signed(&rlp).map_err(|e| {
        TssError::encoding(format!("Cannot decode signed transaction: {}", e))
            .at_stage(Stage::ExtractSender)
    })?;

    let TypedTransaction::Legacy(ref mut request) = typed else {
        return Err(TssError::encoding("Encoded transaction is not a legacy transaction")
            .at_stage(Stage::ExtractSender));
    };
    request.chain_id = match signature.v {
        27 | 28 => None,
        v if v >= 35 => Some(((v - 35) / 2).into()),
        v => {
            return Err(TssError::encoding(format!("Unexpected v value {}", v))
                .at_stage(Stage::ExtractSender))
        }
    };

    signature.recover(typed.sighash()).map_err(|e| {
        TssError::invalid_signature(format!("Sender recovery failed: {}", e))
            .at_stage(Stage::ExtractSender)
    })
}

/// A transaction artifact together with the bytes it describes
#[derive(Debug, Clone)]
pub struct AssembledTransaction {
    pub artifact: TransactionArtifact,
    pub encoded: Vec<u8>,
}

/// Run the transaction-mode steps and build the artifact.
///
/// A sender that differs from the resolver's address is reported through
/// `address_mismatch`, with both addresses kept.
pub fn assemble_transaction(
    tx: &UnsignedTransaction,
    digest: &Digest,
    raw: RawSignature,
    recovery: &Recovery,
) -> TssResult<AssembledTransaction> {
    let finalized = recovery.finalize(raw);
    let signed = apply_signature(tx, &finalized)?;
    let encoded = serialize(&signed);
    let sender = extract_sender(&encoded)?;

    let artifact = TransactionArtifact {
        signature: finalized.to_hex(),
        recovered_address: to_checksum_address(recovery.address().as_bytes()),
        digest_hash: digest.to_hex(),
        recovery_id: recovery.recovery_id().as_u8(),
        verified: recovery.is_verified(),
        chain_id: tx.chain_id,
        v: signed.v,
        signed_transaction: format!("0x{}", hex::encode(&encoded)),
        transaction_hash: format!("0x{}", hex::encode(keccak256(&encoded))),
        from_address: to_checksum_address(sender.as_bytes()),
        address_mismatch: sender != recovery.address(),
        broadcast: None,
    };
    Ok(AssembledTransaction { artifact, encoded })
}
