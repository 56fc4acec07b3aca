//! Finalization pipeline
//!
//! Drives one request from input to artifact:
//! digest -> sign -> normalize -> resolve -> assemble -> (broadcast).
//! Every error before broadcast aborts the request and carries the mode and
//! stage it came from. A broadcast failure is recorded in the artifact.

use crate::error::{Mode, Stage, TssResult};
use crate::signing::backend::SigningPort;
use crate::signing::preimage::{build_message_digest, build_transaction_digest};
use crate::signing::recovery::{resolve, resolve_unverified, Recovery};
use crate::tx::assembler::{assemble_transaction, finalize_message};
use crate::tx::broadcaster::{explorer_url, BroadcastPort};
use crate::types::{
    BroadcastOutcome, Digest, MessageArtifact, RawSignature, TransactionArtifact,
    UnsignedTransaction,
};
use crate::utils::to_checksum_address;
use crate::{log_debug, log_info, log_warn};
use ethers_core::types::Address;

const LOG_MODULE: &str = "pipeline";

/// Where and how to broadcast a signed transaction
#[derive(Clone, Copy)]
pub struct Broadcast<'a> {
    pub port: &'a dyn BroadcastPort,
    /// Explorer base URL; falls back to the chain's default
    pub explorer: Option<&'a str>,
}

/// Runs signing requests against one signer and one expected address.
pub struct Finalizer<S> {
    signer: S,
    expected: Option<Address>,
}

impl<S: SigningPort> Finalizer<S> {
    pub fn new(signer: S, expected: Option<Address>) -> Self {
        Self { signer, expected }
    }

    /// Sign a message with the personal-sign prefix.
    pub fn sign_message(&self, message: &[u8]) -> TssResult<MessageArtifact> {
        let digest = build_message_digest(message);
        log_info!(LOG_MODULE, "Signing message", digest = digest, bytes = message.len());

        let (raw, recovery) = self
            .sign_and_resolve(&digest)
            .map_err(|e| e.in_mode(Mode::Message))?;
        Ok(finalize_message(&digest, raw, &recovery))
    }

    /// Sign a legacy transaction and, if asked, broadcast it.
    pub fn sign_transaction(
        &self,
        tx: &UnsignedTransaction,
        broadcast: Option<Broadcast<'_>>,
    ) -> TssResult<TransactionArtifact> {
        let digest = build_transaction_digest(tx);
        log_info!(
            LOG_MODULE,
            "Signing transaction",
            digest = digest,
            chain_id = tx.chain_id,
            nonce = tx.nonce
        );

        let (raw, recovery) = self
            .sign_and_resolve(&digest)
            .map_err(|e| e.in_mode(Mode::Transaction))?;

        let assembled = assemble_transaction(tx, &digest, raw, &recovery)
            .map_err(|e| e.in_mode(Mode::Transaction))?;
        let mut artifact = assembled.artifact;

        if artifact.address_mismatch {
            log_warn!(
                LOG_MODULE,
                "Sender in encoded transaction differs from recovered signer",
                from_address = &artifact.from_address,
                recovered_address = &artifact.recovered_address
            );
        }

        if let Some(broadcast) = broadcast {
            artifact.broadcast = Some(submit(&broadcast, &assembled.encoded, &artifact));
        }

        Ok(artifact)
    }

    /// Obtain a signature and bind it to a recovery id.
    fn sign_and_resolve(&self, digest: &Digest) -> TssResult<(RawSignature, Recovery)> {
        let raw = self.signer.sign(digest).map_err(|e| e.at_stage(Stage::Sign))?;

        // A high-s signature and its low-s twin recover under opposite ids,
        // so the canonical form has to be fixed before resolving.
        let normalized = raw.to_low_s().map_err(|e| e.at_stage(Stage::Resolve))?;
        if normalized != raw {
            log_debug!(LOG_MODULE, "Normalized high-s backend signature");
        }

        let recovery = match &self.expected {
            Some(expected) => resolve(digest, &normalized, expected)?,
            None => {
                let recovery = resolve_unverified(digest, &normalized)?;
                log_warn!(
                    LOG_MODULE,
                    "No expected address configured; signer is unverified",
                    recovered_address = to_checksum_address(recovery.address().as_bytes())
                );
                recovery
            }
        };

        log_debug!(
            LOG_MODULE,
            "Resolved recovery id",
            recovery_id = recovery.recovery_id().as_u8(),
            verified = recovery.is_verified()
        );
        Ok((normalized, recovery))
    }
}

fn submit(broadcast: &Broadcast<'_>, encoded: &[u8], artifact: &TransactionArtifact) -> BroadcastOutcome {
    match broadcast.port.submit(encoded) {
        Ok(tx_hash) => {
            if !tx_hash.eq_ignore_ascii_case(&artifact.transaction_hash) {
                log_warn!(
                    LOG_MODULE,
                    "Node reported a different transaction hash",
                    reported = &tx_hash,
                    computed = &artifact.transaction_hash
                );
            }
            log_info!(LOG_MODULE, "Transaction submitted", tx_hash = &tx_hash);
            let explorer_url = explorer_url(artifact.chain_id, broadcast.explorer, &tx_hash);
            BroadcastOutcome::Submitted {
                tx_hash,
                explorer_url,
            }
        }
        Err(e) => {
            let e = e.in_mode(Mode::Transaction).at_stage(Stage::Broadcast);
            log_warn!(LOG_MODULE, "Broadcast failed", error = &e);
            BroadcastOutcome::Failed {
                error: e.to_string(),
            }
        }
    }
}
