//! Recovery-id resolution
//!
//! The threshold backend returns `(r, s)` without the bit that says which of
//! the two candidate public keys produced it. We try both candidates and
//! keep the one whose address equals the address we already expect; any
//! other outcome is an error, never a guess.

use crate::error::{Stage, TssError, TssResult};
use crate::types::{Digest, FinalizedSignature, RawSignature, RecoveryId};
use crate::utils::crypto::address_from_secp_key;
use crate::utils::to_checksum_address;
use ethers_core::types::Address;
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId as SecpRecoveryId};
use secp256k1::{Message, Secp256k1};

/// A resolved recovery id and the address it recovers to.
///
/// Only this module can build one, so `is_verified()` cannot be faked by
/// callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recovery {
    recovery_id: RecoveryId,
    address: Address,
    verified: bool,
}

impl Recovery {
    pub fn recovery_id(&self) -> RecoveryId {
        self.recovery_id
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// `true` only when the address was checked against an expected signer
    pub fn is_verified(&self) -> bool {
        self.verified
    }

    pub fn finalize(&self, raw: RawSignature) -> FinalizedSignature {
        FinalizedSignature {
            raw,
            recovery_id: self.recovery_id,
        }
    }
}

/// Recover the address for one candidate, or `None` if recovery is
/// mathematically impossible for it.
pub fn recover_candidate(
    digest: &Digest,
    signature: &RawSignature,
    candidate: RecoveryId,
) -> Option<Address> {
    let secp = Secp256k1::verification_only();
    let msg = Message::from_digest(*digest.as_bytes());
    let rec_id = SecpRecoveryId::from_i32(i32::from(candidate.as_u8())).ok()?;
    let recoverable = RecoverableSignature::from_compact(&signature.to_bytes(), rec_id).ok()?;
    let public_key = secp.recover_ecdsa(&msg, &recoverable).ok()?;
    Some(address_from_secp_key(&public_key))
}

/// Find the single candidate that recovers to `expected`.
///
/// Both candidates are always evaluated so that a double match is detected
/// rather than resolved by trial order.
pub fn resolve(
    digest: &Digest,
    signature: &RawSignature,
    expected: &Address,
) -> TssResult<Recovery> {
    let recovered: Vec<(RecoveryId, Option<Address>)> = RecoveryId::CANDIDATES
        .iter()
        .map(|&candidate| (candidate, recover_candidate(digest, signature, candidate)))
        .collect();

    if recovered.iter().all(|(_, address)| address.is_none()) {
        return Err(TssError::invalid_signature(
            "Public key recovery failed for every candidate",
        )
        .at_stage(Stage::Resolve));
    }

    let matches: Vec<RecoveryId> = recovered
        .iter()
        .filter(|(_, address)| address.as_ref() == Some(expected))
        .map(|(candidate, _)| *candidate)
        .collect();

    match matches.as_slice() {
        [recovery_id] => Ok(Recovery {
            recovery_id: *recovery_id,
            address: *expected,
            verified: true,
        }),
        [] => {
            let seen = recovered
                .iter()
                .map(|(candidate, address)| match address {
                    Some(a) => format!("{}=>{}", candidate.as_u8(), to_checksum_address(a.as_bytes())),
                    None => format!("{}=>none", candidate.as_u8()),
                })
                .collect::<Vec<_>>()
                .join(", ");
            Err(TssError::signer_mismatch(format!(
                "No recovery candidate matches expected signer {} (recovered: {}); \
                 the digest or the backend key does not match",
                to_checksum_address(expected.as_bytes()),
                seen
            ))
            .at_stage(Stage::Resolve))
        }
        _ => Err(TssError::signer_mismatch(format!(
            "Both recovery candidates match {}; refusing to pick one",
            to_checksum_address(expected.as_bytes())
        ))
        .at_stage(Stage::Resolve)),
    }
}

/// Resolve without an expected signer.
///
/// Picks candidate 0, or candidate 1 when 0 cannot recover at all, and marks
/// the result unverified. Callers must surface that flag.
pub fn resolve_unverified(digest: &Digest, signature: &RawSignature) -> TssResult<Recovery> {
    RecoveryId::CANDIDATES
        .iter()
        .find_map(|&candidate| {
            recover_candidate(digest, signature, candidate).map(|address| Recovery {
                recovery_id: candidate,
                address,
                verified: false,
            })
        })
        .ok_or_else(|| {
            TssError::invalid_signature("Public key recovery failed for every candidate")
                .at_stage(Stage::Resolve)
        })
}
