//! Shared types for the TSS signer
//!
//! All data structures that cross module boundaries are defined here so
//! the digest builder, resolver, assembler and CLI agree on one shape.

use crate::error::{TssError, TssResult};
use ethers_core::types::{Address, U256};
use secp256k1::constants::CURVE_ORDER;
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Digest
// =============================================================================

/// The exact 32 bytes handed to the signing backend
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest([u8; 32]);

impl Digest {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

// =============================================================================
// Signatures
// =============================================================================

/// `(r, s)` as returned by the backend, without a recovery id.
///
/// Both scalars are big-endian and lie in `(0, n)`; construction enforces it.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct RawSignature {
    r: [u8; 32],
    s: [u8; 32],
}

impl RawSignature {
    pub fn new(r: [u8; 32], s: [u8; 32]) -> TssResult<Self> {
        check_scalar("r", &r)?;
        check_scalar("s", &s)?;
        Ok(Self { r, s })
    }

    /// Parse a compact `r || s` blob.
    ///
    /// A 65-byte blob is accepted too; its trailing byte is a recovery hint
    /// the backend cannot be trusted on, so it is dropped.
    pub fn from_bytes(bytes: &[u8]) -> TssResult<Self> {
        if bytes.len() != 64 && bytes.len() != 65 {
            return Err(TssError::invalid_signature(format!(
                "Expected 64 or 65 signature bytes, got {}",
                bytes.len()
            )));
        }
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..64]);
        Self::new(r, s)
    }

    pub fn r(&self) -> &[u8; 32] {
        &self.r
    }

    pub fn s(&self) -> &[u8; 32] {
        &self.s
    }

    pub fn to_bytes(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(&self.r);
        out[32..].copy_from_slice(&self.s);
        out
    }

    /// Whether `s <= n/2` (EIP-2)
    pub fn is_low_s(&self) -> bool {
        self.to_low_s().map(|low| low == *self).unwrap_or(false)
    }

    /// The EIP-2 canonical form of this signature (`s` replaced by `n - s`
    /// when it is in the upper half). Flipping `s` flips the recovery id,
    /// so this must run before resolution, never after.
    pub fn to_low_s(&self) -> TssResult<Self> {
        let mut sig = secp256k1::ecdsa::Signature::from_compact(&self.to_bytes())?;
        sig.normalize_s();
        Self::from_bytes(&sig.serialize_compact())
    }
}

impl fmt::Debug for RawSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawSignature")
            .field("r", &hex::encode(self.r))
            .field("s", &hex::encode(self.s))
            .finish()
    }
}

fn check_scalar(name: &str, value: &[u8; 32]) -> TssResult<()> {
    if value.iter().all(|b| *b == 0) {
        return Err(TssError::invalid_signature(format!("{} is zero", name)));
    }
    // Big-endian byte arrays compare like the integers they encode.
    if value.as_slice() >= CURVE_ORDER.as_slice() {
        return Err(TssError::invalid_signature(format!(
            "{} is not below the curve order",
            name
        )));
    }
    Ok(())
}

/// Which of the two candidate public keys a signature belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum RecoveryId {
    Zero,
    One,
}

impl RecoveryId {
    /// Candidates in trial order
    pub const CANDIDATES: [RecoveryId; 2] = [RecoveryId::Zero, RecoveryId::One];

    pub fn as_u8(&self) -> u8 {
        match self {
            RecoveryId::Zero => 0,
            RecoveryId::One => 1,
        }
    }
}

impl From<RecoveryId> for u8 {
    fn from(id: RecoveryId) -> Self {
        id.as_u8()
    }
}

impl TryFrom<u8> for RecoveryId {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(RecoveryId::Zero),
            1 => Ok(RecoveryId::One),
            other => Err(format!("Recovery id must be 0 or 1, got {}", other)),
        }
    }
}

/// A backend signature paired with its resolved recovery id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalizedSignature {
    pub raw: RawSignature,
    pub recovery_id: RecoveryId,
}

impl FinalizedSignature {
    /// Canonical `r || s || v` with `v` in {0, 1}
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&self.raw.to_bytes());
        out[64] = self.recovery_id.as_u8();
        out
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes()))
    }
}

// =============================================================================
// Transactions
// =============================================================================

/// Legacy transaction fields, independent of who signs them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedTransaction {
    pub to: Address,
    pub value: U256,
    pub gas_limit: u64,
    pub gas_price: U256,
    pub nonce: u64,
    pub chain_id: u64,
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
}

impl UnsignedTransaction {
    /// EIP-155 replay protection applies to every non-zero chain id
    pub fn is_replay_protected(&self) -> bool {
        self.chain_id != 0
    }
}

/// An [`UnsignedTransaction`] with the chain-bound `v` and the signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub tx: UnsignedTransaction,
    pub v: u64,
    pub signature: RawSignature,
}

pub type TxId = String;

// =============================================================================
// Artifacts
// =============================================================================

/// Output of message mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageArtifact {
    pub signature: String,
    pub recovered_address: String,
    pub digest_hash: String,
    pub recovery_id: u8,
    pub verified: bool,
}

/// Output of transaction mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionArtifact {
    pub signature: String,
    pub recovered_address: String,
    pub digest_hash: String,
    pub recovery_id: u8,
    pub verified: bool,
    pub chain_id: u64,
    pub v: u64,
    pub signed_transaction: String,
    pub transaction_hash: String,
    pub from_address: String,
    pub address_mismatch: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub broadcast: Option<BroadcastOutcome>,
}

/// What happened when the signed transaction was submitted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BroadcastOutcome {
    Submitted {
        #[serde(rename = "txHash")]
        tx_hash: TxId,
        #[serde(rename = "explorerUrl", skip_serializing_if = "Option::is_none", default)]
        explorer_url: Option<String>,
    },
    Failed {
        error: String,
    },
}

/// Either artifact, serialized without a wrapper
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SignedArtifact {
    Message(MessageArtifact),
    Transaction(TransactionArtifact),
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.trim_start_matches("0x")).map_err(serde::de::Error::custom)
    }
}
