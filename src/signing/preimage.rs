//! Pre-Image Hash Generation
//!
//! Produces the exact 32 bytes the threshold backend signs. If these bytes
//! differ from what the verifying side hashes, recovery will never land on
//! the expected address, so both builders are pure and deterministic.

use super::rlp;
use crate::types::{Digest, UnsignedTransaction};
use crate::utils::keccak256;

/// Ethereum message prefix for personal_sign (EIP-191 version 0x45)
const ETH_MESSAGE_PREFIX: &str = "\x19Ethereum Signed Message:\n";

/// Hash a message with the Ethereum personal sign prefix.
///
/// `keccak256("\x19Ethereum Signed Message:\n" || len(message) || message)`,
/// where the length is the decimal byte count.
pub fn build_message_digest(message: &[u8]) -> Digest {
    let prefix = format!("{}{}", ETH_MESSAGE_PREFIX, message.len());
    let mut data = Vec::with_capacity(prefix.len() + message.len());
    data.extend_from_slice(prefix.as_bytes());
    data.extend_from_slice(message);
    Digest::from_bytes(keccak256(&data))
}

/// Signing hash of a legacy transaction.
///
/// With a non-zero chain id this is the EIP-155 hash over
/// `[nonce, gasPrice, gasLimit, to, value, data, chainId, 0, 0]`. Chain id 0
/// means no replay protection and hashes only the first six fields, which
/// is what nodes recompute for a `v` of 27/28.
///
/// Every field of [`UnsignedTransaction`] is representable in RLP, so this
/// cannot fail.
pub fn build_transaction_digest(tx: &UnsignedTransaction) -> Digest {
    let mut items = unsigned_fields(tx);

    if tx.is_replay_protected() {
        items.push(rlp::encode_u64(tx.chain_id));
        items.push(rlp::encode_u64(0)); // r placeholder
        items.push(rlp::encode_u64(0)); // s placeholder
    }

    let encoded = rlp::encode_list(&items);
    Digest::from_bytes(keccak256(&encoded))
}

/// The six fields shared by the signing payload and the signed encoding
pub(crate) fn unsigned_fields(tx: &UnsignedTransaction) -> Vec<Vec<u8>> {
    vec![
        rlp::encode_u64(tx.nonce),
        rlp::encode_u256(&tx.gas_price),
        rlp::encode_u64(tx.gas_limit),
        rlp::encode_bytes(tx.to.as_bytes()),
        rlp::encode_u256(&tx.value),
        rlp::encode_bytes(&tx.data),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::parse_address;
    use ethers_core::types::transaction::eip2718::TypedTransaction;
    use ethers_core::types::{TransactionRequest, U256};

    fn scenario_b() -> UnsignedTransaction {
        UnsignedTransaction {
            to: parse_address("0x742d35Cc6634C0532925a3b8D4C9db96C4b4d8b6").unwrap(),
            value: U256::exp10(18),
            gas_limit: 21000,
            gas_price: U256::from(20_000_000_000u64),
            nonce: 5,
            chain_id: 1,
            data: vec![],
        }
    }

    fn ethers_sighash(tx: &UnsignedTransaction) -> [u8; 32] {
        let mut request = TransactionRequest::new()
            .to(tx.to)
            .value(tx.value)
            .gas(tx.gas_limit)
            .gas_price(tx.gas_price)
            .nonce(tx.nonce)
            .data(tx.data.clone());
        if tx.chain_id != 0 {
            request = request.chain_id(tx.chain_id);
        }
        TypedTransaction::Legacy(request).sighash().0
    }

    #[test]
    fn test_message_digest_known_vector() {
        // keccak256("\x19Ethereum Signed Message:\n11Hello World")
        let digest = build_message_digest(b"Hello World");
        assert_eq!(
            hex::encode(digest.as_bytes()),
            "a1de988600a42c4b4ab089b619297c17d53cffae5d5120d82d8a92d0bb3b78f2"
        );
    }

    #[test]
    fn test_message_digest_uses_byte_length() {
        let text = "Hello 世界";
        let expected = {
            let mut data = format!("{}{}", ETH_MESSAGE_PREFIX, text.len()).into_bytes();
            data.extend_from_slice(text.as_bytes());
            keccak256(&data)
        };
        assert_eq!(build_message_digest(text.as_bytes()).as_bytes(), &expected);
    }

    #[test]
    fn test_message_digest_deterministic() {
        assert_eq!(build_message_digest(b"123456789"), build_message_digest(b"123456789"));
        assert_ne!(build_message_digest(b"123456789"), build_message_digest(b"12345678"));
    }

    #[test]
    fn test_transaction_digest_matches_ethers() {
        let tx = scenario_b();
        let digest = build_transaction_digest(&tx);
        assert_eq!(digest.as_bytes(), &ethers_sighash(&tx));
    }

    #[test]
    fn test_transaction_digest_with_payload_matches_ethers() {
        let mut tx = scenario_b();
        tx.chain_id = 11155111;
        tx.data = vec![0xa9, 0x05, 0x9c, 0xbb].repeat(20);
        tx.value = U256::zero();
        let digest = build_transaction_digest(&tx);
        assert_eq!(digest.as_bytes(), &ethers_sighash(&tx));
    }

    #[test]
    fn test_unprotected_digest_matches_ethers() {
        let mut tx = scenario_b();
        tx.chain_id = 0;
        let digest = build_transaction_digest(&tx);
        assert_eq!(digest.as_bytes(), &ethers_sighash(&tx));
    }

    #[test]
    fn test_chain_id_changes_digest() {
        let mainnet = build_transaction_digest(&scenario_b());
        let mut other = scenario_b();
        other.chain_id = 5;
        assert_ne!(mainnet, build_transaction_digest(&other));
    }
}
