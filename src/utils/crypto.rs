//! Crypto and parsing helpers shared by the digest builder, the resolver and
//! the assembler.

use crate::error::{TssError, TssResult};
use ethers_core::types::{Address, U256};
use tiny_keccak::{Hasher, Keccak};

/// Keccak256 hash (used for Ethereum addresses and digests)
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut out = [0u8; 32];
    hasher.finalize(&mut out);
    out
}

/// Convert raw address bytes to checksummed Ethereum address (EIP-55)
pub fn to_checksum_address(address: &[u8]) -> String {
    let lower = hex::encode(address);
    let hash = keccak256(lower.as_bytes());

    let mut result = String::from("0x");
    for (i, ch) in lower.chars().enumerate() {
        let byte = hash[i / 2];
        let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };

        if ch.is_ascii_digit() {
            result.push(ch);
        } else if nibble >= 8 {
            result.push(ch.to_ascii_uppercase());
        } else {
            result.push(ch);
        }
    }

    result
}

/// Derive the Ethereum address of a secp256k1 public key.
///
/// Accepts 33-byte compressed or 65-byte uncompressed SEC1 encodings.
pub fn address_from_public_key(public_key: &[u8]) -> TssResult<Address> {
    let key = secp256k1::PublicKey::from_slice(public_key)
        .map_err(|e| TssError::invalid_input(format!("Invalid public key: {}", e)))?;
    Ok(address_from_secp_key(&key))
}

pub(crate) fn address_from_secp_key(key: &secp256k1::PublicKey) -> Address {
    let uncompressed = key.serialize_uncompressed();
    let hash = keccak256(&uncompressed[1..]);
    Address::from_slice(&hash[12..])
}

/// Decode a hex string with or without a `0x` prefix
pub fn parse_hex_bytes(hex_str: &str) -> TssResult<Vec<u8>> {
    let cleaned = hex_str
        .trim()
        .trim_start_matches("0x")
        .trim_start_matches("0X");
    hex::decode(cleaned)
        .map_err(|e| TssError::invalid_input(format!("Invalid hex '{}': {}", hex_str, e)))
}

/// Parse a 20-byte address. Checksum casing is not enforced.
pub fn parse_address(input: &str) -> TssResult<Address> {
    let bytes = parse_hex_bytes(input)?;
    if bytes.len() != 20 {
        return Err(TssError::invalid_input(format!(
            "Address must be 20 bytes, got {} ('{}')",
            bytes.len(),
            input
        )));
    }
    Ok(Address::from_slice(&bytes))
}

/// Parse an unsigned quantity given in decimal or `0x` hex.
///
/// Malformed text is `InvalidInput`; a well-formed number that does not fit
/// in 256 bits is an `EncodingError`, since no canonical encoding exists.
pub fn parse_quantity(field: &str, input: &str) -> TssResult<U256> {
    let trimmed = input.trim();

    if let Some(hex_digits) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        if hex_digits.is_empty() || !hex_digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TssError::invalid_input(format!(
                "{}: '{}' is not a hex quantity",
                field, input
            )));
        }
        if hex_digits.trim_start_matches('0').len() > 64 {
            return Err(TssError::encoding(format!(
                "{}: '{}' exceeds 256 bits",
                field, input
            )));
        }
        return U256::from_str_radix(hex_digits, 16)
            .map_err(|e| TssError::invalid_input(format!("{}: {}", field, e)));
    }

    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Err(TssError::invalid_input(format!(
            "{}: '{}' is not a decimal quantity",
            field, input
        )));
    }

    U256::from_dec_str(trimmed)
        .map_err(|_| TssError::encoding(format!("{}: '{}' exceeds 256 bits", field, input)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_keccak256_empty() {
        let hash = keccak256(b"");
        assert_eq!(
            hex::encode(hash),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_checksum_address() {
        let addr_bytes = hex::decode("5aaeb6053f3e94c9b9a09f33669435e7ef1beaed").unwrap();
        assert_eq!(
            to_checksum_address(&addr_bytes),
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"
        );
    }

    #[test]
    fn test_address_from_public_key_both_encodings() {
        let secp = secp256k1::Secp256k1::new();
        let secret = secp256k1::SecretKey::from_slice(
            &hex::decode("ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80")
                .unwrap(),
        )
        .unwrap();
        let public = secp256k1::PublicKey::from_secret_key(&secp, &secret);

        let from_compressed = address_from_public_key(&public.serialize()).unwrap();
        let from_uncompressed =
            address_from_public_key(&public.serialize_uncompressed()).unwrap();

        assert_eq!(from_compressed, from_uncompressed);
        assert_eq!(
            to_checksum_address(from_compressed.as_bytes()),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
        );
    }

    #[test]
    fn test_parse_address() {
        let addr = parse_address("0x742d35Cc6634C0532925a3b8D4C9db96C4b4d8b6").unwrap();
        assert_eq!(hex::encode(addr.as_bytes()), "742d35cc6634c0532925a3b8d4c9db96c4b4d8b6");
        assert!(parse_address("0x1234").is_err());
        assert!(parse_address("not-an-address").is_err());
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(
            parse_quantity("value", "1000000000000000000").unwrap(),
            U256::exp10(18)
        );
        assert_eq!(parse_quantity("gas_price", "0x4a817c800").unwrap(), U256::from(20_000_000_000u64));
        assert_eq!(parse_quantity("value", "0").unwrap(), U256::zero());

        let garbage = parse_quantity("value", "12abc").unwrap_err();
        assert_eq!(garbage.code, ErrorCode::InvalidInput);

        let too_big = format!("0x1{}", "0".repeat(64));
        let overflow = parse_quantity("value", &too_big).unwrap_err();
        assert_eq!(overflow.code, ErrorCode::EncodingError);

        let dec_overflow = parse_quantity("value", &"9".repeat(80)).unwrap_err();
        assert_eq!(dec_overflow.code, ErrorCode::EncodingError);
    }
}
