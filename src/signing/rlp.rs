//! Minimal RLP encoder for legacy transaction payloads.
//!
//! Integers are encoded big-endian with leading zeros stripped; zero is the
//! empty string (`0x80`).

use ethers_core::types::U256;

pub fn encode_u64(val: u64) -> Vec<u8> {
    encode_uint_bytes(&val.to_be_bytes())
}

pub fn encode_u256(val: &U256) -> Vec<u8> {
    let mut bytes = [0u8; 32];
    val.to_big_endian(&mut bytes);
    encode_uint_bytes(&bytes)
}

/// Encode a big-endian unsigned integer given as raw bytes
pub fn encode_uint_bytes(be: &[u8]) -> Vec<u8> {
    let leading_zeros = be.iter().take_while(|&&b| b == 0).count();
    encode_bytes(&be[leading_zeros..])
}

pub fn encode_bytes(data: &[u8]) -> Vec<u8> {
    if data.len() == 1 && data[0] < 0x80 {
        return data.to_vec();
    }

    if data.len() < 56 {
        let mut result = vec![0x80 + data.len() as u8];
        result.extend_from_slice(data);
        result
    } else {
        let len_bytes = encode_length(data.len());
        let mut result = vec![0xb7 + len_bytes.len() as u8];
        result.extend_from_slice(&len_bytes);
        result.extend_from_slice(data);
        result
    }
}

pub fn encode_list(items: &[Vec<u8>]) -> Vec<u8> {
    let payload: Vec<u8> = items.concat();

    if payload.len() < 56 {
        let mut result = vec![0xc0 + payload.len() as u8];
        result.extend_from_slice(&payload);
        result
    } else {
        let len_bytes = encode_length(payload.len());
        let mut result = vec![0xf7 + len_bytes.len() as u8];
        result.extend_from_slice(&len_bytes);
        result.extend_from_slice(&payload);
        result
    }
}

fn encode_length(len: usize) -> Vec<u8> {
    let bytes = len.to_be_bytes();
    let leading_zeros = bytes.iter().take_while(|&&b| b == 0).count();
    bytes[leading_zeros..].to_vec()
}
