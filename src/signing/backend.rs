//! Signing Backends
//!
//! A [`SigningPort`] turns a 32-byte digest into `(r, s)`. The production
//! implementation talks to the threshold-signing service over HTTP; the
//! local one holds a single secp256k1 key and exists for development and
//! tests. Neither returns a recovery id.

use crate::config::BackendConfig;
use crate::error::{Stage, TssError, TssResult};
use crate::types::{Digest, RawSignature};
use crate::utils::crypto::address_from_secp_key;
use crate::utils::parse_hex_bytes;
use crate::{log_debug, log_warn};
use ethers_core::types::Address;
use reqwest::blocking::Client;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use zeroize::Zeroizing;

const LOG_MODULE: &str = "backend";

/// Anything that can produce a signature over a digest.
///
/// Implementations may block; the bound on that is their own timeout. They
/// must not retry on their own.
pub trait SigningPort {
    fn sign(&self, digest: &Digest) -> TssResult<RawSignature>;
}

impl<T: SigningPort + ?Sized> SigningPort for Box<T> {
    fn sign(&self, digest: &Digest) -> TssResult<RawSignature> {
        (**self).sign(digest)
    }
}

impl<T: SigningPort + ?Sized> SigningPort for &T {
    fn sign(&self, digest: &Digest) -> TssResult<RawSignature> {
        (**self).sign(digest)
    }
}

// =============================================================================
// Remote threshold backend
// =============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignRequest<'a> {
    digest: String,
    vault: &'a str,
    channel_id: &'a str,
    channel_password: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct SignResponse {
    signature: Option<String>,
    r: Option<String>,
    s: Option<String>,
    error: Option<String>,
}

/// HTTP client for the threshold signing service
pub struct RemoteSigner {
    url: String,
    vault: String,
    channel_id: String,
    password: SecretString,
    channel_password: SecretString,
    timeout: Duration,
    client: Client,
}

impl RemoteSigner {
    pub fn new(config: BackendConfig) -> TssResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout.min(Duration::from_secs(10)))
            .build()
            .map_err(|e| TssError::internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            url: config.url,
            vault: config.vault,
            channel_id: config.channel_id,
            password: config.password,
            channel_password: config.channel_password,
            timeout: config.timeout,
            client,
        })
    }
}

impl SigningPort for RemoteSigner {
    fn sign(&self, digest: &Digest) -> TssResult<RawSignature> {
        log_debug!(
            LOG_MODULE,
            "Requesting threshold signature",
            url = &self.url,
            vault = &self.vault,
            digest = digest
        );

        let request = SignRequest {
            digest: digest.to_hex(),
            vault: &self.vault,
            channel_id: &self.channel_id,
            channel_password: self.channel_password.expose_secret(),
            password: self.password.expose_secret(),
        };

        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .map_err(|e| {
                let msg = if e.is_timeout() {
                    format!("Backend did not answer within {}s", self.timeout.as_secs())
                } else if e.is_connect() {
                    format!("Cannot reach signing backend: {}", e)
                } else {
                    format!("Signing request failed: {}", e)
                };
                TssError::backend(msg).at_stage(Stage::Sign)
            })?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| TssError::backend(format!("Failed to read backend response: {}", e)))
            .map_err(|e| e.at_stage(Stage::Sign))?;

        if !status.is_success() {
            log_warn!(LOG_MODULE, "Backend rejected signing request", status = status);
            return Err(TssError::backend(format!(
                "Backend returned HTTP {}: {}",
                status,
                body.trim()
            ))
            .at_stage(Stage::Sign));
        }

        parse_sign_response(&body).map_err(|e| e.at_stage(Stage::Sign))
    }
}

/// Parse the backend's JSON answer into `(r, s)`.
///
/// Accepted shapes: `{"signature": "<64 or 65 bytes hex>"}` or
/// `{"r": "<hex>", "s": "<hex>"}`. A present `error` field wins.
pub fn parse_sign_response(body: &str) -> TssResult<RawSignature> {
    let response: SignResponse = serde_json::from_str(body)
        .map_err(|e| TssError::backend(format!("Malformed backend response: {}", e)))?;

    if let Some(error) = response.error {
        return Err(TssError::backend(format!("Backend error: {}", error)));
    }

    match (response.signature, response.r, response.s) {
        (Some(signature), _, _) => {
            let bytes = parse_hex_bytes(&signature)
                .map_err(|e| TssError::backend(format!("Malformed signature field: {}", e.message)))?;
            if bytes.len() != 64 && bytes.len() != 65 {
                return Err(TssError::backend(format!(
                    "Backend signature is {} bytes, expected 64 or 65",
                    bytes.len()
                )));
            }
            RawSignature::from_bytes(&bytes)
        }
        (None, Some(r), Some(s)) => {
            let r = parse_scalar("r", &r)?;
            let s = parse_scalar("s", &s)?;
            RawSignature::new(r, s)
        }
        _ => Err(TssError::backend(
            "Backend response has neither 'signature' nor 'r'/'s'",
        )),
    }
}

/// Decode a big-endian scalar of at most 32 bytes, left-padding it.
fn parse_scalar(name: &str, value: &str) -> TssResult<[u8; 32]> {
    let digits = value.trim().trim_start_matches("0x");
    let digits = if digits.len() % 2 == 1 {
        format!("0{}", digits)
    } else {
        digits.to_string()
    };
    let bytes = hex::decode(&digits)
        .map_err(|e| TssError::backend(format!("Malformed '{}' field: {}", name, e)))?;
    if bytes.len() > 32 {
        return Err(TssError::backend(format!(
            "'{}' is {} bytes, expected at most 32",
            name,
            bytes.len()
        )));
    }
    let mut out = [0u8; 32];
    out[32 - bytes.len()..].copy_from_slice(&bytes);
    Ok(out)
}

// =============================================================================
// Local key
// =============================================================================

/// Signs with an in-process key, discarding the recovery id the way the
/// threshold backend does.
pub struct LocalKeySigner {
    secret: SecretKey,
    address: Address,
}

impl LocalKeySigner {
    pub fn new(private_key: &SecretString) -> TssResult<Self> {
        let bytes = Zeroizing::new(
            parse_hex_bytes(private_key.expose_secret())
                .map_err(|_| TssError::config("Development key is not valid hex"))?,
        );
        let secret = SecretKey::from_slice(&bytes)
            .map_err(|_| TssError::config("Development key is not a valid secp256k1 scalar"))?;
        let secp = Secp256k1::signing_only();
        let address = address_from_secp_key(&PublicKey::from_secret_key(&secp, &secret));
        Ok(Self { secret, address })
    }

    /// Address of the held key
    pub fn address(&self) -> Address {
        self.address
    }
}

impl SigningPort for LocalKeySigner {
    fn sign(&self, digest: &Digest) -> TssResult<RawSignature> {
        let secp = Secp256k1::signing_only();
        let msg = Message::from_digest(*digest.as_bytes());
        let sig = secp.sign_ecdsa(&msg, &self.secret);
        RawSignature::from_bytes(&sig.serialize_compact()).map_err(|e| e.at_stage(Stage::Sign))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::signing::preimage::build_message_digest;
    use crate::utils::parse_address;

    const TEST_PRIVATE_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const TEST_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    #[test]
    fn test_parse_compact_signature() {
        let r = "11".repeat(32);
        let s = "22".repeat(32);
        let body = format!(r#"{{"signature":"0x{}{}"}}"#, r, s);
        let sig = parse_sign_response(&body).unwrap();
        assert_eq!(sig.r(), &[0x11; 32]);
        assert_eq!(sig.s(), &[0x22; 32]);
    }

    #[test]
    fn test_parse_ignores_trailing_hint_byte() {
        let body = format!(r#"{{"signature":"{}{}1c"}}"#, "11".repeat(32), "22".repeat(32));
        let sig = parse_sign_response(&body).unwrap();
        assert_eq!(sig.s(), &[0x22; 32]);
    }

    #[test]
    fn test_parse_split_fields_left_pads() {
        let body = r#"{"r":"0x1","s":"abcd"}"#;
        let sig = parse_sign_response(body).unwrap();
        let mut r = [0u8; 32];
        r[31] = 1;
        let mut s = [0u8; 32];
        s[30] = 0xab;
        s[31] = 0xcd;
        assert_eq!(sig.r(), &r);
        assert_eq!(sig.s(), &s);
    }

    #[test]
    fn test_parse_zero_s_is_invalid_signature() {
        let body = format!(r#"{{"r":"0x{}","s":"0x00"}}"#, "11".repeat(32));
        let err = parse_sign_response(&body).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidSignature);
    }

    #[test]
    fn test_parse_malformed_is_backend_error() {
        for body in [
            "not json",
            r#"{"error":"peer 3 timed out"}"#,
            r#"{"r":"0x01"}"#,
            r#"{"signature":"zz"}"#,
        ] {
            let err = parse_sign_response(body).unwrap_err();
            assert_eq!(err.code, ErrorCode::BackendError, "body: {}", body);
        }

        let oversized = format!(r#"{{"r":"0x01{}","s":"0x01"}}"#, "00".repeat(32));
        assert_eq!(
            parse_sign_response(&oversized).unwrap_err().code,
            ErrorCode::BackendError
        );
    }

    #[test]
    fn test_parse_wrong_length_signature_is_backend_error() {
        for len in [0usize, 32, 63, 66, 96] {
            let body = format!(r#"{{"signature":"0x{}"}}"#, "11".repeat(len));
            let err = parse_sign_response(&body).unwrap_err();
            assert_eq!(err.code, ErrorCode::BackendError, "length: {}", len);
        }
    }

    #[test]
    fn test_local_signer_address() {
        let signer = LocalKeySigner::new(&SecretString::from(TEST_PRIVATE_KEY.to_string())).unwrap();
        assert_eq!(signer.address(), parse_address(TEST_ADDRESS).unwrap());
    }

    #[test]
    fn test_local_signer_produces_valid_low_s() {
        let signer = LocalKeySigner::new(&SecretString::from(TEST_PRIVATE_KEY.to_string())).unwrap();
        let sig = signer.sign(&build_message_digest(b"Hello World")).unwrap();
        assert!(sig.is_low_s());
    }

    #[test]
    fn test_local_signer_rejects_bad_key() {
        let err = LocalKeySigner::new(&SecretString::from("0x00".to_string())).err().unwrap();
        assert_eq!(err.code, ErrorCode::ConfigError);
    }
}
