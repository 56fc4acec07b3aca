//! Signer configuration
//!
//! Resolved once at startup from CLI flags (with `TSS_*` environment
//! fallbacks) and an optional per-vault profile file, then passed by value
//! to whatever needs it. Nothing here is global or mutable.
//!
//! ## Vault profile
//!
//! `<home>/<vault>/signer.json`, all fields optional:
//!
//! ```json
//! {
//!   "backend_url": "https://tss.internal:9000/sign",
//!   "channel_id": "1116C145287",
//!   "address": "0x...",
//!   "public_key": "02..."
//! }
//! ```
//!
//! CLI flags win over the profile.

use crate::cli::{GlobalArgs, TxArgs};
use crate::error::TssError;
use crate::utils::endpoint::{validate_endpoint, EndpointKind};
use crate::utils::{address_from_public_key, parse_address, parse_hex_bytes, to_checksum_address};
use crate::log_warn;
use ethers_core::types::Address;
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const PROFILE_FILE: &str = "signer.json";
const LOG_MODULE: &str = "config";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read vault profile {path}: {source}")]
    ProfileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("vault profile {path} is malformed: {source}")]
    ProfileParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("vault profile address {address} does not belong to its public key ({derived})")]
    ProfileKeyMismatch { address: String, derived: String },

    #[error("invalid {field} URL '{url}': {reason}")]
    InvalidUrl {
        field: &'static str,
        url: String,
        reason: String,
    },

    #[error("invalid {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("{0}")]
    Missing(&'static str),
}

impl From<ConfigError> for TssError {
    fn from(e: ConfigError) -> Self {
        TssError::config(e.to_string())
    }
}

// =============================================================================
// Vault profile
// =============================================================================

/// Per-vault settings stored next to the vault's key material
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VaultProfile {
    pub backend_url: Option<String>,
    pub channel_id: Option<String>,
    pub address: Option<String>,
    pub public_key: Option<String>,
}

impl VaultProfile {
    pub fn path(home: &Path, vault: &str) -> PathBuf {
        home.join(vault).join(PROFILE_FILE)
    }

    /// Load the profile, or `None` when the vault has no profile file.
    pub fn load(home: &Path, vault: &str) -> Result<Option<Self>, ConfigError> {
        let path = Self::path(home, vault);
        let contents = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(ConfigError::ProfileRead { path, source }),
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|source| ConfigError::ProfileParse { path, source })
    }

    /// The signer address this vault should produce.
    ///
    /// Derived from `public_key` when present; if `address` is also given it
    /// must agree.
    pub fn expected_address(&self) -> Result<Option<Address>, ConfigError> {
        let from_key = match &self.public_key {
            Some(key) => {
                let bytes = parse_hex_bytes(key).map_err(|e| {
                    ConfigError::InvalidValue {
                        field: "public_key",
                        reason: e.message,
                    }
                })?;
                Some(address_from_public_key(&bytes).map_err(|e| ConfigError::InvalidValue {
                    field: "public_key",
                    reason: e.message,
                })?)
            }
            None => None,
        };

        let listed = match &self.address {
            Some(a) => Some(parse_address(a).map_err(|e| ConfigError::InvalidValue {
                field: "address",
                reason: e.message,
            })?),
            None => None,
        };

        match (listed, from_key) {
            (Some(listed), Some(derived)) if listed != derived => {
                Err(ConfigError::ProfileKeyMismatch {
                    address: to_checksum_address(listed.as_bytes()),
                    derived: to_checksum_address(derived.as_bytes()),
                })
            }
            (listed, derived) => Ok(derived.or(listed)),
        }
    }
}

// =============================================================================
// Signer configuration
// =============================================================================

/// Connection and credentials for the threshold signing backend
#[derive(Debug)]
pub struct BackendConfig {
    pub url: String,
    pub timeout: Duration,
    pub vault: String,
    pub channel_id: String,
    pub password: SecretString,
    pub channel_password: SecretString,
}

/// Where signatures come from
#[derive(Debug)]
pub enum SignerSource {
    Remote(BackendConfig),
    /// In-process key, development only
    DevKey(SecretString),
}

#[derive(Debug)]
pub struct SignerConfig {
    pub source: SignerSource,
    /// `None` means results are reported unverified
    pub expected_address: Option<Address>,
}

impl SignerConfig {
    /// Resolve the configuration from flags and the vault profile.
    pub fn from_args(args: &GlobalArgs) -> Result<Self, ConfigError> {
        let profile = VaultProfile::load(&args.home, &args.vault)?.unwrap_or_default();

        let expected_address = match &args.expected_address {
            Some(a) => Some(parse_address(a).map_err(|e| ConfigError::InvalidValue {
                field: "expected address",
                reason: e.message,
            })?),
            None => profile.expected_address()?,
        };

        let source = match &args.dev_key {
            Some(key) => SignerSource::DevKey(SecretString::from(key.clone())),
            None => SignerSource::Remote(backend_config(args, &profile)?),
        };

        Ok(Self {
            source,
            expected_address,
        })
    }
}

fn backend_config(args: &GlobalArgs, profile: &VaultProfile) -> Result<BackendConfig, ConfigError> {
    let url = args
        .backend_url
        .clone()
        .or_else(|| profile.backend_url.clone())
        .ok_or(ConfigError::Missing(
            "no signing backend: pass --backend-url, set it in the vault profile, or use --dev-key",
        ))?;
    let url = checked_url("backend", &url, EndpointKind::SigningBackend)?;

    if args.backend_timeout_secs == 0 {
        return Err(ConfigError::InvalidValue {
            field: "backend timeout",
            reason: "must be at least one second".to_string(),
        });
    }

    Ok(BackendConfig {
        url,
        timeout: Duration::from_secs(args.backend_timeout_secs),
        vault: args.vault.clone(),
        channel_id: args
            .channel_id
            .clone()
            .or_else(|| profile.channel_id.clone())
            .unwrap_or_default(),
        password: SecretString::from(args.password.clone().unwrap_or_default()),
        channel_password: SecretString::from(args.channel_password.clone().unwrap_or_default()),
    })
}

// =============================================================================
// Broadcast configuration
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastConfig {
    pub rpc_url: String,
    pub explorer: Option<String>,
}

impl BroadcastConfig {
    /// `None` unless `--send` was given; `--send` without an RPC is an error.
    pub fn from_args(args: &TxArgs) -> Result<Option<Self>, ConfigError> {
        if !args.send {
            return Ok(None);
        }
        let rpc = args
            .rpc
            .as_deref()
            .ok_or(ConfigError::Missing("--send requires an RPC URL (--rpc)"))?;

        let rpc_url = checked_url("rpc", rpc, EndpointKind::Rpc)?;
        let explorer = args
            .explorer
            .as_deref()
            .map(|e| checked_url("explorer", e, EndpointKind::Explorer))
            .transpose()?;

        Ok(Some(Self { rpc_url, explorer }))
    }
}

/// Validate a URL, logging warnings and failing on errors
fn checked_url(field: &'static str, url: &str, kind: EndpointKind) -> Result<String, ConfigError> {
    let validation = validate_endpoint(url, kind);
    for warning in &validation.warnings {
        log_warn!(LOG_MODULE, "Endpoint warning", endpoint = field, warning = warning);
    }
    match validation.url {
        Some(valid) if validation.is_valid => Ok(valid),
        _ => Err(ConfigError::InvalidUrl {
            field,
            url: url.to_string(),
            reason: validation.errors.join("; "),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use std::fs;
    use tempfile::TempDir;

    const TEST_PRIVATE_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const TEST_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    fn test_public_key() -> String {
        let secp = secp256k1::Secp256k1::new();
        let secret = secp256k1::SecretKey::from_slice(&hex::decode(TEST_PRIVATE_KEY).unwrap()).unwrap();
        hex::encode(secp256k1::PublicKey::from_secret_key(&secp, &secret).serialize())
    }

    fn parse(home: &Path, extra: &[&str]) -> Cli {
        let mut argv = vec!["tss-signer".to_string(), "--home".to_string(), home.display().to_string()];
        argv.extend(extra.iter().map(|s| s.to_string()));
        argv.extend(["message".to_string(), "-m".to_string(), "x".to_string()]);
        Cli::try_parse_from(argv).unwrap()
    }

    fn write_profile(home: &Path, vault: &str, json: &str) {
        let dir = home.join(vault);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(PROFILE_FILE), json).unwrap();
    }

    #[test]
    fn test_missing_profile_is_none() {
        let home = TempDir::new().unwrap();
        assert!(VaultProfile::load(home.path(), "default").unwrap().is_none());
    }

    #[test]
    fn test_profile_supplies_backend_and_address() {
        let home = TempDir::new().unwrap();
        write_profile(
            home.path(),
            "default",
            &format!(
                r#"{{"backend_url":"http://localhost:9000/sign","channel_id":"abc","public_key":"{}"}}"#,
                test_public_key()
            ),
        );

        let cli = parse(home.path(), &[]);
        let config = SignerConfig::from_args(&cli.global).unwrap();
        assert_eq!(
            config.expected_address,
            Some(parse_address(TEST_ADDRESS).unwrap())
        );
        match config.source {
            SignerSource::Remote(backend) => {
                assert_eq!(backend.url, "http://localhost:9000/sign");
                assert_eq!(backend.channel_id, "abc");
                assert_eq!(backend.vault, "default");
            }
            SignerSource::DevKey(_) => panic!("expected remote backend"),
        }
    }

    #[test]
    fn test_flags_override_profile() {
        let home = TempDir::new().unwrap();
        write_profile(
            home.path(),
            "default",
            r#"{"backend_url":"http://localhost:9000/sign","address":"0x1234567890123456789012345678901234567890"}"#,
        );

        let cli = parse(
            home.path(),
            &["--backend-url", "https://tss.example.com/sign", "--expected-address", TEST_ADDRESS],
        );
        let config = SignerConfig::from_args(&cli.global).unwrap();
        assert_eq!(
            config.expected_address,
            Some(parse_address(TEST_ADDRESS).unwrap())
        );
        let SignerSource::Remote(backend) = config.source else {
            panic!("expected remote backend");
        };
        assert_eq!(backend.url, "https://tss.example.com/sign");
    }

    #[test]
    fn test_profile_address_must_match_key() {
        let profile = VaultProfile {
            address: Some("0x1234567890123456789012345678901234567890".to_string()),
            public_key: Some(test_public_key()),
            ..Default::default()
        };
        assert!(matches!(
            profile.expected_address(),
            Err(ConfigError::ProfileKeyMismatch { .. })
        ));
    }

    #[test]
    fn test_malformed_profile_rejected() {
        let home = TempDir::new().unwrap();
        write_profile(home.path(), "default", r#"{"backend":"typo"}"#);
        assert!(matches!(
            VaultProfile::load(home.path(), "default"),
            Err(ConfigError::ProfileParse { .. })
        ));
    }

    #[test]
    fn test_remote_requires_backend_url() {
        let home = TempDir::new().unwrap();
        let cli = parse(home.path(), &[]);
        let err = SignerConfig::from_args(&cli.global).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
        assert_eq!(TssError::from(err).code, crate::error::ErrorCode::ConfigError);
    }

    #[test]
    fn test_dev_key_skips_backend() {
        let home = TempDir::new().unwrap();
        let cli = parse(home.path(), &["--dev-key", "0x01"]);
        let config = SignerConfig::from_args(&cli.global).unwrap();
        assert!(matches!(config.source, SignerSource::DevKey(_)));
        assert!(config.expected_address.is_none());
    }

    #[test]
    fn test_bad_backend_url_rejected() {
        let home = TempDir::new().unwrap();
        let cli = parse(home.path(), &["--backend-url", "ftp://tss.example.com"]);
        assert!(matches!(
            SignerConfig::from_args(&cli.global),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_send_requires_rpc() {
        let cli = Cli::try_parse_from([
            "tss-signer",
            "tx",
            "--to",
            TEST_ADDRESS,
            "--send",
        ])
        .unwrap();
        let Commands::Tx(args) = cli.command else {
            panic!("expected tx command");
        };
        assert!(matches!(
            BroadcastConfig::from_args(&args),
            Err(ConfigError::Missing(_))
        ));
    }

    #[test]
    fn test_rpc_without_send_does_not_broadcast() {
        let cli = Cli::try_parse_from([
            "tss-signer",
            "tx",
            "--to",
            TEST_ADDRESS,
            "--rpc",
            "http://localhost:8545",
        ])
        .unwrap();
        let Commands::Tx(args) = cli.command else {
            panic!("expected tx command");
        };
        assert_eq!(BroadcastConfig::from_args(&args).unwrap(), None);
    }
}
