//! # CLI Interface
//!
//! Command-line arguments for `tss-signer`, defined with `clap` derive.
//! Every global flag can also come from a `TSS_*` environment variable.

use crate::error::TssResult;
use crate::types::UnsignedTransaction;
use crate::utils::logging::LogLevel;
use crate::utils::{parse_address, parse_hex_bytes, parse_quantity};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Finalize threshold signatures into Ethereum artifacts.
///
/// Obtains `(r, s)` from a threshold signing backend, recovers the missing
/// recovery id against the expected signer, and prints either a signed
/// message or a signed legacy transaction.
#[derive(Parser, Debug)]
#[command(name = "tss-signer", version, propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags shared by every subcommand.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Directory holding one sub-directory per vault.
    #[arg(long, global = true, env = "TSS_HOME", default_value = ".tss")]
    pub home: PathBuf,

    /// Vault name; its profile is read from `<home>/<vault>/signer.json`.
    #[arg(long, global = true, env = "TSS_VAULT", default_value = "default")]
    pub vault: String,

    /// Vault password forwarded to the signing backend.
    #[arg(long, global = true, env = "TSS_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Signing channel identifier.
    #[arg(long, global = true, env = "TSS_CHANNEL_ID")]
    pub channel_id: Option<String>,

    /// Signing channel password.
    #[arg(long, global = true, env = "TSS_CHANNEL_PASSWORD", hide_env_values = true)]
    pub channel_password: Option<String>,

    /// URL of the threshold signing backend.
    #[arg(long, global = true, env = "TSS_BACKEND_URL")]
    pub backend_url: Option<String>,

    /// Seconds to wait for the backend before giving up.
    #[arg(long, global = true, env = "TSS_BACKEND_TIMEOUT_SECS", default_value_t = 120)]
    pub backend_timeout_secs: u64,

    /// Address the signature must recover to. Overrides the vault profile.
    #[arg(long, global = true, env = "TSS_EXPECTED_ADDRESS")]
    pub expected_address: Option<String>,

    /// Sign with this hex private key instead of the backend.
    ///
    /// Development and testing only.
    #[arg(long, global = true, env = "TSS_DEV_KEY", hide_env_values = true)]
    pub dev_key: Option<String>,

    /// Minimum log level written to stderr (debug, info, warn, error).
    #[arg(long, global = true, env = "TSS_LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Print the artifact as JSON.
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign a message with the Ethereum personal-sign prefix.
    Message(MessageArgs),
    /// Sign a legacy transaction, optionally broadcasting it.
    Tx(TxArgs),
}

#[derive(Args, Debug)]
pub struct MessageArgs {
    /// UTF-8 message to sign.
    #[arg(long, short = 'm')]
    pub message: String,
}

#[derive(Args, Debug)]
pub struct TxArgs {
    /// Recipient address.
    #[arg(long)]
    pub to: String,

    /// Amount in wei, decimal or 0x hex.
    #[arg(long, default_value = "0")]
    pub value: String,

    #[arg(long, default_value_t = 21000)]
    pub gas_limit: u64,

    /// Gas price in wei, decimal or 0x hex.
    #[arg(long, default_value = "20000000000")]
    pub gas_price: String,

    #[arg(long, default_value_t = 0)]
    pub nonce: u64,

    /// EIP-155 chain id; 0 signs without replay protection.
    #[arg(long, default_value_t = 1)]
    pub chain_id: u64,

    /// Call data as hex.
    #[arg(long)]
    pub data: Option<String>,

    /// JSON-RPC endpoint used with `--send`.
    #[arg(long, env = "TSS_RPC_URL")]
    pub rpc: Option<String>,

    /// Broadcast the signed transaction.
    #[arg(long)]
    pub send: bool,

    /// Block explorer base URL for the transaction link.
    #[arg(long, env = "TSS_EXPLORER_URL")]
    pub explorer: Option<String>,
}

impl TxArgs {
    /// Parse the transaction fields
    pub fn to_unsigned(&self) -> TssResult<UnsignedTransaction> {
        let data = match self.data.as_deref() {
            Some(hex) if !hex.trim().is_empty() => parse_hex_bytes(hex)?,
            _ => Vec::new(),
        };

        Ok(UnsignedTransaction {
            to: parse_address(&self.to)?,
            value: parse_quantity("value", &self.value)?,
            gas_limit: self.gas_limit,
            gas_price: parse_quantity("gas-price", &self.gas_price)?,
            nonce: self.nonce,
            chain_id: self.chain_id,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use clap::CommandFactory;
    use ethers_core::types::U256;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_message_command() {
        let cli = Cli::try_parse_from([
            "tss-signer",
            "--vault",
            "ops",
            "message",
            "--message",
            "Hello World",
            "--json",
        ])
        .unwrap();
        assert_eq!(cli.global.vault, "ops");
        assert!(cli.global.json);
        match cli.command {
            Commands::Message(args) => assert_eq!(args.message, "Hello World"),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_tx_defaults() {
        let cli = Cli::try_parse_from([
            "tss-signer",
            "tx",
            "--to",
            "0x742d35Cc6634C0532925a3b8D4C9db96C4b4d8b6",
        ])
        .unwrap();
        let Commands::Tx(args) = cli.command else {
            panic!("expected tx command");
        };
        let tx = args.to_unsigned().unwrap();
        assert_eq!(tx.chain_id, 1);
        assert_eq!(tx.gas_limit, 21000);
        assert_eq!(tx.gas_price, U256::from(20_000_000_000u64));
        assert_eq!(tx.value, U256::zero());
        assert!(tx.data.is_empty());
        assert!(!args.send);
    }

    #[test]
    fn test_tx_rejects_bad_fields() {
        let cli = Cli::try_parse_from([
            "tss-signer",
            "tx",
            "--to",
            "0x1234",
            "--value",
            "1e18",
        ])
        .unwrap();
        let Commands::Tx(args) = cli.command else {
            panic!("expected tx command");
        };
        assert_eq!(args.to_unsigned().unwrap_err().code, ErrorCode::InvalidInput);
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let result = Cli::try_parse_from([
            "tss-signer",
            "--log-level",
            "loud",
            "message",
            "-m",
            "x",
        ]);
        assert!(result.is_err());
    }
}
