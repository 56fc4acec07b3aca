//! Transaction Broadcaster
//!
//! Submits a signed legacy transaction to a JSON-RPC node with a single
//! `eth_sendRawTransaction` call. There is no fallback list and no retry:
//! a resubmission could race the first attempt.

use crate::error::{Stage, TssError, TssResult};
use crate::types::TxId;
use crate::log_debug;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const LOG_MODULE: &str = "broadcast";

/// Anything that can put an encoded transaction on the network
pub trait BroadcastPort {
    fn submit(&self, encoded_tx: &[u8]) -> TssResult<TxId>;
}

impl<T: BroadcastPort + ?Sized> BroadcastPort for &T {
    fn submit(&self, encoded_tx: &[u8]) -> TssResult<TxId> {
        (**self).submit(encoded_tx)
    }
}

// =============================================================================
// JSON-RPC
// =============================================================================

#[derive(Serialize)]
struct RpcRequest {
    jsonrpc: &'static str,
    method: &'static str,
    params: Vec<String>,
    id: u32,
}

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<String>,
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    code: Option<i64>,
    message: String,
}

/// `eth_sendRawTransaction` against one node
pub struct RpcBroadcaster {
    url: String,
    client: Client,
}

impl RpcBroadcaster {
    pub fn new(url: impl Into<String>) -> TssResult<Self> {
        Ok(Self {
            url: url.into(),
            client: create_client()?,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl BroadcastPort for RpcBroadcaster {
    fn submit(&self, encoded_tx: &[u8]) -> TssResult<TxId> {
        log_debug!(LOG_MODULE, "Submitting transaction", url = &self.url, size = encoded_tx.len());

        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(&RpcRequest {
                jsonrpc: "2.0",
                method: "eth_sendRawTransaction",
                params: vec![format!("0x{}", hex::encode(encoded_tx))],
                id: 1,
            })
            .send()
            .map_err(|e| TssError::from(e).at_stage(Stage::Broadcast))?;

        if !response.status().is_success() {
            return Err(TssError::network(format!(
                "RPC returned HTTP {}",
                response.status()
            ))
            .at_stage(Stage::Broadcast));
        }

        let body = response
            .text()
            .map_err(|e| TssError::from(e).at_stage(Stage::Broadcast))?;
        parse_rpc_response(&body).map_err(|e| e.at_stage(Stage::Broadcast))
    }
}

/// Extract the transaction hash from a JSON-RPC reply
pub fn parse_rpc_response(body: &str) -> TssResult<TxId> {
    let result: RpcResponse = serde_json::from_str(body)
        .map_err(|e| TssError::network(format!("Failed to parse RPC response: {}", e)))?;

    if let Some(error) = result.error {
        return Err(TssError::network(match error.code {
            Some(code) => format!("RPC error {}: {}", code, error.message),
            None => format!("RPC error: {}", error.message),
        }));
    }

    result
        .result
        .ok_or_else(|| TssError::network("No transaction hash in RPC response"))
}

fn create_client() -> TssResult<Client> {
    Client::builder()
        .timeout(Duration::from_secs(15))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| TssError::internal(format!("Failed to create HTTP client: {}", e)))
}

// =============================================================================
// Explorer links
// =============================================================================

fn default_explorer(chain_id: u64) -> Option<&'static str> {
    match chain_id {
        1 => Some("https://etherscan.io"),
        11155111 => Some("https://sepolia.etherscan.io"),
        56 => Some("https://bscscan.com"),
        137 => Some("https://polygonscan.com"),
        42161 => Some("https://arbiscan.io"),
        10 => Some("https://optimistic.etherscan.io"),
        8453 => Some("https://basescan.org"),
        43114 => Some("https://snowtrace.io"),
        _ => None,
    }
}

/// Link to a transaction on a block explorer.
///
/// An explicit base URL wins over the per-chain default; unknown chains
/// without an override get no link.
pub fn explorer_url(chain_id: u64, base_override: Option<&str>, tx_hash: &str) -> Option<String> {
    let base = base_override.or_else(|| default_explorer(chain_id))?;
    Some(format!("{}/tx/{}", base.trim_end_matches('/'), tx_hash))
}
