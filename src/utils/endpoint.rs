//! Endpoint URL validation for the signing backend and the broadcast RPC.

use url::Url;

/// What an endpoint is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    /// Threshold signing backend
    SigningBackend,
    /// JSON-RPC node used for broadcast
    Rpc,
    /// Block explorer base URL (only used to build links)
    Explorer,
}

/// Validation result for an endpoint URL
#[derive(Debug, Clone)]
pub struct EndpointValidation {
    pub is_valid: bool,
    pub url: Option<String>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

/// Validate an endpoint URL.
///
/// Only `http` and `https` are accepted. Plain `http` to a non-loopback
/// host is a warning, not an error: threshold backends commonly sit on a
/// private network.
pub fn validate_endpoint(url: &str, kind: EndpointKind) -> EndpointValidation {
    let mut warnings = Vec::new();
    let mut errors = Vec::new();

    let parsed = match Url::parse(url.trim()) {
        Ok(u) => u,
        Err(e) => {
            errors.push(format!("Invalid URL format: {}", e));
            return EndpointValidation {
                is_valid: false,
                url: None,
                warnings,
                errors,
            };
        }
    };

    match parsed.scheme() {
        "https" => {}
        "http" => {
            if !is_loopback(&parsed) {
                warnings.push(format!(
                    "Plain HTTP to '{}' - traffic is unencrypted",
                    parsed.host_str().unwrap_or_default()
                ));
            }
        }
        other => errors.push(format!("Unsupported URL scheme: {}", other)),
    }

    if parsed.host_str().map(str::is_empty).unwrap_or(true) {
        errors.push("URL has no host".to_string());
    }

    if !parsed.username().is_empty() || parsed.password().is_some() {
        warnings.push("Credentials in URL - ensure URL is not logged".to_string());
    }

    if let Some(query) = parsed.query() {
        let query = query.to_lowercase();
        if query.contains("apikey") || query.contains("api_key") {
            warnings.push("API key in URL query string - ensure URL is not logged".to_string());
        }
    }

    if kind == EndpointKind::Rpc {
        let host = parsed.host_str().unwrap_or_default();
        if host.contains("etherscan") || host.contains("polygonscan") || host.contains("bscscan") {
            warnings.push("Block explorer API - not a JSON-RPC endpoint".to_string());
        }
    }

    let is_valid = errors.is_empty();
    EndpointValidation {
        is_valid,
        url: is_valid.then(|| parsed.to_string()),
        warnings,
        errors,
    }
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(url::Host::Domain(domain)) => domain == "localhost",
        Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
        Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}
