use core::fmt;

use thiserror::Error;

use crate::types::ReportStatus;

/// Common result alias for the engine.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Structured JSON-RPC error object as returned by the EVM node.
#[derive(Debug, Clone)]
pub struct RpcErrorObj {
    pub code: i64,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

impl RpcErrorObj {
    pub fn new(code: i64, message: impl Into<String>, data: Option<serde_json::Value>) -> Self {
        Self { code, message: message.into(), data }
    }

    /// The node message, preferring the `data` field when it carries a string
    /// (nodes put revert payloads and custom tokens there).
    pub fn preferred_message(&self) -> String {
        match &self.data {
            Some(serde_json::Value::String(s)) if !s.is_empty() => s.clone(),
            Some(d) if !d.is_null() => format!("{} | data={}", self.message, d),
            _ => self.message.clone(),
        }
    }
}

impl fmt::Display for RpcErrorObj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(d) = &self.data {
            write!(f, "RPC error {}: {} (data={})", self.code, self.message, d)
        } else {
            write!(f, "RPC error {}: {}", self.code, self.message)
        }
    }
}

/// Top-level engine error.
///
/// Variants are intentionally broad and stable. Absence of a resource (HTTP
/// 404, receipt not yet mined) is modeled as `Option`, never as an error.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    // ---- Input validation ---------------------------------------------------
    /// Bad input to the report builder; never retried, fix the caller.
    #[error("validation error: {0}")]
    Validation(String),

    /// Reporting period boundaries are inconsistent.
    #[error("invalid period: {0}")]
    InvalidPeriod(String),

    /// Malformed chain address.
    #[error("address error: {0}")]
    Address(String),

    // ---- Wallet / Crypto ----------------------------------------------------
    /// Key material missing or undecipherable; fatal until an operator fixes it.
    #[error("hub wallet unavailable: {0}")]
    WalletUnavailable(String),

    /// Keystore error (seal/open/parse).
    #[error("keystore error: {0}")]
    Keystore(String),

    /// Signing or signature-recovery error.
    #[error("signer error: {0}")]
    Signer(String),

    // ---- Lifecycle state machine --------------------------------------------
    /// A disallowed status transition was requested; a defect in the caller.
    #[error("illegal report status transition: {from} -> {to}")]
    IllegalStateTransition { from: ReportStatus, to: ReportStatus },

    // ---- Chain submission ---------------------------------------------------
    /// Gas estimation dry-run failed; carries the node message verbatim.
    #[error("gas estimation failed: {0}")]
    EstimationFailed(String),

    /// Transaction was mined but did not succeed.
    #[error("transaction failed: {0}")]
    TransactionFailed(String),

    /// Receipt polling attempts exhausted for the given transaction hash.
    #[error("receipt not found within timeout for tx {0}")]
    ReceiptTimeout(String),

    /// Mined receipt carries no ReportSent log.
    #[error("no ReportSent event in receipt of tx {0}")]
    ReportIdNotFound(String),

    /// JSON-RPC error response with structured details.
    #[error("{0}")]
    Rpc(RpcErrorObj),

    /// RPC response had an unexpected shape.
    #[error("malformed rpc response: {0}")]
    RpcResponse(String),

    // ---- Remote service -----------------------------------------------------
    /// Network error (request building, connection, DNS, timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-2xx/404 HTTP status with no domain token in the body.
    #[error("http status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// Domain-prefixed error token (`wom.*` / `uem.*`) from the remote network
    /// or the contract; carries actionable semantics and takes precedence over
    /// generic transport messages.
    #[error("{message}")]
    Domain { message: String, parameters: Vec<String> },

    // ---- Encoding / Decoding ------------------------------------------------
    /// JSON (de)serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Hex decoding error.
    #[error("hex decode error: {0}")]
    Hex(#[from] hex::FromHexError),

    /// URL parse error.
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    /// Build a bare domain-token error.
    pub fn domain(token: impl Into<String>) -> Self {
        Error::Domain { message: token.into(), parameters: Vec::new() }
    }

    /// The most specific domain token carried by this error, if any.
    ///
    /// Searches the whole printable chain, including the JSON-RPC `data`
    /// field, so `uem.notAuthorized` buried in a revert payload is found.
    pub fn domain_token(&self) -> Option<String> {
        match self {
            Error::Domain { message, .. } => {
                extract_domain_token(message).or_else(|| Some(message.clone()))
            }
            Error::Rpc(obj) => extract_domain_token(&obj.preferred_message())
                .or_else(|| extract_domain_token(&obj.to_string())),
            other => extract_domain_token(&other.to_string()),
        }
    }
}

impl From<RpcErrorObj> for Error {
    fn from(e: RpcErrorObj) -> Self {
        Error::Rpc(e)
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            Error::HttpStatus { status: status.as_u16(), body: e.to_string() }
        } else {
            Error::Transport(e.to_string())
        }
    }
}

// --------------------------- Domain tokens -----------------------------------

/// Scan free text for a `uem.*` or `wom.*` token.
///
/// Contract reverts and WoM error bodies embed these tokens in otherwise
/// unstructured messages; `uem.` tokens win when both namespaces appear.
pub fn extract_domain_token(text: &str) -> Option<String> {
    use std::sync::OnceLock;
    static UEM: OnceLock<regex::Regex> = OnceLock::new();
    static WOM: OnceLock<regex::Regex> = OnceLock::new();
    let uem = UEM.get_or_init(|| regex::Regex::new(r"uem\.[a-zA-Z0-9]+").expect("static pattern"));
    let wom = WOM.get_or_init(|| regex::Regex::new(r"wom\.[a-zA-Z0-9]+").expect("static pattern"));
    uem.find(text)
        .or_else(|| wom.find(text))
        .map(|m| m.as_str().to_string())
}

/// Re-wrap an error as its domain token when one is present anywhere in its
/// message chain; otherwise return it unchanged.
pub(crate) fn prefer_domain_token(err: Error) -> Error {
    if matches!(err, Error::Domain { .. }) {
        return err;
    }
    match err.domain_token() {
        Some(token) => Error::domain(token),
        None => err,
    }
}

// ----------------------------------- Tests -----------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_extraction() {
        assert_eq!(
            extract_domain_token("execution reverted: uem.notAuthorized").as_deref(),
            Some("uem.notAuthorized")
        );
        assert_eq!(
            extract_domain_token("{\"message\":\"wom.alreadySent\"}").as_deref(),
            Some("wom.alreadySent")
        );
        assert_eq!(extract_domain_token("connection reset by peer"), None);
    }

    #[test]
    fn uem_token_wins_over_wom() {
        let both = "wom.errorResponse caused by uem.sendReportTransactionFailed";
        assert_eq!(extract_domain_token(both).as_deref(), Some("uem.sendReportTransactionFailed"));
    }

    #[test]
    fn rpc_data_participates_in_token_lookup() {
        let err = Error::Rpc(RpcErrorObj::new(
            3,
            "execution reverted",
            Some(serde_json::Value::String("uem.notAuthorized".into())),
        ));
        assert_eq!(err.domain_token().as_deref(), Some("uem.notAuthorized"));
    }

    #[test]
    fn prefer_domain_token_upgrades() {
        let err = Error::TransactionFailed("reverted with wom.alreadySent".into());
        match prefer_domain_token(err) {
            Error::Domain { message, .. } => assert_eq!(message, "wom.alreadySent"),
            other => panic!("expected domain error, got {other}"),
        }
    }
}
