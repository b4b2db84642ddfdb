//! HTTP client to the WoM aggregating service.
//!
//! Protocol: plain HTTP, JSON bodies.
//! - any `2xx` is success; an empty body means "nothing there" for reads,
//! - `404` is absence (`None`), **not** an error,
//! - anything else is an error: a body carrying a `wom.*`/`uem.*` token is
//!   parsed into a structured domain error (JSON `{message, parameters}` when
//!   the body is an object), otherwise the raw status + body are wrapped as a
//!   generic transport-level error.
//!
//! The client is constructed explicitly and injected; the connection pool is
//! bounded (default 5 idle per host) so periodic reporting load stays
//! predictable.

use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::debug;

use crate::config::HubConfig;
use crate::error::{extract_domain_token, Error, Result};
use crate::report::envelope::VerifiableEnvelope;
use crate::types::RemoteReport;

const REPORTS_PATH: &str = "api/hub/reports";
const MANAGER_PATH: &str = "api/hubs/manager";
const TOKEN_PATH: &str = "api/hubs/token";

/// Structured error body returned by the WoM service.
#[derive(Debug, Deserialize)]
struct WomErrorBody {
    message: String,
    #[serde(default)]
    parameters: Vec<String>,
}

pub struct WomClient {
    base: Url,
    client: Client,
}

impl WomClient {
    pub fn new(config: &HubConfig) -> Result<Self> {
        let mut base = config.wom_url.parse::<Url>()?;
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        let client = Client::builder()
            .connect_timeout(config.http_connect_timeout)
            .timeout(config.http_timeout)
            .pool_max_idle_per_host(config.http_pool_max_idle)
            .build()
            .map_err(|e| Error::Transport(format!("http client build: {e}")))?;
        Ok(Self { base, client })
    }

    /// Persist a signed report envelope; returns the canonical remote report.
    pub async fn persist(&self, envelope: &VerifiableEnvelope) -> Result<RemoteReport> {
        let url = self.base.join(REPORTS_PATH)?;
        let response = self.client.post(url).json(envelope).send().await?;
        let body = classify_response(response.status().as_u16(), &response.text().await?)?
            .ok_or_else(|| Error::Transport("empty response to report persistence".into()))?;
        debug!(report_hash = %envelope.hash, "report persisted to WoM");
        Ok(serde_json::from_str(&body)?)
    }

    /// Fetch a report by its network id; `None` when the WoM does not know it.
    pub async fn fetch(&self, report_id: u64) -> Result<Option<RemoteReport>> {
        let url = self.base.join(&format!("{REPORTS_PATH}/{report_id}"))?;
        let response = self.client.get(url).send().await?;
        match classify_response(response.status().as_u16(), &response.text().await?)? {
            Some(body) => Ok(Some(serde_json::from_str(&body)?)),
            None => Ok(None),
        }
    }

    /// Whether `address` manages the given deed on the WoM.
    pub async fn is_manager_of(&self, address: &str, deed_id: u64) -> Result<bool> {
        let mut url = self.base.join(MANAGER_PATH)?;
        url.query_pairs_mut()
            .append_pair("nftId", &deed_id.to_string())
            .append_pair("address", address);
        let response = self.client.get(url).send().await?;
        let body = classify_response(response.status().as_u16(), &response.text().await?)?;
        Ok(body.as_deref() == Some("true"))
    }

    /// Obtain a short-lived action token from the WoM.
    pub async fn generate_token(&self) -> Result<String> {
        let url = self.base.join(TOKEN_PATH)?;
        let response = self.client.get(url).send().await?;
        classify_response(response.status().as_u16(), &response.text().await?)?
            .ok_or_else(|| Error::Transport("empty response to token generation".into()))
    }
}

/// Map an HTTP outcome onto the protocol's success/absence/error trichotomy.
///
/// Pure so the whole ladder is testable without a live server.
pub(crate) fn classify_response(status: u16, body: &str) -> Result<Option<String>> {
    if (200..300).contains(&status) {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        return Ok(Some(trimmed.to_string()));
    }
    if status == 404 {
        return Ok(None);
    }
    let trimmed = body.trim();
    if extract_domain_token(trimmed).is_some() {
        if trimmed.starts_with('{') {
            if let Ok(parsed) = serde_json::from_str::<WomErrorBody>(trimmed) {
                return Err(Error::Domain {
                    message: parsed.message,
                    parameters: parsed.parameters,
                });
            }
        }
        return Err(Error::Domain { message: trimmed.to_string(), parameters: Vec::new() });
    }
    Err(Error::HttpStatus { status, body: trimmed.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_with_body() {
        assert_eq!(
            classify_response(200, "{\"reportId\":1}").unwrap().as_deref(),
            Some("{\"reportId\":1}")
        );
    }

    #[test]
    fn success_with_empty_body_is_absence() {
        assert!(classify_response(204, "").unwrap().is_none());
        assert!(classify_response(200, "   ").unwrap().is_none());
    }

    #[test]
    fn not_found_is_absence_not_error() {
        assert!(classify_response(404, "").unwrap().is_none());
        assert!(classify_response(404, "gone").unwrap().is_none());
    }

    #[test]
    fn error_with_json_token_body() {
        let err = classify_response(500, "{\"message\":\"wom.alreadySent\"}").unwrap_err();
        match err {
            Error::Domain { message, parameters } => {
                assert_eq!(message, "wom.alreadySent");
                assert!(parameters.is_empty());
            }
            other => panic!("expected domain error, got {other}"),
        }
    }

    #[test]
    fn error_with_json_token_and_parameters() {
        let body = "{\"message\":\"wom.notManager\",\"parameters\":[\"0xabc\",\"12\"]}";
        match classify_response(403, body).unwrap_err() {
            Error::Domain { message, parameters } => {
                assert_eq!(message, "wom.notManager");
                assert_eq!(parameters, vec!["0xabc".to_string(), "12".to_string()]);
            }
            other => panic!("expected domain error, got {other}"),
        }
    }

    #[test]
    fn error_with_plain_token_body() {
        match classify_response(409, "uem.sendReportTransactionFailed").unwrap_err() {
            Error::Domain { message, .. } => assert_eq!(message, "uem.sendReportTransactionFailed"),
            other => panic!("expected domain error, got {other}"),
        }
    }

    #[test]
    fn error_without_token_is_generic() {
        match classify_response(502, "Bad Gateway").unwrap_err() {
            Error::HttpStatus { status, body } => {
                assert_eq!(status, 502);
                assert_eq!(body, "Bad Gateway");
            }
            other => panic!("expected HttpStatus, got {other}"),
        }
    }

    #[test]
    fn malformed_json_with_token_degrades_to_raw_body() {
        match classify_response(500, "{\"msg\": \"wom.alreadySent\"").unwrap_err() {
            Error::Domain { message, .. } => assert!(message.contains("wom.alreadySent")),
            other => panic!("expected domain error, got {other}"),
        }
    }
}
