//! Request/response boundary: event in, status + body + headers out.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::batch::probe_batch;
use crate::config::ProbeConfig;
use crate::metrics::inc_request;
use crate::util::is_valid_url;

pub const BAD_JSON: &str = "Bad json payload";
pub const INVALID_URL: &str = "Not a valid URL in payload.";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Event {
    #[serde(default)]
    pub body: Option<String>,
}

impl Event {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: Some(body.into()) }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Response {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
}

impl Response {
    fn text(status: StatusCode, body: &str) -> Self {
        Self {
            status_code: status.as_u16(),
            body: body.to_string(),
            headers: None,
        }
    }

    fn json(status: StatusCode, body: String) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        Self {
            status_code: status.as_u16(),
            body,
            headers: Some(headers),
        }
    }
}

/// Parse the URL list, validate it, probe it.
///
/// Input problems are answered with 422 before any network activity. The
/// only error returned is a failure to set up the batch's HTTP client.
pub async fn handle_event(event: &Event, config: &ProbeConfig) -> Result<Response> {
    let response = respond(event, config).await?;
    inc_request(response.status_code);
    Ok(response)
}

async fn respond(event: &Event, config: &ProbeConfig) -> Result<Response> {
    let Some(urls) = parse_urls(event) else {
        debug!("rejecting request: body is not a JSON array of strings");
        return Ok(Response::text(StatusCode::UNPROCESSABLE_ENTITY, BAD_JSON));
    };

    if config.validate_urls {
        if let Some(bad) = urls.iter().find(|u| !is_valid_url(u)) {
            debug!("rejecting request: invalid url {:?}", bad);
            return Ok(Response::text(StatusCode::UNPROCESSABLE_ENTITY, INVALID_URL));
        }
    }

    info!("probing {} urls", urls.len());
    let batch = probe_batch(&urls, &config.client_settings()).await?;
    let body = serde_json::to_string(&batch).context("serializing batch result")?;
    Ok(Response::json(StatusCode::OK, body))
}

fn parse_urls(event: &Event) -> Option<Vec<String>> {
    let body = event.body.as_deref()?;
    serde_json::from_str::<Vec<String>>(body).ok()
}

/// Synchronous entry point for one invocation.
///
/// Runs the batch on a fresh current-thread runtime, so all probes of the
/// invocation interleave on a single thread. Must not be called from inside
/// another tokio runtime.
pub fn handler(event: &Event, config: &ProbeConfig) -> Result<Response> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building invocation runtime")?;
    rt.block_on(handle_event(event, config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_uses_invocation_field_names() {
        let json = serde_json::to_value(Response::json(StatusCode::OK, "{}".to_string())).unwrap();
        assert_eq!(json["statusCode"], 200);
        assert_eq!(json["headers"]["Content-Type"], "application/json");

        let json = serde_json::to_value(Response::text(StatusCode::UNPROCESSABLE_ENTITY, BAD_JSON)).unwrap();
        assert!(json.get("headers").is_none());
    }

    #[test]
    fn event_body_is_optional() {
        let event: Event = serde_json::from_str("{}").unwrap();
        assert_eq!(event.body, None);
        let event: Event = serde_json::from_str(r#"{"body": "[]"}"#).unwrap();
        assert_eq!(event, Event::new("[]"));
    }

    #[test]
    fn parse_urls_requires_array_of_strings() {
        assert_eq!(parse_urls(&Event::new(r#"["a", "b"]"#)), Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(parse_urls(&Event::new("not json")), None);
        assert_eq!(parse_urls(&Event::new(r#"{"url": "http://x"}"#)), None);
        assert_eq!(parse_urls(&Event::new("[1, 2]")), None);
        assert_eq!(parse_urls(&Event::default()), None);
    }

    #[test]
    fn sync_handler_answers_empty_batch() {
        let resp = handler(&Event::new("[]"), &ProbeConfig::default()).unwrap();
        assert_eq!(resp.status_code, 200);
        assert_eq!(resp.body, r#"{"results":[],"errors":[]}"#);
    }

    #[test]
    fn sync_handler_rejects_bad_json() {
        let resp = handler(&Event::new("not json"), &ProbeConfig::default()).unwrap();
        assert_eq!(resp.status_code, 422);
        assert_eq!(resp.body, BAD_JSON);
    }
}
