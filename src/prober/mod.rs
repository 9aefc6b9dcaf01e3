use std::any::Any;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinError;

pub mod http;

/// Outcome of probing one URL.
///
/// `status_code` is set only when the HTTP exchange completed, body included.
/// `time` is always measured, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProbeResult {
    pub url: String,
    pub status_code: Option<u16>,
    pub time: f64,
}

impl ProbeResult {
    pub fn succeeded(url: &str, status_code: u16, time: f64) -> Self {
        Self {
            url: url.to_string(),
            status_code: Some(status_code),
            time,
        }
    }

    pub fn failed(url: &str, time: f64) -> Self {
        Self {
            url: url.to_string(),
            status_code: None,
            time,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code.is_some()
    }
}

/// Why a probe produced no status code.
///
/// Everything but `Panicked` is an expected network-level failure.
#[derive(Debug, Error)]
pub enum ProbeFailure {
    #[error("timed out: {0}")]
    Timeout(#[source] reqwest::Error),

    #[error("connection failed: {0}")]
    Connect(#[source] reqwest::Error),

    #[error("invalid request: {0}")]
    InvalidRequest(#[source] reqwest::Error),

    #[error("failed reading response body: {0}")]
    Body(#[source] reqwest::Error),

    #[error("protocol error: {0}")]
    Protocol(#[source] reqwest::Error),

    #[error("probe task cancelled")]
    Cancelled,

    #[error("probe task panicked: {0}")]
    Panicked(String),
}

impl ProbeFailure {
    /// Metric label for the failure class.
    pub fn label(&self) -> &'static str {
        match self {
            ProbeFailure::Timeout(_) => "timeout",
            ProbeFailure::Connect(_) => "connect",
            ProbeFailure::InvalidRequest(_) => "invalid_request",
            ProbeFailure::Body(_) => "body",
            ProbeFailure::Protocol(_) => "protocol",
            ProbeFailure::Cancelled => "cancelled",
            ProbeFailure::Panicked(_) => "panicked",
        }
    }

    pub fn is_defect(&self) -> bool {
        matches!(self, ProbeFailure::Panicked(_))
    }

    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let msg = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_string());
        ProbeFailure::Panicked(msg)
    }
}

impl From<reqwest::Error> for ProbeFailure {
    fn from(e: reqwest::Error) -> Self {
        // timeout first: a timed out connect reports both
        if e.is_timeout() {
            ProbeFailure::Timeout(e)
        } else if e.is_connect() {
            ProbeFailure::Connect(e)
        } else if e.is_builder() {
            ProbeFailure::InvalidRequest(e)
        } else if e.is_body() || e.is_decode() {
            ProbeFailure::Body(e)
        } else {
            ProbeFailure::Protocol(e)
        }
    }
}

impl From<JoinError> for ProbeFailure {
    fn from(e: JoinError) -> Self {
        if e.is_panic() {
            ProbeFailure::from_panic(e.into_panic())
        } else {
            ProbeFailure::Cancelled
        }
    }
}
