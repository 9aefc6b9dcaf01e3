//! Fan-out/fan-in over one batch of URLs.
//!
//! Every URL gets its own task against one shared [`reqwest::Client`]. The
//! client is `Send + Sync` and its clones share a single connection pool, so
//! concurrent in-flight requests need no further coordination. Tasks are
//! joined in dispatch order, which fixes the output order regardless of which
//! probe finishes first.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::FutureExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::metrics::{inc_failure, observe_probe};
use crate::prober::{ProbeFailure, ProbeResult, http::probe};

#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    pub user_agent: String,
    pub request_timeout: Option<Duration>,
}

/// Probe outcomes split by whether a status code was obtained, both in input order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProbeBatchResult {
    pub results: Vec<ProbeResult>,
    pub errors: Vec<ProbeResult>,
}

impl ProbeBatchResult {
    pub fn partition(outcomes: Vec<ProbeResult>) -> Self {
        let (results, errors): (Vec<_>, Vec<_>) = outcomes.into_iter().partition(ProbeResult::is_success);
        Self { results, errors }
    }

    pub fn len(&self) -> usize {
        self.results.len() + self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Client shared by all probes of one batch.
///
/// Built without a cookie store, so no session state crosses probes or batches.
pub fn build_client(settings: &ClientSettings) -> Result<Client> {
    let mut builder = Client::builder().user_agent(settings.user_agent.as_str());
    if let Some(timeout) = settings.request_timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().context("building shared http client")
}

/// Run one probe as its own task.
///
/// A panic inside the probe is caught at the task boundary and turned into a
/// failed result, timed from task start to the panic.
fn spawn_guarded<F>(url: String, fut: F) -> JoinHandle<ProbeResult>
where
    F: Future<Output = ProbeResult> + Send + 'static,
{
    tokio::spawn(async move {
        let start = Instant::now();
        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => {
                let elapsed = start.elapsed().as_secs_f64();
                let failure = ProbeFailure::from_panic(payload);
                error!("probe task for {} died: {}", url, failure);
                observe_probe(false, elapsed);
                inc_failure(failure.label());
                ProbeResult::failed(&url, elapsed)
            }
        }
    })
}

/// Probe every URL concurrently and wait for all of them.
///
/// Per-URL failures end up in `errors`; only failing to build the client is an error here.
pub async fn probe_batch(urls: &[String], settings: &ClientSettings) -> Result<ProbeBatchResult> {
    let client = build_client(settings)?;
    let started = Instant::now();

    let handles: Vec<(Instant, JoinHandle<ProbeResult>)> = urls
        .iter()
        .map(|url| {
            let client = client.clone();
            let target = url.clone();
            (
                Instant::now(),
                spawn_guarded(url.clone(), async move { probe(&client, &target).await }),
            )
        })
        .collect();
    debug!("dispatched {} probes", handles.len());

    let mut outcomes = Vec::with_capacity(urls.len());
    for (url, (dispatched, handle)) in urls.iter().zip(handles) {
        match handle.await {
            Ok(result) => outcomes.push(result),
            // only reachable when the runtime cancels the task
            Err(e) => {
                let elapsed = dispatched.elapsed().as_secs_f64();
                let failure = ProbeFailure::from(e);
                info!("probe task for {} ended early: {}", url, failure);
                observe_probe(false, elapsed);
                inc_failure(failure.label());
                outcomes.push(ProbeResult::failed(url, elapsed));
            }
        }
    }
    drop(client);

    let batch = ProbeBatchResult::partition(outcomes);
    info!(
        "probed {} urls in {:.3}s: {} ok, {} failed",
        batch.len(),
        started.elapsed().as_secs_f64(),
        batch.results.len(),
        batch.errors.len()
    );
    Ok(batch)
}
