use reqwest::Client;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{ProbeFailure, ProbeResult};
use crate::metrics::{observe_probe, inc_failure};

/// GET `url` once and measure until the whole body is read.
///
/// Never fails: any client-layer error becomes a result without a status code,
/// timed up to the point the error surfaced.
pub async fn probe(client: &Client, url: &str) -> ProbeResult {
    let start = Instant::now();
    let outcome = fetch(client, url).await;
    let elapsed = start.elapsed().as_secs_f64();

    match outcome {
        Ok(status) => {
            debug!("http probe {} -> {} in {:.3}s", url, status, elapsed);
            observe_probe(true, elapsed);
            ProbeResult::succeeded(url, status, elapsed)
        }
        Err(failure) => {
            warn!("http probe {} failed after {:.3}s: {}", url, elapsed, failure);
            observe_probe(false, elapsed);
            inc_failure(failure.label());
            ProbeResult::failed(url, elapsed)
        }
    }
}

async fn fetch(client: &Client, url: &str) -> Result<u16, ProbeFailure> {
    let resp = client.get(url).send().await?;
    let status = resp.status().as_u16();
    // drain so the connection goes back to the pool and the timing covers the transfer
    let _ = resp.bytes().await?;
    Ok(status)
}
