use prometheus::{Encoder, TextEncoder, HistogramVec, IntCounterVec, Opts, Registry};
use warp::Filter;
use std::net::SocketAddr;
use once_cell::sync::{Lazy, OnceCell};
use anyhow::Result;

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

static REQUEST_COUNTER: Lazy<IntCounterVec> = Lazy::new(|| {
    let opts = Opts::new("probe_requests_total", "Handled probe requests by response status code");
    let ctr = IntCounterVec::new(opts, &["status"]).expect("creating request counter");
    REGISTRY.register(Box::new(ctr.clone())).expect("registering request counter");
    ctr
});

static RESULT_COUNTER: Lazy<IntCounterVec> = Lazy::new(|| {
    let opts = Opts::new("probe_results_total", "Probes by outcome");
    let ctr = IntCounterVec::new(opts, &["outcome"]).expect("creating result counter");
    REGISTRY.register(Box::new(ctr.clone())).expect("registering result counter");
    ctr
});

static FAILURE_COUNTER: Lazy<IntCounterVec> = Lazy::new(|| {
    let opts = Opts::new("probe_failures_total", "Failed probes by failure class");
    let ctr = IntCounterVec::new(opts, &["reason"]).expect("creating failure counter");
    REGISTRY.register(Box::new(ctr.clone())).expect("registering failure counter");
    ctr
});

// Only set when latency history is enabled.
static LATENCY_HIST: OnceCell<HistogramVec> = OnceCell::new();

pub fn initialize_metrics(enable_latency_history: bool) -> Result<()> {
    Lazy::force(&REQUEST_COUNTER);
    Lazy::force(&RESULT_COUNTER);
    Lazy::force(&FAILURE_COUNTER);

    if enable_latency_history {
        LATENCY_HIST.get_or_try_init(|| -> Result<HistogramVec> {
            let opts = Opts::new("probe_latency_seconds", "Probe latency in seconds");
            let hist = HistogramVec::new(
                prometheus::HistogramOpts {
                    common_opts: opts,
                    buckets: vec![
                        0.005, 0.01, 0.025, 0.05, 0.1, 0.25,
                        0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0
                    ],
                },
                &["outcome"],
            )?;
            REGISTRY.register(Box::new(hist.clone()))?;
            Ok(hist)
        })?;
    }
    Ok(())
}

/// Prometheus text exposition of everything registered so far.
pub fn render() -> Result<Vec<u8>> {
    let encoder = TextEncoder::new();
    let mf = REGISTRY.gather();
    let mut buf = Vec::new();
    encoder.encode(&mf, &mut buf)?;
    Ok(buf)
}

pub async fn serve_metrics(addr: SocketAddr) {
    let metrics_route = warp::path!("metrics").map(move || {
        let (status, body) = match render() {
            Ok(buf) => (warp::http::StatusCode::OK, buf),
            Err(e) => {
                tracing::error!("encoding metrics failed: {:?}", e);
                (warp::http::StatusCode::INTERNAL_SERVER_ERROR, Vec::new())
            }
        };
        warp::reply::with_status(
            warp::reply::with_header(body, "Content-Type", TextEncoder::new().format_type().to_string()),
            status,
        )
    });

    tracing::info!("serving metrics on {}", addr);
    warp::serve(metrics_route).run(addr).await;
}

pub fn inc_request(status: u16) {
    REQUEST_COUNTER
        .with_label_values(&[status.to_string().as_str()])
        .inc();
}

pub fn observe_probe(success: bool, latency_secs: f64) {
    let outcome = if success { "success" } else { "failure" };
    RESULT_COUNTER.with_label_values(&[outcome]).inc();

    if let Some(hist) = LATENCY_HIST.get() {
        hist.with_label_values(&[outcome]).observe(latency_secs);
    }
}

pub fn inc_failure(reason: &str) {
    FAILURE_COUNTER
        .with_label_values(&[reason])
        .inc();
}
