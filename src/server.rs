use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::RwLock;
use warp::Filter;
use warp::http::{HeaderName, HeaderValue, StatusCode};

use crate::config::ProbeConfig;
use crate::handler::{Event, Response, handle_event};

/// `POST /probe`: the raw request body is the event body.
///
/// A body that is not UTF-8 is passed on as a missing body, so it is rejected
/// like any other malformed input.
pub fn routes(
    config: Arc<RwLock<ProbeConfig>>,
) -> impl Filter<Extract = (warp::http::Response<Vec<u8>>,), Error = warp::Rejection> + Clone {
    warp::path!("probe")
        .and(warp::post())
        .and(warp::body::bytes())
        .then(move |body: Bytes| {
            let config = config.clone();
            async move {
                let event = match std::str::from_utf8(&body) {
                    Ok(text) => Event::new(text),
                    Err(e) => {
                        tracing::debug!("request body is not utf-8: {}", e);
                        Event::default()
                    }
                };
                let snapshot = config.read().await.clone();
                match handle_event(&event, &snapshot).await {
                    Ok(resp) => into_http(resp),
                    Err(e) => {
                        tracing::error!("probe request failed: {:#}", e);
                        let mut resp = warp::http::Response::new(b"Internal error".to_vec());
                        *resp.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                        resp
                    }
                }
            }
        })
}

fn into_http(resp: Response) -> warp::http::Response<Vec<u8>> {
    let mut out = warp::http::Response::new(resp.body.into_bytes());
    *out.status_mut() = StatusCode::from_u16(resp.status_code)
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    for (name, value) in resp.headers.unwrap_or_default() {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(&value)) {
            (Ok(name), Ok(value)) => {
                out.headers_mut().insert(name, value);
            }
            _ => tracing::warn!("dropping invalid response header {}", name),
        }
    }
    out
}

pub async fn serve(addr: SocketAddr, config: Arc<RwLock<ProbeConfig>>) {
    tracing::info!("serving probe requests on {}", addr);
    warp::serve(routes(config)).run(addr).await;
}
