mod common;

use batch_latency_probe::config::ProbeConfig;
use batch_latency_probe::handler::{BAD_JSON, Event, INVALID_URL, handle_event};
use common::{TestServer, refused_url};
use serde_json::Value;

fn config() -> ProbeConfig {
    ProbeConfig {
        request_timeout_ms: Some(5000),
        ..ProbeConfig::default()
    }
}

#[tokio::test]
async fn empty_list_is_ok() {
    let resp = handle_event(&Event::new("[]"), &config()).await.unwrap();
    assert_eq!(resp.status_code, 200);
    let body: Value = serde_json::from_str(&resp.body).unwrap();
    assert_eq!(body, serde_json::json!({"results": [], "errors": []}));
}

#[tokio::test]
async fn non_json_body_is_rejected() {
    let resp = handle_event(&Event::new("not json"), &config()).await.unwrap();
    assert_eq!(resp.status_code, 422);
    assert_eq!(resp.body, BAD_JSON);
    assert!(resp.headers.is_none());
}

#[tokio::test]
async fn missing_body_is_rejected() {
    let resp = handle_event(&Event::default(), &config()).await.unwrap();
    assert_eq!(resp.status_code, 422);
    assert_eq!(resp.body, BAD_JSON);
}

#[tokio::test]
async fn one_invalid_url_rejects_the_batch_before_probing() {
    let server = TestServer::ok().await;
    let body = serde_json::to_string(&vec![server.url(), "not a url".to_string()]).unwrap();

    let resp = handle_event(&Event::new(body), &config()).await.unwrap();

    assert_eq!(resp.status_code, 422);
    assert_eq!(resp.body, INVALID_URL);
    assert_eq!(server.hits(), 0);
}

#[tokio::test]
async fn without_validation_invalid_urls_are_errors() {
    let config = ProbeConfig {
        validate_urls: false,
        ..config()
    };

    let resp = handle_event(&Event::new(r#"["not a url"]"#), &config).await.unwrap();

    assert_eq!(resp.status_code, 200);
    let body: Value = serde_json::from_str(&resp.body).unwrap();
    assert_eq!(body["results"], serde_json::json!([]));
    assert_eq!(body["errors"][0]["url"], "not a url");
    assert_eq!(body["errors"][0]["status_code"], Value::Null);
    assert!(body["errors"][0]["time"].as_f64().unwrap() >= 0.0);
}

#[tokio::test]
async fn mixed_batch_returns_json_partition() {
    let server = TestServer::ok().await;
    let refused = refused_url().await;
    let body = serde_json::to_string(&vec![server.url(), refused.clone()]).unwrap();

    let resp = handle_event(&Event::new(body), &config()).await.unwrap();

    assert_eq!(resp.status_code, 200);
    let headers = resp.headers.expect("json response carries headers");
    assert_eq!(headers["Content-Type"], "application/json");

    let body: Value = serde_json::from_str(&resp.body).unwrap();
    assert_eq!(body["results"].as_array().unwrap().len(), 1);
    assert_eq!(body["errors"].as_array().unwrap().len(), 1);
    assert_eq!(body["results"][0]["url"], server.url());
    assert_eq!(body["results"][0]["status_code"], 200);
    assert_eq!(body["errors"][0]["url"], refused);
    assert_eq!(body["errors"][0]["status_code"], Value::Null);
}
