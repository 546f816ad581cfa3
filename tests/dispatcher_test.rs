//! Batch dispatcher behavior against a mock webhook receiver.

use leadgen_dispatch::config::Config;
use leadgen_dispatch::dispatch::{
    BatchDispatcher, CallError, DispatchSettings, PayloadShape, WebhookKind, WebhookTarget,
};
use leadgen_dispatch::error::Error;
use leadgen_dispatch::model::ItemIds;
use secrecy::SecretString;
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn dispatcher(server: &MockServer, concurrency: usize, call_timeout: Duration) -> BatchDispatcher {
    let target = WebhookTarget::new(
        WebhookKind::AiScore,
        format!("{}/hook", server.uri()),
        None,
    );
    BatchDispatcher::new(
        &DispatchSettings {
            concurrency,
            call_timeout,
        },
        &target,
    )
}

fn item_payload(id: &str) -> serde_json::Value {
    PayloadShape::new("business_id").build(id)
}

fn set(ids: &[&str]) -> BTreeSet<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn duplicates_collapse_to_one_call_each() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .expect(3)
        .mount(&server)
        .await;

    let ids = ItemIds::new(["a", "a", "b", "c"]);
    let outcome = dispatcher(&server, 2, Duration::from_secs(5))
        .dispatch(&ids, item_payload)
        .await;

    assert_eq!(outcome.succeeded, set(&["a", "b", "c"]));
    assert!(outcome.failed.is_empty());

    let requests = server.received_requests().await.unwrap();
    let mut posted: Vec<String> = requests
        .iter()
        .map(|r| {
            let body: serde_json::Value = serde_json::from_slice(&r.body).unwrap();
            body["business_id"].as_str().unwrap().to_string()
        })
        .collect();
    posted.sort();
    assert_eq!(posted, ["a", "b", "c"]);
}

#[tokio::test]
async fn non_success_status_is_recorded_as_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"business_id": "b"})))
        .respond_with(ResponseTemplate::new(500).set_body_string("workflow exploded"))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let ids = ItemIds::new(["a", "b"]);
    let outcome = dispatcher(&server, 5, Duration::from_secs(5))
        .dispatch(&ids, item_payload)
        .await;

    assert_eq!(outcome.succeeded, set(&["a"]));
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.failed[0].id, "b");
    assert_eq!(outcome.failed[0].status, Some(500));
    assert_eq!(outcome.failed[0].reason, "HTTP 500: workflow exploded");
}

#[tokio::test]
async fn long_error_bodies_are_truncated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("e".repeat(500)))
        .mount(&server)
        .await;

    let outcome = dispatcher(&server, 3, Duration::from_secs(5))
        .dispatch(&ItemIds::new(["x"]), item_payload)
        .await;

    let reason = &outcome.failed[0].reason;
    assert!(reason.starts_with("HTTP 502: eee"));
    assert!(reason.ends_with("..."));
    assert_eq!(reason.len(), "HTTP 502: ".len() + 200 + 3);
}

#[tokio::test]
async fn empty_batch_makes_no_calls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let ids = ItemIds::new(Vec::<String>::new());
    let outcome = dispatcher(&server, 3, Duration::from_secs(5))
        .dispatch(&ids, item_payload)
        .await;

    assert!(outcome.is_empty());
    assert!(outcome.succeeded.is_empty());
    assert!(outcome.failed.is_empty());
}

#[tokio::test]
async fn blank_ids_are_filtered_before_dispatch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let ids = ItemIds::from_json(&json!(["", "   "])).unwrap();
    let outcome = dispatcher(&server, 3, Duration::from_secs(5))
        .dispatch(&ids, item_payload)
        .await;
    assert_eq!(outcome.total(), 0);
}

#[tokio::test]
async fn slow_calls_time_out_as_failures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"business_id": "slow"})))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let ids = ItemIds::new(["fast", "slow"]);
    let outcome = dispatcher(&server, 2, Duration::from_millis(200))
        .dispatch(&ids, item_payload)
        .await;

    assert_eq!(outcome.succeeded, set(&["fast"]));
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.failed[0].id, "slow");
    assert!(outcome.failed[0].reason.starts_with("timed out"));
    assert_eq!(outcome.failed[0].status, None);
}

#[tokio::test]
async fn transport_errors_are_recorded() {
    // Bind then drop a listener so the port refuses connections.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let target = WebhookTarget::new(WebhookKind::PlaceEnrich, format!("http://{addr}/hook"), None);

    let dispatcher = BatchDispatcher::new(&DispatchSettings::default(), &target);
    let outcome = dispatcher
        .dispatch(&ItemIds::new(["a"]), item_payload)
        .await;

    assert!(outcome.succeeded.is_empty());
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.failed[0].status, None);
    assert!(!outcome.failed[0].reason.is_empty());
}

#[tokio::test]
async fn secret_header_is_sent_when_configured() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("x-webhook-secret", "s3cret"))
        .and(body_partial_json(json!({"place_id": "p-1"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let target = WebhookTarget::new(
        WebhookKind::PlaceEnrich,
        server.uri(),
        Some(SecretString::from("s3cret")),
    );
    let dispatcher = BatchDispatcher::new(&DispatchSettings::default(), &target);
    let shape = PayloadShape::new("place_id");
    let outcome = dispatcher
        .dispatch(&ItemIds::new(["p-1"]), |id| shape.build(id))
        .await;

    assert!(outcome.all_succeeded());
    assert_eq!(outcome.succeeded_count(), 1);
}

#[tokio::test]
async fn missing_webhook_config_rejects_before_any_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = Config::from_vars(|_| None).unwrap();
    let result = BatchDispatcher::from_config(&config, WebhookKind::PlaceEnrich);
    assert!(matches!(result, Err(Error::Config(_))));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn from_config_uses_configured_settings() {
    let config = Config::from_vars(|name| match name {
        "N8N_AI_ENRICH_WEBHOOK_URL" => Some("http://hooks.local/score".to_string()),
        "DISPATCH_CONCURRENCY" => Some("5".to_string()),
        _ => None,
    })
    .unwrap();
    let dispatcher = BatchDispatcher::from_config(&config, WebhookKind::AiScore).unwrap();
    assert_eq!(dispatcher.settings().concurrency, 5);
    assert_eq!(dispatcher.kind(), WebhookKind::AiScore);
}

// ---------------------------------------------------------------------------
// Concurrency bound, measured with an instrumented call
// ---------------------------------------------------------------------------

#[tokio::test]
async fn in_flight_calls_never_exceed_limit_and_chunks_do_not_overlap() {
    let target = WebhookTarget::new(WebhookKind::AiScore, "http://unused.invalid", None);
    let dispatcher = BatchDispatcher::new(
        &DispatchSettings {
            concurrency: 3,
            call_timeout: Duration::from_secs(5),
        },
        &target,
    );

    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let spans = Arc::new(Mutex::new(Vec::new()));

    let raw: Vec<String> = (0..10).map(|i| format!("item-{i:02}")).collect();
    let ids = ItemIds::new(&raw);

    let outcome = dispatcher
        .dispatch_with(&ids, |id| {
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            let spans = Arc::clone(&spans);
            async move {
                let start = tokio::time::Instant::now();
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                // Later items finish sooner, so a chunk's join really waits.
                let index: u64 = id[5..].parse().unwrap();
                tokio::time::sleep(Duration::from_millis(40 - index * 3)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                spans
                    .lock()
                    .unwrap()
                    .push((index, start, tokio::time::Instant::now()));
                if index % 4 == 3 {
                    Err(CallError::transport("simulated"))
                } else {
                    Ok(())
                }
            }
        })
        .await;

    assert_eq!(outcome.total(), 10);
    assert_eq!(outcome.failed_count(), 2);
    assert!(peak.load(Ordering::SeqCst) <= 3);
    assert_eq!(peak.load(Ordering::SeqCst), 3);

    let spans = spans.lock().unwrap().clone();
    for chunk in 0..3u64 {
        let chunk_end = spans
            .iter()
            .filter(|(i, _, _)| i / 3 == chunk)
            .map(|(_, _, end)| *end)
            .max()
            .unwrap();
        let next_start = spans
            .iter()
            .filter(|(i, _, _)| i / 3 == chunk + 1)
            .map(|(_, start, _)| *start)
            .min()
            .unwrap();
        assert!(next_start >= chunk_end, "chunk {} overlapped", chunk + 1);
    }
}

#[tokio::test]
async fn every_item_accounted_for_exactly_once() {
    let target = WebhookTarget::new(WebhookKind::AiScore, "http://unused.invalid", None);
    let dispatcher = BatchDispatcher::new(
        &DispatchSettings {
            concurrency: 4,
            call_timeout: Duration::from_millis(100),
        },
        &target,
    );

    let raw = ["a", "b", "c", "d", "e", "f", "a", "c", " g "];
    let ids = ItemIds::new(raw);
    let outcome = dispatcher
        .dispatch_with(&ids, |id| async move {
            match id.as_str() {
                "b" | "e" => Err(CallError::status(503, "unavailable")),
                "f" => {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    Ok(())
                }
                _ => Ok(()),
            }
        })
        .await;

    assert_eq!(outcome.total(), ids.len());
    let failed: BTreeSet<String> = outcome.failed_ids().map(str::to_string).collect();
    assert!(outcome.succeeded.is_disjoint(&failed));
    let all: BTreeSet<String> = outcome.succeeded.union(&failed).cloned().collect();
    assert_eq!(all, set(&["a", "b", "c", "d", "e", "f", "g"]));
    assert_eq!(failed, set(&["b", "e", "f"]));
}
