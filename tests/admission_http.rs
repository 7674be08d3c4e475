//! End-to-end admission behaviour over real HTTP.

use std::sync::Arc;

use axum::{routing::get, Router};
use herdmaster::config::ServiceConfig;
use herdmaster::http::X_REQUEST_ID;
use reqwest::StatusCode;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Semaphore;

mod common;

/// Routes whose `/hold` handler blocks until the gate hands out a permit.
fn gated_routes(gate: Arc<Semaphore>) -> Router {
    Router::new()
        .route(
            "/hold",
            get(move || {
                let gate = Arc::clone(&gate);
                async move {
                    if let Ok(permit) = gate.acquire().await {
                        permit.forget();
                    }
                    "released"
                }
            }),
        )
        .route("/fast", get(|| async { "fast" }))
        .route(
            "/stuck",
            get(|| async {
                std::future::pending::<()>().await;
                "never"
            }),
        )
        .route(
            "/panic",
            get(|| async {
                if true {
                    panic!("handler failure");
                }
                "unreachable"
            }),
        )
}

fn config(
    max_running: i64,
    max_in_flight: i64,
    retry_after_secs: i64,
    request_ms: u64,
) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.admission.max_running = max_running;
    config.admission.max_in_flight = max_in_flight;
    config.admission.retry_after_secs = retry_after_secs;
    config.timeouts.request_ms = request_ms;
    config
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn queued_request_runs_after_holder_and_excess_is_rejected() {
    let gate = Arc::new(Semaphore::new(0));
    let routes = gated_routes(Arc::clone(&gate));
    let server = common::spawn_server(config(1, 2, 7, 10_000), routes).await;
    let client = common::client();

    let a = tokio::spawn(client.get(server.url("/hold")).send());
    common::wait_until(|| server.controller.running() == 1).await;

    let b = tokio::spawn(client.get(server.url("/hold")).send());
    common::wait_until(|| server.controller.in_flight() == 2).await;

    let c = common::within(client.get(server.url("/fast")).send()).await.unwrap();
    assert_eq!(c.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(c.headers()["retry-after"], "7");
    assert!(c.headers().contains_key(X_REQUEST_ID.as_str()));
    assert_eq!(server.controller.rejected(), 1);
    assert_eq!(server.controller.running(), 1);

    gate.add_permits(2);
    let a = common::within(a).await.unwrap().unwrap();
    let b = common::within(b).await.unwrap().unwrap();
    assert_eq!(a.status(), StatusCode::OK);
    assert_eq!(b.status(), StatusCode::OK);
    assert_eq!(b.text().await.unwrap(), "released");

    assert_eq!(server.controller.timed_out(), 0);
    common::wait_until(|| server.controller.in_flight() == 0).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn caller_deadline_while_queued_answers_429() {
    let gate = Arc::new(Semaphore::new(0));
    let routes = gated_routes(Arc::clone(&gate));
    let server = common::spawn_server(config(1, 5, 2, 100), routes).await;
    let client = common::client();

    let a = tokio::spawn(client.get(server.url("/hold")).send());
    common::wait_until(|| server.controller.running() == 1).await;

    let b = common::within(client.get(server.url("/fast")).send()).await.unwrap();
    assert_eq!(b.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(b.headers()["retry-after"], "2");
    assert_eq!(server.controller.timed_out(), 1);
    assert_eq!(server.controller.rejected(), 0);

    gate.add_permits(1);
    // The holder's own deadline has long passed, but it already had a slot.
    let a = common::within(a).await.unwrap().unwrap();
    assert_eq!(a.status(), StatusCode::OK);
}

#[tokio::test]
async fn request_id_is_echoed_or_generated() {
    let routes = gated_routes(Arc::new(Semaphore::new(0)));
    let server = common::spawn_server(config(4, 4, 1, 1_000), routes).await;
    let client = common::client();

    let echoed = client
        .get(server.url("/fast"))
        .header(X_REQUEST_ID.as_str(), "caller-supplied-42")
        .send()
        .await
        .unwrap();
    assert_eq!(echoed.headers()[X_REQUEST_ID.as_str()], "caller-supplied-42");

    let mut generated = Vec::new();
    for _ in 0..2 {
        let response = client.get(server.url("/fast")).send().await.unwrap();
        let id = response.headers()[X_REQUEST_ID.as_str()]
            .to_str()
            .unwrap()
            .to_string();
        let parsed = uuid::Uuid::parse_str(&id).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
        generated.push(id);
    }
    assert_ne!(generated[0], generated[1]);
}

#[tokio::test]
async fn handler_panic_is_500_and_capacity_recovers() {
    let routes = gated_routes(Arc::new(Semaphore::new(0)));
    let server = common::spawn_server(config(1, 1, 1, 1_000), routes).await;
    let client = common::client();

    let response = client.get(server.url("/panic")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.headers().contains_key(X_REQUEST_ID.as_str()));

    common::wait_until(|| server.controller.in_flight() == 0).await;
    assert_eq!(server.controller.running(), 0);

    let response = client.get(server.url("/fast")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shutdown_releases_queued_requests_and_drains_running_ones() {
    let gate = Arc::new(Semaphore::new(0));
    let routes = gated_routes(Arc::clone(&gate));
    let server = common::spawn_server(config(1, 5, 1, 10_000), routes).await;
    let client = common::client();

    let a = tokio::spawn(client.get(server.url("/hold")).send());
    common::wait_until(|| server.controller.running() == 1).await;

    let b = tokio::spawn(client.get(server.url("/fast")).send());
    common::wait_until(|| server.controller.in_flight() == 2).await;

    server.shutdown.trigger();

    let b = common::within(b).await.unwrap().unwrap();
    assert_eq!(b.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(server.controller.timed_out(), 1);

    gate.add_permits(1);
    let a = common::within(a).await.unwrap().unwrap();
    assert_eq!(a.status(), StatusCode::OK);

    common::within(server.handle).await.unwrap();
}

#[tokio::test]
async fn business_scaffold_answers_501() {
    let server = common::spawn_server(ServiceConfig::default(), herdmaster::routes::router()).await;
    let client = common::client();

    let response = client.delete(server.url("/owner/12")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    assert!(response.headers().contains_key(X_REQUEST_ID.as_str()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn client_disconnect_while_queued_counts_as_timed_out() {
    let gate = Arc::new(Semaphore::new(0));
    let routes = gated_routes(Arc::clone(&gate));
    let server = common::spawn_server(config(1, 5, 1, 10_000), routes).await;
    let client = common::client();

    let a = tokio::spawn(client.get(server.url("/hold")).send());
    common::wait_until(|| server.controller.running() == 1).await;

    let mut socket = TcpStream::connect(server.addr).await.unwrap();
    socket
        .write_all(b"GET /hold HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();
    common::wait_until(|| server.controller.in_flight() == 2).await;

    drop(socket);
    common::wait_until(|| server.controller.in_flight() == 1).await;
    assert_eq!(server.controller.timed_out(), 1);
    assert_eq!(server.controller.rejected(), 0);

    gate.add_permits(1);
    let a = common::within(a).await.unwrap().unwrap();
    assert_eq!(a.status(), StatusCode::OK);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shutdown_gives_up_on_a_stuck_handler() {
    let mut config = config(1, 5, 1, 200);
    config.timeouts.shutdown_ms = 200;
    let server = common::spawn_server(config, gated_routes(Arc::new(Semaphore::new(0)))).await;
    let client = common::client();

    let stuck = tokio::spawn(client.get(server.url("/stuck")).send());
    common::wait_until(|| server.controller.running() == 1).await;

    server.shutdown.trigger();
    tokio::time::timeout(std::time::Duration::from_secs(3), server.handle)
        .await
        .expect("server should stop once the drain timeout passes")
        .unwrap();

    stuck.abort();
}
