//! Shared utilities for integration tests.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use herdmaster::admission::AdmissionController;
use herdmaster::config::ServiceConfig;
use herdmaster::http::HttpServer;
use herdmaster::lifecycle::Shutdown;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A service running on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub controller: Arc<AdmissionController>,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<()>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Boot the service with `routes` behind admission control.
///
/// The admin listener stays off so tests never fight over its port.
pub async fn spawn_server(mut config: ServiceConfig, routes: Router) -> TestServer {
    config.admin.enabled = false;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = HttpServer::with_routes(config, routes);
    let controller = Arc::clone(server.controller());
    let shutdown = Shutdown::new();

    let signal = shutdown.clone();
    let handle = tokio::spawn(async move {
        server.run(listener, signal).await.unwrap();
    });

    TestServer {
        addr,
        controller,
        shutdown,
        handle,
    }
}

/// HTTP client that never goes through an environment proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Poll `condition` until it holds, failing the test after two seconds.
#[allow(dead_code)]
pub async fn wait_until<F>(condition: F)
where
    F: Fn() -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Await `future`, failing the test if it takes longer than five seconds.
#[allow(dead_code)]
pub async fn within<T>(future: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("operation timed out")
}
