//! Common test utilities for integration tests
//!
//! Shared fixtures for driving a coordinator against a wiremock Discovery
//! Service.

use std::sync::Arc;
use std::time::Duration;

use dpi_console::domain::models::{DeliveryMode, ServiceConfig};
use dpi_console::{
    CoordinatorSettings, DiscoveryCoordinator, DiscoveryService, DiscoveryView,
    HttpDiscoveryClient, SessionStore, StatusPoller,
};
use wiremock::MockServer;

/// Poll interval used by integration tests
#[allow(dead_code)]
pub const FAST_INTERVAL: Duration = Duration::from_millis(20);

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
#[allow(dead_code)]
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// HTTP client pointed at `base_url` with the default `/api` prefix
#[allow(dead_code)]
pub fn client_for_url(base_url: &str) -> Arc<dyn DiscoveryService> {
    let config = ServiceConfig {
        base_url: base_url.to_string(),
        timeout_secs: 2,
        ..ServiceConfig::default()
    };
    Arc::new(HttpDiscoveryClient::from_config(&config).expect("client should build"))
}

/// HTTP client pointed at a mock server
#[allow(dead_code)]
pub fn client_for(server: &MockServer) -> Arc<dyn DiscoveryService> {
    client_for_url(&server.uri())
}

/// Idle coordinator with explicit tuning
#[allow(dead_code)]
pub fn coordinator(
    service: Arc<dyn DiscoveryService>,
    store: Arc<dyn SessionStore>,
    interval: Duration,
    mode: DeliveryMode,
    resume_failure_threshold: u32,
) -> DiscoveryCoordinator {
    let poller = StatusPoller::with_config(Arc::clone(&service), interval, mode);
    DiscoveryCoordinator::new(
        service,
        store,
        poller,
        CoordinatorSettings {
            resume_failure_threshold,
        },
    )
}

/// Mounted coordinator (resumes whatever `store` holds), polling fast
#[allow(dead_code)]
pub async fn mount_polling(
    service: Arc<dyn DiscoveryService>,
    store: Arc<dyn SessionStore>,
) -> DiscoveryCoordinator {
    let poller = StatusPoller::with_config(Arc::clone(&service), FAST_INTERVAL, DeliveryMode::Poll);
    DiscoveryCoordinator::mount(service, store, poller, CoordinatorSettings::default()).await
}

/// Wait until the coordinator publishes a view matching `predicate`
///
/// Panics after five seconds, printing the last view.
#[allow(dead_code)]
pub async fn wait_for_view<F>(coordinator: &DiscoveryCoordinator, mut predicate: F) -> Arc<DiscoveryView>
where
    F: FnMut(&DiscoveryView) -> bool,
{
    let mut views = coordinator.subscribe();
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let view = views.borrow_and_update().clone();
            if predicate(&view) {
                return view;
            }
            views.changed().await.expect("view channel closed");
        }
    })
    .await;

    match waited {
        Ok(view) => view,
        Err(_) => panic!("timed out waiting for view; last view: {:#?}", coordinator.view()),
    }
}

/// Minimal session payload
#[allow(dead_code)]
pub fn session_json(id: &str, status: &str, total: u64, completed: u64) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "status": status,
        "total_checks": total,
        "completed_checks": completed,
    })
}

/// A port on localhost with nothing listening
#[allow(dead_code)]
pub fn unreachable_base_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}
