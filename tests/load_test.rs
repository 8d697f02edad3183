//! Concurrent load against a failing license service.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use licensing_resilience::licensing::{LicenseClient, LicenseError};
use licensing_resilience::observability::events::drain;
use licensing_resilience::observability::{ChannelSink, EventKind, NoopSink};
use licensing_resilience::resilience::{BreakerRegistry, CircuitState};

mod common;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_failures_open_once() {
    let call_count = Arc::new(AtomicU32::new(0));
    let cc = call_count.clone();
    let addr = common::start_license_server(move |_| {
        cc.fetch_add(1, Ordering::SeqCst);
        async { (503, "Service Unavailable".into()) }
    })
    .await;

    let mut config = common::test_config(addr);
    config.retry.max_attempts = 1;
    config.circuit_breaker.failure_threshold = 3;

    let (sink, mut rx) = ChannelSink::new();
    let registry = BreakerRegistry::new(config.circuit_breaker.to_options()).with_events(Arc::new(sink));
    let client = LicenseClient::new(&config, &registry, Arc::new(NoopSink)).unwrap();

    let concurrency = 32;
    let mut handles = Vec::with_capacity(concurrency);
    for i in 0..concurrency {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            client.validate(&format!("LIC-{i}"), "device-a").await
        }));
    }

    let mut failed = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Err(LicenseError::Request(_)) => failed += 1,
            Err(LicenseError::Unavailable { .. }) => rejected += 1,
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    assert_eq!(failed + rejected, concurrency);
    assert!(failed >= 3);
    assert_eq!(call_count.load(Ordering::SeqCst) as usize, failed);
    assert_eq!(client.breaker().state(), CircuitState::Open);

    let opens = drain(&mut rx)
        .into_iter()
        .filter(|e| e.kind == EventKind::CircuitOpen)
        .count();
    assert_eq!(opens, 1, "Late failures from the same generation must not re-open");

    let err = client.validate("LIC-late", "device-a").await.unwrap_err();
    assert!(err.is_unavailable());
    assert_eq!(call_count.load(Ordering::SeqCst) as usize, failed);
}
