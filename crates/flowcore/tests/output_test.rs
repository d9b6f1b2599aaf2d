// crates/flowcore/tests/output_test.rs

use flowcore::{OutputError, OutputRegistry, OutputStatus, Value};
use std::time::Duration;
use tokio::time::Instant;

/// Initialize tracing for tests
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with_test_writer()
        .try_init();
}

#[tokio::test]
async fn test_resolve_wakes_every_awaiter() {
    init_tracing();
    let registry = OutputRegistry::new();
    let (future, resolver) = registry.create::<Value>();

    let first = tokio::spawn({
        let future = future.clone();
        async move { future.wait().await }
    });
    let second = tokio::spawn({
        let future = future.clone();
        async move { future.wait().await }
    });

    tokio::task::yield_now().await;
    resolver.resolve(Value::from("hello")).unwrap();

    assert_eq!(first.await.unwrap().unwrap(), Value::from("hello"));
    assert_eq!(second.await.unwrap().unwrap(), Value::from("hello"));

    // Late awaiters see the same value
    assert_eq!(future.wait().await.unwrap(), Value::from("hello"));
    assert_eq!(resolver.status(), OutputStatus::Resolved);
}

#[tokio::test]
async fn test_second_resolve_is_rejected_and_first_value_wins() {
    let registry = OutputRegistry::new();
    let (future, resolver) = registry.create::<String>();

    resolver.resolve("first".to_string()).unwrap();
    let err = resolver.resolve("second".to_string()).unwrap_err();

    assert_eq!(err, OutputError::DoubleResolution { id: resolver.id() });
    assert_eq!(future.wait().await.unwrap(), "first");
}

#[tokio::test(start_paused = true)]
async fn test_unresolved_output_times_out() {
    init_tracing();
    let registry = OutputRegistry::with_timeout(Duration::from_millis(5000));
    let (future, resolver) = registry.create::<Value>();

    let start = Instant::now();
    let err = future.wait().await.unwrap_err();

    assert!(err.is_timeout(), "expected timeout, got {err:?}");
    assert_eq!(err.id(), future.id());
    assert!(start.elapsed() >= Duration::from_millis(5000));
    assert_eq!(registry.status(future.id()), Some(OutputStatus::Failed));
    assert!(registry.pending().is_empty());

    // A late resolve cannot fix an output that already timed out
    let late = resolver.resolve(Value::from("late")).unwrap_err();
    assert!(late.is_timeout());
    assert!(future.wait().await.unwrap_err().is_timeout());
}

#[tokio::test(start_paused = true)]
async fn test_timeout_is_seen_once_by_all_awaiters() {
    let registry = OutputRegistry::with_timeout(Duration::from_millis(100));
    let (future, _resolver) = registry.create::<Value>();

    let (a, b) = tokio::join!(future.wait(), future.wait());

    assert_eq!(a.unwrap_err(), b.unwrap_err());
}

#[tokio::test(start_paused = true)]
async fn test_resolve_after_deadline_without_awaiters_fails() {
    let registry = OutputRegistry::with_timeout(Duration::from_millis(100));
    let (future, resolver) = registry.create::<Value>();

    tokio::time::sleep(Duration::from_millis(150)).await;

    assert!(resolver.resolve(Value::Null).unwrap_err().is_timeout());
    assert!(future.try_get().unwrap().unwrap_err().is_timeout());
}

#[tokio::test(start_paused = true)]
async fn test_resolve_before_deadline_keeps_value_after_it() {
    let registry = OutputRegistry::with_timeout(Duration::from_millis(100));
    let (future, resolver) = registry.create::<Value>();

    resolver.resolve(Value::from(1.0)).unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(future.wait().await.unwrap(), Value::from(1.0));
    assert_eq!(future.status(), OutputStatus::Resolved);
}

#[tokio::test]
async fn test_reject_reaches_awaiters() {
    let registry = OutputRegistry::new();
    let (future, resolver) = registry.create::<Value>();

    resolver.reject("upstream node failed").unwrap();

    match future.wait().await {
        Err(OutputError::Upstream { id, message }) => {
            assert_eq!(id, future.id());
            assert_eq!(message, "upstream node failed");
        }
        other => panic!("expected upstream failure, got {other:?}"),
    }
    assert!(resolver.resolve(Value::Null).is_err());
}

#[tokio::test]
async fn test_registry_tracks_pending_outputs() {
    let registry = OutputRegistry::new();
    let (a, resolve_a) = registry.create::<Value>();
    let (b, _resolve_b) = registry.create::<Value>();

    assert_ne!(a.id(), b.id());
    assert_eq!(registry.len(), 2);
    assert_eq!(registry.pending(), vec![a.id(), b.id()]);
    assert!(a.try_get().is_none());

    resolve_a.resolve(Value::from(true)).unwrap();

    assert_eq!(registry.pending(), vec![b.id()]);
    assert_eq!(registry.status(a.id()), Some(OutputStatus::Resolved));
    assert_eq!(a.id().to_string(), "output_0");
}
