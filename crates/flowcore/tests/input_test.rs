// crates/flowcore/tests/input_test.rs

use flowcore::{resolve_inputs, FlowError, Input, InputBag, OutputError, OutputRegistry, Value};
use std::time::Duration;
use tokio::time::{sleep, Instant};

fn resolve_later(resolver: flowcore::Resolver<Value>, delay_ms: u64, value: Value) {
    tokio::spawn(async move {
        sleep(Duration::from_millis(delay_ms)).await;
        resolver.resolve(value).unwrap();
    });
}

#[tokio::test]
async fn test_concrete_inputs_pass_through() {
    let mut inputs = InputBag::new();
    inputs.insert("title".to_string(), Input::from("Secrets"));
    inputs.insert("count".to_string(), Input::from(3.0));

    let resolved = resolve_inputs(&inputs).await.unwrap();

    assert_eq!(resolved.get("title"), Some(&Value::from("Secrets")));
    assert_eq!(resolved.get("count"), Some(&Value::from(3.0)));
}

#[tokio::test(start_paused = true)]
async fn test_pending_inputs_resolve_in_parallel() {
    let registry = OutputRegistry::with_timeout(Duration::from_secs(10));
    let (slow, resolve_slow) = registry.create::<Value>();
    let (medium, resolve_medium) = registry.create::<Value>();
    let (fast, resolve_fast) = registry.create::<Value>();

    let mut inputs = InputBag::new();
    inputs.insert("slow".to_string(), Input::from(&slow));
    inputs.insert("medium".to_string(), Input::from(&medium));
    inputs.insert("fast".to_string(), Input::from(&fast));
    inputs.insert("plain".to_string(), Input::from("ready"));

    resolve_later(resolve_slow, 300, Value::from("s"));
    resolve_later(resolve_medium, 200, Value::from("m"));
    resolve_later(resolve_fast, 100, Value::from("f"));

    let start = Instant::now();
    let resolved = resolve_inputs(&inputs).await.unwrap();
    let elapsed = start.elapsed();

    assert!(elapsed >= Duration::from_millis(300), "returned before slowest input: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(600), "inputs were awaited serially: {elapsed:?}");
    assert_eq!(resolved.len(), 4);
    assert_eq!(resolved["slow"], Value::from("s"));
    assert_eq!(resolved["medium"], Value::from("m"));
    assert_eq!(resolved["fast"], Value::from("f"));
}

#[tokio::test]
async fn test_failed_input_fails_whole_resolution() {
    let registry = OutputRegistry::new();
    let (ok, resolve_ok) = registry.create::<Value>();
    let (broken, resolve_broken) = registry.create::<Value>();

    resolve_ok.resolve(Value::from("fine")).unwrap();
    resolve_broken.reject("producer crashed").unwrap();

    let mut inputs = InputBag::new();
    inputs.insert("a".to_string(), Input::from(ok));
    inputs.insert("b".to_string(), Input::from(broken));

    match resolve_inputs(&inputs).await {
        Err(FlowError::Resolution { input, source }) => {
            assert_eq!(input, "b");
            assert!(matches!(source, OutputError::Upstream { .. }));
        }
        other => panic!("expected resolution error, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_never_resolved_input_surfaces_timeout() {
    let registry = OutputRegistry::with_timeout(Duration::from_millis(250));
    let (never, _resolver) = registry.create::<Value>();

    let mut inputs = InputBag::new();
    inputs.insert("content".to_string(), Input::from(never));

    let err = resolve_inputs(&inputs).await.unwrap_err();

    match err {
        FlowError::Resolution { input, source } => {
            assert_eq!(input, "content");
            assert!(source.is_timeout());
        }
        other => panic!("expected resolution error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_typed_input_resolves() {
    let registry = OutputRegistry::new();
    let (future, resolver) = registry.create::<u32>();
    resolver.resolve(7).unwrap();

    let pending: Input<u32> = Input::Pending(future);
    let concrete: Input<u32> = Input::Concrete(3);

    assert!(pending.is_pending());
    assert_eq!(pending.resolve().await.unwrap() + concrete.resolve().await.unwrap(), 10);
}
