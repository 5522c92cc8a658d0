//! Load testing for shared policy instances.

use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;

use resilient_client::resilience::{ManualClock, PolicyError};
use resilient_client::{execute_resiliently, CircuitBreaker, CircuitState, FailureClass, ResilientPolicy};

mod common;

use common::{breaker_config, resilience_config, CallCounter, RecordingListener, Unavailable};

#[tokio::test]
async fn test_concurrent_failures_open_circuit_once() {
    let events = Arc::new(RecordingListener::default());
    let breaker = Arc::new(
        CircuitBreaker::new("shared", &breaker_config(3, 1, 600_000))
            .with_clock(Arc::new(ManualClock::new()))
            .with_listener(events.clone()),
    );
    let calls = CallCounter::default();

    // All callers are admitted while Closed, then fail together.
    let results = join_all((0..25).map(|_| {
        execute_resiliently(
            || async {
                calls.hit();
                tokio::task::yield_now().await;
                Err::<(), _>(Unavailable)
            },
            &breaker,
        )
    }))
    .await;

    assert_eq!(calls.count(), 25);
    assert!(results.iter().all(|r| r.as_ref().is_err_and(|f| f.class == FailureClass::Failed)));
    assert_eq!(events.circuit_events(), vec!["break"]);

    let stats = breaker.stats();
    assert_eq!(stats.state, CircuitState::Open);
    // Outcomes arriving after the transition are ignored.
    assert_eq!(stats.consecutive_failures, 3);
}

#[tokio::test]
async fn test_half_open_admits_single_trial() {
    let clock = Arc::new(ManualClock::new());
    let breaker = Arc::new(
        CircuitBreaker::new("trial", &breaker_config(1, 1, 10_000)).with_clock(clock.clone()),
    );
    execute_resiliently(|| async { Err::<(), _>(Unavailable) }, &breaker)
        .await
        .unwrap_err();
    clock.advance(Duration::from_secs(10));

    let calls = CallCounter::default();
    let results = join_all((0..20).map(|_| {
        execute_resiliently(
            || async {
                calls.hit();
                tokio::task::yield_now().await;
                Ok::<_, Unavailable>(())
            },
            &breaker,
        )
    }))
    .await;

    assert_eq!(calls.count(), 1);
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let rejected = results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .filter(|f| matches!(f.error, PolicyError::CircuitOpen { .. }))
        .count();
    assert_eq!(rejected, 19);
    assert_eq!(breaker.state(), CircuitState::Closed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_shared_policy_under_parallel_load() {
    let config = resilience_config(3, breaker_config(5, 2, 10_000));
    let policy = Arc::new(
        ResilientPolicy::builder("load", &config)
            .without_observability()
            .build(),
    );
    let calls = Arc::new(CallCounter::default());

    let concurrency = 16;
    let requests_per_task = 50;
    let handles: Vec<_> = (0..concurrency)
        .map(|_| {
            let policy = policy.clone();
            let calls = calls.clone();
            tokio::spawn(async move {
                let mut ok = 0;
                for _ in 0..requests_per_task {
                    let result = execute_resiliently(
                        || async {
                            calls.hit();
                            tokio::task::yield_now().await;
                            Ok::<_, Unavailable>(())
                        },
                        policy.as_ref(),
                    )
                    .await;
                    if result.is_ok() {
                        ok += 1;
                    }
                }
                ok
            })
        })
        .collect();

    let mut succeeded = 0;
    for handle in handles {
        succeeded += handle.await.unwrap();
    }

    assert_eq!(succeeded, concurrency * requests_per_task);
    assert_eq!(calls.count() as usize, concurrency * requests_per_task);
    assert_eq!(policy.breaker().state(), CircuitState::Closed);
    assert_eq!(policy.breaker().stats().consecutive_failures, 0);
}
