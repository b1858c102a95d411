//! Failures stay inside their query; the batch always completes.

use std::sync::Arc;
use std::time::Duration;

use tile_fanout::{
    DispatchState, EventHub, EventKind, PipelineError, Providers, QueryDispatcher, TimeoutConfig,
    WorkerPool,
};
use tile_search::{Latency, MockReviewsProvider, ProviderError};

use crate::helpers::{FailingImages, HangingImages, QuerySearch, pipeline, recording_hub};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failing_provider_fails_only_its_query() {
    let latency = Latency::fixed(Duration::from_millis(10));
    let (hub, seen) = recording_hub();
    let providers = Providers::new(
        QuerySearch::new(vec![1, 2, 3], 10).with_query("broken", vec![1, 13]),
        MockReviewsProvider::new(latency),
        FailingImages {
            failing_product: 13,
            latency,
        },
    );
    let dispatcher = QueryDispatcher::new(
        pipeline(providers, 50, TimeoutConfig::default(), hub),
        WorkerPool::new("dispatch", 3).unwrap(),
    );
    let state = dispatcher.state();

    let outcome = dispatcher
        .dispatch(["fine", "broken", "also fine"])
        .await
        .unwrap();

    assert_eq!(*state.borrow(), DispatchState::Done);
    assert_eq!(outcome.succeeded(), 2);
    let (index, err) = outcome.failures().next().unwrap();
    assert_eq!(index, 1);
    assert!(matches!(err, PipelineError::Provider(ProviderError::Image(_))));
    assert!(err.to_string().contains("product 13"));

    let seen = seen.lock().unwrap();
    let failed: Vec<_> = seen
        .iter()
        .filter_map(|e| match &e.kind {
            EventKind::QueryFailed { query, .. } => Some(query.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(failed, vec!["broken"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn join_timeout_turns_hang_into_error() {
    let latency = Latency::fixed(Duration::from_millis(5));
    let providers = Providers::new(
        QuerySearch::new(vec![1, 2], 5).with_query("stuck", vec![1, 99]),
        MockReviewsProvider::new(latency),
        HangingImages { hung_product: 99 },
    );
    let timeouts = TimeoutConfig {
        join_timeout_ms: Some(80),
        search_timeout_ms: None,
    };
    let dispatcher = QueryDispatcher::new(
        pipeline(providers, 20, timeouts, EventHub::new()),
        WorkerPool::new("dispatch", 2).unwrap(),
    );

    let outcome = tokio::time::timeout(
        Duration::from_secs(3),
        dispatcher.dispatch(["stuck", "ok"]),
    )
    .await
    .expect("barrier released despite hung provider")
    .unwrap();

    let stuck = &outcome.results[0];
    assert!(matches!(stuck.outcome, Err(PipelineError::Timeout(_))));
    let ok = outcome.results[1].outcome.as_ref().unwrap();
    assert_eq!(ok.tile_ids(), vec![1, 2]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_query_failing_still_reaches_done() {
    let latency = Latency::fixed(Duration::ZERO);
    let providers = Providers {
        search: Arc::new(QuerySearch::new(vec![7], 0)),
        reviews: Arc::new(MockReviewsProvider::new(latency)),
        images: Arc::new(FailingImages {
            failing_product: 7,
            latency,
        }),
    };
    let dispatcher = QueryDispatcher::new(
        pipeline(providers, 10, TimeoutConfig::default(), EventHub::new()),
        WorkerPool::new("dispatch", 2).unwrap(),
    );
    let state = dispatcher.state();

    let outcome = dispatcher.dispatch(vec!["x"; 6]).await.unwrap();
    assert_eq!(outcome.failed(), 6);
    assert!(!outcome.is_success());
    assert_eq!(*state.borrow(), DispatchState::Done);
}
