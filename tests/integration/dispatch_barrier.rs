//! Batch dispatch: barrier release, queueing and worker placement.

use std::time::Duration;

use tile_fanout::{
    DispatchState, EventHub, EventKind, FanoutConfig, QueryDispatcher, TimeoutConfig, WorkerPool,
};

use crate::helpers::{mock_providers, pipeline, recording_hub};

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn fifty_queries_on_fifty_slots_run_together() {
    let dispatcher = QueryDispatcher::new(
        pipeline(
            mock_providers(vec![1, 2, 3], 100),
            400,
            TimeoutConfig::default(),
            EventHub::new(),
        ),
        WorkerPool::new("dispatch", 50).unwrap(),
    );
    let outcome = dispatcher
        .dispatch(vec!["search term"; 50])
        .await
        .unwrap();

    assert_eq!(outcome.results.len(), 50);
    assert!(outcome.is_success());
    for set in outcome.result_sets() {
        assert_eq!(set.tile_ids(), vec![1, 2, 3]);
    }
    // Queued waves would take at least two query latencies (400ms).
    assert!(outcome.wall_ms >= 200);
    assert!(outcome.wall_ms < 400, "batch took {}ms", outcome.wall_ms);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn smaller_dispatch_pool_queues_queries() {
    let dispatcher = QueryDispatcher::new(
        pipeline(
            mock_providers(vec![1, 2], 50),
            100,
            TimeoutConfig::default(),
            EventHub::new(),
        ),
        WorkerPool::new("dispatch", 5).unwrap(),
    );
    let outcome = dispatcher.dispatch(vec!["q"; 10]).await.unwrap();

    assert!(outcome.is_success());
    // Two waves of five, each a search plus a join.
    assert!(outcome.wall_ms >= 200, "batch took {}ms", outcome.wall_ms);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn state_moves_through_running_to_done() {
    let dispatcher = QueryDispatcher::new(
        pipeline(
            mock_providers(vec![1], 20),
            10,
            TimeoutConfig::default(),
            EventHub::new(),
        ),
        WorkerPool::new("dispatch", 2).unwrap(),
    );
    let mut state = dispatcher.state();
    assert_eq!(*state.borrow(), DispatchState::Init);

    let watcher = tokio::spawn(async move {
        let mut seen = Vec::new();
        while state.changed().await.is_ok() {
            let current = *state.borrow_and_update();
            seen.push(current);
            if current == DispatchState::Done {
                break;
            }
        }
        seen
    });

    let outcome = dispatcher.dispatch(["a", "b", "c"]).await.unwrap();
    assert_eq!(outcome.succeeded(), 3);

    let seen = tokio::time::timeout(Duration::from_secs(1), watcher)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(seen.last(), Some(&DispatchState::Done));
    assert!(
        seen.iter()
            .any(|s| matches!(s, DispatchState::Running { .. }))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn running_count_drops_by_one_per_report() {
    // One dispatch slot: queries report one at a time, 40ms apart.
    let dispatcher = QueryDispatcher::new(
        pipeline(
            mock_providers(vec![1], 20),
            10,
            TimeoutConfig::default(),
            EventHub::new(),
        ),
        WorkerPool::new("dispatch", 1).unwrap(),
    );
    let mut state = dispatcher.state();
    let watcher = tokio::spawn(async move {
        let mut remaining = Vec::new();
        while state.changed().await.is_ok() {
            match *state.borrow_and_update() {
                DispatchState::Running { remaining: n } => remaining.push(n),
                DispatchState::Done => break,
                DispatchState::Init => {}
            }
        }
        remaining
    });

    let outcome = dispatcher.dispatch(["a", "b", "c"]).await.unwrap();
    assert_eq!(outcome.succeeded(), 3);

    let remaining = tokio::time::timeout(Duration::from_secs(1), watcher)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(remaining.first(), Some(&3));
    assert!(
        remaining.windows(2).all(|w| w[1] < w[0]),
        "remaining must fall with every report: {remaining:?}"
    );
    assert!(remaining.contains(&2) && remaining.contains(&1), "got {remaining:?}");
    assert!(*remaining.last().unwrap() <= 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dedicated_pools_run_on_their_own_threads() {
    let mut config = FanoutConfig::default();
    config.pools.downstream_threads = Some(2);
    config.pools.dispatch_threads = Some(2);
    let (hub, seen) = recording_hub();

    let dispatcher = QueryDispatcher::from_config(&config, mock_providers(vec![1, 2], 10), hub)
        .unwrap();
    let outcome = dispatcher.dispatch(["a", "b"]).await.unwrap();
    assert!(outcome.is_success());

    let seen = seen.lock().unwrap();
    for event in seen.iter() {
        let expected = match event.kind {
            EventKind::ReviewsCompleted { .. }
            | EventKind::ImageCompleted { .. }
            | EventKind::SearchCompleted { .. } => "tile-downstream#",
            EventKind::SearchStarted { .. }
            | EventKind::JoinCompleted { .. }
            | EventKind::CollectionCompleted { .. } => "tile-dispatch#",
            EventKind::QueryFailed { .. } => panic!("unexpected failure: {event:?}"),
        };
        assert!(
            event.worker.starts_with(expected),
            "{} ran on {}",
            event.kind,
            event.worker
        );
    }
}
