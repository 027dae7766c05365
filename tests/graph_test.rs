/*!
 * Graph Tests
 * Topological execution, validation, and failure accounting
 */

use corestack::{
    GraphRunOptions, GraphTaskOptions, StatusCode, TaskGraph, TaskPriority, ThreadPoolExecutor,
};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[test]
fn test_topological_run_with_executor() {
    let executor = ThreadPoolExecutor::with_workers(4);
    let mut graph = TaskGraph::new();

    let counter = Arc::new(AtomicU64::new(0));

    let c1 = Arc::clone(&counter);
    let a = graph.add_task(move || {
        c1.fetch_add(1, Ordering::SeqCst);
    });
    let c2 = Arc::clone(&counter);
    let b = graph.add_task(move || {
        c2.fetch_add(1, Ordering::SeqCst);
    });
    let c3 = Arc::clone(&counter);
    let c = graph.add_task(move || {
        // Both ancestors returned before this node starts.
        assert_eq!(c3.load(Ordering::SeqCst), 2);
        c3.fetch_add(1, Ordering::SeqCst);
    });

    graph.add_dependency(a, c).unwrap();
    graph.add_dependency(b, c).unwrap();

    let stats = graph
        .run_with_executor(&executor, &GraphRunOptions { fail_fast: true, max_concurrency: 0 })
        .unwrap();

    assert_eq!(stats.total, 3);
    assert_eq!(stats.succeeded, 3);
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.canceled, 0);
    assert_eq!(counter.load(Ordering::SeqCst), 3);
}

#[test]
fn test_cycle_never_executes() {
    let executor = ThreadPoolExecutor::with_workers(2);
    let mut graph = TaskGraph::new();

    let counter = Arc::new(AtomicU64::new(0));
    let c1 = Arc::clone(&counter);
    let a = graph.add_task(move || {
        c1.fetch_add(1, Ordering::SeqCst);
    });
    let c2 = Arc::clone(&counter);
    let b = graph.add_task(move || {
        c2.fetch_add(1, Ordering::SeqCst);
    });
    graph.add_dependency(a, b).unwrap();
    graph.add_dependency(b, a).unwrap();

    let status = graph.validate().unwrap_err();
    assert_eq!(status.code(), StatusCode::InvalidArgument);

    let status = graph
        .run_with_executor(&executor, &GraphRunOptions::default())
        .unwrap_err();
    assert_eq!(status.code(), StatusCode::InvalidArgument);

    let status = graph.run().unwrap_err();
    assert_eq!(status.code(), StatusCode::InvalidArgument);

    assert_eq!(counter.load(Ordering::SeqCst), 0);
}

#[test]
fn test_fail_fast_aborts_run() {
    let executor = ThreadPoolExecutor::with_workers(2);
    let mut graph = TaskGraph::new();

    let reached = Arc::new(AtomicU64::new(0));
    let a = graph.add_task(|| panic!("node failure"));
    let seen = Arc::clone(&reached);
    let c = graph.add_task(move || {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    graph.add_dependency(a, c).unwrap();

    let status = graph
        .run_with_executor(&executor, &GraphRunOptions { fail_fast: true, max_concurrency: 0 })
        .unwrap_err();
    assert_eq!(status.code(), StatusCode::InternalError);
    assert_eq!(reached.load(Ordering::SeqCst), 0);
}

#[test]
fn test_failures_counted_without_fail_fast() {
    let executor = ThreadPoolExecutor::with_workers(2);
    let mut graph = TaskGraph::new();

    let reached = Arc::new(AtomicU64::new(0));
    let a = graph.add_task(|| panic!("node failure"));
    let seen = Arc::clone(&reached);
    let c = graph.add_task(move || {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    graph.add_dependency(a, c).unwrap();

    let stats = graph
        .run_with_executor(&executor, &GraphRunOptions { fail_fast: false, max_concurrency: 0 })
        .unwrap();

    // The failed ancestor still releases its successor.
    assert_eq!(stats.total, 2);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.succeeded, 1);
    assert_eq!(reached.load(Ordering::SeqCst), 1);
}

#[test]
fn test_max_concurrency_bounds_levels() {
    let executor = ThreadPoolExecutor::with_workers(4);
    let mut graph = TaskGraph::new();

    let running = Arc::new(AtomicU64::new(0));
    let max_running = Arc::new(AtomicU64::new(0));
    for _ in 0..6 {
        let running = Arc::clone(&running);
        let max_running = Arc::clone(&max_running);
        graph.add_task(move || {
            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
            max_running.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(20));
            running.fetch_sub(1, Ordering::SeqCst);
        });
    }

    let stats = graph
        .run_with_executor(&executor, &GraphRunOptions { fail_fast: true, max_concurrency: 1 })
        .unwrap();

    assert_eq!(stats.succeeded, 6);
    assert!(max_running.load(Ordering::SeqCst) <= 1);
}

#[test]
fn test_add_dependencies_batch() {
    let mut graph = TaskGraph::new();
    let a = graph.add_task(|| {});
    let b = graph.add_task(|| {});
    let c = graph.add_task(|| {});

    graph.add_dependencies(c, &[a, b]).unwrap();
    graph.validate().unwrap();

    let status = graph.add_dependencies(c, &[c]).unwrap_err();
    assert_eq!(status.code(), StatusCode::InvalidArgument);

    let status = graph.add_dependencies(c, &[404]).unwrap_err();
    assert_eq!(status.code(), StatusCode::NotFound);
}

#[test]
fn test_graph_task_options_flow_to_executor() {
    let executor = ThreadPoolExecutor::with_workers(4);
    let mut graph = TaskGraph::new();

    // All nodes share one serial key; they must never overlap even though
    // they land in the same level.
    let running = Arc::new(AtomicU64::new(0));
    let max_running = Arc::new(AtomicU64::new(0));
    for _ in 0..4 {
        let running = Arc::clone(&running);
        let max_running = Arc::clone(&max_running);
        graph.add_task_ex(
            move || {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                max_running.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(std::time::Duration::from_millis(20));
                running.fetch_sub(1, Ordering::SeqCst);
            },
            GraphTaskOptions {
                name: None,
                priority: TaskPriority::High,
                serial_key: 7,
            },
        );
    }

    let stats = graph
        .run_with_executor(&executor, &GraphRunOptions::default())
        .unwrap();
    assert_eq!(stats.succeeded, 4);
    assert!(max_running.load(Ordering::SeqCst) <= 1);
}

#[test]
fn test_empty_graph_runs_clean() {
    let executor = ThreadPoolExecutor::with_workers(1);
    let graph = TaskGraph::new();

    graph.run().unwrap();
    let stats = graph.run_with_executor(&executor, &GraphRunOptions::default()).unwrap();
    assert_eq!(stats.total, 0);
    assert_eq!(stats.succeeded, 0);
}

#[test]
fn test_graph_can_run_twice() {
    let executor = ThreadPoolExecutor::with_workers(2);
    let mut graph = TaskGraph::new();

    let counter = Arc::new(AtomicU64::new(0));
    let c1 = Arc::clone(&counter);
    graph.add_task(move || {
        c1.fetch_add(1, Ordering::SeqCst);
    });

    graph.run_with_executor(&executor, &GraphRunOptions::default()).unwrap();
    graph.run_with_executor(&executor, &GraphRunOptions::default()).unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}
