/*!
 * Executor Tests
 * Thread-pool scheduling policies, serial keys, waits, and cancellation
 */

use corestack::{
    ExecutorOptions, ExecutorPolicy, StatusCode, TaskPriority, TaskSubmitOptions,
    ThreadPoolExecutor,
};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

fn spin_until(flag: &AtomicBool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !flag.load(Ordering::SeqCst) {
        assert!(Instant::now() < deadline, "worker never picked up the task");
        thread::yield_now();
    }
}

#[test]
fn test_serial_key_excludes_overlap() {
    let _ = env_logger::builder().is_test(true).try_init();
    let executor = ThreadPoolExecutor::with_workers(4);

    let running = Arc::new(AtomicU64::new(0));
    let max_running = Arc::new(AtomicU64::new(0));

    let start = Instant::now();
    let mut ids = Vec::new();
    for _ in 0..10 {
        let running = Arc::clone(&running);
        let max_running = Arc::clone(&max_running);
        let id = executor
            .submit_with_key(99, move || {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                max_running.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(50));
                running.fetch_sub(1, Ordering::SeqCst);
            })
            .unwrap();
        ids.push(id);
    }

    executor.wait_batch(&ids, 0).unwrap();

    assert!(max_running.load(Ordering::SeqCst) <= 1);
    assert!(start.elapsed() >= Duration::from_millis(500));
    assert_eq!(executor.query_stats().completed, 10);
}

#[test]
fn test_priority_pick_order_under_occupancy() {
    let executor = ThreadPoolExecutor::new(ExecutorOptions {
        worker_count: 1,
        policy: ExecutorPolicy::Priority,
        ..ExecutorOptions::default()
    });

    let order = Arc::new(Mutex::new(Vec::new()));
    let blocker_started = Arc::new(AtomicBool::new(false));
    let (release_tx, release_rx) = mpsc::channel::<()>();

    let blocker_order = Arc::clone(&order);
    let started = Arc::clone(&blocker_started);
    executor
        .submit(move || {
            started.store(true, Ordering::SeqCst);
            release_rx.recv().unwrap();
            blocker_order.lock().unwrap().push("blocker");
        })
        .unwrap();

    // The blocker must hold the only worker before the rest queue up.
    spin_until(&blocker_started);

    let low_order = Arc::clone(&order);
    executor
        .submit_ex(
            move || low_order.lock().unwrap().push("low"),
            TaskSubmitOptions { priority: TaskPriority::Low, ..TaskSubmitOptions::default() },
        )
        .unwrap();

    let high_order = Arc::clone(&order);
    executor
        .submit_ex(
            move || high_order.lock().unwrap().push("high"),
            TaskSubmitOptions { priority: TaskPriority::High, ..TaskSubmitOptions::default() },
        )
        .unwrap();

    release_tx.send(()).unwrap();
    executor.wait_all().unwrap();

    assert_eq!(*order.lock().unwrap(), vec!["blocker", "high", "low"]);
}

#[test]
fn test_fifo_preserves_submission_order() {
    let executor = ThreadPoolExecutor::new(ExecutorOptions {
        worker_count: 1,
        policy: ExecutorPolicy::Fifo,
        ..ExecutorOptions::default()
    });

    let order = Arc::new(Mutex::new(Vec::new()));
    let blocker_started = Arc::new(AtomicBool::new(false));
    let (release_tx, release_rx) = mpsc::channel::<()>();

    let started = Arc::clone(&blocker_started);
    executor
        .submit(move || {
            started.store(true, Ordering::SeqCst);
            release_rx.recv().unwrap();
        })
        .unwrap();
    spin_until(&blocker_started);

    for i in 0..5 {
        let order = Arc::clone(&order);
        executor
            .submit_ex(
                move || order.lock().unwrap().push(i),
                TaskSubmitOptions {
                    // Priorities are ignored under Fifo.
                    priority: if i % 2 == 0 { TaskPriority::Low } else { TaskPriority::High },
                    ..TaskSubmitOptions::default()
                },
            )
            .unwrap();
    }

    release_tx.send(()).unwrap();
    executor.wait_all().unwrap();

    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_cancel_before_start() {
    let executor = ThreadPoolExecutor::with_workers(1);

    let a_started = Arc::new(AtomicBool::new(false));
    let started = Arc::clone(&a_started);
    let a = executor
        .submit_ex(
            move || {
                started.store(true, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(150));
            },
            TaskSubmitOptions::default(),
        )
        .unwrap();
    spin_until(&a_started);

    let b_executed = Arc::new(AtomicBool::new(false));
    let executed = Arc::clone(&b_executed);
    let b = executor
        .submit_ex(move || executed.store(true, Ordering::SeqCst), TaskSubmitOptions::default())
        .unwrap();

    executor.try_cancel(b).unwrap();

    executor.wait(a, 0).unwrap();
    executor.wait(b, 0).unwrap();

    assert!(!b_executed.load(Ordering::SeqCst));
    let stats = executor.query_stats();
    assert_eq!(stats.canceled, 1);
    assert_eq!(stats.completed, 1);
}

#[test]
fn test_cancel_after_done_would_block() {
    let executor = ThreadPoolExecutor::with_workers(1);

    let id = executor.submit_ex(|| {}, TaskSubmitOptions::default()).unwrap();
    executor.wait(id, 0).unwrap();

    let status = executor.try_cancel(id).unwrap_err();
    assert_eq!(status.code(), StatusCode::WouldBlock);
}

#[test]
fn test_cancel_unknown_id_not_found() {
    let executor = ThreadPoolExecutor::with_workers(1);
    let status = executor.try_cancel(12345).unwrap_err();
    assert_eq!(status.code(), StatusCode::NotFound);
}

#[test]
fn test_wait_unknown_id_not_found() {
    let executor = ThreadPoolExecutor::with_workers(1);
    let status = executor.wait(77, 0).unwrap_err();
    assert_eq!(status.code(), StatusCode::NotFound);
}

#[test]
fn test_wait_timeout_would_block() {
    let executor = ThreadPoolExecutor::with_workers(1);

    let id = executor
        .submit_ex(|| thread::sleep(Duration::from_millis(200)), TaskSubmitOptions::default())
        .unwrap();

    let status = executor.wait(id, 30).unwrap_err();
    assert_eq!(status.code(), StatusCode::WouldBlock);

    // An indefinite wait still observes completion.
    executor.wait(id, 0).unwrap();
}

#[test]
fn test_wait_batch_empty_is_ok() {
    let executor = ThreadPoolExecutor::with_workers(1);
    executor.wait_batch(&[], 0).unwrap();
    executor.wait_batch(&[], 50).unwrap();
}

#[test]
fn test_parallel_for_covers_range() {
    let executor = ThreadPoolExecutor::with_workers(4);

    let sum = Arc::new(AtomicU64::new(0));
    let seen = Arc::clone(&sum);
    executor.parallel_for(0, 100, 7, move |i| {
        seen.fetch_add(i as u64, Ordering::SeqCst);
    })
    .unwrap();

    assert_eq!(sum.load(Ordering::SeqCst), (0..100u64).sum::<u64>());
}

#[test]
fn test_parallel_for_empty_range() {
    let executor = ThreadPoolExecutor::with_workers(2);
    let before = executor.query_stats().submitted;
    executor.parallel_for(5, 5, 1, |_| {}).unwrap();
    assert_eq!(executor.query_stats().submitted, before);
}

#[test]
fn test_parallel_for_inverted_range_rejected() {
    let executor = ThreadPoolExecutor::with_workers(2);
    let status = executor.parallel_for(5, 2, 1, |_| {}).unwrap_err();
    assert_eq!(status.code(), StatusCode::InvalidArgument);
}

#[test]
fn test_queue_capacity_rejects_with_would_block() {
    let executor = ThreadPoolExecutor::new(ExecutorOptions {
        worker_count: 1,
        queue_capacity: 1,
        ..ExecutorOptions::default()
    });

    let blocker_started = Arc::new(AtomicBool::new(false));
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let started = Arc::clone(&blocker_started);
    executor
        .submit(move || {
            started.store(true, Ordering::SeqCst);
            release_rx.recv().unwrap();
        })
        .unwrap();
    spin_until(&blocker_started);

    // The worker is occupied; one entry fits the queue, the next is rejected.
    executor.submit(|| {}).unwrap();
    let status = executor.submit(|| {}).unwrap_err();
    assert_eq!(status.code(), StatusCode::WouldBlock);

    release_tx.send(()).unwrap();
    executor.wait_all().unwrap();

    let stats = executor.query_stats();
    assert_eq!(stats.rejected, 1);
    assert_eq!(stats.submitted, 2);
    assert_eq!(stats.completed, 2);
}

#[test]
fn test_panicking_task_counts_failed() {
    let executor = ThreadPoolExecutor::with_workers(1);

    let id = executor
        .submit_ex(|| panic!("task exploded"), TaskSubmitOptions::default())
        .unwrap();
    executor.wait(id, 0).unwrap();

    let stats = executor.query_stats();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.completed, 0);
}

#[test]
fn test_wait_all_submitted_before_observes_completion() {
    let executor = ThreadPoolExecutor::with_workers(2);

    let first = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&first);
    executor
        .submit(move || {
            thread::sleep(Duration::from_millis(50));
            flag.store(true, Ordering::SeqCst);
        })
        .unwrap();

    executor.wait_all_submitted_before().unwrap();
    assert!(first.load(Ordering::SeqCst));
}

#[test]
fn test_stats_accounting_balances() {
    let executor = ThreadPoolExecutor::with_workers(2);

    for _ in 0..20 {
        executor.submit(|| {}).unwrap();
    }
    executor.wait_all().unwrap();

    let stats = executor.query_stats();
    assert_eq!(stats.submitted, 20);
    assert_eq!(stats.completed, 20);
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.queue_depth, 0);
    assert!(stats.queue_high_watermark >= 1);
}

#[test]
fn test_reconfigure_is_idempotent() {
    let executor = ThreadPoolExecutor::with_workers(2);

    let options = ExecutorOptions {
        worker_count: 2,
        queue_capacity: 64,
        enable_work_stealing: false,
        policy: ExecutorPolicy::Fifo,
    };
    executor.reconfigure(options).unwrap();
    executor.reconfigure(options).unwrap();
    executor.set_scheduling_policy(ExecutorPolicy::Priority).unwrap();

    // The pool still runs tasks after reconfiguration.
    executor.submit(|| {}).unwrap();
    executor.wait_all().unwrap();
    assert_eq!(executor.query_stats().completed, 1);
}

#[test]
fn test_worker_count_defaults_to_host_parallelism() {
    let executor = ThreadPoolExecutor::with_workers(0);
    assert!(executor.worker_count() >= 1);
}
