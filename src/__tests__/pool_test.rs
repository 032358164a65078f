use crate::pool::{CancelToken, RateLimiter, SubmitError, WorkerPool};
use crate::Value;
use std::time::{Duration, Instant};

#[test]
fn submit_and_wait_returns_the_task_value() {
    let pool = WorkerPool::new("t", 2, 8, None);
    let result = pool
        .submit_and_wait(Box::new(|_| Ok(Value::Int(42))))
        .unwrap();
    assert_eq!(result, Value::Int(42));
    assert_eq!(pool.metrics().processed, 1);
}

#[test]
fn fire_and_forget_results_arrive_on_the_channel() {
    let pool = WorkerPool::new("t", 2, 8, None);
    for index in 0..4 {
        pool.submit(Box::new(move |_| Ok(Value::Int(index)))).unwrap();
    }
    let mut received = Vec::new();
    for _ in 0..4 {
        received.push(
            pool.results()
                .recv_timeout(Duration::from_secs(2))
                .unwrap()
                .unwrap(),
        );
    }
    assert_eq!(received.len(), 4);
    assert_eq!(pool.metrics().queued, 4);
}

#[test]
fn full_queue_rejects_without_blocking() {
    let pool = WorkerPool::new("t", 1, 1, None);

    // Block the single worker on a gate, then keep submitting until the queue
    // slot is taken and the pool pushes back.
    let (gate_tx, gate_rx) = crossbeam_channel::bounded::<()>(0);
    pool.submit(Box::new(move |_| {
        let _ = gate_rx.recv();
        Ok(Value::Null)
    }))
    .unwrap();

    let mut saw_queue_full = false;
    for _ in 0..50 {
        match pool.submit(Box::new(|_| Ok(Value::Null))) {
            Ok(()) => std::thread::sleep(Duration::from_millis(5)),
            Err(SubmitError::QueueFull) => {
                saw_queue_full = true;
                break;
            }
            Err(other) => panic!("expected QueueFull, got {:?}", other),
        }
    }
    assert!(saw_queue_full);
    gate_tx.send(()).unwrap();
}

#[test]
fn shutdown_rejects_new_submissions_and_drains() {
    let mut pool = WorkerPool::new("t", 2, 8, None);
    pool.submit(Box::new(|_| Ok(Value::Int(1)))).unwrap();
    pool.shutdown();
    match pool.submit(Box::new(|_| Ok(Value::Null))) {
        Err(SubmitError::ShuttingDown) => {}
        other => panic!("expected ShuttingDown, got {:?}", other),
    }
    let metrics = pool.metrics();
    assert_eq!(metrics.processed + metrics.errored, 1);
}

#[test]
fn errored_tasks_count_separately() {
    let pool = WorkerPool::new("t", 1, 4, None);
    let result = pool.submit_and_wait(Box::new(|_| {
        Err(crate::Error::new(
            crate::ErrorKind::Operator,
            "boom".to_string(),
        ))
    }));
    assert!(result.is_err());
    assert_eq!(pool.metrics().errored, 1);
}

#[test]
fn try_acquire_exhausts_the_bucket() {
    let limiter = RateLimiter::new(2);
    assert!(limiter.try_acquire());
    assert!(limiter.try_acquire());
    assert!(!limiter.try_acquire());
}

#[test]
fn wait_refills_over_time() {
    let limiter = RateLimiter::new(20);
    let cancel = CancelToken::new();
    for _ in 0..20 {
        assert!(limiter.try_acquire());
    }
    let started = Instant::now();
    limiter.wait(&cancel).unwrap();
    // One token refills every 1/20th of a second.
    assert!(started.elapsed() >= Duration::from_millis(20));
}

#[test]
fn cancellation_interrupts_the_wait() {
    let limiter = RateLimiter::new(1);
    assert!(limiter.try_acquire());

    let cancel = CancelToken::new();
    let waiter = cancel.clone();
    let handle = std::thread::spawn(move || {
        let limiter = limiter;
        limiter.wait(&waiter)
    });
    std::thread::sleep(Duration::from_millis(20));
    cancel.cancel();
    let result = handle.join().unwrap();
    assert!(result.is_err());
}

#[test]
fn shutdown_terminates_within_bounded_time() {
    let mut pool = WorkerPool::new("t", 4, 16, None);
    for _ in 0..8 {
        pool.submit(Box::new(|_| {
            std::thread::sleep(Duration::from_millis(10));
            Ok(Value::Null)
        }))
        .unwrap();
    }
    let started = Instant::now();
    pool.shutdown();
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn rate_limited_pool_still_processes_everything() {
    let pool = WorkerPool::new("rated", 2, 16, Some(50));
    for _ in 0..5 {
        pool.submit(Box::new(|_| Ok(Value::Null))).unwrap();
    }
    for _ in 0..5 {
        pool.results()
            .recv_timeout(Duration::from_secs(2))
            .unwrap()
            .unwrap();
    }
    assert_eq!(pool.metrics().processed, 5);
}
