// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

#[tokio::test]
async fn second_acquirer_waits_for_release() {
    let arbiter = Arbiter::spawn();
    let mut first = arbiter.acquire(1, ArbiterScope::Global).await.unwrap();

    let a = arbiter.clone();
    let second = tokio::spawn(async move { a.acquire(2, ArbiterScope::Global).await });
    settle().await;
    assert!(!second.is_finished());

    first.release();
    let guard = second.await.unwrap().unwrap();
    assert_eq!(guard.holder(), 2);
}

#[tokio::test]
async fn admission_is_fifo() {
    let arbiter = Arbiter::spawn();
    let first = arbiter.acquire(0, ArbiterScope::Global).await.unwrap();
    let order = Arc::new(Mutex::new(Vec::new()));

    let mut handles = Vec::new();
    for holder in 1..=4 {
        let a = arbiter.clone();
        let order = Arc::clone(&order);
        handles.push(tokio::spawn(async move {
            let _guard = a.acquire(holder, ArbiterScope::Global).await.unwrap();
            order.lock().await.push(holder);
        }));
        // Queue them in a known order
        settle().await;
    }

    drop(first);
    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(*order.lock().await, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn double_release_is_harmless() {
    let arbiter = Arbiter::spawn();
    let mut first = arbiter.acquire(1, ArbiterScope::Global).await.unwrap();
    first.release();
    first.release();
    assert!(first.is_released());

    let mut second = arbiter.acquire(2, ArbiterScope::Global).await.unwrap();
    let a = arbiter.clone();
    let third = tokio::spawn(async move { a.acquire(3, ArbiterScope::Global).await });
    settle().await;

    // A stale release from holder 1 must not free holder 2's slot
    drop(first);
    settle().await;
    assert!(!third.is_finished());

    second.release();
    assert_eq!(third.await.unwrap().unwrap().holder(), 3);
}

#[tokio::test]
async fn scopes_are_independent() {
    let arbiter = Arbiter::spawn();
    let _a = arbiter.acquire(1, ArbiterScope::Project(1)).await.unwrap();
    let b = tokio::time::timeout(
        Duration::from_secs(1),
        arbiter.acquire(2, ArbiterScope::Project(2)),
    )
    .await;
    assert!(b.is_ok());
}

#[tokio::test]
async fn abandoned_waiter_is_skipped() {
    let arbiter = Arbiter::spawn();
    let mut first = arbiter.acquire(1, ArbiterScope::Global).await.unwrap();

    let a = arbiter.clone();
    let abandoned = tokio::spawn(async move { a.acquire(2, ArbiterScope::Global).await });
    settle().await;
    abandoned.abort();
    let _ = abandoned.await;

    let a = arbiter.clone();
    let third = tokio::spawn(async move { a.acquire(3, ArbiterScope::Global).await });
    settle().await;

    first.release();
    let guard = tokio::time::timeout(Duration::from_secs(1), third).await.unwrap().unwrap().unwrap();
    assert_eq!(guard.holder(), 3);
}
