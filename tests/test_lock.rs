// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Binary semaphore lock against the in-memory namespace.

mod common;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::{unique_key, Faulty};
use sysv_ipc::{InMemoryNamespace, IpcError, ResourceKey, ResourceKind, SemaphoreLock};

fn new_lock() -> SemaphoreLock<Arc<InMemoryNamespace>> {
    SemaphoreLock::new(Arc::new(InMemoryNamespace::new()))
}

// ========== Lifecycle ==========

#[test]
fn create_starts_available() {
    let lock = new_lock();
    let key = unique_key();

    lock.create(key).expect("create");
    assert_eq!(lock.value(key).expect("value"), 1);
}

#[test]
fn create_is_idempotent_and_resets_value() {
    let lock = new_lock();
    let key = unique_key();

    lock.create(key).expect("create");
    lock.acquire(key).expect("acquire");
    assert_eq!(lock.value(key).expect("value"), 0);

    lock.create(key).expect("create again");
    assert_eq!(lock.value(key).expect("value"), 1);
}

#[test]
fn acquire_before_create_is_absent() {
    let lock = new_lock();
    let key = unique_key();

    let err = lock.acquire(key).unwrap_err();
    assert!(
        matches!(err, IpcError::ResourceAbsent { kind: ResourceKind::Semaphore, key: k } if k == key),
        "{err}"
    );
    assert!(lock.release(key).unwrap_err().is_absent());
    assert!(lock.try_acquire(key).unwrap_err().is_absent());
}

#[test]
fn private_key_rejected() {
    let lock = new_lock();
    let err = lock.create(ResourceKey::PRIVATE).unwrap_err();
    assert!(matches!(err, IpcError::InvalidArgument(_)), "{err}");
}

#[test]
fn destroy_then_acquire_is_absent() {
    let lock = new_lock();
    let key = unique_key();

    lock.create(key).expect("create");
    lock.destroy(key).expect("destroy");

    assert!(lock.acquire(key).unwrap_err().is_absent());
    assert!(lock.destroy(key).unwrap_err().is_absent());
}

#[test]
fn failed_initialisation_removes_new_semaphore() {
    let ns = Faulty::new();
    Faulty::set(&ns.fail_sem_set_value, true);
    let lock = SemaphoreLock::new(&ns);
    let key = unique_key();

    let err = lock.create(key).unwrap_err();
    assert!(
        matches!(err, IpcError::ResourceCreationFailed { kind: ResourceKind::Semaphore, .. }),
        "{err}"
    );
    assert_eq!(err.raw_os_error(), Some(libc::EPERM));

    Faulty::set(&ns.fail_sem_set_value, false);
    assert!(lock.value(key).unwrap_err().is_absent());
}

#[test]
fn failed_initialisation_keeps_existing_semaphore() {
    let ns = Faulty::new();
    let lock = SemaphoreLock::new(&ns);
    let key = unique_key();
    lock.create(key).expect("create");

    Faulty::set(&ns.fail_sem_set_value, true);
    assert!(lock.create(key).is_err());

    assert_eq!(lock.value(key).expect("still there"), 1);
}

#[test]
fn failed_initialisation_and_cleanup_reports_both() {
    let ns = Faulty::new();
    Faulty::set(&ns.fail_sem_set_value, true);
    Faulty::set(&ns.fail_sem_remove, true);
    let lock = SemaphoreLock::new(&ns);

    let err = lock.create(unique_key()).unwrap_err();
    match err {
        IpcError::RollbackFailed { primary, rollback } => {
            assert!(matches!(*primary, IpcError::ResourceCreationFailed { .. }));
            assert!(matches!(*rollback, IpcError::Os { op: "remove", .. }));
        }
        other => panic!("expected RollbackFailed, got {other}"),
    }
}

// ========== Acquire / release ==========

#[test]
fn acquire_release() {
    let lock = new_lock();
    let key = unique_key();
    lock.create(key).expect("create");

    lock.acquire(key).expect("acquire");
    assert_eq!(lock.value(key).expect("value"), 0);
    lock.release(key).expect("release");
    assert_eq!(lock.value(key).expect("value"), 1);
}

#[test]
fn try_acquire_contended() {
    let lock = new_lock();
    let key = unique_key();
    lock.create(key).expect("create");

    assert!(lock.try_acquire(key).expect("first"));
    assert!(!lock.try_acquire(key).expect("second"));
    lock.release(key).expect("release");
    assert!(lock.try_acquire(key).expect("third"));
}

#[test]
fn guard_releases_on_drop() {
    let lock = new_lock();
    let key = unique_key();
    lock.create(key).expect("create");

    {
        let guard = lock.lock(key).expect("lock");
        assert_eq!(guard.key(), key);
        assert_eq!(lock.value(key).expect("value"), 0);
    }
    assert_eq!(lock.value(key).expect("value"), 1);
}

#[test]
fn guard_release_reports_failure() {
    let lock = new_lock();
    let key = unique_key();
    lock.create(key).expect("create");

    let guard = lock.lock(key).expect("lock");
    lock.destroy(key).expect("destroy");
    assert!(guard.release().unwrap_err().is_absent());
}

#[test]
fn acquire_blocks_until_release() {
    let lock = Arc::new(new_lock());
    let key = unique_key();
    lock.create(key).expect("create");
    lock.acquire(key).expect("acquire");

    let entered = Arc::new(AtomicBool::new(false));
    let waiter = {
        let lock = Arc::clone(&lock);
        let entered = Arc::clone(&entered);
        thread::spawn(move || {
            lock.acquire(key).expect("acquire in thread");
            entered.store(true, Ordering::SeqCst);
            lock.release(key).expect("release in thread");
        })
    };

    thread::sleep(Duration::from_millis(50));
    assert!(!entered.load(Ordering::SeqCst), "acquire must block while held");

    lock.release(key).expect("release");
    waiter.join().unwrap();
    assert!(entered.load(Ordering::SeqCst));
    assert_eq!(lock.value(key).expect("value"), 1);
}

#[test]
fn destroy_while_blocked_fails_waiter() {
    let lock = Arc::new(new_lock());
    let key = unique_key();
    lock.create(key).expect("create");
    lock.acquire(key).expect("acquire");

    let waiter = {
        let lock = Arc::clone(&lock);
        thread::spawn(move || lock.acquire(key))
    };
    thread::sleep(Duration::from_millis(50));
    lock.destroy(key).expect("destroy");

    let err = waiter.join().unwrap().unwrap_err();
    assert!(
        matches!(err, IpcError::LockUnavailable { op: "acquire", .. }) || err.is_absent(),
        "{err}"
    );
}

#[test]
fn lock_contention() {
    let lock = Arc::new(new_lock());
    let key = unique_key();
    lock.create(key).expect("create");

    let inside = Arc::new(AtomicUsize::new(0));
    let violation = Arc::new(AtomicBool::new(false));
    let total = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let lock = Arc::clone(&lock);
            let inside = Arc::clone(&inside);
            let violation = Arc::clone(&violation);
            let total = Arc::clone(&total);
            thread::spawn(move || {
                for _ in 0..50 {
                    let _guard = lock.lock(key).expect("lock");
                    if inside.fetch_add(1, Ordering::SeqCst) != 0 {
                        violation.store(true, Ordering::SeqCst);
                    }
                    thread::sleep(Duration::from_micros(10));
                    total.fetch_add(1, Ordering::Relaxed);
                    inside.fetch_sub(1, Ordering::SeqCst);
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    assert!(!violation.load(Ordering::SeqCst), "mutual exclusion violated");
    assert_eq!(total.load(Ordering::Relaxed), 200);
    assert_eq!(lock.value(key).expect("value"), 1);
}
