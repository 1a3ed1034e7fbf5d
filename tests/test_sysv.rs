// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// The same components against the host kernel's System V namespace.
// Keys are derived from the process id so parallel test binaries do not
// collide; every test removes what it creates.

#![cfg(target_os = "linux")]

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use sysv_ipc::{
    IpcError, MessageQueue, Received, RegionManager, ResourceKey, SemaphoreLock, SysV, MAX_PAYLOAD,
};

static COUNTER: AtomicI32 = AtomicI32::new(0);

fn unique_key() -> ResourceKey {
    let pid = (std::process::id() & 0xffff) as i32;
    let n = COUNTER.fetch_add(2, Ordering::Relaxed);
    ResourceKey::new(0x5e00_0000 + (pid << 8) + n)
}

/// Remove anything a previous crashed run may have left at `key` / `key + 1`.
fn scrub(key: ResourceKey) {
    let _ = RegionManager::new(SysV::new()).destroy(1, key);
    let _ = MessageQueue::new(SysV::new()).destroy(key);
}

// ========== Lock ==========

#[test]
fn lock_lifecycle() {
    let key = unique_key();
    scrub(key);
    let lock = SemaphoreLock::new(SysV::new());

    assert!(lock.acquire(key).unwrap_err().is_absent());

    lock.create(key).expect("create");
    assert_eq!(lock.value(key).expect("value"), 1);
    {
        let _guard = lock.lock(key).expect("lock");
        assert!(!lock.try_acquire(key).expect("try while held"));
    }
    assert_eq!(lock.value(key).expect("value"), 1);

    lock.destroy(key).expect("destroy");
    assert!(lock.value(key).unwrap_err().is_absent());
}

#[test]
fn lock_blocks_second_thread() {
    let key = unique_key();
    scrub(key);
    let lock = Arc::new(SemaphoreLock::new(SysV::new()));
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
    assert!(!entered.load(Ordering::SeqCst));
    lock.release(key).expect("release");
    waiter.join().unwrap();
    assert!(entered.load(Ordering::SeqCst));

    lock.destroy(key).expect("destroy");
}

// ========== Region ==========

#[test]
fn region_roundtrip_and_destroy() {
    let key = unique_key();
    scrub(key);
    let mgr = RegionManager::new(SysV::new());

    mgr.create(64, key).expect("create");
    let stat = mgr.stat(key).expect("stat");
    assert_eq!(stat.size, 64);

    let data: Vec<u8> = (0..64u8).collect();
    mgr.write(key, &data).expect("write");
    assert_eq!(mgr.read_vec(key, 64).expect("read"), data);
    assert_eq!(mgr.semaphores().value(key.lock_key().unwrap()).expect("lock"), 1);

    mgr.destroy(64, key).expect("destroy");
    assert!(mgr.read_vec(key, 64).unwrap_err().is_absent());
    assert!(mgr.stat(key).unwrap_err().is_absent());
}

#[test]
fn region_oversized_read_rejected() {
    let key = unique_key();
    scrub(key);
    let mgr = RegionManager::new(SysV::new());
    mgr.create(32, key).expect("create");

    let err = mgr.read_vec(key, 33).unwrap_err();
    assert!(matches!(err, IpcError::InvalidArgument(_)), "{err}");
    assert_eq!(mgr.semaphores().value(key.lock_key().unwrap()).expect("lock"), 1);

    mgr.destroy(32, key).expect("destroy");
}

#[test]
fn region_concurrent_writers() {
    const SIZE: usize = 128;
    let key = unique_key();
    scrub(key);
    let mgr = Arc::new(RegionManager::new(SysV::with_mode(0o600)));
    mgr.create(SIZE, key).expect("create");

    let handles: Vec<_> = (1..=3u8)
        .map(|fill| {
            let mgr = Arc::clone(&mgr);
            thread::spawn(move || {
                for _ in 0..50 {
                    mgr.write(key, &[fill; SIZE]).expect("write");
                    let seen = mgr.read_vec(key, SIZE).expect("read");
                    assert!(seen.iter().all(|&b| b == seen[0]), "torn read");
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    mgr.destroy(SIZE, key).expect("destroy");
}

// ========== Channel ==========

#[test]
fn channel_roundtrip() {
    let key = unique_key();
    scrub(key);
    let q = MessageQueue::new(SysV::new());
    q.create(key).expect("create");

    assert_eq!(q.receive(key, 1).expect("empty"), Received::Empty);

    q.send(key, 5, b"ping").expect("send");
    assert!(q.receive(key, 6).expect("other type").is_empty());
    assert_eq!(q.pending(key).expect("pending"), 1);

    let msg = q.receive(key, 5).expect("receive").into_message().expect("message");
    assert_eq!(msg.payload(), b"ping");

    q.destroy(key).expect("destroy");
    assert!(q.receive(key, 5).unwrap_err().is_absent());
}

#[test]
fn channel_capacity_boundary() {
    let key = unique_key();
    scrub(key);
    let q = MessageQueue::new(SysV::new());
    q.create(key).expect("create");

    let full = vec![b'z'; MAX_PAYLOAD];
    q.send(key, 1, &full).expect("send 511");
    let msg = q.receive(key, 1).expect("receive").into_message().expect("message");
    assert_eq!(msg.payload(), &full[..]);

    let err = q.send(key, 1, &[b'z'; MAX_PAYLOAD + 1]).unwrap_err();
    assert!(matches!(err, IpcError::TruncationRisk { .. }), "{err}");
    assert_eq!(q.pending(key).expect("pending"), 0);

    q.destroy(key).expect("destroy");
}
