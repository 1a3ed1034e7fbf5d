// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Shared helpers for the integration tests: unique keys and a namespace
// wrapper that injects kernel failures on demand.

#![allow(dead_code)]

use std::io;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use sysv_ipc::{InMemoryNamespace, Namespace, ObjectId, OpenMode, ResourceKey, SegmentStat};

static NEXT_KEY: AtomicI32 = AtomicI32::new(0x1000);

/// A fresh key with `key + 1` also unused.
pub fn unique_key() -> ResourceKey {
    ResourceKey::new(NEXT_KEY.fetch_add(2, Ordering::Relaxed))
}

fn fail_if(flag: &AtomicBool, errno: i32) -> io::Result<()> {
    if flag.load(Ordering::SeqCst) {
        Err(io::Error::from_raw_os_error(errno))
    } else {
        Ok(())
    }
}

/// `InMemoryNamespace` with switches that make selected calls fail.
#[derive(Default)]
pub struct Faulty {
    pub inner: InMemoryNamespace,
    pub fail_shm_create: AtomicBool,
    pub fail_shm_attach: AtomicBool,
    pub fail_shm_detach: AtomicBool,
    pub fail_sem_set_value: AtomicBool,
    pub fail_sem_remove: AtomicBool,
}

impl Faulty {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(flag: &AtomicBool, on: bool) {
        flag.store(on, Ordering::SeqCst);
    }
}

impl Namespace for Faulty {
    fn sem_get(&self, key: ResourceKey, mode: OpenMode) -> io::Result<ObjectId> {
        self.inner.sem_get(key, mode)
    }
    fn sem_set_value(&self, id: ObjectId, value: i32) -> io::Result<()> {
        fail_if(&self.fail_sem_set_value, libc::EPERM)?;
        self.inner.sem_set_value(id, value)
    }
    fn sem_value(&self, id: ObjectId) -> io::Result<i32> {
        self.inner.sem_value(id)
    }
    fn sem_op(&self, id: ObjectId, delta: i16, nowait: bool) -> io::Result<bool> {
        self.inner.sem_op(id, delta, nowait)
    }
    fn sem_remove(&self, id: ObjectId) -> io::Result<()> {
        fail_if(&self.fail_sem_remove, libc::EPERM)?;
        self.inner.sem_remove(id)
    }
    fn shm_get(&self, key: ResourceKey, size: usize, mode: OpenMode) -> io::Result<ObjectId> {
        if mode != OpenMode::Open {
            fail_if(&self.fail_shm_create, libc::ENOSPC)?;
        }
        self.inner.shm_get(key, size, mode)
    }
    fn shm_attach(&self, id: ObjectId) -> io::Result<NonNull<u8>> {
        fail_if(&self.fail_shm_attach, libc::ENOMEM)?;
        self.inner.shm_attach(id)
    }
    unsafe fn shm_detach(&self, addr: NonNull<u8>) -> io::Result<()> {
        if self.fail_shm_detach.load(Ordering::SeqCst) {
            // Detach for real so the fake's bookkeeping stays consistent.
            self.inner.shm_detach(addr)?;
            return Err(io::Error::from_raw_os_error(libc::EINVAL));
        }
        self.inner.shm_detach(addr)
    }
    fn shm_stat(&self, id: ObjectId) -> io::Result<SegmentStat> {
        self.inner.shm_stat(id)
    }
    fn shm_remove(&self, id: ObjectId) -> io::Result<()> {
        self.inner.shm_remove(id)
    }
    fn msg_get(&self, key: ResourceKey, mode: OpenMode) -> io::Result<ObjectId> {
        self.inner.msg_get(key, mode)
    }
    fn msg_send(&self, id: ObjectId, mtype: i64, data: &[u8]) -> io::Result<()> {
        self.inner.msg_send(id, mtype, data)
    }
    fn msg_receive(&self, id: ObjectId, mtype: i64, buf: &mut [u8]) -> io::Result<Option<usize>> {
        self.inner.msg_receive(id, mtype, buf)
    }
    fn msg_count(&self, id: ObjectId) -> io::Result<usize> {
        self.inner.msg_count(id)
    }
    fn msg_remove(&self, id: ObjectId) -> io::Result<()> {
        self.inner.msg_remove(id)
    }
}
