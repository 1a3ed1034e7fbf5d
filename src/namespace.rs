// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// The key-addressed kernel namespace, as a capability handed to each
// component. `platform::SysV` is the real kernel; `platform::InMemoryNamespace`
// reproduces its semantics in-process for tests.

use std::io;
use std::ptr::NonNull;
use std::sync::Arc;

use crate::key::ResourceKey;

/// Open mode for keyed objects. Mirrors `IPC_CREAT | IPC_EXCL`, no flag, and
/// `IPC_CREAT` respectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Create exclusively; fail with `EEXIST` if the key is in use.
    Create,
    /// Open existing; fail with `ENOENT` if the key is unused.
    Open,
    /// Create if missing, open if it already exists.
    CreateOrOpen,
}

/// Kernel identifier returned by a `*get` call (semid, shmid or msqid).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(pub i32);

/// Subset of `shmid_ds` exposed for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentStat {
    /// Size fixed at creation.
    pub size: usize,
    /// Number of current attachments across all processes.
    pub attached: u64,
}

/// Access to System V semaphores, shared memory and message queues.
///
/// Every method reports failures as `io::Error` carrying the `errno` the kernel
/// would set, so callers can classify them uniformly.
pub trait Namespace {
    /// `semget(key, 1, ..)`: a set holding a single semaphore.
    fn sem_get(&self, key: ResourceKey, mode: OpenMode) -> io::Result<ObjectId>;
    /// `semctl(SETVAL)`.
    fn sem_set_value(&self, id: ObjectId, value: i32) -> io::Result<()>;
    /// `semctl(GETVAL)`.
    fn sem_value(&self, id: ObjectId) -> io::Result<i32>;
    /// `semop` with a single operation adding `delta`.
    ///
    /// Blocks while the result would be negative, unless `nowait` is set, in
    /// which case `Ok(false)` is returned instead. `EINTR` is retried.
    fn sem_op(&self, id: ObjectId, delta: i16, nowait: bool) -> io::Result<bool>;
    /// `semctl(IPC_RMID)`. Blocked `sem_op` callers fail with `EIDRM`.
    fn sem_remove(&self, id: ObjectId) -> io::Result<()>;

    /// `shmget(key, size, ..)`. Looking up an existing segment with a larger
    /// size than it was created with fails with `EINVAL`.
    fn shm_get(&self, key: ResourceKey, size: usize, mode: OpenMode) -> io::Result<ObjectId>;
    /// `shmat`: map the segment, returning its base address.
    fn shm_attach(&self, id: ObjectId) -> io::Result<NonNull<u8>>;
    /// `shmdt`.
    ///
    /// # Safety
    /// `addr` must have been returned by `shm_attach` on this namespace and not
    /// yet detached. No reference into the mapping may outlive this call.
    unsafe fn shm_detach(&self, addr: NonNull<u8>) -> io::Result<()>;
    /// `shmctl(IPC_STAT)`.
    fn shm_stat(&self, id: ObjectId) -> io::Result<SegmentStat>;
    /// `shmctl(IPC_RMID)`. The memory is reclaimed after the last detach, but
    /// the key is released immediately.
    fn shm_remove(&self, id: ObjectId) -> io::Result<()>;

    /// `msgget`.
    fn msg_get(&self, key: ResourceKey, mode: OpenMode) -> io::Result<ObjectId>;
    /// `msgsnd` without `IPC_NOWAIT`: blocks while the queue is full.
    fn msg_send(&self, id: ObjectId, mtype: i64, data: &[u8]) -> io::Result<()>;
    /// `msgrcv(.., IPC_NOWAIT)` for the oldest message of exactly `mtype`.
    ///
    /// Returns `Ok(None)` when no such message is queued (`ENOMSG`), otherwise
    /// the number of bytes copied into `buf`. A message longer than `buf` fails
    /// with `E2BIG` and stays queued.
    fn msg_receive(&self, id: ObjectId, mtype: i64, buf: &mut [u8]) -> io::Result<Option<usize>>;
    /// `msgctl(IPC_STAT)` → `msg_qnum`.
    fn msg_count(&self, id: ObjectId) -> io::Result<usize>;
    /// `msgctl(IPC_RMID)`. Undelivered messages are dropped.
    fn msg_remove(&self, id: ObjectId) -> io::Result<()>;
}

macro_rules! forward_namespace {
    ($($ptr:ty),* $(,)?) => {$(
        impl<N: Namespace + ?Sized> Namespace for $ptr {
            fn sem_get(&self, key: ResourceKey, mode: OpenMode) -> io::Result<ObjectId> {
                (**self).sem_get(key, mode)
            }
            fn sem_set_value(&self, id: ObjectId, value: i32) -> io::Result<()> {
                (**self).sem_set_value(id, value)
            }
            fn sem_value(&self, id: ObjectId) -> io::Result<i32> {
                (**self).sem_value(id)
            }
            fn sem_op(&self, id: ObjectId, delta: i16, nowait: bool) -> io::Result<bool> {
                (**self).sem_op(id, delta, nowait)
            }
            fn sem_remove(&self, id: ObjectId) -> io::Result<()> {
                (**self).sem_remove(id)
            }
            fn shm_get(&self, key: ResourceKey, size: usize, mode: OpenMode) -> io::Result<ObjectId> {
                (**self).shm_get(key, size, mode)
            }
            fn shm_attach(&self, id: ObjectId) -> io::Result<NonNull<u8>> {
                (**self).shm_attach(id)
            }
            unsafe fn shm_detach(&self, addr: NonNull<u8>) -> io::Result<()> {
                (**self).shm_detach(addr)
            }
            fn shm_stat(&self, id: ObjectId) -> io::Result<SegmentStat> {
                (**self).shm_stat(id)
            }
            fn shm_remove(&self, id: ObjectId) -> io::Result<()> {
                (**self).shm_remove(id)
            }
            fn msg_get(&self, key: ResourceKey, mode: OpenMode) -> io::Result<ObjectId> {
                (**self).msg_get(key, mode)
            }
            fn msg_send(&self, id: ObjectId, mtype: i64, data: &[u8]) -> io::Result<()> {
                (**self).msg_send(id, mtype, data)
            }
            fn msg_receive(&self, id: ObjectId, mtype: i64, buf: &mut [u8]) -> io::Result<Option<usize>> {
                (**self).msg_receive(id, mtype, buf)
            }
            fn msg_count(&self, id: ObjectId) -> io::Result<usize> {
                (**self).msg_count(id)
            }
            fn msg_remove(&self, id: ObjectId) -> io::Result<()> {
                (**self).msg_remove(id)
            }
        }
    )*};
}

forward_namespace!(&N, Arc<N>, Box<N>);
