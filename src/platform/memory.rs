// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// In-process stand-in for the System V namespace. Keys, identifiers, blocking
// semaphores, deferred segment removal and bounded queues follow the kernel's
// rules closely enough that the components cannot tell the difference.

use std::cell::UnsafeCell;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::ptr::NonNull;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use crate::key::ResourceKey;
use crate::namespace::{Namespace, ObjectId, OpenMode, SegmentStat};

/// Largest semaphore value (`SEMVMX`).
const SEM_VALUE_MAX: i32 = 32767;

/// Default queue capacity in bytes (`MSGMNB`).
pub const DEFAULT_QUEUE_BYTES: usize = 16384;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Class {
    Sem,
    Shm,
    Msg,
}

fn errno(code: i32) -> io::Error {
    io::Error::from_raw_os_error(code)
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panicking test thread must not wedge every other user of the namespace.
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct Semaphore {
    /// `None` once removed.
    value: Mutex<Option<i32>>,
    changed: Condvar,
}

struct Segment {
    mem: Box<[UnsafeCell<u8>]>,
    attached: u64,
    removed: bool,
}

impl Segment {
    fn base(&self) -> NonNull<u8> {
        // UnsafeCell<u8> has the layout of u8 and permits writes through a
        // shared reference. The slice is never empty (size 0 is rejected).
        let first = UnsafeCell::raw_get(self.mem.as_ptr());
        NonNull::new(first).unwrap_or(NonNull::dangling())
    }
}

struct QueueState {
    messages: VecDeque<(i64, Vec<u8>)>,
    bytes: usize,
}

struct Queue {
    /// `None` once removed.
    state: Mutex<Option<QueueState>>,
    changed: Condvar,
}

#[derive(Default)]
struct Table {
    next_id: i32,
    keys: HashMap<(Class, ResourceKey), ObjectId>,
    sems: HashMap<ObjectId, Arc<Semaphore>>,
    segments: HashMap<ObjectId, Segment>,
    attachments: HashMap<usize, ObjectId>,
    queues: HashMap<ObjectId, Arc<Queue>>,
}

impl Table {
    /// Resolve `key` under `mode`. Returns the id and whether it is new.
    fn resolve(&mut self, class: Class, key: ResourceKey, mode: OpenMode) -> io::Result<(ObjectId, bool)> {
        match (self.keys.get(&(class, key)).copied(), mode) {
            (Some(_), OpenMode::Create) => Err(errno(libc::EEXIST)),
            (Some(id), _) => Ok((id, false)),
            (None, OpenMode::Open) => Err(errno(libc::ENOENT)),
            (None, _) => {
                self.next_id += 1;
                let id = ObjectId(self.next_id);
                if key != ResourceKey::PRIVATE {
                    self.keys.insert((class, key), id);
                }
                Ok((id, true))
            }
        }
    }

    fn forget_key(&mut self, class: Class, id: ObjectId) {
        self.keys.retain(|k, v| !(k.0 == class && *v == id));
    }
}

/// An isolated, in-memory System V namespace.
///
/// Objects live as long as the namespace value. Share it between threads with
/// `&InMemoryNamespace` or `Arc<InMemoryNamespace>`.
pub struct InMemoryNamespace {
    table: Mutex<Table>,
    queue_bytes: usize,
}

impl Default for InMemoryNamespace {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryNamespace {
    pub fn new() -> Self {
        Self::with_queue_capacity(DEFAULT_QUEUE_BYTES)
    }

    /// Queues hold at most `bytes` bytes of payload before `msg_send` blocks.
    pub fn with_queue_capacity(bytes: usize) -> Self {
        Self {
            table: Mutex::new(Table::default()),
            queue_bytes: bytes,
        }
    }

    fn semaphore(&self, id: ObjectId) -> io::Result<Arc<Semaphore>> {
        lock(&self.table).sems.get(&id).cloned().ok_or_else(|| errno(libc::EIDRM))
    }

    fn queue(&self, id: ObjectId) -> io::Result<Arc<Queue>> {
        lock(&self.table).queues.get(&id).cloned().ok_or_else(|| errno(libc::EIDRM))
    }
}

impl Namespace for InMemoryNamespace {
    fn sem_get(&self, key: ResourceKey, mode: OpenMode) -> io::Result<ObjectId> {
        let mut table = lock(&self.table);
        let (id, fresh) = table.resolve(Class::Sem, key, mode)?;
        if fresh {
            table.sems.insert(
                id,
                Arc::new(Semaphore {
                    value: Mutex::new(Some(0)),
                    changed: Condvar::new(),
                }),
            );
        }
        Ok(id)
    }

    fn sem_set_value(&self, id: ObjectId, value: i32) -> io::Result<()> {
        if !(0..=SEM_VALUE_MAX).contains(&value) {
            return Err(errno(libc::ERANGE));
        }
        let sem = self.semaphore(id)?;
        let mut slot = lock(&sem.value);
        match slot.as_mut() {
            Some(v) => *v = value,
            None => return Err(errno(libc::EIDRM)),
        }
        sem.changed.notify_all();
        Ok(())
    }

    fn sem_value(&self, id: ObjectId) -> io::Result<i32> {
        let sem = self.semaphore(id)?;
        let value = *lock(&sem.value);
        value.ok_or_else(|| errno(libc::EIDRM))
    }

    fn sem_op(&self, id: ObjectId, delta: i16, nowait: bool) -> io::Result<bool> {
        let sem = self.semaphore(id)?;
        let mut slot = lock(&sem.value);
        loop {
            let current = (*slot).ok_or_else(|| errno(libc::EIDRM))?;
            let next = current + i32::from(delta);
            if next > SEM_VALUE_MAX {
                return Err(errno(libc::ERANGE));
            }
            if next >= 0 {
                *slot = Some(next);
                sem.changed.notify_all();
                return Ok(true);
            }
            if nowait {
                return Ok(false);
            }
            slot = sem
                .changed
                .wait(slot)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    fn sem_remove(&self, id: ObjectId) -> io::Result<()> {
        let sem = {
            let mut table = lock(&self.table);
            let sem = table.sems.remove(&id).ok_or_else(|| errno(libc::EINVAL))?;
            table.forget_key(Class::Sem, id);
            sem
        };
        *lock(&sem.value) = None;
        sem.changed.notify_all();
        Ok(())
    }

    fn shm_get(&self, key: ResourceKey, size: usize, mode: OpenMode) -> io::Result<ObjectId> {
        let mut table = lock(&self.table);
        if let Some(id) = table.keys.get(&(Class::Shm, key)).copied() {
            if mode == OpenMode::Create {
                return Err(errno(libc::EEXIST));
            }
            let segment = table.segments.get(&id).ok_or_else(|| errno(libc::EIDRM))?;
            if size > segment.mem.len() {
                return Err(errno(libc::EINVAL));
            }
            return Ok(id);
        }
        if mode == OpenMode::Open {
            return Err(errno(libc::ENOENT));
        }
        if size == 0 {
            return Err(errno(libc::EINVAL));
        }
        let (id, _) = table.resolve(Class::Shm, key, mode)?;
        let mem = (0..size).map(|_| UnsafeCell::new(0u8)).collect();
        table.segments.insert(
            id,
            Segment {
                mem,
                attached: 0,
                removed: false,
            },
        );
        Ok(id)
    }

    fn shm_attach(&self, id: ObjectId) -> io::Result<NonNull<u8>> {
        let mut table = lock(&self.table);
        let segment = table.segments.get_mut(&id).ok_or_else(|| errno(libc::EINVAL))?;
        if segment.removed {
            return Err(errno(libc::EIDRM));
        }
        segment.attached += 1;
        let base = segment.base();
        table.attachments.insert(base.as_ptr() as usize, id);
        Ok(base)
    }

    unsafe fn shm_detach(&self, addr: NonNull<u8>) -> io::Result<()> {
        let mut table = lock(&self.table);
        let addr = addr.as_ptr() as usize;
        let id = *table.attachments.get(&addr).ok_or_else(|| errno(libc::EINVAL))?;
        let segment = table.segments.get_mut(&id).ok_or_else(|| errno(libc::EINVAL))?;
        segment.attached -= 1;
        let (attached, removed) = (segment.attached, segment.removed);
        if attached == 0 {
            table.attachments.remove(&addr);
            if removed {
                table.segments.remove(&id);
            }
        }
        Ok(())
    }

    fn shm_stat(&self, id: ObjectId) -> io::Result<SegmentStat> {
        let table = lock(&self.table);
        let segment = table.segments.get(&id).ok_or_else(|| errno(libc::EINVAL))?;
        Ok(SegmentStat {
            size: segment.mem.len(),
            attached: segment.attached,
        })
    }

    fn shm_remove(&self, id: ObjectId) -> io::Result<()> {
        let mut table = lock(&self.table);
        let segment = table.segments.get_mut(&id).ok_or_else(|| errno(libc::EINVAL))?;
        segment.removed = true;
        if segment.attached == 0 {
            table.segments.remove(&id);
        }
        table.forget_key(Class::Shm, id);
        Ok(())
    }

    fn msg_get(&self, key: ResourceKey, mode: OpenMode) -> io::Result<ObjectId> {
        let mut table = lock(&self.table);
        let (id, fresh) = table.resolve(Class::Msg, key, mode)?;
        if fresh {
            table.queues.insert(
                id,
                Arc::new(Queue {
                    state: Mutex::new(Some(QueueState {
                        messages: VecDeque::new(),
                        bytes: 0,
                    })),
                    changed: Condvar::new(),
                }),
            );
        }
        Ok(id)
    }

    fn msg_send(&self, id: ObjectId, mtype: i64, data: &[u8]) -> io::Result<()> {
        if mtype <= 0 || data.len() > self.queue_bytes {
            return Err(errno(libc::EINVAL));
        }
        let queue = self.queue(id)?;
        let mut slot = lock(&queue.state);
        loop {
            let state = slot.as_mut().ok_or_else(|| errno(libc::EIDRM))?;
            if state.bytes + data.len() <= self.queue_bytes {
                state.bytes += data.len();
                state.messages.push_back((mtype, data.to_vec()));
                queue.changed.notify_all();
                return Ok(());
            }
            slot = queue
                .changed
                .wait(slot)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    fn msg_receive(&self, id: ObjectId, mtype: i64, buf: &mut [u8]) -> io::Result<Option<usize>> {
        // Only exact-type selection is modelled.
        if mtype <= 0 {
            return Err(errno(libc::EINVAL));
        }
        let queue = self.queue(id)?;
        let mut slot = lock(&queue.state);
        let state = slot.as_mut().ok_or_else(|| errno(libc::EIDRM))?;
        let Some(pos) = state.messages.iter().position(|(t, _)| *t == mtype) else {
            return Ok(None);
        };
        if state.messages[pos].1.len() > buf.len() {
            return Err(errno(libc::E2BIG));
        }
        let (_, data) = state
            .messages
            .remove(pos)
            .ok_or_else(|| errno(libc::ENOMSG))?;
        state.bytes -= data.len();
        buf[..data.len()].copy_from_slice(&data);
        queue.changed.notify_all();
        Ok(Some(data.len()))
    }

    fn msg_count(&self, id: ObjectId) -> io::Result<usize> {
        let queue = self.queue(id)?;
        let slot = lock(&queue.state);
        slot.as_ref()
            .map(|state| state.messages.len())
            .ok_or_else(|| errno(libc::EIDRM))
    }

    fn msg_remove(&self, id: ObjectId) -> io::Result<()> {
        let queue = {
            let mut table = lock(&self.table);
            let queue = table.queues.remove(&id).ok_or_else(|| errno(libc::EINVAL))?;
            table.forget_key(Class::Msg, id);
            queue
        };
        *lock(&queue.state) = None;
        queue.changed.notify_all();
        Ok(())
    }
}
