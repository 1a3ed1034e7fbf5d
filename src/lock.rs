// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Keyed binary semaphore used as an inter-process lock, plus an RAII guard
// that releases it on every exit path.

use log::{debug, warn};

use crate::error::{IpcError, ResourceKind, Result};
use crate::key::ResourceKey;
use crate::namespace::{Namespace, ObjectId, OpenMode};

const KIND: ResourceKind = ResourceKind::Semaphore;

/// A binary semaphore addressed by key, initialised to 1 (available).
///
/// There is no owner: any process that knows the key may acquire or release.
/// Acquire blocks without timeout. A process that dies while holding the lock
/// leaves it held for good (no `SEM_UNDO`).
///
/// Destroying a semaphore while another process is blocked in [`acquire`]
/// is unsupported; the blocked call fails with `LockUnavailable`.
///
/// [`acquire`]: SemaphoreLock::acquire
pub struct SemaphoreLock<N> {
    ns: N,
}

impl<N: Namespace> SemaphoreLock<N> {
    pub fn new(ns: N) -> Self {
        Self { ns }
    }

    pub fn namespace(&self) -> &N {
        &self.ns
    }

    /// Get-or-create the semaphore at `key` and set it to 1.
    ///
    /// Resets an existing semaphore to 1 as well, even if it is held.
    pub fn create(&self, key: ResourceKey) -> Result<()> {
        self.provision(key).map(|_| ())
    }

    /// Like `create`, returning whether this call created the semaphore.
    pub(crate) fn provision(&self, key: ResourceKey) -> Result<bool> {
        let key = key.checked()?;
        let (id, created) = match self.ns.sem_get(key, OpenMode::Create) {
            Ok(id) => (id, true),
            Err(e) if e.raw_os_error() == Some(libc::EEXIST) => {
                let id = self
                    .ns
                    .sem_get(key, OpenMode::Open)
                    .map_err(|e| IpcError::creation(KIND, key, e))?;
                (id, false)
            }
            Err(e) => return Err(IpcError::creation(KIND, key, e)),
        };

        if let Err(e) = self.ns.sem_set_value(id, 1) {
            let primary = IpcError::creation(KIND, key, e);
            if created {
                warn!("semaphore {key}: initialisation failed, removing it");
                if let Err(rb) = self.ns.sem_remove(id) {
                    return Err(IpcError::RollbackFailed {
                        primary: Box::new(primary),
                        rollback: Box::new(IpcError::os("remove", KIND, key, rb)),
                    });
                }
            }
            return Err(primary);
        }

        debug!(
            "semaphore {key}: {} (id {})",
            if created { "created" } else { "reset" },
            id.0
        );
        Ok(created)
    }

    fn open(&self, key: ResourceKey) -> Result<ObjectId> {
        let key = key.checked()?;
        self.ns
            .sem_get(key, OpenMode::Open)
            .map_err(|e| IpcError::lookup(KIND, key, e))
    }

    /// Take the lock, blocking until it is available.
    ///
    /// Fails with `ResourceAbsent` if the semaphore was never created. Each
    /// successful call must be paired with exactly one [`release`].
    ///
    /// [`release`]: SemaphoreLock::release
    pub fn acquire(&self, key: ResourceKey) -> Result<()> {
        let id = self.open(key)?;
        self.ns
            .sem_op(id, -1, false)
            .map_err(|source| IpcError::LockUnavailable {
                op: "acquire",
                key,
                source,
            })?;
        debug!("semaphore {key}: acquired");
        Ok(())
    }

    /// Take the lock if it is free. Returns `false` if someone holds it.
    pub fn try_acquire(&self, key: ResourceKey) -> Result<bool> {
        let id = self.open(key)?;
        self.ns
            .sem_op(id, -1, true)
            .map_err(|source| IpcError::LockUnavailable {
                op: "acquire",
                key,
                source,
            })
    }

    /// Give the lock back, waking one blocked acquirer.
    ///
    /// Releasing a lock that is not held raises its value above 1; the caller
    /// is responsible for pairing.
    pub fn release(&self, key: ResourceKey) -> Result<()> {
        let id = self.open(key)?;
        self.ns
            .sem_op(id, 1, false)
            .map_err(|source| IpcError::LockUnavailable {
                op: "release",
                key,
                source,
            })?;
        debug!("semaphore {key}: released");
        Ok(())
    }

    /// Acquire and return a guard that releases when dropped.
    pub fn lock(&self, key: ResourceKey) -> Result<LockGuard<'_, N>> {
        self.acquire(key)?;
        Ok(LockGuard {
            lock: self,
            key,
            held: true,
        })
    }

    /// Current semaphore value: 1 when free, 0 when held.
    pub fn value(&self, key: ResourceKey) -> Result<i32> {
        let id = self.open(key)?;
        self.ns
            .sem_value(id)
            .map_err(|e| IpcError::os("read value of", KIND, key, e))
    }

    /// Remove the semaphore from the namespace.
    pub fn destroy(&self, key: ResourceKey) -> Result<()> {
        let id = self.open(key)?;
        self.ns
            .sem_remove(id)
            .map_err(|e| IpcError::os("remove", KIND, key, e))?;
        debug!("semaphore {key}: removed");
        Ok(())
    }
}

/// RAII guard: the lock is held for the guard's lifetime.
///
/// Dropping the guard releases the lock and logs a failure; call
/// [`LockGuard::release`] to observe the failure instead.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard<'a, N: Namespace> {
    lock: &'a SemaphoreLock<N>,
    key: ResourceKey,
    held: bool,
}

impl<'a, N: Namespace> LockGuard<'a, N> {
    pub fn key(&self) -> ResourceKey {
        self.key
    }

    /// Release now and report the outcome.
    pub fn release(mut self) -> Result<()> {
        self.held = false;
        self.lock.release(self.key)
    }
}

impl<'a, N: Namespace> Drop for LockGuard<'a, N> {
    fn drop(&mut self) {
        if self.held {
            if let Err(e) = self.lock.release(self.key) {
                warn!("semaphore {}: release on drop failed: {e}", self.key);
            }
        }
    }
}
