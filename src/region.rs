// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Keyed shared memory regions. Each region is a segment at key K guarded by
// the semaphore at K + 1; every access is lock → attach → copy → detach →
// unlock, with no mapping kept between calls.

use std::ptr::{self, NonNull};

use log::{debug, warn};

use crate::error::{IpcError, ResourceKind, Result};
use crate::key::ResourceKey;
use crate::lock::SemaphoreLock;
use crate::namespace::{Namespace, ObjectId, OpenMode, SegmentStat};

const KIND: ResourceKind = ResourceKind::Segment;

/// Creates, reads, writes and destroys lock-guarded shared memory regions.
///
/// All processes using a region must agree on its key and size. Reads and
/// writes of fewer bytes than the segment address its prefix; more bytes than
/// the segment fail with `InvalidArgument`.
pub struct RegionManager<N> {
    lock: SemaphoreLock<N>,
}

impl<N: Namespace> RegionManager<N> {
    pub fn new(ns: N) -> Self {
        Self {
            lock: SemaphoreLock::new(ns),
        }
    }

    pub fn namespace(&self) -> &N {
        self.lock.namespace()
    }

    /// The semaphores guarding regions, for callers that want to hold a
    /// region's lock (at `key.lock_key()`) across several operations.
    pub fn semaphores(&self) -> &SemaphoreLock<N> {
        &self.lock
    }

    /// Get-or-create the region: its lock at `key + 1` first, then the
    /// segment of `size` bytes at `key`.
    ///
    /// If the segment cannot be created, a lock created by this call is
    /// destroyed again; a lock that already existed is left in place.
    pub fn create(&self, size: usize, key: ResourceKey) -> Result<()> {
        let key = key.checked()?;
        let lock_key = key.lock_key()?;
        if size == 0 {
            return Err(IpcError::InvalidArgument(
                "shared memory size must be positive".into(),
            ));
        }

        let created_lock = self.lock.provision(lock_key)?;

        match self.namespace().shm_get(key, size, OpenMode::CreateOrOpen) {
            Ok(id) => {
                debug!("segment {key}: ready ({size} bytes, id {})", id.0);
                Ok(())
            }
            Err(e) => {
                let primary = IpcError::creation(KIND, key, e);
                if !created_lock {
                    return Err(primary);
                }
                // Roll back the semaphore we just made, at its own key.
                warn!("segment {key}: creation failed, destroying semaphore {lock_key}");
                match self.lock.destroy(lock_key) {
                    Ok(()) => Err(primary),
                    Err(rollback) => Err(IpcError::RollbackFailed {
                        primary: Box::new(primary),
                        rollback: Box::new(rollback),
                    }),
                }
            }
        }
    }

    /// Copy the first `buf.len()` bytes of the region into `buf`.
    pub fn read(&self, key: ResourceKey, buf: &mut [u8]) -> Result<()> {
        let len = buf.len();
        self.with_segment(key, len, |base| unsafe {
            ptr::copy_nonoverlapping(base.as_ptr() as *const u8, buf.as_mut_ptr(), len);
        })
    }

    /// Read `size` bytes of the region into a new vector.
    pub fn read_vec(&self, key: ResourceKey, size: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; size];
        self.read(key, &mut buf)?;
        Ok(buf)
    }

    /// Copy `buf` into the start of the region.
    pub fn write(&self, key: ResourceKey, buf: &[u8]) -> Result<()> {
        self.with_segment(key, buf.len(), |base| unsafe {
            ptr::copy_nonoverlapping(buf.as_ptr(), base.as_ptr(), buf.len());
        })
    }

    /// Destroy the region's lock and segment. Both are attempted; `size` must
    /// not exceed the size the region was created with.
    pub fn destroy(&self, size: usize, key: ResourceKey) -> Result<()> {
        let key = key.checked()?;
        let lock_key = key.lock_key()?;

        let lock_result = self.lock.destroy(lock_key);
        let segment_result = self.segment(key, size).and_then(|id| {
            self.namespace()
                .shm_remove(id)
                .map_err(|e| IpcError::os("remove", KIND, key, e))
        });
        if segment_result.is_ok() {
            debug!("segment {key}: removed");
        }

        let result = IpcError::aggregate(lock_result, segment_result);
        if let Err(e) = &result {
            warn!("region {key}: destroy incomplete: {e}");
        }
        result
    }

    /// Size and attachment count of the segment at `key`.
    pub fn stat(&self, key: ResourceKey) -> Result<SegmentStat> {
        let key = key.checked()?;
        let id = self.segment(key, 0)?;
        self.namespace()
            .shm_stat(id)
            .map_err(|e| IpcError::os("stat", KIND, key, e))
    }

    fn segment(&self, key: ResourceKey, size: usize) -> Result<ObjectId> {
        self.namespace()
            .shm_get(key, size, OpenMode::Open)
            .map_err(|e| IpcError::lookup(KIND, key, e))
    }

    /// Run `f` on the attached segment while holding the region's lock. The
    /// lock is released and the segment detached on every path.
    fn with_segment<F>(&self, key: ResourceKey, size: usize, f: F) -> Result<()>
    where
        F: FnOnce(NonNull<u8>),
    {
        let key = key.checked()?;
        let guard = self.lock.lock(key.lock_key()?)?;

        let id = self.segment(key, size)?;
        let attachment = Attachment::new(self.namespace(), key, id)?;
        f(attachment.base);
        attachment.detach()?;

        guard.release()
    }
}

/// A segment mapped into this process; detached on drop.
struct Attachment<'a, N: Namespace> {
    ns: &'a N,
    key: ResourceKey,
    base: NonNull<u8>,
    attached: bool,
}

impl<'a, N: Namespace> Attachment<'a, N> {
    fn new(ns: &'a N, key: ResourceKey, id: ObjectId) -> Result<Self> {
        let base = ns
            .shm_attach(id)
            .map_err(|source| IpcError::MappingFailed { key, source })?;
        Ok(Self {
            ns,
            key,
            base,
            attached: true,
        })
    }

    fn detach(mut self) -> Result<()> {
        self.attached = false;
        unsafe { self.ns.shm_detach(self.base) }
            .map_err(|source| IpcError::MappingFailed { key: self.key, source })
    }
}

impl<'a, N: Namespace> Drop for Attachment<'a, N> {
    fn drop(&mut self) {
        if self.attached {
            if let Err(e) = unsafe { self.ns.shm_detach(self.base) } {
                warn!("segment {}: detach failed: {e}", self.key);
            }
        }
    }
}
