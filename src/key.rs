// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Resource keys for the System V IPC namespace and the fixed derivation
// rule that binds a region's lock to its segment.

use std::fmt;

use crate::error::{IpcError, Result};

/// A key naming a kernel IPC object (the C `key_t`).
///
/// Keys live in one flat, host-wide namespace. They are agreed upon out of band
/// by cooperating processes; this crate never allocates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey(i32);

impl ResourceKey {
    /// `IPC_PRIVATE`. Never names a shared object, so it is rejected.
    pub const PRIVATE: ResourceKey = ResourceKey(0);

    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Fails with `InvalidArgument` for `IPC_PRIVATE`.
    pub fn checked(self) -> Result<Self> {
        if self == Self::PRIVATE {
            return Err(IpcError::InvalidArgument(
                "key 0 is IPC_PRIVATE and cannot address a shared object".into(),
            ));
        }
        Ok(self)
    }

    /// Key of the semaphore guarding the segment at `self`: always `self + 1`.
    ///
    /// Callers must never allocate `self + 1` for an unrelated resource while
    /// the region at `self` exists.
    pub fn lock_key(self) -> Result<ResourceKey> {
        let derived = self.0.checked_add(1).ok_or_else(|| {
            IpcError::InvalidArgument(format!("region key {} has no lock key (overflow)", self.0))
        })?;
        ResourceKey(derived).checked()
    }
}

impl From<i32> for ResourceKey {
    fn from(raw: i32) -> Self {
        Self(raw)
    }
}

impl From<ResourceKey> for i32 {
    fn from(key: ResourceKey) -> Self {
        key.0
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
