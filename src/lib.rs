// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Keyed inter-process communication on the System V IPC namespace:
// shared memory regions guarded by a binary semaphore at `key + 1`, and
// typed, bounded message queues with non-blocking receive.
//
// Components take the namespace as a value (`platform::SysV` for the kernel,
// `platform::InMemoryNamespace` for tests), so no global state is involved.

mod error;
pub use error::{IpcError, ResourceKind, Result};

mod key;
pub use key::ResourceKey;

pub mod namespace;
pub use namespace::{Namespace, ObjectId, OpenMode, SegmentStat};

pub mod platform;
pub use platform::InMemoryNamespace;
#[cfg(target_os = "linux")]
pub use platform::SysV;

mod lock;
pub use lock::{LockGuard, SemaphoreLock};

mod region;
pub use region::RegionManager;

pub mod channel;
pub use channel::{Message, MessageQueue, Received, MAX_PAYLOAD, MAX_SEND_SIZE};
