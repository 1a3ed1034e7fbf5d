// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors

pub mod memory;

#[cfg(target_os = "linux")]
pub mod sysv;

pub use memory::InMemoryNamespace;

#[cfg(target_os = "linux")]
pub use sysv::{SysV, DEFAULT_MODE};
