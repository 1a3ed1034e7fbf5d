// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Error taxonomy shared by the lock, region and channel components.
// The namespace layer reports plain `io::Error`s; this module classifies them.

use std::fmt;
use std::io;

use thiserror::Error;

use crate::key::ResourceKey;

/// Kind of kernel object an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Semaphore,
    Segment,
    Queue,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResourceKind::Semaphore => "semaphore",
            ResourceKind::Segment => "shared memory segment",
            ResourceKind::Queue => "message queue",
        })
    }
}

/// Everything that can go wrong in this crate.
///
/// An empty message queue is not an error: see [`crate::Received::Empty`].
#[derive(Debug, Error)]
pub enum IpcError {
    /// The object was never created, or has been destroyed.
    #[error("{kind} at key {key} does not exist")]
    ResourceAbsent { kind: ResourceKind, key: ResourceKey },

    /// The kernel refused to allocate the object (limits, memory, permissions).
    #[error("could not create {kind} at key {key}: {source}")]
    ResourceCreationFailed {
        kind: ResourceKind,
        key: ResourceKey,
        #[source]
        source: io::Error,
    },

    /// A semaphore operation failed in the kernel. Never means "contended".
    #[error("could not {op} semaphore at key {key}: {source}")]
    LockUnavailable {
        op: &'static str,
        key: ResourceKey,
        #[source]
        source: io::Error,
    },

    /// Attaching or detaching the segment failed.
    #[error("could not map shared memory segment at key {key}: {source}")]
    MappingFailed {
        key: ResourceKey,
        #[source]
        source: io::Error,
    },

    /// The payload does not fit in a message; nothing was sent.
    #[error("payload of {len} bytes exceeds channel capacity of {capacity} bytes")]
    TruncationRisk { len: usize, capacity: usize },

    /// Payloads are NUL-terminated on the wire and may not contain NUL.
    #[error("payload contains a nul byte at offset {position}")]
    InteriorNul { position: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Any other kernel failure.
    #[error("{op} on {kind} at key {key} failed: {source}")]
    Os {
        op: &'static str,
        kind: ResourceKind,
        key: ResourceKey,
        #[source]
        source: io::Error,
    },

    /// A multi-step create failed and undoing the finished steps failed too.
    #[error("{primary} (rollback also failed: {rollback})")]
    RollbackFailed {
        primary: Box<IpcError>,
        rollback: Box<IpcError>,
    },

    /// Both halves of a two-step teardown failed.
    #[error("{first}; {second}")]
    Incomplete {
        first: Box<IpcError>,
        second: Box<IpcError>,
    },
}

pub type Result<T> = std::result::Result<T, IpcError>;

impl IpcError {
    /// Classify a failed lookup of an existing object.
    ///
    /// `ENOENT` means the key is not in use; `EINVAL` from a segment lookup
    /// means the requested size exceeds the segment's size.
    pub(crate) fn lookup(kind: ResourceKind, key: ResourceKey, err: io::Error) -> Self {
        match err.raw_os_error() {
            Some(libc::ENOENT) | Some(libc::EIDRM) => IpcError::ResourceAbsent { kind, key },
            Some(libc::EINVAL) if kind == ResourceKind::Segment => IpcError::InvalidArgument(
                format!("requested size exceeds the {kind} at key {key}"),
            ),
            _ => IpcError::Os {
                op: "lookup",
                kind,
                key,
                source: err,
            },
        }
    }

    /// Classify an operation on an already looked-up object. An identifier that
    /// vanished in between is reported as absent.
    pub(crate) fn os(op: &'static str, kind: ResourceKind, key: ResourceKey, err: io::Error) -> Self {
        match err.raw_os_error() {
            Some(libc::EIDRM) => IpcError::ResourceAbsent { kind, key },
            _ => IpcError::Os {
                op,
                kind,
                key,
                source: err,
            },
        }
    }

    pub(crate) fn creation(kind: ResourceKind, key: ResourceKey, source: io::Error) -> Self {
        IpcError::ResourceCreationFailed { kind, key, source }
    }

    /// True when the object addressed does not exist.
    pub fn is_absent(&self) -> bool {
        matches!(self, IpcError::ResourceAbsent { .. })
    }

    /// The OS error behind this failure, if any. For compound errors this is
    /// the primary (first) failure's.
    pub fn os_error(&self) -> Option<&io::Error> {
        match self {
            IpcError::ResourceCreationFailed { source, .. }
            | IpcError::LockUnavailable { source, .. }
            | IpcError::MappingFailed { source, .. }
            | IpcError::Os { source, .. } => Some(source),
            IpcError::RollbackFailed { primary, .. } => primary.os_error(),
            IpcError::Incomplete { first, .. } => first.os_error(),
            _ => None,
        }
    }

    /// Raw `errno` for diagnostics. Not stable across platforms.
    pub fn raw_os_error(&self) -> Option<i32> {
        self.os_error().and_then(io::Error::raw_os_error)
    }

    /// Combine the outcomes of two independent teardown steps.
    pub(crate) fn aggregate(first: Result<()>, second: Result<()>) -> Result<()> {
        match (first, second) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
            (Err(first), Err(second)) => Err(IpcError::Incomplete {
                first: Box::new(first),
                second: Box::new(second),
            }),
        }
    }
}
