// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Typed message channels on kernel message queues.
//
// Every message carries a positive type tag and a NUL-terminated payload of
// at most MAX_SEND_SIZE bytes on the wire. Receiving is non-blocking and
// selects the oldest message of exactly the requested type; messages of other
// types stay queued. The kernel serializes queue access, so no lock is used.

use log::debug;

use crate::error::{IpcError, ResourceKind, Result};
use crate::key::ResourceKey;
use crate::namespace::{Namespace, ObjectId, OpenMode};

/// Largest message on the wire, terminating NUL included.
pub const MAX_SEND_SIZE: usize = 512;

/// Largest payload accepted by [`MessageQueue::send`].
pub const MAX_PAYLOAD: usize = MAX_SEND_SIZE - 1;

const KIND: ResourceKind = ResourceKind::Queue;

/// A message taken off a queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    mtype: i64,
    payload: Vec<u8>,
}

impl Message {
    /// The type tag the message was sent with.
    pub fn mtype(&self) -> i64 {
        self.mtype
    }

    /// Payload without its terminating NUL.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// The payload as text, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }
}

/// Outcome of a successful non-blocking receive.
///
/// Together with `Err(IpcError)` this is the three-way result of
/// [`MessageQueue::receive`]: nothing queued, a message, or a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// No message of the requested type is queued. Not an error.
    Empty,
    Message(Message),
}

impl Received {
    pub fn is_empty(&self) -> bool {
        matches!(self, Received::Empty)
    }

    pub fn into_message(self) -> Option<Message> {
        match self {
            Received::Empty => None,
            Received::Message(msg) => Some(msg),
        }
    }
}

/// Creates, feeds, drains and destroys keyed message queues.
pub struct MessageQueue<N> {
    ns: N,
}

impl<N: Namespace> MessageQueue<N> {
    pub fn new(ns: N) -> Self {
        Self { ns }
    }

    pub fn namespace(&self) -> &N {
        &self.ns
    }

    /// Get-or-create the queue at `key`. Idempotent.
    pub fn create(&self, key: ResourceKey) -> Result<()> {
        let key = key.checked()?;
        let id = self
            .ns
            .msg_get(key, OpenMode::CreateOrOpen)
            .map_err(|e| IpcError::creation(KIND, key, e))?;
        debug!("queue {key}: ready (id {})", id.0);
        Ok(())
    }

    /// Enqueue `payload` under type `mtype`.
    ///
    /// The payload is checked before anything is copied: it must be at most
    /// [`MAX_PAYLOAD`] bytes (`TruncationRisk` otherwise) and contain no NUL
    /// (`InteriorNul`). Blocks while the queue is full.
    pub fn send(&self, key: ResourceKey, mtype: i64, payload: &[u8]) -> Result<()> {
        check_type(mtype)?;
        if payload.len() > MAX_PAYLOAD {
            return Err(IpcError::TruncationRisk {
                len: payload.len(),
                capacity: MAX_PAYLOAD,
            });
        }
        if let Some(position) = payload.iter().position(|&b| b == 0) {
            return Err(IpcError::InteriorNul { position });
        }

        let id = self.open(key)?;
        let mut frame = [0u8; MAX_SEND_SIZE];
        frame[..payload.len()].copy_from_slice(payload);
        self.ns
            .msg_send(id, mtype, &frame[..payload.len() + 1])
            .map_err(|e| IpcError::os("send", KIND, key, e))?;
        debug!("queue {key}: sent {} bytes as type {mtype}", payload.len());
        Ok(())
    }

    /// Take the oldest message of type `mtype` without blocking.
    pub fn receive(&self, key: ResourceKey, mtype: i64) -> Result<Received> {
        check_type(mtype)?;
        let id = self.open(key)?;
        let mut frame = [0u8; MAX_SEND_SIZE];
        let n = match self.ns.msg_receive(id, mtype, &mut frame) {
            Ok(Some(n)) => n,
            Ok(None) => return Ok(Received::Empty),
            Err(e) => return Err(IpcError::os("receive", KIND, key, e)),
        };
        let body = &frame[..n];
        let end = body.iter().position(|&b| b == 0).unwrap_or(n);
        debug!("queue {key}: received {end} bytes of type {mtype}");
        Ok(Received::Message(Message {
            mtype,
            payload: body[..end].to_vec(),
        }))
    }

    /// Number of messages of any type currently queued.
    pub fn pending(&self, key: ResourceKey) -> Result<usize> {
        let id = self.open(key)?;
        self.ns
            .msg_count(id)
            .map_err(|e| IpcError::os("stat", KIND, key, e))
    }

    /// Remove the queue, dropping undelivered messages.
    pub fn destroy(&self, key: ResourceKey) -> Result<()> {
        let id = self.open(key)?;
        self.ns
            .msg_remove(id)
            .map_err(|e| IpcError::os("remove", KIND, key, e))?;
        debug!("queue {key}: removed");
        Ok(())
    }

    fn open(&self, key: ResourceKey) -> Result<ObjectId> {
        let key = key.checked()?;
        self.ns
            .msg_get(key, OpenMode::Open)
            .map_err(|e| IpcError::lookup(KIND, key, e))
    }
}

fn check_type(mtype: i64) -> Result<()> {
    if mtype <= 0 {
        return Err(IpcError::InvalidArgument(format!(
            "message type must be positive, got {mtype}"
        )));
    }
    Ok(())
}
