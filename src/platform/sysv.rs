// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// System V implementation of the namespace: semget/semop/semctl,
// shmget/shmat/shmdt/shmctl and msgget/msgsnd/msgrcv/msgctl.

use std::io;
use std::mem;
use std::ptr::{self, NonNull};

use crate::channel::MAX_SEND_SIZE;
use crate::key::ResourceKey;
use crate::namespace::{Namespace, ObjectId, OpenMode, SegmentStat};

/// Permission bits given to newly created objects unless configured otherwise.
pub const DEFAULT_MODE: u32 = 0o666;

/// Wire layout of a message: `struct msgbuf` with a fixed-size text.
#[repr(C)]
struct MsgBuf {
    mtype: libc::c_long,
    mtext: [u8; MAX_SEND_SIZE],
}

/// The host kernel's System V IPC namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SysV {
    mode: u32,
}

impl Default for SysV {
    fn default() -> Self {
        Self { mode: DEFAULT_MODE }
    }
}

impl SysV {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `mode` (e.g. `0o600`) as the permission bits of objects created
    /// through this handle. Only the low nine bits are kept.
    pub fn with_mode(mode: u32) -> Self {
        Self { mode: mode & 0o777 }
    }

    pub fn mode(&self) -> u32 {
        self.mode
    }

    fn flags(&self, mode: OpenMode) -> libc::c_int {
        let perms = self.mode as libc::c_int;
        match mode {
            OpenMode::Create => perms | libc::IPC_CREAT | libc::IPC_EXCL,
            OpenMode::Open => perms,
            OpenMode::CreateOrOpen => perms | libc::IPC_CREAT,
        }
    }
}

fn check(ret: libc::c_int) -> io::Result<libc::c_int> {
    if ret == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret)
    }
}

impl Namespace for SysV {
    fn sem_get(&self, key: ResourceKey, mode: OpenMode) -> io::Result<ObjectId> {
        let id = check(unsafe { libc::semget(key.raw(), 1, self.flags(mode)) })?;
        Ok(ObjectId(id))
    }

    fn sem_set_value(&self, id: ObjectId, value: i32) -> io::Result<()> {
        // `union semun` is passed by value; its `val` member is the first field.
        check(unsafe { libc::semctl(id.0, 0, libc::SETVAL, value as libc::c_int) })?;
        Ok(())
    }

    fn sem_value(&self, id: ObjectId) -> io::Result<i32> {
        check(unsafe { libc::semctl(id.0, 0, libc::GETVAL) })
    }

    fn sem_op(&self, id: ObjectId, delta: i16, nowait: bool) -> io::Result<bool> {
        let mut op = libc::sembuf {
            sem_num: 0,
            sem_op: delta,
            sem_flg: if nowait { libc::IPC_NOWAIT as libc::c_short } else { 0 },
        };
        loop {
            let ret = unsafe { libc::semop(id.0, &mut op, 1) };
            if ret == 0 {
                return Ok(true);
            }
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::EINTR) => continue,
                Some(libc::EAGAIN) if nowait => return Ok(false),
                _ => return Err(err),
            }
        }
    }

    fn sem_remove(&self, id: ObjectId) -> io::Result<()> {
        check(unsafe { libc::semctl(id.0, 0, libc::IPC_RMID) })?;
        Ok(())
    }

    fn shm_get(&self, key: ResourceKey, size: usize, mode: OpenMode) -> io::Result<ObjectId> {
        let id = check(unsafe { libc::shmget(key.raw(), size, self.flags(mode)) })?;
        Ok(ObjectId(id))
    }

    fn shm_attach(&self, id: ObjectId) -> io::Result<NonNull<u8>> {
        let addr = unsafe { libc::shmat(id.0, ptr::null(), 0) };
        // shmat reports failure as (void *)-1, not NULL.
        if addr as isize == -1 {
            return Err(io::Error::last_os_error());
        }
        NonNull::new(addr as *mut u8)
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "shmat returned a null address"))
    }

    unsafe fn shm_detach(&self, addr: NonNull<u8>) -> io::Result<()> {
        check(libc::shmdt(addr.as_ptr() as *const libc::c_void))?;
        Ok(())
    }

    fn shm_stat(&self, id: ObjectId) -> io::Result<SegmentStat> {
        let mut ds: libc::shmid_ds = unsafe { mem::zeroed() };
        check(unsafe { libc::shmctl(id.0, libc::IPC_STAT, &mut ds) })?;
        Ok(SegmentStat {
            size: ds.shm_segsz as usize,
            attached: ds.shm_nattch as u64,
        })
    }

    fn shm_remove(&self, id: ObjectId) -> io::Result<()> {
        check(unsafe { libc::shmctl(id.0, libc::IPC_RMID, ptr::null_mut()) })?;
        Ok(())
    }

    fn msg_get(&self, key: ResourceKey, mode: OpenMode) -> io::Result<ObjectId> {
        let id = check(unsafe { libc::msgget(key.raw(), self.flags(mode)) })?;
        Ok(ObjectId(id))
    }

    fn msg_send(&self, id: ObjectId, mtype: i64, data: &[u8]) -> io::Result<()> {
        if data.len() > MAX_SEND_SIZE {
            return Err(io::Error::from_raw_os_error(libc::EINVAL));
        }
        let mut msg = MsgBuf {
            mtype: mtype as libc::c_long,
            mtext: [0; MAX_SEND_SIZE],
        };
        msg.mtext[..data.len()].copy_from_slice(data);
        loop {
            let ret = unsafe {
                libc::msgsnd(
                    id.0,
                    &msg as *const MsgBuf as *const libc::c_void,
                    data.len(),
                    0,
                )
            };
            if ret == 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::EINTR) {
                return Err(err);
            }
        }
    }

    fn msg_receive(&self, id: ObjectId, mtype: i64, buf: &mut [u8]) -> io::Result<Option<usize>> {
        let mut msg = MsgBuf {
            mtype: 0,
            mtext: [0; MAX_SEND_SIZE],
        };
        let cap = buf.len().min(MAX_SEND_SIZE);
        let n = unsafe {
            libc::msgrcv(
                id.0,
                &mut msg as *mut MsgBuf as *mut libc::c_void,
                cap,
                mtype as libc::c_long,
                libc::IPC_NOWAIT,
            )
        };
        if n < 0 {
            let err = io::Error::last_os_error();
            return match err.raw_os_error() {
                Some(libc::ENOMSG) => Ok(None),
                _ => Err(err),
            };
        }
        let n = n as usize;
        buf[..n].copy_from_slice(&msg.mtext[..n]);
        Ok(Some(n))
    }

    fn msg_count(&self, id: ObjectId) -> io::Result<usize> {
        let mut ds: libc::msqid_ds = unsafe { mem::zeroed() };
        check(unsafe { libc::msgctl(id.0, libc::IPC_STAT, &mut ds) })?;
        Ok(ds.msg_qnum as usize)
    }

    fn msg_remove(&self, id: ObjectId) -> io::Result<()> {
        check(unsafe { libc::msgctl(id.0, libc::IPC_RMID, ptr::null_mut()) })?;
        Ok(())
    }
}
