// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 shmsync contributors
//
// Exclusive lock backed by an error-checking pthread mutex that lives either
// on the private heap or inside caller-supplied shared memory.

use std::cell::UnsafeCell;
use std::fmt;
use std::io;
use std::time::Duration;

use crate::control::{ControlBlock, ControlHeader, SharedState, Sharing};
use crate::deadline::{Deadline, TimePoint};
use crate::error::Result;
use crate::platform::posix;

/// In-memory layout of a mutex control block.
#[repr(C)]
pub(crate) struct SharedMutexState {
    header: ControlHeader,
    lock: UnsafeCell<libc::pthread_mutex_t>,
}

unsafe impl SharedState for SharedMutexState {
    type Config = ();
    const KIND: &'static str = "mutex";

    fn header(&self) -> &ControlHeader {
        &self.header
    }

    unsafe fn init(this: *mut Self, sharing: Sharing, _config: ()) -> io::Result<()> {
        posix::mutex_init((*this).lock.get(), sharing)
    }

    unsafe fn destroy(this: *mut Self) {
        if let Err(e) = posix::mutex_destroy((*this).lock.get()) {
            log::warn!("pthread_mutex_destroy failed: {e}");
        }
    }
}

/// A mutual-exclusion lock usable across threads and, when attached to
/// shared memory, across processes.
///
/// The lock is not tied to a guard: [`lock`](Self::lock) and
/// [`unlock`](Self::unlock) must be paired by the caller, on the same thread.
/// Relocking from the owning thread reports
/// [`Error::SelfDeadlock`](crate::Error::SelfDeadlock) instead of hanging, and
/// unlocking from another thread reports
/// [`Error::NotOwner`](crate::Error::NotOwner).
pub struct Mutex {
    block: ControlBlock<SharedMutexState>,
}

impl Mutex {
    /// Bytes a shared mutex occupies at its attach address.
    pub const SHARED_SIZE: usize = std::mem::size_of::<SharedMutexState>();

    /// Required alignment of a shared mutex's attach address.
    pub const SHARED_ALIGN: usize = std::mem::align_of::<SharedMutexState>();

    /// Create a process-private mutex on the heap.
    pub fn new() -> Result<Self> {
        Ok(Self {
            block: ControlBlock::private(())?,
        })
    }

    /// Attach to the mutex stored at `addr`, creating it if no other handle
    /// is attached yet.
    ///
    /// # Safety
    /// `addr` must point to at least [`Self::SHARED_SIZE`] bytes aligned to
    /// [`Self::SHARED_ALIGN`] that are either zeroed or already hold a mutex
    /// attached through this function, and must stay mapped at the same
    /// address until the returned handle is dropped.
    pub unsafe fn attach(addr: *mut u8) -> Result<Self> {
        Ok(Self {
            block: ControlBlock::attach(addr, ())?,
        })
    }

    /// Whether this handle is attached to caller-supplied memory.
    pub fn is_shared(&self) -> bool {
        self.block.is_shared()
    }

    /// How the native primitives were configured when the mutex was
    /// created. `None` only if the block has been torn down underneath this
    /// handle, e.g. by someone zeroing the shared memory.
    pub fn sharing(&self) -> Option<Sharing> {
        self.block.header().sharing()
    }

    /// Number of handles, in any process, attached to this mutex.
    pub fn attachments(&self) -> i32 {
        self.block.header().attachments()
    }

    fn raw(&self) -> *mut libc::pthread_mutex_t {
        self.block.get().lock.get()
    }

    /// Block until the lock is acquired.
    pub fn lock(&self) -> Result<()> {
        unsafe { posix::mutex_lock(self.raw()) }
    }

    /// Acquire the lock only if it is free right now.
    ///
    /// Returns [`Error::Busy`](crate::Error::Busy) if another thread holds it.
    pub fn try_lock(&self) -> Result<()> {
        unsafe { posix::mutex_trylock(self.raw()) }
    }

    /// Acquire the lock, giving up after `ms` milliseconds with
    /// [`Error::TimedOut`](crate::Error::TimedOut). Zero waits forever.
    pub fn timed_lock(&self, ms: u64) -> Result<()> {
        if ms == 0 {
            return self.lock();
        }
        self.lock_by(&Deadline::after_millis(ms))
    }

    /// Acquire the lock, giving up after `timeout`.
    pub fn try_lock_for(&self, timeout: Duration) -> Result<()> {
        self.lock_by(&Deadline::after(timeout))
    }

    /// Acquire the lock, giving up once `point` is reached on its own clock.
    pub fn try_lock_until<T: TimePoint>(&self, point: T) -> Result<()> {
        self.lock_by(&Deadline::from_point(point))
    }

    fn lock_by(&self, deadline: &Deadline) -> Result<()> {
        unsafe { posix::mutex_timedlock(self.raw(), deadline) }
    }

    /// Release the lock held by the calling thread.
    pub fn unlock(&self) -> Result<()> {
        unsafe { posix::mutex_unlock(self.raw()) }
    }
}

impl fmt::Debug for Mutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutex")
            .field("sharing", &self.sharing())
            .field("attachments", &self.attachments())
            .finish()
    }
}
