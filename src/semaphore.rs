// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 shmsync contributors
//
// Counting semaphore built from a pthread mutex, a condition variable and a
// plain counter, all stored in one control block.

use std::cell::UnsafeCell;
use std::fmt;
use std::io;
use std::time::Duration;

use crate::control::{ControlBlock, ControlHeader, SharedState, Sharing};
use crate::deadline::{Deadline, TimePoint};
use crate::error::Result;
use crate::platform::posix;

/// In-memory layout of a semaphore control block.
///
/// `count`, `waiters` and `generation` are only read or written while `lock`
/// is held. `generation` advances on every `signal_all` that finds sleepers;
/// a sleeper that sees it change has been released.
#[repr(C)]
pub(crate) struct SharedSemaphoreState {
    header: ControlHeader,
    lock: UnsafeCell<libc::pthread_mutex_t>,
    cond: UnsafeCell<libc::pthread_cond_t>,
    count: UnsafeCell<i32>,
    waiters: UnsafeCell<i32>,
    generation: UnsafeCell<u32>,
}

unsafe impl SharedState for SharedSemaphoreState {
    type Config = i32;
    const KIND: &'static str = "semaphore";

    fn header(&self) -> &ControlHeader {
        &self.header
    }

    unsafe fn init(this: *mut Self, sharing: Sharing, initial: i32) -> io::Result<()> {
        let state = &*this;
        posix::mutex_init(state.lock.get(), sharing)?;
        if let Err(e) = posix::cond_init(state.cond.get(), sharing) {
            let _ = posix::mutex_destroy(state.lock.get());
            return Err(e);
        }
        *state.count.get() = initial.max(0);
        *state.waiters.get() = 0;
        *state.generation.get() = 0;
        Ok(())
    }

    unsafe fn destroy(this: *mut Self) {
        let state = &*this;
        if let Err(e) = posix::cond_destroy(state.cond.get()) {
            log::warn!("pthread_cond_destroy failed: {e}");
        }
        if let Err(e) = posix::mutex_destroy(state.lock.get()) {
            log::warn!("pthread_mutex_destroy failed: {e}");
        }
    }
}

/// A counting semaphore usable across threads and, when attached to shared
/// memory, across processes.
///
/// Each successful wait consumes one signal; a waiter that finds the count
/// at zero sleeps until a signal arrives. Waiters are not woken in any
/// particular order.
pub struct Semaphore {
    block: ControlBlock<SharedSemaphoreState>,
}

impl Semaphore {
    /// Bytes a shared semaphore occupies at its attach address.
    pub const SHARED_SIZE: usize = std::mem::size_of::<SharedSemaphoreState>();

    /// Required alignment of a shared semaphore's attach address.
    pub const SHARED_ALIGN: usize = std::mem::align_of::<SharedSemaphoreState>();

    /// Create a process-private semaphore with a count of zero.
    pub fn new() -> Result<Self> {
        Self::with_count(0)
    }

    /// Create a process-private semaphore holding `initial` signals.
    pub fn with_count(initial: i32) -> Result<Self> {
        Ok(Self {
            block: ControlBlock::private(initial)?,
        })
    }

    /// Attach to the semaphore stored at `addr`, creating it with a count of
    /// zero if no other handle is attached yet.
    ///
    /// # Safety
    /// `addr` must point to at least [`Self::SHARED_SIZE`] bytes aligned to
    /// [`Self::SHARED_ALIGN`] that are either zeroed or already hold a
    /// semaphore attached through this crate, and must stay mapped at the
    /// same address until the returned handle is dropped.
    pub unsafe fn attach(addr: *mut u8) -> Result<Self> {
        Self::attach_with_count(addr, 0)
    }

    /// Like [`attach`](Self::attach); `initial` is used only if this call
    /// creates the semaphore.
    ///
    /// # Safety
    /// Same as [`attach`](Self::attach).
    pub unsafe fn attach_with_count(addr: *mut u8, initial: i32) -> Result<Self> {
        Ok(Self {
            block: ControlBlock::attach(addr, initial)?,
        })
    }

    /// Whether this handle is attached to caller-supplied memory.
    pub fn is_shared(&self) -> bool {
        self.block.is_shared()
    }

    /// How the native primitives were configured when the semaphore was
    /// created. `None` only if the block has been torn down underneath this
    /// handle, e.g. by someone zeroing the shared memory.
    pub fn sharing(&self) -> Option<Sharing> {
        self.block.header().sharing()
    }

    /// Number of handles, in any process, attached to this semaphore.
    pub fn attachments(&self) -> i32 {
        self.block.header().attachments()
    }

    fn state(&self) -> &SharedSemaphoreState {
        self.block.get()
    }

    /// Take one signal, sleeping until one is available.
    pub fn wait(&self) -> Result<()> {
        unsafe {
            posix::mutex_lock(self.state().lock.get())?;
            self.wait_locked(None)
        }
    }

    /// Like [`wait`](Self::wait), but fails with
    /// [`Error::Busy`](crate::Error::Busy) instead of blocking when the
    /// internal lock is held.
    ///
    /// Once the lock is taken this still sleeps until a signal is available.
    pub fn try_wait(&self) -> Result<()> {
        unsafe {
            posix::mutex_trylock(self.state().lock.get())?;
            self.wait_locked(None)
        }
    }

    /// Take one signal, giving up after `ms` milliseconds with
    /// [`Error::TimedOut`](crate::Error::TimedOut). Zero waits forever.
    pub fn timed_wait(&self, ms: u64) -> Result<()> {
        if ms == 0 {
            return self.wait();
        }
        self.wait_by(&Deadline::after_millis(ms))
    }

    /// Take one signal, giving up after `timeout`.
    pub fn try_wait_for(&self, timeout: Duration) -> Result<()> {
        self.wait_by(&Deadline::after(timeout))
    }

    /// Take one signal, giving up once `point` is reached on its own clock.
    pub fn try_wait_until<T: TimePoint>(&self, point: T) -> Result<()> {
        self.wait_by(&Deadline::from_point(point))
    }

    fn wait_by(&self, deadline: &Deadline) -> Result<()> {
        unsafe {
            posix::mutex_timedlock(self.state().lock.get(), deadline)?;
            self.wait_locked(Some(deadline))
        }
    }

    /// Sleep on the condition variable until a signal can be taken or a
    /// `signal_all` releases this waiter, then release the lock.
    ///
    /// # Safety
    /// The caller must hold the semaphore's lock.
    unsafe fn wait_locked(&self, deadline: Option<&Deadline>) -> Result<()> {
        let s = self.state();
        let count = s.count.get();

        let outcome = if *count > 0 {
            *count -= 1;
            Ok(())
        } else {
            self.sleep_locked(deadline)
        };
        let unlocked = posix::mutex_unlock(s.lock.get());
        outcome.and(unlocked)
    }

    /// The blocking half of [`wait_locked`](Self::wait_locked): entered with
    /// the lock held and no signal available, returns with the lock held.
    ///
    /// # Safety
    /// The caller must hold the semaphore's lock.
    unsafe fn sleep_locked(&self, deadline: Option<&Deadline>) -> Result<()> {
        let s = self.state();
        let (lock, cond) = (s.lock.get(), s.cond.get());
        let (count, waiters, generation) = (s.count.get(), s.waiters.get(), s.generation.get());

        let entered = *generation;
        *waiters += 1;
        let outcome = loop {
            let woke = match deadline {
                None => posix::cond_wait(cond, lock),
                Some(d) => posix::cond_timedwait(cond, lock, d),
            };
            // Released by signal_all: leave without consuming a signal.
            if *generation != entered {
                break Ok(());
            }
            // A signal that raced the timeout is still taken.
            if *count > 0 {
                *count -= 1;
                break Ok(());
            }
            if let Err(e) = woke {
                break Err(e);
            }
        };
        *waiters -= 1;
        outcome
    }

    /// Add one signal and wake one waiter.
    ///
    /// Fails with `EOVERFLOW` when the count is already `i32::MAX`; the count
    /// is left unchanged.
    pub fn signal(&self) -> Result<()> {
        let s = self.state();
        unsafe {
            posix::mutex_lock(s.lock.get())?;
            let count = &mut *s.count.get();
            let woke = match count.checked_add(1) {
                Some(raised) => {
                    *count = raised;
                    posix::cond_signal(s.cond.get())
                }
                None => Err(io::Error::from_raw_os_error(libc::EOVERFLOW).into()),
            };
            let unlocked = posix::mutex_unlock(s.lock.get());
            woke.and(unlocked)
        }
    }

    /// Release every thread blocked in a wait at the time of the call.
    ///
    /// Released waiters return without consuming a signal, so the count is
    /// unchanged and threads that start waiting afterwards cannot take their
    /// place.
    pub fn signal_all(&self) -> Result<()> {
        let s = self.state();
        unsafe {
            posix::mutex_lock(s.lock.get())?;
            let woke = if *s.waiters.get() > 0 {
                let generation = &mut *s.generation.get();
                *generation = generation.wrapping_add(1);
                posix::cond_broadcast(s.cond.get())
            } else {
                Ok(())
            };
            let unlocked = posix::mutex_unlock(s.lock.get());
            woke.and(unlocked)
        }
    }

    /// Number of signals currently available.
    pub fn count(&self) -> Result<i32> {
        let s = self.state();
        unsafe {
            posix::mutex_lock(s.lock.get())?;
            let count = *s.count.get();
            posix::mutex_unlock(s.lock.get())?;
            Ok(count)
        }
    }
}

impl fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Semaphore")
            .field("sharing", &self.sharing())
            .field("attachments", &self.attachments())
            .finish()
    }
}
