// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 shmsync contributors
//
// Thin pthread wrappers operating on primitives that live inside a control
// block. Every function takes raw pointers; the caller owns the memory and
// guarantees it outlives the call.

use std::io;
use std::mem;

use crate::control::Sharing;
use crate::deadline::Deadline;
use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Robust mutex symbols: not exposed by the `libc` crate on all platforms.
// On macOS robust mutexes are not available.
// ---------------------------------------------------------------------------

#[cfg(not(target_os = "macos"))]
const EOWNERDEAD: i32 = libc::EOWNERDEAD;

#[cfg(not(target_os = "macos"))]
extern "C" {
    fn pthread_mutexattr_setrobust(
        attr: *mut libc::pthread_mutexattr_t,
        robustness: libc::c_int,
    ) -> libc::c_int;
    fn pthread_mutex_consistent(mutex: *mut libc::pthread_mutex_t) -> libc::c_int;
}

#[cfg(not(target_os = "macos"))]
const PTHREAD_MUTEX_ROBUST: libc::c_int = 1;

#[cfg(not(any(target_os = "macos", feature = "polled-timedlock")))]
extern "C" {
    fn pthread_mutex_timedlock(
        mutex: *mut libc::pthread_mutex_t,
        abstime: *const libc::timespec,
    ) -> libc::c_int;
}

fn pshared(sharing: Sharing) -> libc::c_int {
    match sharing {
        Sharing::ProcessPrivate => libc::PTHREAD_PROCESS_PRIVATE,
        Sharing::ProcessShared => libc::PTHREAD_PROCESS_SHARED,
    }
}

fn check(eno: libc::c_int) -> io::Result<()> {
    if eno != 0 {
        return Err(io::Error::from_raw_os_error(eno));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Mutex
// ---------------------------------------------------------------------------

/// Initialise an error-checking mutex in place.
///
/// Shared mutexes are additionally robust (except on macOS) so that a
/// process dying while holding the lock does not wedge every other attacher.
///
/// # Safety
/// `mtx` must point to writable memory large enough for a `pthread_mutex_t`
/// that no other thread is using.
pub unsafe fn mutex_init(mtx: *mut libc::pthread_mutex_t, sharing: Sharing) -> io::Result<()> {
    std::ptr::write_bytes(mtx, 0, 1);

    let mut attr: libc::pthread_mutexattr_t = mem::zeroed();
    check(libc::pthread_mutexattr_init(&mut attr))?;
    let configured = init_with_attr(mtx, &mut attr, sharing);
    libc::pthread_mutexattr_destroy(&mut attr);
    configured
}

unsafe fn init_with_attr(
    mtx: *mut libc::pthread_mutex_t,
    attr: &mut libc::pthread_mutexattr_t,
    sharing: Sharing,
) -> io::Result<()> {
    check(libc::pthread_mutexattr_settype(attr, libc::PTHREAD_MUTEX_ERRORCHECK))?;
    check(libc::pthread_mutexattr_setpshared(attr, pshared(sharing)))?;

    #[cfg(not(target_os = "macos"))]
    {
        if sharing == Sharing::ProcessShared {
            check(pthread_mutexattr_setrobust(attr, PTHREAD_MUTEX_ROBUST))?;
        }
    }

    check(libc::pthread_mutex_init(mtx, attr))
}

/// Map the result of a lock call, recovering a mutex whose owner died.
#[cfg_attr(target_os = "macos", allow(unused_variables))]
unsafe fn lock_result(mtx: *mut libc::pthread_mutex_t, eno: libc::c_int) -> Result<()> {
    match eno {
        0 => Ok(()),
        #[cfg(not(target_os = "macos"))]
        EOWNERDEAD => {
            log::warn!("previous owner of shared mutex {mtx:p} died; marking consistent");
            let eno2 = pthread_mutex_consistent(mtx);
            if eno2 != 0 {
                return Err(Error::from_errno(eno2));
            }
            Ok(())
        }
        _ => Err(Error::from_errno(eno)),
    }
}

/// Blocking lock.
///
/// # Safety
/// `mtx` must point to an initialised mutex.
pub unsafe fn mutex_lock(mtx: *mut libc::pthread_mutex_t) -> Result<()> {
    lock_result(mtx, libc::pthread_mutex_lock(mtx))
}

/// Non-blocking lock, retried only while interrupted.
///
/// # Safety
/// `mtx` must point to an initialised mutex.
pub unsafe fn mutex_trylock(mtx: *mut libc::pthread_mutex_t) -> Result<()> {
    loop {
        let eno = libc::pthread_mutex_trylock(mtx);
        if eno == libc::EINTR {
            continue;
        }
        return lock_result(mtx, eno);
    }
}

/// Lock with an absolute realtime deadline.
///
/// # Safety
/// `mtx` must point to an initialised mutex.
pub unsafe fn mutex_timedlock(mtx: *mut libc::pthread_mutex_t, deadline: &Deadline) -> Result<()> {
    loop {
        #[cfg(any(target_os = "macos", feature = "polled-timedlock"))]
        let eno = super::timedlock::timedlock(mtx, deadline);

        #[cfg(not(any(target_os = "macos", feature = "polled-timedlock")))]
        let eno = {
            let ts = deadline.to_timespec();
            pthread_mutex_timedlock(mtx, &ts)
        };

        if eno == libc::EINTR {
            continue;
        }
        return lock_result(mtx, eno);
    }
}

/// Release the mutex.
///
/// # Safety
/// `mtx` must point to an initialised mutex.
pub unsafe fn mutex_unlock(mtx: *mut libc::pthread_mutex_t) -> Result<()> {
    let eno = libc::pthread_mutex_unlock(mtx);
    if eno != 0 {
        return Err(Error::from_errno(eno));
    }
    Ok(())
}

/// Destroy the mutex.
///
/// A lock still held by the calling thread is released first; an unlock
/// attempt on a mutex owned elsewhere fails harmlessly with `EPERM`.
///
/// # Safety
/// `mtx` must point to an initialised mutex that no other thread will use
/// again.
pub unsafe fn mutex_destroy(mtx: *mut libc::pthread_mutex_t) -> io::Result<()> {
    libc::pthread_mutex_unlock(mtx);
    check(libc::pthread_mutex_destroy(mtx))
}

// ---------------------------------------------------------------------------
// Condition variable
// ---------------------------------------------------------------------------

/// Initialise a condition variable in place.
///
/// # Safety
/// `cond` must point to writable memory large enough for a `pthread_cond_t`
/// that no other thread is using.
pub unsafe fn cond_init(cond: *mut libc::pthread_cond_t, sharing: Sharing) -> io::Result<()> {
    std::ptr::write_bytes(cond, 0, 1);

    let mut attr: libc::pthread_condattr_t = mem::zeroed();
    check(libc::pthread_condattr_init(&mut attr))?;

    let configured = check(libc::pthread_condattr_setpshared(&mut attr, pshared(sharing)))
        .and_then(|()| check(libc::pthread_cond_init(cond, &attr)));

    libc::pthread_condattr_destroy(&mut attr);
    configured
}

/// Atomically release `mtx` and block on `cond` until woken.
///
/// # Safety
/// Both pointers must refer to initialised primitives and the caller must
/// hold `mtx`.
pub unsafe fn cond_wait(
    cond: *mut libc::pthread_cond_t,
    mtx: *mut libc::pthread_mutex_t,
) -> Result<()> {
    lock_result(mtx, libc::pthread_cond_wait(cond, mtx))
}

/// Like [`cond_wait`], bounded by an absolute realtime deadline.
///
/// A deadline rejected by the OS as invalid is reported as a timeout.
///
/// # Safety
/// Same as [`cond_wait`].
pub unsafe fn cond_timedwait(
    cond: *mut libc::pthread_cond_t,
    mtx: *mut libc::pthread_mutex_t,
    deadline: &Deadline,
) -> Result<()> {
    let ts = deadline.to_timespec();
    match libc::pthread_cond_timedwait(cond, mtx, &ts) {
        libc::ETIMEDOUT | libc::EINVAL => Err(Error::TimedOut),
        eno => lock_result(mtx, eno),
    }
}

/// Wake one waiter.
///
/// # Safety
/// `cond` must point to an initialised condition variable.
pub unsafe fn cond_signal(cond: *mut libc::pthread_cond_t) -> Result<()> {
    check(libc::pthread_cond_signal(cond)).map_err(Error::from)
}

/// Wake every waiter.
///
/// # Safety
/// `cond` must point to an initialised condition variable.
pub unsafe fn cond_broadcast(cond: *mut libc::pthread_cond_t) -> Result<()> {
    check(libc::pthread_cond_broadcast(cond)).map_err(Error::from)
}

/// Destroy the condition variable.
///
/// # Safety
/// `cond` must point to an initialised condition variable with no waiters.
pub unsafe fn cond_destroy(cond: *mut libc::pthread_cond_t) -> io::Result<()> {
    check(libc::pthread_cond_destroy(cond))
}
