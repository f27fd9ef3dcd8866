// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 shmsync contributors
//
// pthread_mutex_timedlock for platforms that lack it (macOS), built from
// pthread_mutex_trylock and a fixed polling interval.

use std::time::Duration;

use crate::clock::WallClock;
use crate::deadline::Deadline;

/// Sleep between two trylock attempts.
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Poll `pthread_mutex_trylock` until it stops reporting `EBUSY` or the
/// deadline passes.
///
/// Returns the errno of the last trylock attempt, or `ETIMEDOUT`.
///
/// # Safety
/// `mtx` must point to an initialised `pthread_mutex_t`.
#[cfg_attr(not(any(target_os = "macos", feature = "polled-timedlock")), allow(dead_code))]
pub unsafe fn timedlock(mtx: *mut libc::pthread_mutex_t, deadline: &Deadline) -> libc::c_int {
    loop {
        let eno = libc::pthread_mutex_trylock(mtx);
        if eno != libc::EBUSY {
            return eno;
        }
        if deadline.has_passed_at(WallClock::now()) {
            log::trace!("polled timed lock expired at {deadline:?}");
            return libc::ETIMEDOUT;
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}
