// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 shmsync contributors
//
// Word-sized spin lock that backs off from spinning to sleeping.
// It guards attach/detach bookkeeping inside control blocks, so it must work
// from zeroed memory and across processes mapping the same page.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Longest pause between two attempts once spinning and yielding gave up.
const BACKOFF_SLEEP: Duration = Duration::from_millis(1);

/// One backoff step: plain spins, then pause hints, then yields, then sleeps.
#[inline]
fn adaptive_yield(k: &mut u32) {
    match *k {
        0..=3 => {}
        4..=15 => std::hint::spin_loop(),
        16..=31 => std::thread::yield_now(),
        _ => {
            std::thread::sleep(BACKOFF_SLEEP);
            return;
        }
    }
    *k += 1;
}

/// A spin lock whose unlocked state is all-zero bytes.
///
/// Holding it means having swapped the word from 0 to 1; the guard writes 0
/// back on drop.
#[repr(transparent)]
pub(crate) struct SpinLock {
    lc: AtomicU32,
}

impl SpinLock {
    pub(crate) fn lock(&self) -> SpinGuard<'_> {
        let mut k = 0u32;
        while self.lc.swap(1, Ordering::Acquire) != 0 {
            adaptive_yield(&mut k);
        }
        SpinGuard { lock: self }
    }
}

/// Releases the [`SpinLock`] on drop.
pub(crate) struct SpinGuard<'a> {
    lock: &'a SpinLock,
}

impl Drop for SpinGuard<'_> {
    fn drop(&mut self) {
        self.lock.lc.store(0, Ordering::Release);
    }
}
