// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 shmsync contributors
//
// Mutex and counting semaphore that live either on the private heap or
// inside memory shared between processes (a mapped file or shm segment).
// The primitives are pthread based; the clock and deadline helpers build on
// every platform.

pub mod clock;
pub mod deadline;

mod error;
pub use error::{Error, Result};

#[cfg(unix)]
mod platform;
#[cfg(unix)]
pub use platform::timedlock::POLL_INTERVAL;

#[cfg(unix)]
mod spin_lock;

#[cfg(unix)]
mod control;
#[cfg(unix)]
pub use control::Sharing;

#[cfg(unix)]
mod mutex;
#[cfg(unix)]
pub use mutex::Mutex;

#[cfg(unix)]
mod semaphore;
#[cfg(unix)]
pub use semaphore::Semaphore;

#[cfg(unix)]
mod region;
#[cfg(unix)]
pub use region::MappedRegion;

#[cfg(unix)]
mod scoped_access;
#[cfg(unix)]
pub use scoped_access::ScopedAccess;

pub use clock::WallClock;
pub use deadline::{Deadline, TimePoint};
