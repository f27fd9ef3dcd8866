// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 shmsync contributors
//
// Error taxonomy shared by every primitive in the crate.

use std::io;

/// Failure reported by a lock, wait or attach operation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A non-blocking acquisition found the lock already held.
    #[error("resource is busy")]
    Busy,

    /// The calling thread already holds the lock it tried to acquire.
    #[error("lock is already held by the calling thread")]
    SelfDeadlock,

    /// The deadline of a timed operation passed before it could succeed.
    #[error("operation timed out")]
    TimedOut,

    /// `unlock` was called by a thread that does not hold the lock.
    #[error("lock is not held by the calling thread")]
    NotOwner,

    /// Setting up a native primitive inside a control block failed.
    #[error("failed to initialise {primitive}")]
    Init {
        primitive: &'static str,
        #[source]
        source: io::Error,
    },

    /// The address handed to an attach call cannot hold a control block.
    #[error("invalid control block address: {0}")]
    InvalidAddress(&'static str),

    /// A region access fell outside the mapping.
    #[error("access of {len} bytes at offset {offset} exceeds region of {size} bytes")]
    OutOfBounds {
        offset: usize,
        len: usize,
        size: usize,
    },

    /// Any other error reported by the operating system.
    #[error(transparent)]
    Os(#[from] io::Error),
}

impl Error {
    /// Map a raw errno returned by a pthread call to an error kind.
    #[cfg_attr(not(unix), allow(dead_code))]
    pub(crate) fn from_errno(eno: i32) -> Self {
        #[cfg(unix)]
        {
            match eno {
                libc::EBUSY => return Error::Busy,
                libc::EDEADLK => return Error::SelfDeadlock,
                libc::ETIMEDOUT => return Error::TimedOut,
                libc::EPERM => return Error::NotOwner,
                _ => {}
            }
        }
        Error::Os(io::Error::from_raw_os_error(eno))
    }

    /// Whether this error is [`Error::TimedOut`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::TimedOut)
    }

    /// Whether this error is [`Error::Busy`].
    pub fn is_busy(&self) -> bool {
        matches!(self, Error::Busy)
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
