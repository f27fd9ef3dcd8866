// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 shmsync contributors
//
// RAII guard that locks a mutex for the lifetime of the access, providing
// bounds-checked reads and writes to a mapped region.

use crate::error::{Error, Result};
use crate::{MappedRegion, Mutex};

/// RAII guard: locks the mutex on construction, unlocks on drop.
/// Provides offset-based access to the underlying mapping.
pub struct ScopedAccess<'a> {
    region: &'a MappedRegion,
    mtx: &'a Mutex,
}

impl<'a> ScopedAccess<'a> {
    /// Create a new scoped access guard. Locks `mtx` immediately.
    pub fn new(region: &'a MappedRegion, mtx: &'a Mutex) -> Result<Self> {
        mtx.lock()?;
        Ok(Self { region, mtx })
    }

    /// Like [`new`](Self::new), but gives up after `ms` milliseconds.
    pub fn with_timeout(region: &'a MappedRegion, mtx: &'a Mutex, ms: u64) -> Result<Self> {
        mtx.timed_lock(ms)?;
        Ok(Self { region, mtx })
    }

    fn check(&self, offset: usize, len: usize) -> Result<()> {
        let size = self.region.len();
        match offset.checked_add(len) {
            Some(end) if end <= size => Ok(()),
            _ => Err(Error::OutOfBounds { offset, len, size }),
        }
    }

    /// Borrow `len` bytes starting at `offset`.
    pub fn read_at(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.check(offset, len)?;
        Ok(unsafe { std::slice::from_raw_parts(self.region.as_ptr().add(offset), len) })
    }

    /// Read a NUL-terminated byte string starting at `offset`, without the
    /// terminator. Stops at the end of the mapping if no NUL is found.
    pub fn read_cstr_at(&self, offset: usize) -> Result<&[u8]> {
        let rest = self.read_at(offset, self.region.len().saturating_sub(offset))?;
        let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
        Ok(&rest[..end])
    }

    /// Copy `buf` into the mapping at `offset`.
    ///
    /// Takes `&mut self` so no slice handed out by the read methods can be
    /// alive across a write:
    ///
    /// ```compile_fail
    /// # fn demo(access: &mut shmsync::ScopedAccess<'_>) -> shmsync::Result<()> {
    /// let before = access.read_at(0, 4)?;
    /// access.write_at(0, b"x")?;
    /// assert_eq!(before.len(), 4);
    /// # Ok(())
    /// # }
    /// ```
    pub fn write_at(&mut self, offset: usize, buf: &[u8]) -> Result<()> {
        self.check(offset, buf.len())?;
        unsafe {
            std::ptr::copy_nonoverlapping(
                buf.as_ptr(),
                self.region.as_mut_ptr().add(offset),
                buf.len(),
            );
        }
        Ok(())
    }

    /// Copy `buf` followed by a NUL terminator into the mapping at `offset`.
    pub fn write_cstr_at(&mut self, offset: usize, buf: &[u8]) -> Result<()> {
        self.check(offset, buf.len() + 1)?;
        self.write_at(offset, buf)?;
        self.write_at(offset + buf.len(), &[0])
    }

    /// Total mapped size.
    pub fn size(&self) -> usize {
        self.region.len()
    }
}

impl Drop for ScopedAccess<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.mtx.unlock() {
            log::warn!("scoped access failed to unlock: {e}");
        }
    }
}
