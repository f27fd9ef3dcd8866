// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 shmsync contributors
//
// File-backed shared mapping: the memory shared mutexes and semaphores are
// attached to. Every process that maps the same file sees the same bytes.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::ptr;

use crate::error::Result;

/// A read/write `MAP_SHARED` mapping of a whole file.
///
/// The base address is stable for the lifetime of the value. Dropping it
/// unmaps the memory but leaves the file in place.
pub struct MappedRegion {
    mem: *mut u8,
    len: usize,
    path: PathBuf,
}

// Safety: the mapping is process-shared by design; synchronisation of its
// contents is the caller's business.
unsafe impl Send for MappedRegion {}
unsafe impl Sync for MappedRegion {}

impl MappedRegion {
    /// Open `path`, creating it if missing, grow it to at least `len` bytes
    /// and map it. Bytes added by growing the file read as zero.
    pub fn create<P: AsRef<Path>>(path: P, len: usize) -> Result<Self> {
        if len == 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "size is 0").into());
        }
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .mode(0o666)
            .open(path)?;

        // Only ever grow: shrinking would pull pages out from under other
        // processes that already mapped the file.
        if file.metadata()?.len() < len as u64 {
            file.set_len(len as u64)?;
        }

        Self::map(&file, len, path)
    }

    /// Map an existing file at its current length.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len() as usize;
        if len == 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "file is empty").into());
        }
        Self::map(&file, len, path)
    }

    fn map(file: &File, len: usize, path: &Path) -> Result<Self> {
        let mem = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                0,
            )
        };
        if mem == libc::MAP_FAILED {
            return Err(io::Error::last_os_error().into());
        }
        log::debug!("mapped {} bytes of {} at {:p}", len, path.display(), mem);

        Ok(Self {
            mem: mem as *mut u8,
            len,
            path: path.to_path_buf(),
        })
    }

    /// Pointer to the start of the mapping.
    pub fn as_ptr(&self) -> *const u8 {
        self.mem
    }

    /// Mutable pointer to the start of the mapping.
    pub fn as_mut_ptr(&self) -> *mut u8 {
        self.mem
    }

    /// Mapped length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false: empty mappings are rejected at construction.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write dirty pages back to the file.
    pub fn flush(&self) -> Result<()> {
        let ret = unsafe { libc::msync(self.mem as *mut libc::c_void, self.len, libc::MS_SYNC) };
        if ret != 0 {
            return Err(io::Error::last_os_error().into());
        }
        Ok(())
    }
}

impl Drop for MappedRegion {
    fn drop(&mut self) {
        if self.mem.is_null() {
            return;
        }
        unsafe { libc::munmap(self.mem as *mut libc::c_void, self.len) };
    }
}
