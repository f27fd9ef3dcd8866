// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 shmsync contributors
//
// Control blocks: fixed-layout records holding a primitive's native state
// plus the bookkeeping that decides who initialises and who tears it down.
//
// A block either lives on the private heap (one owner, process-private
// primitives) or at an address inside a mapping shared between processes.
// For the shared case the header words are atomics in the shared page, so
// every process agrees on the attachment count without any other channel.

use std::io;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};

use crate::error::{Error, Result};
use crate::spin_lock::SpinLock;

/// How native primitives are configured at initialisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sharing {
    /// Usable only by threads of the creating process.
    ProcessPrivate,
    /// Usable by any process that maps the memory holding the primitive.
    ProcessShared,
}

impl Sharing {
    fn to_raw(self) -> u32 {
        match self {
            Sharing::ProcessPrivate => 1,
            Sharing::ProcessShared => 2,
        }
    }

    fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            1 => Some(Sharing::ProcessPrivate),
            2 => Some(Sharing::ProcessShared),
            _ => None,
        }
    }
}

/// Leading words of every control block.
///
/// `guard` serialises attach and detach so that counting, first-time
/// initialisation and last-time teardown form one critical section in every
/// process. Lock, unlock, wait and signal never take it.
#[repr(C)]
pub struct ControlHeader {
    guard: SpinLock,
    attachments: AtomicI32,
    sharing: AtomicU32,
}

impl ControlHeader {
    /// Number of live handles attached to the block.
    pub fn attachments(&self) -> i32 {
        self.attachments.load(Ordering::Acquire)
    }

    /// The configuration the primitives were initialised with, or `None`
    /// while they are torn down.
    pub fn sharing(&self) -> Option<Sharing> {
        Sharing::from_raw(self.sharing.load(Ordering::Acquire))
    }
}

/// A record that can live in a control block.
///
/// # Safety
/// Implementors must be `#[repr(C)]` with a [`ControlHeader`] as their first
/// field, and must be valid when every byte is zero.
pub(crate) unsafe trait SharedState: Sized {
    /// Parameters applied by the initialising attacher only.
    type Config: Copy;

    /// Name used in errors and log lines.
    const KIND: &'static str;

    fn header(&self) -> &ControlHeader;

    /// Initialise the native primitives in place.
    ///
    /// # Safety
    /// `this` must be valid for writes and not in use by anyone else.
    unsafe fn init(this: *mut Self, sharing: Sharing, config: Self::Config) -> io::Result<()>;

    /// Destroy the native primitives. Failures are logged, never raised.
    ///
    /// # Safety
    /// `this` must have been initialised and must not be used again until
    /// re-initialised.
    unsafe fn destroy(this: *mut Self);
}

/// A handle's attachment to one control block.
pub(crate) struct ControlBlock<S: SharedState> {
    ptr: NonNull<S>,
    shared: bool,
}

// The block is only ever touched through atomics and native primitives that
// are designed for concurrent use.
unsafe impl<S: SharedState> Send for ControlBlock<S> {}
unsafe impl<S: SharedState> Sync for ControlBlock<S> {}

impl<S: SharedState> ControlBlock<S> {
    /// Allocate a fresh block on the heap, owned by this handle.
    pub(crate) fn private(config: S::Config) -> Result<Self> {
        // Zero is a valid bit pattern for S by the trait contract.
        let boxed: Box<S> = Box::new(unsafe { std::mem::zeroed() });
        let ptr = NonNull::from(Box::leak(boxed));

        if let Err(source) = unsafe { S::init(ptr.as_ptr(), Sharing::ProcessPrivate, config) } {
            drop(unsafe { Box::from_raw(ptr.as_ptr()) });
            return Err(Error::Init {
                primitive: S::KIND,
                source,
            });
        }

        let header = unsafe { ptr.as_ref() }.header();
        header
            .sharing
            .store(Sharing::ProcessPrivate.to_raw(), Ordering::Relaxed);
        header.attachments.store(1, Ordering::Release);

        Ok(Self { ptr, shared: false })
    }

    /// Attach to the block at `addr`, initialising it if this is the first
    /// attachment.
    ///
    /// # Safety
    /// `addr` must point to at least `size_of::<S>()` bytes that are either
    /// all zero or hold a block previously set up by this function, and must
    /// stay mapped at the same address until the returned handle is dropped.
    pub(crate) unsafe fn attach(addr: *mut u8, config: S::Config) -> Result<Self> {
        let ptr = NonNull::new(addr as *mut S).ok_or(Error::InvalidAddress("null pointer"))?;
        if (addr as usize) % std::mem::align_of::<S>() != 0 {
            return Err(Error::InvalidAddress("misaligned for control block"));
        }
        let header = ptr.as_ref().header();

        let _guard = header.guard.lock();
        if header.attachments.load(Ordering::Acquire) <= 0 {
            if let Err(source) = S::init(ptr.as_ptr(), Sharing::ProcessShared, config) {
                return Err(Error::Init {
                    primitive: S::KIND,
                    source,
                });
            }
            header
                .sharing
                .store(Sharing::ProcessShared.to_raw(), Ordering::Release);
            header.attachments.store(1, Ordering::Release);
            log::debug!("initialised shared {} at {:p}", S::KIND, addr);
        } else {
            header.attachments.fetch_add(1, Ordering::AcqRel);
        }

        Ok(Self { ptr, shared: true })
    }

    pub(crate) fn get(&self) -> &S {
        unsafe { self.ptr.as_ref() }
    }

    pub(crate) fn header(&self) -> &ControlHeader {
        self.get().header()
    }

    pub(crate) fn is_shared(&self) -> bool {
        self.shared
    }
}

impl<S: SharedState> Drop for ControlBlock<S> {
    fn drop(&mut self) {
        let header = self.header();
        {
            let _guard = header.guard.lock();
            if header.attachments.fetch_sub(1, Ordering::AcqRel) <= 1 {
                unsafe { S::destroy(self.ptr.as_ptr()) };
                header.sharing.store(0, Ordering::Release);
                header.attachments.store(0, Ordering::Release);
                log::debug!("tore down {} at {:p}", S::KIND, self.ptr);
            }
        }

        if !self.shared {
            drop(unsafe { Box::from_raw(self.ptr.as_ptr()) });
        }
    }
}
