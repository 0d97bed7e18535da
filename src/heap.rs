//! Memory domains, and the heaps that stacks are drawn from

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::{alloc::GlobalAlloc, ptr::NonNull};

use crate::ThreadClass;

/// A pool of memory that a stack can be drawn from
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MemoryDomain {
    /// Protected kernel memory, not accessible to user code
    Trusted,
    /// Memory that user tasks and threads can access
    User,
}

impl MemoryDomain {
    /// Index into per-domain tables
    pub(crate) const fn index(self) -> usize {
        match self {
            MemoryDomain::Trusted => 0,
            MemoryDomain::User => 1,
        }
    }
}

impl core::fmt::Display for MemoryDomain {
    fn fmt(&self, fmt: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            MemoryDomain::Trusted => write!(fmt, "trusted"),
            MemoryDomain::User => write!(fmt, "user"),
        }
    }
}

/// How the system's heaps are arranged
///
/// This is fixed when the system is built. It is a plain value so that both
/// arrangements can be exercised by the same code.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HeapModel {
    /// One heap serves everything
    Unified,
    /// Kernel threads get their stacks from a separate, trusted heap
    PrivilegeSeparated,
}

impl HeapModel {
    /// The model selected by the `kernel-heap` feature
    pub const fn from_build() -> HeapModel {
        if cfg!(feature = "kernel-heap") {
            HeapModel::PrivilegeSeparated
        } else {
            HeapModel::Unified
        }
    }

    /// Which domain a thread of the given class takes its stack from
    ///
    /// This depends on nothing but the class and the model, because
    /// privilege isolation relies on it.
    pub const fn domain_for(self, class: ThreadClass) -> MemoryDomain {
        match (self, class) {
            (HeapModel::PrivilegeSeparated, ThreadClass::Kernel) => MemoryDomain::Trusted,
            _ => MemoryDomain::User,
        }
    }
}

/// Something that hands out raw memory for stacks
///
/// We use one of these per [`MemoryDomain`].
pub trait StackHeap {
    /// Get `size` contiguous bytes starting on an `align` byte boundary, or
    /// `None` if there is no room
    ///
    /// `align` is the stack alignment, always a non-zero power of two. A heap
    /// that can't give that alignment must return `None`. The stack manager
    /// hands back (and refuses) any block which is not aligned.
    fn allocate(&self, size: usize, align: usize) -> Option<NonNull<u8>>;

    /// Give back memory obtained from [`StackHeap::allocate`]
    ///
    /// # Safety
    ///
    /// `base` and `size` must describe an allocation this heap handed out,
    /// which has not been released already and is no longer in use.
    unsafe fn release(&self, base: NonNull<u8>, size: usize);
}

impl<H> StackHeap for &H
where
    H: StackHeap + ?Sized,
{
    fn allocate(&self, size: usize, align: usize) -> Option<NonNull<u8>> {
        (**self).allocate(size, align)
    }

    unsafe fn release(&self, base: NonNull<u8>, size: usize) {
        // SAFETY: passed on from our caller
        unsafe { (**self).release(base, size) }
    }
}

/// A [`StackHeap`] that draws on a [`GlobalAlloc`]
///
/// Block sizes are rounded up to the block alignment, so the final slot of a
/// descending stack never reaches past the block. Requests for a stack
/// alignment above the block alignment are refused.
pub struct GlobalHeap<A: 'static> {
    allocator: &'static A,
    align: usize,
}

impl<A> GlobalHeap<A>
where
    A: GlobalAlloc + 'static,
{
    /// Wrap an allocator, asking it for blocks aligned to `align` bytes
    ///
    /// The alignment must be a non-zero power of two, which is checked with
    /// an assert.
    pub const fn new(allocator: &'static A, align: usize) -> GlobalHeap<A> {
        assert!(align.is_power_of_two());
        GlobalHeap { allocator, align }
    }

    fn layout(&self, size: usize) -> Option<core::alloc::Layout> {
        core::alloc::Layout::from_size_align(size, self.align)
            .ok()
            .map(|layout| layout.pad_to_align())
    }
}

impl<A> StackHeap for GlobalHeap<A>
where
    A: GlobalAlloc + 'static,
{
    fn allocate(&self, size: usize, align: usize) -> Option<NonNull<u8>> {
        if size == 0 || align > self.align {
            return None;
        }
        let layout = self.layout(size)?;
        // SAFETY: the layout has a non-zero size
        NonNull::new(unsafe { self.allocator.alloc(layout) })
    }

    unsafe fn release(&self, base: NonNull<u8>, size: usize) {
        if let Some(layout) = self.layout(size) {
            // SAFETY: the caller promises this block came from `allocate`,
            // which used the same layout
            unsafe { self.allocator.dealloc(base.as_ptr(), layout) }
        }
    }
}


// End of File
