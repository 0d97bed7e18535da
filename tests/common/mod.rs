//! Test heaps

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

#![allow(dead_code)]

use std::{
    alloc::System,
    cell::{Cell, RefCell},
    ptr::NonNull,
};

use task_stacks::{GlobalHeap, StackHeap};

/// Something that happened to a [`CountingHeap`]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Allocate(usize),
    Release(usize),
}

/// A heap backed by the system allocator, which records what it is asked to do
pub struct CountingHeap {
    inner: GlobalHeap<System>,
    fail: Cell<bool>,
    pub events: RefCell<Vec<Event>>,
}

impl CountingHeap {
    pub fn new() -> CountingHeap {
        static SYSTEM: System = System;
        CountingHeap {
            inner: GlobalHeap::new(&SYSTEM, 16),
            fail: Cell::new(false),
            events: RefCell::new(Vec::new()),
        }
    }

    /// Make every following allocation fail
    pub fn exhaust(&self) {
        self.fail.set(true);
    }

    pub fn allocations(&self) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|e| matches!(e, Event::Allocate(_)))
            .count()
    }

    pub fn releases(&self) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|e| matches!(e, Event::Release(_)))
            .count()
    }
}

impl StackHeap for CountingHeap {
    fn allocate(&self, size: usize, align: usize) -> Option<NonNull<u8>> {
        if self.fail.get() {
            return None;
        }
        let block = self.inner.allocate(size, align)?;
        self.events.borrow_mut().push(Event::Allocate(size));
        Some(block)
    }

    unsafe fn release(&self, base: NonNull<u8>, size: usize) {
        self.events.borrow_mut().push(Event::Release(size));
        unsafe { self.inner.release(base, size) }
    }
}

/// A heap that always hands out the same made-up address
///
/// Nothing may ever be written to the memory, so stack coloration must be
/// off when using this.
pub struct FixedHeap {
    addr: usize,
    pub released: Cell<usize>,
}

impl FixedHeap {
    pub fn new(addr: usize) -> FixedHeap {
        FixedHeap {
            addr,
            released: Cell::new(0),
        }
    }
}

impl StackHeap for FixedHeap {
    fn allocate(&self, _size: usize, _align: usize) -> Option<NonNull<u8>> {
        NonNull::new(self.addr as *mut u8)
    }

    unsafe fn release(&self, _base: NonNull<u8>, _size: usize) {
        self.released.set(self.released.get() + 1);
    }
}

/// A heap with no memory at all
pub struct EmptyHeap;

impl StackHeap for EmptyHeap {
    fn allocate(&self, _size: usize, _align: usize) -> Option<NonNull<u8>> {
        None
    }

    unsafe fn release(&self, _base: NonNull<u8>, _size: usize) {
        panic!("Released memory to a heap that never gave any out");
    }
}

const ARENA_SIZE: usize = 1024;

/// Backing memory for an [`ArenaHeap`]
#[repr(align(16))]
struct Arena([u8; ARENA_SIZE]);

/// A heap that hands out exactly the bytes asked for, `offset` bytes into a
/// 16-byte aligned arena
///
/// Nothing is padded, so anything written past the end of a block shows up
/// in the arena. The arena starts out filled with [`ArenaHeap::FILL`].
pub struct ArenaHeap {
    arena: NonNull<Arena>,
    offset: usize,
    pub allocated: Cell<usize>,
    pub released: Cell<usize>,
}

impl ArenaHeap {
    pub const FILL: u8 = 0x55;

    pub fn new(offset: usize) -> ArenaHeap {
        let arena = Box::new(Arena([Self::FILL; ARENA_SIZE]));
        ArenaHeap {
            arena: NonNull::from(Box::leak(arena)),
            offset,
            allocated: Cell::new(0),
            released: Cell::new(0),
        }
    }

    /// Where blocks start
    pub fn base(&self) -> usize {
        self.arena.as_ptr() as usize + self.offset
    }

    /// The byte `idx` bytes past the start of the blocks
    pub fn byte(&self, idx: usize) -> u8 {
        assert!(self.offset + idx < ARENA_SIZE);
        unsafe { self.arena.cast::<u8>().as_ptr().add(self.offset + idx).read() }
    }
}

impl StackHeap for ArenaHeap {
    fn allocate(&self, size: usize, _align: usize) -> Option<NonNull<u8>> {
        if self.offset + size > ARENA_SIZE {
            return None;
        }
        self.allocated.set(self.allocated.get() + 1);
        Some(unsafe { self.arena.cast::<u8>().add(self.offset) })
    }

    unsafe fn release(&self, base: NonNull<u8>, _size: usize) {
        assert_eq!(base.as_ptr() as usize, self.base());
        self.released.set(self.released.get() + 1);
    }
}

impl Drop for ArenaHeap {
    fn drop(&mut self) {
        drop(unsafe { Box::from_raw(self.arena.as_ptr()) });
    }
}

// End of File
