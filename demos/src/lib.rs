//! Common handlers, heaps and board support for the demos

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

#![no_std]

use core::{
    cell::{Cell, UnsafeCell},
    ptr::NonNull,
    sync::atomic::{AtomicU32, Ordering},
};

use critical_section::Mutex;
use defmt_semihosting as _;
use task_stacks::{StackHeap, StatusIndicator};

/// Logs how far the demo got, then stops the core
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    defmt::error!(
        "Demo panicked after {=u32} stacks: {}",
        STACKS_CREATED.load(Ordering::Relaxed),
        defmt::Debug2Format(info)
    );
    cortex_m::asm::udf();
}

/// A task ran off the end of its stack (or worse)
#[cortex_m_rt::exception]
unsafe fn HardFault(frame: &cortex_m_rt::ExceptionFrame) -> ! {
    defmt::error!(
        "HardFault at pc 0x{=u32:08x}, lr 0x{=u32:08x}",
        frame.pc(),
        frame.lr()
    );
    cortex_m::asm::udf();
}

/// How many stacks the board has seen created
static STACKS_CREATED: AtomicU32 = AtomicU32::new(0);

// Prefix each log line with how many stacks have been created
defmt::timestamp!("stacks={=u32}", STACKS_CREATED.load(Ordering::Relaxed));

/// Stands in for the board's status LED
pub struct Led;

impl StatusIndicator for Led {
    fn stack_created(&self) {
        let count = STACKS_CREATED.fetch_add(1, Ordering::Relaxed) + 1;
        defmt::info!("LED: stack #{=u32} created", count);
    }
}

/// One block of a [`SlotHeap`]
#[repr(align(8))]
struct Slot<const SIZE: usize>([u8; SIZE]);

/// A heap of `SLOTS` fixed-size blocks, each `SIZE` bytes
///
/// Just enough of an allocator to hand out task stacks in a demo.
pub struct SlotHeap<const SLOTS: usize, const SIZE: usize> {
    slots: UnsafeCell<[Slot<SIZE>; SLOTS]>,
    in_use: Mutex<Cell<[bool; SLOTS]>>,
}

impl<const SLOTS: usize, const SIZE: usize> SlotHeap<SLOTS, SIZE> {
    /// Create an empty heap
    pub const fn new() -> Self {
        SlotHeap {
            slots: UnsafeCell::new([const { Slot([0u8; SIZE]) }; SLOTS]),
            in_use: Mutex::new(Cell::new([false; SLOTS])),
        }
    }

    fn slot_ptr(&self, idx: usize) -> NonNull<u8> {
        let first = self.slots.get() as *mut Slot<SIZE>;
        // SAFETY: idx is always less than SLOTS
        unsafe { NonNull::new_unchecked(first.add(idx) as *mut u8) }
    }
}

impl<const SLOTS: usize, const SIZE: usize> StackHeap for SlotHeap<SLOTS, SIZE> {
    fn allocate(&self, size: usize, align: usize) -> Option<NonNull<u8>> {
        if size > SIZE || align > core::mem::align_of::<Slot<SIZE>>() {
            return None;
        }
        let idx = critical_section::with(|cs| {
            let cell = self.in_use.borrow(cs);
            let mut in_use = cell.get();
            let idx = in_use.iter().position(|used| !used)?;
            in_use[idx] = true;
            cell.set(in_use);
            Some(idx)
        })?;
        Some(self.slot_ptr(idx))
    }

    unsafe fn release(&self, base: NonNull<u8>, _size: usize) {
        let offset = base.as_ptr() as usize - self.slot_ptr(0).as_ptr() as usize;
        let idx = offset / core::mem::size_of::<Slot<SIZE>>();
        critical_section::with(|cs| {
            let cell = self.in_use.borrow(cs);
            let mut in_use = cell.get();
            in_use[idx] = false;
            cell.set(in_use);
        });
    }
}

/// SAFETY: The slots are only reached through pointers handed out under a
/// critical section, one slot per caller.
unsafe impl<const SLOTS: usize, const SIZE: usize> Sync for SlotHeap<SLOTS, SIZE> {}

// End of File
