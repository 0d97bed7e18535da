//! Holds the [`Stack`] type and methods

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::{cell::UnsafeCell, ptr::NonNull};

/// A statically allocated task stack, with the given size `LEN` bytes.
///
/// Hand one to [`crate::StackManager::use_stack`] when a task should not
/// take its stack from a heap.
///
/// The value of `LEN` must be a multiple of 4, which is checked with an
/// assert.
///
/// We align stacks on 8-byte boundaries, as required by AAPCS.
#[repr(align(8))]
pub struct Stack<const LEN: usize> {
    /// The memory reserved for the task stack
    contents: UnsafeCell<[u8; LEN]>,
}

impl<const LEN: usize> Stack<LEN> {
    /// Create a new stack
    pub const fn new() -> Self {
        assert!(LEN.is_multiple_of(4));
        Self {
            contents: UnsafeCell::new([0u8; LEN]),
        }
    }

    /// Get the lowest address of the stack
    pub const fn bottom(&self) -> NonNull<u8> {
        // SAFETY: the pointer comes from a reference, so is not null
        unsafe { NonNull::new_unchecked(self.contents.get() as *mut u8) }
    }

    /// Get the size of the stack, in bytes
    pub const fn len(&self) -> usize {
        LEN
    }

    /// Is this a zero sized stack?
    pub const fn is_empty(&self) -> bool {
        LEN == 0
    }
}

/// SAFETY: Our stack object only exposes pointers to itself, so is thread-safe
/// despite containing an `UnsafeCell`.
unsafe impl<const LEN: usize> Sync for Stack<LEN> {}

impl<const LEN: usize> Default for Stack<LEN> {
    fn default() -> Self {
        Stack::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligned_for_aapcs() {
        static STACK: Stack<64> = Stack::new();
        assert_eq!(STACK.bottom().as_ptr() as usize % 8, 0);
        assert_eq!(STACK.len(), 64);
        assert!(!STACK.is_empty());
    }
}

// End of File
