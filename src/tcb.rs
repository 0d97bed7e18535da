//! Holds the [`Tcb`] type and the stack it owns

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::ptr::NonNull;

use crate::{MemoryDomain, StackError, StackLayout};

/// The privilege class of a thread
///
/// This may differ from what the scheduler has on file, because the stack is
/// often created before the rest of the task is set up.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ThreadClass {
    /// A normal user task
    Task,
    /// A user thread, inside some task
    Pthread,
    /// A kernel thread
    Kernel,
}

/// Where the memory behind a [`TaskStack`] came from
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StackOrigin {
    /// We allocated it from the given domain, and must give it back there
    Heap(MemoryDomain),
    /// The caller handed it to us and keeps ownership
    Caller,
}

/// A stack region, plus the values the hardware needs to use it
///
/// The raw region and the adjusted values are only ever set together.
#[derive(Debug, PartialEq, Eq)]
pub struct TaskStack {
    /// Start of the raw region
    base: NonNull<u8>,
    /// Length of the raw region, as requested
    len: usize,
    /// The initial stack pointer
    adjusted_ptr: NonNull<u8>,
    /// Usable bytes after adjustment
    adjusted_size: usize,
    /// Who owns the raw region
    origin: StackOrigin,
    /// Was the region filled with [`crate::STACK_COLOR`]?
    colored: bool,
}

impl TaskStack {
    /// Fit a layout onto a raw region
    pub(crate) fn fit(
        base: NonNull<u8>,
        len: usize,
        layout: &StackLayout,
        origin: StackOrigin,
        colored: bool,
    ) -> Result<TaskStack, StackError> {
        let normalized = layout.normalize(base.as_ptr() as usize, len)?;
        // SAFETY: normalisation keeps the offset inside the region, so this
        // does not wrap and is not null
        let adjusted_ptr = unsafe { base.add(normalized.offset) };
        Ok(TaskStack {
            base,
            len,
            adjusted_ptr,
            adjusted_size: normalized.size,
            origin,
            colored,
        })
    }

    /// Start of the raw region
    pub fn base(&self) -> NonNull<u8> {
        self.base
    }

    /// Length of the raw region
    pub fn len(&self) -> usize {
        self.len
    }

    /// Is the raw region empty?
    ///
    /// Always `false`: a region only becomes a `TaskStack` once at least one
    /// aligned slot fits in it.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The initial stack pointer to give the context switch code
    pub fn adjusted_base_pointer(&self) -> NonNull<u8> {
        self.adjusted_ptr
    }

    /// How many bytes the task can use
    pub fn adjusted_size(&self) -> usize {
        self.adjusted_size
    }

    /// Where the region came from
    pub fn origin(&self) -> StackOrigin {
        self.origin
    }

    /// Was the region filled with [`crate::STACK_COLOR`] when set up?
    pub fn is_colored(&self) -> bool {
        self.colored
    }

    /// Does this address fall inside the raw region?
    pub fn contains(&self, addr: usize) -> bool {
        let base = self.base.as_ptr() as usize;
        addr >= base && addr - base < self.len
    }

    /// Move the initial stack pointer past a frame at the start of the stack
    pub(crate) fn shrink(&mut self, adjusted_ptr: NonNull<u8>, adjusted_size: usize) {
        self.adjusted_ptr = adjusted_ptr;
        self.adjusted_size = adjusted_size;
    }
}

// SAFETY: A TaskStack is the only handle on its region, so it can be moved
// between threads along with the Tcb that holds it.
unsafe impl Send for TaskStack {}

/// The stack related part of a Task Control Block
#[derive(Debug)]
pub struct Tcb {
    class: ThreadClass,
    requested_size: usize,
    stack: Option<TaskStack>,
}

impl Tcb {
    /// Create a new [`Tcb`] object, without a stack
    pub const fn new(class: ThreadClass) -> Tcb {
        Tcb {
            class,
            requested_size: 0,
            stack: None,
        }
    }

    /// The class of thread this TCB belongs to
    pub const fn thread_class(&self) -> ThreadClass {
        self.class
    }

    /// The size most recently requested for this stack
    pub const fn requested_size(&self) -> usize {
        self.requested_size
    }

    /// The stack, if one has been set up
    pub fn stack(&self) -> Option<&TaskStack> {
        self.stack.as_ref()
    }

    /// Start of the raw stack region
    pub fn stack_base(&self) -> Option<NonNull<u8>> {
        self.stack.as_ref().map(TaskStack::base)
    }

    /// The initial stack pointer
    pub fn adjusted_base_pointer(&self) -> Option<NonNull<u8>> {
        self.stack.as_ref().map(TaskStack::adjusted_base_pointer)
    }

    /// Usable stack bytes after adjustment
    pub fn adjusted_size(&self) -> Option<usize> {
        self.stack.as_ref().map(TaskStack::adjusted_size)
    }

    /// Store a complete stack
    pub(crate) fn install(&mut self, stack: TaskStack, class: ThreadClass, requested_size: usize) {
        self.stack = Some(stack);
        self.class = class;
        self.requested_size = requested_size;
    }

    /// Remove the stack, leaving every stack field empty
    pub(crate) fn take_stack(&mut self) -> Option<TaskStack> {
        self.stack.take()
    }

    pub(crate) fn stack_mut(&mut self) -> Option<&mut TaskStack> {
        self.stack.as_mut()
    }
}


// End of File
