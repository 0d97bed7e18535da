//! Contains the [`StackManager`] type

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::ptr::NonNull;

use crate::{
    DomainStats, MemoryDomain, Stack, StackConfig, StackError, StackHeap, StackOrigin, TaskStack,
    Tcb, ThreadClass,
    log::{debug, error, trace},
    stats::StackStats,
};

/// The byte we fill new stacks with, when coloration is on
///
/// Any byte still holding this value has (probably) never been used.
pub const STACK_COLOR: u8 = 0xAA;

/// Something on the board that shows system status, like an LED
pub trait StatusIndicator {
    /// A task stack has been set up
    fn stack_created(&self) {}
}

/// A board with no status indicator
impl StatusIndicator for () {}

/// Creates, resizes and releases task stacks
///
/// There are two heaps. Which one a stack comes from depends on the class of
/// thread and on [`StackConfig::heap_model`]. With a unified heap model the
/// trusted heap is never used, so it can be the same heap as the user one
/// (pass `&heap` twice).
///
/// The manager can live in a `static`. Each [`Tcb`] must only be handed to
/// it by one caller at a time, which `&mut Tcb` takes care of.
pub struct StackManager<T, U, S = ()> {
    /// Protected kernel memory
    trusted: T,
    /// Memory accessible to user code
    user: U,
    /// Told whenever a stack is set up
    status: S,
    /// Fixed for the life of the system
    config: StackConfig,
    /// Accounting for every domain
    stats: StackStats,
}

impl<T, U> StackManager<T, U, ()>
where
    T: StackHeap,
    U: StackHeap,
{
    /// Build a stack manager, with no status indicator
    pub const fn new(trusted: T, user: U, config: StackConfig) -> StackManager<T, U, ()> {
        StackManager::with_status(trusted, user, (), config)
    }
}

impl<T, U, S> StackManager<T, U, S>
where
    T: StackHeap,
    U: StackHeap,
    S: StatusIndicator,
{
    /// Build a stack manager which reports to the given status indicator
    pub const fn with_status(
        trusted: T,
        user: U,
        status: S,
        config: StackConfig,
    ) -> StackManager<T, U, S> {
        StackManager {
            trusted,
            user,
            status,
            config,
            stats: StackStats::new(),
        }
    }

    /// The configuration we were built with
    pub const fn config(&self) -> &StackConfig {
        &self.config
    }

    /// Which domain a thread of this class gets its stack from
    pub const fn domain_for(&self, class: ThreadClass) -> MemoryDomain {
        self.config.heap_model.domain_for(class)
    }

    /// What a domain is currently providing
    pub fn stats(&self, domain: MemoryDomain) -> DomainStats {
        self.stats.get(domain)
    }

    /// Give a task a stack of at least `requested_size` bytes
    ///
    /// If the task already has a stack, it is kept when its adjusted size
    /// is exactly `requested_size` and it came from the domain `class` draws
    /// on (its values are recomputed, and it is re-colored if coloration is
    /// on). Static stacks count as belonging to every domain. Any other
    /// existing stack is released and a new one allocated from the domain
    /// for `class`.
    ///
    /// On success the task holds a complete stack and the status indicator
    /// has been told. [`StackError::LayoutTooSmall`] is found before
    /// anything is released, and never touches the task. When the old stack
    /// has to go, it is released before the new one is allocated, so an
    /// [`StackError::AllocationFailed`] then leaves the task with no stack at
    /// all.
    pub fn create_stack(
        &self,
        tcb: &mut Tcb,
        requested_size: usize,
        class: ThreadClass,
    ) -> Result<(), StackError> {
        trace!("> create_stack {=usize} {}", requested_size, class);
        self.config.layout.check_size(requested_size)?;

        let domain = self.domain_for(class);
        if tcb
            .stack()
            .is_some_and(|stack| !Self::reusable(stack, requested_size, domain))
        {
            debug!("Stack size or domain changed, releasing old stack");
            self.release_stack(tcb);
        }

        let stack = match tcb.stack() {
            Some(existing) => self.prepare(existing.base(), existing.len(), existing.origin())?,
            None => {
                let base = self.allocate(domain, requested_size)?;
                match self.prepare(base, requested_size, StackOrigin::Heap(domain)) {
                    Ok(stack) => {
                        self.stats.allocated(domain, requested_size);
                        stack
                    }
                    Err(e) => {
                        // SAFETY: we allocated this just now, and nobody
                        // else has seen it
                        unsafe { self.heap_release(domain, base, requested_size) };
                        return Err(e);
                    }
                }
            }
        };

        self.commit(tcb, stack, class, requested_size);
        Ok(())
    }

    /// Give a task a statically allocated stack
    ///
    /// Any stack the task already has is released first. The given stack is
    /// adjusted and (optionally) colored just like a heap allocated one, but
    /// it is never freed.
    ///
    /// On failure the task's stack fields are not touched.
    ///
    /// # Safety
    ///
    /// The stack must not be in use by any other task, now or at any point
    /// until this task's stack is released.
    pub unsafe fn use_stack<const N: usize>(
        &self,
        tcb: &mut Tcb,
        stack: &'static Stack<N>,
        class: ThreadClass,
    ) -> Result<(), StackError> {
        trace!("> use_stack {=usize} {}", N, class);
        let prepared = self.prepare(stack.bottom(), stack.len(), StackOrigin::Caller)?;
        self.release_stack(tcb);
        self.commit(tcb, prepared, class, stack.len());
        Ok(())
    }

    /// Take a task's stack away
    ///
    /// Heap stacks go back to the domain they came from, whatever class the
    /// task is now. Static stacks are just forgotten. Does nothing if the
    /// task has no stack.
    pub fn release_stack(&self, tcb: &mut Tcb) {
        let Some(stack) = tcb.take_stack() else {
            return;
        };
        match stack.origin() {
            StackOrigin::Heap(domain) => {
                trace!("Releasing {=usize} bytes to {}", stack.len(), domain);
                // SAFETY: this region came from that heap, and the task which
                // owned it has just given it up
                unsafe { self.heap_release(domain, stack.base(), stack.len()) };
                self.stats.released(domain, stack.len());
            }
            StackOrigin::Caller => {
                trace!("Detaching static stack");
            }
        }
    }

    /// Reserve `bytes` at the start of a task's stack
    ///
    /// The frame is rounded up to the stack alignment, taken from the end of
    /// the stack that the task would use first, and zeroed. The initial
    /// stack pointer and usable size move past it. Use this for start-up data
    /// such as task arguments.
    ///
    /// Returns the lowest address of the frame, or `None` if the task has no
    /// stack or the frame would leave less than one aligned slot.
    pub fn reserve_frame(&self, tcb: &mut Tcb, bytes: usize) -> Option<NonNull<u8>> {
        let layout = self.config.layout;
        let align = layout.alignment();
        let frame = layout.align_up(bytes)?;
        let stack = tcb.stack_mut()?;
        let sp = stack.adjusted_base_pointer();

        let (frame_start, new_sp, remaining) = if layout.grows_upward() {
            // The usable bytes run from `sp` to the end of the region
            let remaining = stack.adjusted_size().checked_sub(frame)?;
            if remaining < align {
                return None;
            }
            // SAFETY: `frame` is less than the usable size, so the new stack
            // pointer stays inside the region
            (sp, unsafe { sp.add(frame) }, remaining)
        } else {
            // The first slot may overhang the region, so the frame ends at
            // the lower of the slot's end and the last aligned address the
            // region covers.
            let base = stack.base();
            let base_addr = base.as_ptr() as usize;
            let region_end = layout.align_down(base_addr.saturating_add(stack.len()));
            let frame_end = (sp.as_ptr() as usize).saturating_add(align).min(region_end);
            let remaining = frame_end.checked_sub(base_addr)?.checked_sub(frame)?;
            if remaining < align {
                return None;
            }
            // SAFETY: `base + remaining` is the start of the frame, at least
            // one slot above `base`, so both pointers are inside the region
            unsafe {
                let frame_start = base.add(remaining);
                (frame_start, frame_start.sub(align), remaining)
            }
        };

        // SAFETY: `[frame_start, frame_start + frame)` lies inside the region,
        // which this task owns
        unsafe { frame_start.as_ptr().write_bytes(0, frame) };

        stack.shrink(new_sp, remaining);
        Some(frame_start)
    }

    /// How many bytes of a task's stack have been used, at most
    ///
    /// Counts from the far end of the stack until it finds a byte which is
    /// not [`STACK_COLOR`]. Returns `None` if the stack was not colored.
    pub fn stack_usage(&self, tcb: &Tcb) -> Option<usize> {
        let stack = tcb.stack()?;
        if !stack.is_colored() {
            return None;
        }
        let base = stack.base().as_ptr();
        let len = stack.len();
        let grows_upward = self.config.layout.grows_upward();
        let untouched = (0..len)
            .map(|i| if grows_upward { len - 1 - i } else { i })
            // SAFETY: the index is inside the region. We use a volatile read
            // because the task may be running on this stack.
            .take_while(|&i| unsafe { base.add(i).read_volatile() } == STACK_COLOR)
            .count();
        Some(len - untouched)
    }

    /// Can a task keep this stack for a new request?
    fn reusable(stack: &TaskStack, requested_size: usize, domain: MemoryDomain) -> bool {
        let same_domain = match stack.origin() {
            StackOrigin::Heap(from) => from == domain,
            StackOrigin::Caller => true,
        };
        same_domain && stack.adjusted_size() == requested_size
    }

    /// Get raw memory from a domain, aligned for our stack layout
    ///
    /// A block which is not aligned goes straight back, and counts as a
    /// failed allocation. Every size that passed
    /// [`StackLayout::check_size`](crate::StackLayout::check_size) then fits.
    fn allocate(&self, domain: MemoryDomain, size: usize) -> Result<NonNull<u8>, StackError> {
        let align = self.config.layout.alignment();
        let block = match domain {
            MemoryDomain::Trusted => self.trusted.allocate(size, align),
            MemoryDomain::User => self.user.allocate(size, align),
        };
        match block {
            Some(base) if (base.as_ptr() as usize).is_multiple_of(align) => Ok(base),
            Some(base) => {
                error!(
                    "Heap gave misaligned stack @ 0x{=usize:08x}",
                    base.as_ptr() as usize
                );
                // SAFETY: the heap just handed us this block, and nobody has
                // seen it
                unsafe { self.heap_release(domain, base, size) };
                self.stats.failed(domain);
                Err(StackError::AllocationFailed { domain, size })
            }
            None => {
                error!("Failed to allocate stack, size {=usize}", size);
                self.stats.failed(domain);
                Err(StackError::AllocationFailed { domain, size })
            }
        }
    }

    /// Give raw memory back to a domain
    ///
    /// # Safety
    ///
    /// The region must have come from [`Self::allocate`] on the same domain,
    /// and must not be used again.
    unsafe fn heap_release(&self, domain: MemoryDomain, base: NonNull<u8>, size: usize) {
        // SAFETY: passed on from our caller
        unsafe {
            match domain {
                MemoryDomain::Trusted => self.trusted.release(base, size),
                MemoryDomain::User => self.user.release(base, size),
            }
        }
    }

    /// Fit the layout onto a region, and color it if required
    ///
    /// Only colors the region once the layout is known to fit.
    fn prepare(
        &self,
        base: NonNull<u8>,
        len: usize,
        origin: StackOrigin,
    ) -> Result<TaskStack, StackError> {
        let stack = TaskStack::fit(base, len, &self.config.layout, origin, self.config.coloration)?;
        if self.config.coloration {
            // SAFETY: the region is `len` bytes long and is not in use
            unsafe { base.as_ptr().write_bytes(STACK_COLOR, len) };
        }
        Ok(stack)
    }

    /// Store a finished stack in the task, and tell the board
    fn commit(&self, tcb: &mut Tcb, stack: TaskStack, class: ThreadClass, requested_size: usize) {
        debug!(
            "Stack @ 0x{=usize:08x}, sp 0x{=usize:08x}, {=usize} bytes",
            stack.base().as_ptr() as usize,
            stack.adjusted_base_pointer().as_ptr() as usize,
            stack.adjusted_size()
        );
        tcb.install(stack, class, requested_size);
        self.status.stack_created();
    }
}


// End of File
