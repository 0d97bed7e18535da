//! Creates, resizes, measures and releases some task stacks

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

#![no_std]
#![no_main]

use task_stacks::{
    MemoryDomain, Stack, StackConfig, StackError, StackLayout, StackManager, Tcb, ThreadClass,
};
use task_stacks_demos::{Led, SlotHeap};

static KERNEL_HEAP: SlotHeap<2, 1024> = SlotHeap::new();

static USER_HEAP: SlotHeap<4, 512> = SlotHeap::new();

static MANAGER: StackManager<&SlotHeap<2, 1024>, &SlotHeap<4, 512>, Led> =
    StackManager::with_status(
        &KERNEL_HEAP,
        &USER_HEAP,
        Led,
        StackConfig::from_build().with_layout(StackLayout::AAPCS),
    );

static IDLE_STACK: Stack<256> = Stack::new();

#[cortex_m_rt::entry]
fn main() -> ! {
    defmt::info!("Hello! {}", MANAGER.config());

    // A kernel thread that can't get a stack means the system is broken
    let mut worker = Tcb::new(ThreadClass::Kernel);
    if let Err(e) = MANAGER.create_stack(&mut worker, 1024, ThreadClass::Kernel) {
        defmt::error!("Kernel thread stack: {}", e);
        cortex_m::asm::udf();
    }

    let mut idle = Tcb::new(ThreadClass::Kernel);
    // SAFETY: nothing else uses IDLE_STACK
    if let Err(e) = unsafe { MANAGER.use_stack(&mut idle, &IDLE_STACK, ThreadClass::Kernel) } {
        defmt::error!("Idle thread stack: {}", e);
        cortex_m::asm::udf();
    }

    // User tasks that can't get a stack just don't get started
    let mut tasks = [
        Tcb::new(ThreadClass::Task),
        Tcb::new(ThreadClass::Task),
        Tcb::new(ThreadClass::Pthread),
    ];
    for (idx, tcb) in tasks.iter_mut().enumerate() {
        let class = tcb.thread_class();
        match MANAGER.create_stack(tcb, 384, class) {
            Ok(()) => defmt::info!("Task {=usize} has a stack", idx),
            Err(StackError::AllocationFailed { domain, size }) => {
                defmt::warn!("Task {=usize}: no {=usize} bytes in {}", idx, size, domain)
            }
            Err(e) => defmt::warn!("Task {=usize}: {}", idx, e),
        }
    }

    // A task with start-up arguments
    if let Some(args) = MANAGER.reserve_frame(&mut tasks[0], 12) {
        // SAFETY: the frame is 12 bytes long and belongs to this task
        unsafe { args.as_ptr().cast::<[u32; 3]>().write_unaligned([1, 2, 3]) };
        defmt::info!("Args @ 0x{=usize:08x}", args.as_ptr() as usize);
    }

    // Restart task 1 with a bigger stack than the user heap can offer
    if let Err(e) = MANAGER.create_stack(&mut tasks[1], 2048, ThreadClass::Task) {
        defmt::warn!("Restart failed: {}", e);
    }

    for (idx, tcb) in tasks.iter().enumerate() {
        if let Some(used) = MANAGER.stack_usage(tcb) {
            defmt::info!("Task {=usize} has used {=usize} bytes", idx, used);
        }
    }

    for tcb in tasks.iter_mut() {
        MANAGER.release_stack(tcb);
    }
    MANAGER.release_stack(&mut worker);
    MANAGER.release_stack(&mut idle);

    for domain in [MemoryDomain::Trusted, MemoryDomain::User] {
        defmt::info!("{}: {}", domain, MANAGER.stats(domain));
    }

    semihosting::process::exit(0);
}

// End of File
