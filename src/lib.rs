//! Task stack management for a real-time operating system
//!
//! The [`StackManager`] gives each task a stack: it picks which heap the
//! memory comes from, fits the hardware's stack layout onto it, and records
//! the initial stack pointer in the task's [`Tcb`] for the context switch
//! code to pick up.
//!
//! ```
//! use task_stacks::{
//!     GlobalHeap, HeapModel, StackConfig, StackLayout, StackManager, Tcb, ThreadClass,
//! };
//!
//! static SYSTEM: std::alloc::System = std::alloc::System;
//! let heap = GlobalHeap::new(&SYSTEM, 8);
//! let manager = StackManager::new(
//!     &heap,
//!     &heap,
//!     StackConfig::from_build()
//!         .with_layout(StackLayout::AAPCS)
//!         .with_heap_model(HeapModel::Unified),
//! );
//!
//! let mut tcb = Tcb::new(ThreadClass::Task);
//! manager.create_stack(&mut tcb, 1024, ThreadClass::Task).unwrap();
//! assert_eq!(tcb.adjusted_size(), Some(1024));
//! manager.release_stack(&mut tcb);
//! ```

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

#![no_std]

mod config;
mod error;
mod heap;
mod layout;
mod log;
mod manager;
mod stack;
mod stats;
mod tcb;

pub use config::StackConfig;
pub use error::StackError;
pub use heap::{GlobalHeap, HeapModel, MemoryDomain, StackHeap};
pub use layout::{Normalized, StackLayout};
pub use manager::{STACK_COLOR, StackManager, StatusIndicator};
pub use stack::Stack;
pub use stats::DomainStats;
pub use tcb::{StackOrigin, TaskStack, Tcb, ThreadClass};

// End of File
