//! Holds the [`StackError`] type

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::MemoryDomain;

/// The ways in which setting up a task stack can fail
///
/// Neither is retried here. Whether to try again with a different size, to
/// give up on the task, or to treat the failure as fatal is up to the
/// caller.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StackError {
    /// The selected memory domain had no room for the stack
    AllocationFailed {
        /// Where we tried to allocate from
        domain: MemoryDomain,
        /// How many bytes we asked for
        size: usize,
    },
    /// The requested size cannot hold even one aligned stack slot
    LayoutTooSmall {
        /// How many bytes were requested
        size: usize,
        /// The alignment the hardware needs
        alignment: usize,
    },
}

impl core::fmt::Display for StackError {
    fn fmt(&self, fmt: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            StackError::AllocationFailed { domain, size } => {
                write!(fmt, "failed to allocate {size} byte stack from {domain} memory")
            }
            StackError::LayoutTooSmall { size, alignment } => {
                write!(
                    fmt,
                    "{size} byte stack is too small for {alignment} byte alignment"
                )
            }
        }
    }
}

impl core::error::Error for StackError {}


// End of File
