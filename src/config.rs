//! Holds the [`StackConfig`] type

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::{HeapModel, StackLayout};

/// Everything the [`crate::StackManager`] needs to know about the system
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StackConfig {
    /// How the hardware uses a stack
    pub layout: StackLayout,
    /// How the heaps are arranged
    pub heap_model: HeapModel,
    /// Fill new stacks with [`crate::STACK_COLOR`], so that
    /// [`crate::StackManager::stack_usage`] can measure them later
    pub coloration: bool,
}

impl StackConfig {
    /// The configuration selected at build time
    ///
    /// Uses the native stack layout, the `kernel-heap` feature for the heap
    /// model and the `stack-coloration` feature for stack coloration.
    pub const fn from_build() -> StackConfig {
        StackConfig {
            layout: StackLayout::native(),
            heap_model: HeapModel::from_build(),
            coloration: cfg!(feature = "stack-coloration"),
        }
    }

    /// Use a different stack layout
    pub const fn with_layout(self, layout: StackLayout) -> StackConfig {
        StackConfig { layout, ..self }
    }

    /// Use a different heap model
    pub const fn with_heap_model(self, heap_model: HeapModel) -> StackConfig {
        StackConfig { heap_model, ..self }
    }

    /// Turn stack coloration on or off
    pub const fn with_coloration(self, coloration: bool) -> StackConfig {
        StackConfig { coloration, ..self }
    }
}

impl Default for StackConfig {
    fn default() -> Self {
        StackConfig::from_build()
    }
}


// End of File
