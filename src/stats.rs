//! Per-domain stack accounting

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::cell::Cell;

use critical_section::Mutex;

use crate::MemoryDomain;

/// What one memory domain is currently providing in stacks
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DomainStats {
    /// Stacks allocated and not yet released
    pub live_stacks: usize,
    /// Bytes held by those stacks
    pub live_bytes: usize,
    /// How many allocations this domain has refused
    pub allocation_failures: usize,
}

/// Counters for every domain
///
/// Updated inside a critical section, as not every core we run on has
/// atomic read-modify-write instructions.
pub(crate) struct StackStats {
    domains: Mutex<Cell<[DomainStats; 2]>>,
}

impl StackStats {
    pub(crate) const fn new() -> StackStats {
        StackStats {
            domains: Mutex::new(Cell::new(
                [DomainStats {
                    live_stacks: 0,
                    live_bytes: 0,
                    allocation_failures: 0,
                }; 2],
            )),
        }
    }

    pub(crate) fn get(&self, domain: MemoryDomain) -> DomainStats {
        critical_section::with(|cs| self.domains.borrow(cs).get()[domain.index()])
    }

    fn update<F>(&self, domain: MemoryDomain, f: F)
    where
        F: FnOnce(&mut DomainStats),
    {
        critical_section::with(|cs| {
            let cell = self.domains.borrow(cs);
            let mut domains = cell.get();
            f(&mut domains[domain.index()]);
            cell.set(domains);
        });
    }

    pub(crate) fn allocated(&self, domain: MemoryDomain, size: usize) {
        self.update(domain, |s| {
            s.live_stacks += 1;
            s.live_bytes += size;
        });
    }

    pub(crate) fn released(&self, domain: MemoryDomain, size: usize) {
        self.update(domain, |s| {
            s.live_stacks = s.live_stacks.saturating_sub(1);
            s.live_bytes = s.live_bytes.saturating_sub(size);
        });
    }

    pub(crate) fn failed(&self, domain: MemoryDomain) {
        self.update(domain, |s| s.allocation_failures += 1);
    }
}


// End of File
