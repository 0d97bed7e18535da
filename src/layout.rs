//! Holds the [`StackLayout`] type and the stack normalisation logic

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::StackError;

/// Describes how the hardware uses a stack
///
/// Every target is described by two values: which way the stack grows, and
/// how the initial stack pointer must be aligned. One set of normalisation
/// logic then serves every target.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StackLayout {
    grows_upward: bool,
    alignment: usize,
}

/// The result of fitting a stack layout onto a raw region
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Normalized {
    /// Offset of the initial stack pointer from the start of the region
    pub offset: usize,
    /// Usable bytes, measured as the hardware sees them
    pub size: usize,
}

impl StackLayout {
    /// A full-descending stack on 32-bit word boundaries
    pub const DESCENDING_WORD: StackLayout = StackLayout::new(false, 4);

    /// A full-ascending stack on 32-bit word boundaries
    pub const ASCENDING_WORD: StackLayout = StackLayout::new(true, 4);

    /// The Arm AAPCS: full-descending, 8-byte aligned
    pub const AAPCS: StackLayout = StackLayout::new(false, 8);

    /// AArch64, x86-64 and RISC-V: descending, 16-byte aligned
    pub const DESCENDING_QUAD: StackLayout = StackLayout::new(false, 16);

    /// Build a layout
    ///
    /// The alignment must be a non-zero power of two, which is checked with
    /// an assert. An alignment of one means no alignment is required.
    pub const fn new(grows_upward: bool, alignment: usize) -> StackLayout {
        assert!(alignment.is_power_of_two());
        StackLayout {
            grows_upward,
            alignment,
        }
    }

    /// The layout of the target we were compiled for
    pub const fn native() -> StackLayout {
        if cfg!(target_arch = "arm") {
            StackLayout::AAPCS
        } else if cfg!(any(
            target_arch = "aarch64",
            target_arch = "x86_64",
            target_arch = "riscv32",
            target_arch = "riscv64"
        )) {
            StackLayout::DESCENDING_QUAD
        } else {
            StackLayout::DESCENDING_WORD
        }
    }

    /// Does the stack grow towards higher addresses?
    pub const fn grows_upward(&self) -> bool {
        self.grows_upward
    }

    /// The required alignment of the stack pointer, in bytes
    pub const fn alignment(&self) -> usize {
        self.alignment
    }

    /// Round an address down to our alignment
    pub const fn align_down(&self, addr: usize) -> usize {
        addr & !(self.alignment - 1)
    }

    /// Round an address up to our alignment, or `None` on overflow
    pub const fn align_up(&self, addr: usize) -> Option<usize> {
        match addr.checked_add(self.alignment - 1) {
            Some(bumped) => Some(self.align_down(bumped)),
            None => None,
        }
    }

    /// Check that `size` bytes could hold at least one aligned slot
    ///
    /// This is the part of [`StackLayout::normalize`] that does not depend
    /// on where the region ends up.
    pub const fn check_size(&self, size: usize) -> Result<(), StackError> {
        if size < self.alignment {
            Err(StackError::LayoutTooSmall {
                size,
                alignment: self.alignment,
            })
        } else {
            Ok(())
        }
    }

    /// Fit this layout onto the raw region `[base, base + size)`
    ///
    /// For a descending stack the initial stack pointer is the highest
    /// address in the region, rounded down to the alignment, and the usable
    /// size runs from `base` up to and including the slot at that address.
    /// That slot may reach up to `alignment - 1` bytes past the end of the
    /// region when `size` is not a multiple of the alignment.
    ///
    /// For an ascending stack the initial stack pointer is the first aligned
    /// address, and the usable size runs from there to the end of the
    /// region.
    ///
    /// The returned offset always lies within `[0, size)`.
    pub fn normalize(&self, base: usize, size: usize) -> Result<Normalized, StackError> {
        self.check_size(size)?;
        let too_small = StackError::LayoutTooSmall {
            size,
            alignment: self.alignment,
        };
        let end = base.checked_add(size).ok_or(too_small)?;

        if self.grows_upward {
            let bottom = self.align_up(base).ok_or(too_small)?;
            let usable = end.checked_sub(bottom).ok_or(too_small)?;
            if usable < self.alignment {
                return Err(too_small);
            }
            Ok(Normalized {
                offset: bottom - base,
                size: usable,
            })
        } else {
            let top = self.align_down(end - 1);
            if top < base {
                return Err(too_small);
            }
            let offset = top - base;
            Ok(Normalized {
                offset,
                size: offset + self.alignment,
            })
        }
    }
}

impl Default for StackLayout {
    fn default() -> Self {
        StackLayout::native()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descending_already_aligned() {
        let n = StackLayout::DESCENDING_WORD.normalize(0x1000, 256).unwrap();
        assert_eq!(0x1000 + n.offset, 0x10FC);
        assert_eq!(n.size, 256);
    }

    #[test]
    fn descending_rounds_down() {
        let n = StackLayout::DESCENDING_WORD.normalize(0x1000, 257).unwrap();
        assert_eq!(0x1000 + n.offset, 0x1100);
        assert_eq!(n.size, 260);
    }

    #[test]
    fn descending_misaligned_base() {
        let n = StackLayout::AAPCS.normalize(0x2003, 64).unwrap();
        let sp = 0x2003 + n.offset;
        assert_eq!(sp, 0x2040);
        assert_eq!(n.size, 0x2040 - 0x2003 + 8);
    }

    #[test]
    fn descending_exact_slot() {
        let n = StackLayout::AAPCS.normalize(0x2000, 8).unwrap();
        assert_eq!(n.offset, 0);
        assert_eq!(n.size, 8);
    }

    #[test]
    fn ascending_rounds_up() {
        let n = StackLayout::ASCENDING_WORD.normalize(0x1001, 64).unwrap();
        assert_eq!(0x1001 + n.offset, 0x1004);
        assert_eq!(n.size, 61);

        let n = StackLayout::ASCENDING_WORD.normalize(0x1000, 64).unwrap();
        assert_eq!(n.offset, 0);
        assert_eq!(n.size, 64);
    }

    #[test]
    fn ascending_too_small_after_rounding() {
        assert!(StackLayout::new(true, 16).normalize(0x1001, 16).is_err());
    }

    #[test]
    fn no_alignment_is_a_no_op() {
        let layout = StackLayout::new(false, 1);
        let n = layout.normalize(0x1001, 3).unwrap();
        assert_eq!(n.offset, 2);
        assert_eq!(n.size, 3);
    }

    #[test]
    fn smaller_than_one_slot() {
        for size in 0..8 {
            assert_eq!(
                StackLayout::AAPCS.normalize(0x1000, size),
                Err(StackError::LayoutTooSmall { size, alignment: 8 })
            );
        }
    }

    #[test]
    fn pointer_always_inside_region() {
        for layout in [
            StackLayout::DESCENDING_WORD,
            StackLayout::ASCENDING_WORD,
            StackLayout::AAPCS,
            StackLayout::DESCENDING_QUAD,
        ] {
            for base in [0x1000usize, 0x1004, 0x1008, 0x1010] {
                for size in layout.alignment()..300 {
                    let n = layout.normalize(base, size).unwrap();
                    let sp = base + n.offset;
                    assert!(n.offset < size, "{layout:?} {base:#x} {size}");
                    assert_eq!(sp % layout.alignment(), 0);
                }
            }
        }
    }

    #[test]
    fn region_at_top_of_address_space() {
        assert!(
            StackLayout::DESCENDING_WORD
                .normalize(usize::MAX - 3, 16)
                .is_err()
        );
    }

    #[test]
    #[should_panic]
    fn alignment_must_be_power_of_two() {
        let _ = StackLayout::new(false, 12);
    }
}

// End of File
