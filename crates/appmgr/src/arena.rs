//! Arena partitioning: the pure arithmetic half of the dynamic loader (§4.D).
//!
//! Kept separate from the side-effecting copy/relocate/zero steps in
//! [`crate::loader`] so the layout math is independently testable without a
//! real arena buffer, the same split the host OS draws between computing a
//! relocation value and writing it through a page mapping.

use core::fmt;

use bitflags::bitflags;

bitflags! {
    /// Describes how a [`Partition`] region may be accessed. Informational
    /// only — the core manager does not enforce memory protection (§1: no
    /// virtual memory).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RegionFlags: u8 {
        /// Region holds instructions that may be fetched and executed.
        const EXECUTABLE = 1 << 0;
        /// Region may be written to at runtime.
        const WRITABLE   = 1 << 1;
    }
}

/// Errors from [`partition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArenaError {
    /// `virtual_size + stack_size_bytes` exceeds the arena's total size.
    SizeOverflow,
    /// The computed heap region has zero or negative size.
    NoHeap,
}

impl fmt::Display for ArenaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SizeOverflow => write!(f, "application image too large for arena"),
            Self::NoHeap => write!(f, "no heap space remains after stack and image"),
        }
    }
}

#[cfg(not(test))]
impl core::error::Error for ArenaError {}
#[cfg(test)]
impl std::error::Error for ArenaError {}

/// Width in bytes of a machine word, used to convert `MAX_APP_STACK_SIZE`
/// (given in words) to bytes.
pub const WORD_SIZE: usize = 4;

/// The four contiguous byte ranges an arena is carved into once an
/// application is loaded (§3):
///
/// ```text
/// [ code+data | bss | heap (grows up) ... (grows down) stack ]
/// ```
///
/// All offsets are relative to the arena's base address (byte 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    /// End of the code+data region (== `header.app_size`).
    pub code_end: usize,
    /// End of the bss region (== `header.virtual_size`).
    pub bss_end: usize,
    /// Flags describing the code+data and bss regions collectively: they
    /// are always executable-or-writable program image bytes.
    pub image_flags: RegionFlags,
    /// Start offset of the heap region.
    pub heap_base: usize,
    /// Size in bytes of the heap region.
    pub heap_size: usize,
    /// Start offset of the stack region.
    pub stack_base: usize,
    /// Size in bytes of the stack region (`stack_words * 4`).
    pub stack_size: usize,
}

/// Computes the four-region layout of an arena of `arena_size` bytes for an
/// application whose code+data occupies `[0, app_size)` and whose code+
/// data+bss occupies `[0, virtual_size)`, given a stack of `stack_words`
/// 32-bit words (§4.D).
///
/// `app_size` and `virtual_size` are `header.app_size` / `header.virtual_size`
/// respectively (§3: `code_end = header.app_size`, `bss_end =
/// header.virtual_size`) — internal apps, which have no loaded image, pass
/// `0` for both.
///
/// Pure function: no side effects, no access to a real arena buffer.
///
/// # Errors
///
/// - [`ArenaError::SizeOverflow`] if `virtual_size + stack_words * 4 >
///   arena_size`.
/// - [`ArenaError::NoHeap`] if the remaining space after the image and
///   stack is zero.
pub fn partition(
    app_size: usize,
    virtual_size: usize,
    arena_size: usize,
    stack_words: usize,
) -> Result<Partition, ArenaError> {
    let stack_size = stack_words * WORD_SIZE;

    let total = virtual_size
        .checked_add(stack_size)
        .ok_or(ArenaError::SizeOverflow)?;
    if total > arena_size {
        return Err(ArenaError::SizeOverflow);
    }

    let heap_base = virtual_size;
    let heap_size = arena_size - total;
    if heap_size == 0 {
        return Err(ArenaError::NoHeap);
    }

    let stack_base = arena_size - stack_size;

    Ok(Partition {
        code_end: app_size,
        bss_end: virtual_size,
        image_flags: RegionFlags::EXECUTABLE | RegionFlags::WRITABLE,
        heap_base,
        heap_size,
        stack_base,
        stack_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_layout() {
        // app_size=4096 (code+data only), virtual_size=5120 (code+data+bss):
        // code_end and bss_end must differ, per §3.
        let p = partition(4096, 5120, 65536, 512).unwrap();
        assert_eq!(p.code_end, 4096);
        assert_eq!(p.bss_end, 5120);
        assert_eq!(p.heap_base, 5120);
        assert_eq!(p.stack_size, 512 * WORD_SIZE);
        assert_eq!(p.stack_base, 65536 - 512 * WORD_SIZE);
        assert_eq!(p.heap_size, 65536 - 5120 - 512 * WORD_SIZE);
        assert!(p.heap_size > 0);
    }

    #[test]
    fn exact_fit_has_no_heap() {
        // virtual_size + stack exactly consumes the arena: zero heap is an error.
        let err = partition(65024, 65024, 65536, 128).unwrap_err();
        assert_eq!(err, ArenaError::NoHeap);
    }

    #[test]
    fn overflow_is_rejected() {
        let err = partition(65536, 65536, 65536, 1).unwrap_err();
        assert_eq!(err, ArenaError::SizeOverflow);
    }

    #[test]
    fn internal_app_uses_whole_arena_minus_stack() {
        // S2: internal apps have app_size == virtual_size == 0 (no code/bss
        // region), heap = ARENA_SIZE - stack*4 bytes starting at arena base.
        let p = partition(0, 0, 65536, 512).unwrap();
        assert_eq!(p.code_end, 0);
        assert_eq!(p.heap_base, 0);
        assert_eq!(p.heap_size, 65536 - 512 * WORD_SIZE);
    }

    #[test]
    fn invariant_virtual_plus_stack_le_arena_size() {
        for virtual_size in [0usize, 100, 4096, 60000] {
            for stack_words in [1usize, 64, 512] {
                if let Ok(p) = partition(virtual_size, virtual_size, 65536, stack_words) {
                    assert!(virtual_size + p.stack_size <= 65536);
                }
            }
        }
    }
}
