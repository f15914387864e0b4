//! The dynamic loader (§4.C).
//!
//! Parses the on-flash header, copies the image into the arena, applies
//! GOT relocations, zeroes bss, installs the host symbol-table pointer,
//! partitions the arena, and hands off the heap region — in that order,
//! matching §4.C exactly (the bss zero intentionally clobbers the reloc
//! table, which is why relocation must run first).

use core::fmt;

use appmgr_header::AppHeader;

use crate::arena::{self, ArenaError, Partition};
use crate::flash::{self, FlashError};
use crate::platform::{Platform, TaskSpawnSpec};
use crate::reloc::{self, RelocError};
use crate::kdebug;
use crate::record::InternalEntryPoint;

/// Errors from [`load_external`] / [`load_internal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderError {
    /// The slot's header failed to parse (bad magic or truncated).
    BadMagic,
    /// The underlying flash read failed.
    IoError,
    /// `virtual_size + stack_size` exceeds the arena (§4.C, §7).
    SizeOverflow,
    /// The computed heap region is empty (§4.C, §7).
    NoHeap,
    /// A GOT relocation entry was malformed or out of bounds.
    Reloc(RelocError),
}

impl fmt::Display for LoaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadMagic => write!(f, "slot does not hold a valid application image"),
            Self::IoError => write!(f, "flash read failed while loading application"),
            Self::SizeOverflow => write!(f, "application image too large for arena"),
            Self::NoHeap => write!(f, "no heap space remains after stack and image"),
            Self::Reloc(e) => write!(f, "relocation failed: {e}"),
        }
    }
}

#[cfg(not(test))]
impl core::error::Error for LoaderError {}
#[cfg(test)]
impl std::error::Error for LoaderError {}

impl From<FlashError> for LoaderError {
    fn from(e: FlashError) -> Self {
        match e {
            FlashError::InvalidSlot | FlashError::IoError => Self::IoError,
        }
    }
}

impl From<ArenaError> for LoaderError {
    fn from(e: ArenaError) -> Self {
        match e {
            ArenaError::SizeOverflow => Self::SizeOverflow,
            ArenaError::NoHeap => Self::NoHeap,
        }
    }
}

impl From<RelocError> for LoaderError {
    fn from(e: RelocError) -> Self {
        Self::Reloc(e)
    }
}

/// The result of a successful load: the arena layout and the parameters
/// the caller (the supervisor) must pass to [`Platform::spawn_app_task`].
#[derive(Debug, Clone, Copy)]
pub struct LoadedImage {
    /// Arena layout computed for this application (§4.D).
    pub partition: Partition,
    /// Entry point, stack top and stack size to spawn the app task with.
    pub spawn: TaskSpawnSpec,
}

fn stack_top<P: Platform>(platform: &P, partition: &Partition) -> usize {
    platform.arena_base() + partition.stack_base + partition.stack_size
}

/// Loads the application image held in flash slot `slot_id` into the
/// arena and prepares it to run (§4.C steps 1-6).
///
/// Does not spawn the task itself (step 7); the caller does that with the
/// returned [`TaskSpawnSpec`] once it has updated the running-app pointer
/// (§5's publication ordering requirement).
///
/// # Errors
///
/// Returns [`LoaderError`] if the header doesn't parse, the image doesn't
/// fit the arena, the heap region would be empty, or a relocation entry
/// is malformed.
pub fn load_external<P: Platform>(
    platform: &mut P,
    slot_id: usize,
) -> Result<(AppHeader, LoadedImage), LoaderError> {
    // Step 1: read header.
    let header = flash::read_header(platform.flash(), slot_id)?;

    let app_size = header.app_size as usize;
    let reloc_bytes = header.reloc_entries_count as usize * 4;
    let copy_len = app_size
        .checked_add(reloc_bytes)
        .ok_or(LoaderError::SizeOverflow)?;

    // Step 2: copy app_size + reloc_entries_count*4 bytes from flash,
    // immediately following the header, into the arena starting at
    // offset 0.
    {
        let (flash_dev, arena) = platform.flash_and_arena_mut();
        let dest = arena
            .get_mut(..copy_len)
            .ok_or(LoaderError::SizeOverflow)?;
        crate::flash::Flash::read(flash_dev, slot_id, appmgr_header::HEADER_SIZE, dest)?;
    }

    let arena_base = platform.arena_base();

    // Step 3: relocate the GOT. Must happen before the bss zero below,
    // which overwrites the reloc table in place.
    reloc::apply_relocations(
        platform.arena_mut(),
        app_size,
        header.reloc_entries_count,
        arena_base,
    )?;

    // Step 4: zero bss, [app_size, virtual_size).
    let virtual_size = header.virtual_size as usize;
    platform.arena_mut()[app_size..virtual_size].fill(0);

    // Step 5: install the host symbol-table pointer.
    let sym_table_addr = header.sym_table_addr as usize;
    let sym_table_base = platform.host_symbol_table_base();
    platform.arena_mut()[sym_table_addr..sym_table_addr + 4]
        .copy_from_slice(&sym_table_base.to_le_bytes());

    // Step 6: compute the arena partition and hand the heap off.
    let partition = arena::partition(
        app_size,
        virtual_size,
        P::ARENA_SIZE,
        P::MAX_APP_STACK_SIZE_WORDS,
    )?;
    platform.init_app_heap(arena_base + partition.heap_base, partition.heap_size);

    kdebug!(
        "load: slot={slot_id} name={} sdk={}.{} app_version={}.{} app_size={app_size} \
         virtual_size={virtual_size} reloc_entries={} sym_table_addr={sym_table_addr} \
         entry_offset={}",
        header.name(),
        header.sdk_version.0,
        header.sdk_version.1,
        header.app_version.0,
        header.app_version.1,
        header.reloc_entries_count,
        header.entry_offset,
    );

    let spawn = TaskSpawnSpec {
        entry_point: arena_base + header.entry_offset as usize,
        stack_top: stack_top(platform, &partition),
        stack_words: P::MAX_APP_STACK_SIZE_WORDS,
    };

    Ok((header, LoadedImage { partition, spawn }))
}

/// Prepares the arena for an internal application (§4.C: "internal apps
/// skip steps 1-5 entirely; the arena is used only as heap+stack").
///
/// # Errors
///
/// Returns [`LoaderError::NoHeap`] / [`LoaderError::SizeOverflow`] if the
/// stack alone doesn't leave room for a heap in the arena.
pub fn load_internal<P: Platform>(
    platform: &mut P,
    entry_point: InternalEntryPoint,
) -> Result<LoadedImage, LoaderError> {
    let arena_base = platform.arena_base();
    let partition = arena::partition(0, 0, P::ARENA_SIZE, P::MAX_APP_STACK_SIZE_WORDS)?;
    platform.init_app_heap(arena_base + partition.heap_base, partition.heap_size);

    let spawn = TaskSpawnSpec {
        entry_point: entry_point as usize,
        stack_top: stack_top(platform, &partition),
        stack_words: P::MAX_APP_STACK_SIZE_WORDS,
    };

    Ok(LoadedImage { partition, spawn })
}
