//! An in-memory stand-in for the non-volatile-storage block device (§1).

use appmgr::{Flash, FlashError};

/// Block-read access to a fixed set of in-memory "flash slots".
///
/// Each slot is an independent byte buffer; reads past the end of a slot,
/// or reads of a slot index that was never populated, fail the same way a
/// real flash read would on a bad address.
#[derive(Debug, Default)]
pub struct SimFlash {
    slots: Vec<Vec<u8>>,
}

impl SimFlash {
    /// Builds flash with `slot_count` empty (all-zero, `HEADER_SIZE`-long)
    /// slots — equivalent to erased flash, which fails every header probe.
    #[must_use]
    pub fn erased(slot_count: usize) -> Self {
        Self {
            slots: vec![vec![0u8; appmgr_header::HEADER_SIZE]; slot_count],
        }
    }

    /// Overwrites `slot`'s contents, growing the slot table if necessary.
    pub fn write_slot(&mut self, slot: usize, data: Vec<u8>) {
        if slot >= self.slots.len() {
            self.slots
                .resize_with(slot + 1, || vec![0u8; appmgr_header::HEADER_SIZE]);
        }
        self.slots[slot] = data;
    }
}

impl Flash for SimFlash {
    fn read(&self, slot: usize, offset: usize, buf: &mut [u8]) -> Result<(), FlashError> {
        let data = self.slots.get(slot).ok_or(FlashError::InvalidSlot)?;
        if offset + buf.len() > data.len() {
            return Err(FlashError::IoError);
        }
        buf.copy_from_slice(&data[offset..offset + buf.len()]);
        Ok(())
    }
}

/// Builds the bytes of one valid application slot: a header followed by
/// `app_size` bytes of "code" (each reloc target pre-set to a relative
/// offset of `0`) and then the packed GOT-relocation table itself.
///
/// Mirrors the on-flash layout `appmgr-header` parses against, using the
/// same raw field offsets its own parser tests do — this crate has no
/// access to the header's private offset constants, only the public
/// `MAGIC`/`HEADER_SIZE`/`NAME_LEN` ones.
#[must_use]
pub fn build_app_slot(
    name: &str,
    app_size: u16,
    entry_offset: u32,
    sym_table_addr: u32,
    reloc_entries: &[u32],
    virtual_size: u32,
) -> Vec<u8> {
    let mut buf = vec![0u8; appmgr_header::HEADER_SIZE];
    buf[0..6].copy_from_slice(appmgr_header::MAGIC);
    buf[12..14].copy_from_slice(&app_size.to_le_bytes());
    buf[14..18].copy_from_slice(&entry_offset.to_le_bytes());
    let name_bytes = name.as_bytes();
    buf[22..22 + name_bytes.len()].copy_from_slice(name_bytes);
    buf[90..94].copy_from_slice(&sym_table_addr.to_le_bytes());
    buf[96..100].copy_from_slice(&(reloc_entries.len() as u32).to_le_bytes());
    buf[100..104].copy_from_slice(&virtual_size.to_le_bytes());

    let mut image = vec![0u8; app_size as usize];
    for &r in reloc_entries {
        image[r as usize..r as usize + 4].copy_from_slice(&0u32.to_le_bytes());
    }
    for &r in reloc_entries {
        image.extend_from_slice(&r.to_le_bytes());
    }

    buf.extend(image);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn erased_flash_fails_every_probe() {
        let flash = SimFlash::erased(4);
        let mut buf = [0u8; appmgr_header::HEADER_SIZE];
        for slot in 0..4 {
            flash.read(slot, 0, &mut buf).unwrap();
            assert!(!appmgr_header::AppHeader::probe(&buf));
        }
    }

    #[test]
    fn reading_an_unpopulated_slot_index_fails() {
        let flash = SimFlash::erased(2);
        let mut buf = [0u8; appmgr_header::HEADER_SIZE];
        assert_eq!(flash.read(5, 0, &mut buf), Err(FlashError::InvalidSlot));
    }

    #[test]
    fn write_slot_grows_the_table() {
        let mut flash = SimFlash::erased(0);
        flash.write_slot(3, build_app_slot("Grown", 16, 0, 4, &[], 16));
        let mut header_buf = [0u8; appmgr_header::HEADER_SIZE];
        flash.read(3, 0, &mut header_buf).unwrap();
        assert!(appmgr_header::AppHeader::probe(&header_buf));
    }

    #[test]
    fn build_app_slot_round_trips_through_header_parse() {
        let slot = build_app_slot("TestApp", 4096, 8, 100, &[0, 4], 5120);
        let mut flash = SimFlash::erased(0);
        flash.write_slot(0, slot);
        let mut header_buf = [0u8; appmgr_header::HEADER_SIZE];
        flash.read(0, 0, &mut header_buf).unwrap();
        let header = appmgr_header::AppHeader::parse(&header_buf).unwrap();
        assert_eq!(header.name(), "TestApp");
        assert_eq!(header.app_size, 4096);
        assert_eq!(header.virtual_size, 5120);
        assert_eq!(header.sym_table_addr, 100);
        assert_eq!(header.reloc_entries_count, 2);
    }
}
