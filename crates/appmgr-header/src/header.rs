//! On-flash application header layout and parsing.
//!
//! Field semantics follow the application-manager specification's data
//! model (magic, SDK/app version, code size, entry offset, CRC, display
//! name, company name, icon resource id, flags, relocation-entry count,
//! symbol-table offset, virtual size). The exact byte offsets are this
//! crate's own choice — the specification calls the wire layout
//! implementation-defined and only fixes the semantics.

use core::fmt;

/// The 6-byte magic signature that identifies a valid application image.
pub const MAGIC: &[u8; 6] = b"PBLAPP";

/// Length in bytes of the zero-padded `name` and `company` fields.
pub const NAME_LEN: usize = 32;

/// Total size in bytes of [`AppHeader`]'s on-flash representation.
pub const HEADER_SIZE: usize = 104;

const OFF_MAGIC: usize = 0;
const OFF_SDK_VERSION: usize = 8;
const OFF_APP_VERSION: usize = 10;
const OFF_APP_SIZE: usize = 12;
const OFF_ENTRY_OFFSET: usize = 14;
const OFF_CRC: usize = 18;
const OFF_NAME: usize = 22;
const OFF_COMPANY: usize = OFF_NAME + NAME_LEN;
const OFF_ICON_RESOURCE_ID: usize = 86;
const OFF_SYM_TABLE_ADDR: usize = 90;
const OFF_FLAGS: usize = 94;
const OFF_RELOC_ENTRIES_COUNT: usize = 96;
const OFF_VIRTUAL_SIZE: usize = 100;

/// Read a little-endian `u16` from `data` at byte offset `off`.
///
/// # Panics
///
/// Panics if `off + 2 > data.len()`. Callers must bounds-check first.
fn le_u16(data: &[u8], off: usize) -> u16 {
    u16::from_le_bytes(*data[off..].first_chunk().unwrap())
}

/// Read a little-endian `u32` from `data` at byte offset `off`.
fn le_u32(data: &[u8], off: usize) -> u32 {
    u32::from_le_bytes(*data[off..].first_chunk().unwrap())
}

/// Errors that can occur when parsing an [`AppHeader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderError {
    /// The input is shorter than [`HEADER_SIZE`].
    Truncated,
    /// The first six bytes do not equal [`MAGIC`].
    BadMagic,
    /// `sym_table_addr` or the entry offset falls outside `[0, app_size)`.
    InvalidOffset,
    /// `virtual_size` is smaller than `app_size` (bss region can't be negative).
    InvalidVirtualSize,
}

impl fmt::Display for HeaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated => write!(f, "header data truncated"),
            Self::BadMagic => write!(f, "invalid application magic signature"),
            Self::InvalidOffset => write!(f, "entry or symbol-table offset out of bounds"),
            Self::InvalidVirtualSize => write!(f, "virtual_size smaller than app_size"),
        }
    }
}

#[cfg(not(test))]
impl core::error::Error for HeaderError {}
#[cfg(test)]
impl std::error::Error for HeaderError {}

/// A parsed on-flash application header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppHeader {
    /// SDK major/minor version the app was built against.
    pub sdk_version: (u8, u8),
    /// Application major/minor version.
    pub app_version: (u8, u8),
    /// Bytes of code + initialized data, starting at arena offset 0.
    pub app_size: u16,
    /// Byte offset of the entry point within the loaded image.
    pub entry_offset: u32,
    /// CRC32 of the image, as recorded by the packaging tool. Not verified
    /// by the core loader unless the caller opts in (see `verify_crc`).
    pub crc: u32,
    /// Zero-padded display name (raw bytes; see [`AppHeader::name`]).
    pub name: [u8; NAME_LEN],
    /// Zero-padded company name (raw bytes; see [`AppHeader::company`]).
    pub company: [u8; NAME_LEN],
    /// Resource id of the application's launcher icon.
    pub icon_resource_id: u32,
    /// Byte offset within the image at which the host symbol-table pointer
    /// must be written.
    pub sym_table_addr: u32,
    /// Opaque per-app flags byte; semantics are OS-specific and not
    /// interpreted by the core loader.
    pub flags: u8,
    /// Number of 32-bit relocation entries immediately following the
    /// `app_size` bytes of code.
    pub reloc_entries_count: u32,
    /// Total bytes of code + initialized data + bss.
    pub virtual_size: u32,
}

impl AppHeader {
    /// Extracts every field from `data` with no invariant checking beyond
    /// magic and length — the raw field-extraction half shared by
    /// [`AppHeader::parse`] and [`AppHeader::parse_relaxed`].
    fn extract_fields(data: &[u8]) -> Result<Self, HeaderError> {
        if data.len() < HEADER_SIZE {
            return Err(HeaderError::Truncated);
        }

        if &data[OFF_MAGIC..OFF_MAGIC + 6] != MAGIC {
            return Err(HeaderError::BadMagic);
        }

        let app_size = le_u16(data, OFF_APP_SIZE);
        let entry_offset = le_u32(data, OFF_ENTRY_OFFSET);
        let sym_table_addr = le_u32(data, OFF_SYM_TABLE_ADDR);
        let virtual_size = le_u32(data, OFF_VIRTUAL_SIZE);

        let mut name = [0u8; NAME_LEN];
        name.copy_from_slice(&data[OFF_NAME..OFF_NAME + NAME_LEN]);
        let mut company = [0u8; NAME_LEN];
        company.copy_from_slice(&data[OFF_COMPANY..OFF_COMPANY + NAME_LEN]);

        Ok(Self {
            sdk_version: (data[OFF_SDK_VERSION], data[OFF_SDK_VERSION + 1]),
            app_version: (data[OFF_APP_VERSION], data[OFF_APP_VERSION + 1]),
            app_size,
            entry_offset,
            crc: le_u32(data, OFF_CRC),
            name,
            company,
            icon_resource_id: le_u32(data, OFF_ICON_RESOURCE_ID),
            sym_table_addr,
            flags: data[OFF_FLAGS],
            reloc_entries_count: le_u32(data, OFF_RELOC_ENTRIES_COUNT),
            virtual_size,
        })
    }

    /// Parses an [`AppHeader`] from raw bytes.
    ///
    /// Validates the magic signature and the basic size/offset invariants
    /// used by the dynamic loader (§3, §4.C of the specification). Does
    /// *not* verify the CRC — see [`AppHeader::verify_crc`].
    ///
    /// Used by the loader, which requires a structurally sound header
    /// before it starts copying and relocating an image (§4.C step 1). The
    /// flash scanner uses [`AppHeader::parse_relaxed`] instead, which skips
    /// these invariant checks (§4.B).
    ///
    /// # Errors
    ///
    /// Returns [`HeaderError`] if the data is too short, the magic doesn't
    /// match, or `virtual_size`/offsets are inconsistent.
    pub fn parse(data: &[u8]) -> Result<Self, HeaderError> {
        let header = Self::extract_fields(data)?;

        if header.virtual_size < u32::from(header.app_size) {
            return Err(HeaderError::InvalidVirtualSize);
        }
        if header.entry_offset >= u32::from(header.app_size)
            || header.sym_table_addr >= u32::from(header.app_size)
        {
            return Err(HeaderError::InvalidOffset);
        }

        Ok(header)
    }

    /// Parses an [`AppHeader`] from raw bytes, checking only the magic
    /// signature and that `data` is long enough — none of
    /// [`AppHeader::parse`]'s `virtual_size`/offset invariants are
    /// enforced.
    ///
    /// Used by the flash scanner (§4.B): the specification and the
    /// original implementation both gate manifest insertion on the magic
    /// match alone ("If the first 6 bytes of the header equal the literal
    /// ASCII `PBLAPP`, a new record is inserted"), resolving the entry
    /// point and validating the rest of the header later, at load time.
    /// A slot with valid magic but a malformed `entry_offset`/
    /// `sym_table_addr`/`virtual_size` is therefore still discoverable
    /// here; the dynamic loader is where it will actually fail, with the
    /// `bad_magic`/`size_overflow` taxonomy §7 describes.
    ///
    /// # Errors
    ///
    /// Returns [`HeaderError`] if the data is too short or the magic
    /// doesn't match.
    pub fn parse_relaxed(data: &[u8]) -> Result<Self, HeaderError> {
        Self::extract_fields(data)
    }

    /// Returns `true` if the first six bytes of `data` are [`MAGIC`].
    ///
    /// Cheap pre-check the flash scanner uses before attempting a full
    /// parse (§4.B).
    pub fn probe(data: &[u8]) -> bool {
        data.len() >= 6 && &data[0..6] == MAGIC
    }

    /// Returns the zero-padded `name` field as a `&str`, trimmed at the
    /// first NUL byte.
    #[must_use]
    pub fn name(&self) -> &str {
        trim_nul(&self.name)
    }

    /// Returns the zero-padded `company` field as a `&str`, trimmed at the
    /// first NUL byte.
    #[must_use]
    pub fn company(&self) -> &str {
        trim_nul(&self.company)
    }

    /// Verifies `self.crc` against a CRC32 computed over `image`.
    ///
    /// Not called by the default loader path (the specification treats CRC
    /// checking as an optional hook, §4.B); boards that want it enable it
    /// explicitly via the scanner's `verify_crc` option.
    #[must_use]
    pub fn verify_crc(&self, image: &[u8]) -> bool {
        crc32fast::hash(image) == self.crc
    }
}

fn trim_nul(raw: &[u8]) -> &str {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    core::str::from_utf8(&raw[..end]).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    extern crate std;
    use std::vec::Vec;

    fn make_header(
        app_size: u16,
        entry_offset: u32,
        sym_table_addr: u32,
        reloc_entries_count: u32,
        virtual_size: u32,
        name: &str,
    ) -> Vec<u8> {
        let mut buf = vec![0u8; HEADER_SIZE];
        buf[OFF_MAGIC..OFF_MAGIC + 6].copy_from_slice(MAGIC);
        buf[OFF_SDK_VERSION] = 4;
        buf[OFF_SDK_VERSION + 1] = 2;
        buf[OFF_APP_VERSION] = 1;
        buf[OFF_APP_VERSION + 1] = 0;
        buf[OFF_APP_SIZE..OFF_APP_SIZE + 2].copy_from_slice(&app_size.to_le_bytes());
        buf[OFF_ENTRY_OFFSET..OFF_ENTRY_OFFSET + 4].copy_from_slice(&entry_offset.to_le_bytes());
        buf[OFF_CRC..OFF_CRC + 4].copy_from_slice(&0xDEAD_BEEFu32.to_le_bytes());
        let name_bytes = name.as_bytes();
        buf[OFF_NAME..OFF_NAME + name_bytes.len()].copy_from_slice(name_bytes);
        buf[OFF_ICON_RESOURCE_ID..OFF_ICON_RESOURCE_ID + 4].copy_from_slice(&7u32.to_le_bytes());
        buf[OFF_SYM_TABLE_ADDR..OFF_SYM_TABLE_ADDR + 4]
            .copy_from_slice(&sym_table_addr.to_le_bytes());
        buf[OFF_FLAGS] = 0;
        buf[OFF_RELOC_ENTRIES_COUNT..OFF_RELOC_ENTRIES_COUNT + 4]
            .copy_from_slice(&reloc_entries_count.to_le_bytes());
        buf[OFF_VIRTUAL_SIZE..OFF_VIRTUAL_SIZE + 4].copy_from_slice(&virtual_size.to_le_bytes());
        buf
    }

    #[test]
    fn parse_valid_header() {
        let buf = make_header(4096, 8, 100, 2, 5120, "TestApp");
        let hdr = AppHeader::parse(&buf).expect("valid header");
        assert_eq!(hdr.app_size, 4096);
        assert_eq!(hdr.entry_offset, 8);
        assert_eq!(hdr.sym_table_addr, 100);
        assert_eq!(hdr.reloc_entries_count, 2);
        assert_eq!(hdr.virtual_size, 5120);
        assert_eq!(hdr.name(), "TestApp");
        assert_eq!(hdr.sdk_version, (4, 2));
    }

    #[test]
    fn reject_bad_magic() {
        let mut buf = make_header(10, 0, 1, 0, 10, "X");
        buf[0] = b'Z';
        assert_eq!(AppHeader::parse(&buf), Err(HeaderError::BadMagic));
    }

    #[test]
    fn reject_truncated() {
        let buf = vec![0u8; HEADER_SIZE - 1];
        assert_eq!(AppHeader::parse(&buf), Err(HeaderError::Truncated));
    }

    #[test]
    fn reject_truncated_empty() {
        assert_eq!(AppHeader::parse(&[]), Err(HeaderError::Truncated));
    }

    #[test]
    fn reject_virtual_size_smaller_than_app_size() {
        let buf = make_header(4096, 8, 100, 0, 2048, "X");
        assert_eq!(
            AppHeader::parse(&buf),
            Err(HeaderError::InvalidVirtualSize)
        );
    }

    #[test]
    fn reject_entry_offset_out_of_bounds() {
        let buf = make_header(100, 200, 10, 0, 200, "X");
        assert_eq!(AppHeader::parse(&buf), Err(HeaderError::InvalidOffset));
    }

    #[test]
    fn parse_relaxed_accepts_malformed_offsets_that_strict_parse_rejects() {
        // Valid magic, but entry_offset/virtual_size fail the strict
        // invariant checks parse() enforces. Discovery time only cares
        // about the magic match (§4.B); parse_relaxed must still succeed.
        let buf = make_header(100, 200, 10, 0, 50, "BadOffsets");
        assert_eq!(AppHeader::parse(&buf), Err(HeaderError::InvalidOffset));
        let hdr = AppHeader::parse_relaxed(&buf).expect("relaxed parse ignores offset invariants");
        assert_eq!(hdr.name(), "BadOffsets");
        assert_eq!(hdr.entry_offset, 200);
    }

    #[test]
    fn parse_relaxed_still_rejects_bad_magic_and_truncation() {
        let mut buf = make_header(10, 0, 1, 0, 10, "X");
        buf[0] = b'Z';
        assert_eq!(AppHeader::parse_relaxed(&buf), Err(HeaderError::BadMagic));
        assert_eq!(
            AppHeader::parse_relaxed(&[]),
            Err(HeaderError::Truncated)
        );
    }

    #[test]
    fn reject_sym_table_addr_out_of_bounds() {
        let buf = make_header(100, 8, 200, 0, 200, "X");
        assert_eq!(AppHeader::parse(&buf), Err(HeaderError::InvalidOffset));
    }

    #[test]
    fn sym_table_addr_at_last_word_of_app_size_is_legal() {
        // Boundary behavior from the specification: sym_table_addr at the
        // last 4 bytes of app_size is legal.
        let buf = make_header(100, 0, 96, 0, 100, "X");
        let hdr = AppHeader::parse(&buf).expect("legal boundary offset");
        assert_eq!(hdr.sym_table_addr, 96);
    }

    #[test]
    fn probe_recognizes_magic_prefix() {
        let buf = make_header(10, 0, 1, 0, 10, "X");
        assert!(AppHeader::probe(&buf));
        assert!(!AppHeader::probe(b"notanapp"));
        assert!(!AppHeader::probe(b"PBLA"));
    }

    #[test]
    fn name_and_company_trim_at_nul() {
        let mut buf = make_header(10, 0, 1, 0, 10, "Short");
        let company = b"Acme Corp";
        buf[OFF_COMPANY..OFF_COMPANY + company.len()].copy_from_slice(company);
        let hdr = AppHeader::parse(&buf).unwrap();
        assert_eq!(hdr.name(), "Short");
        assert_eq!(hdr.company(), "Acme Corp");
    }

    #[test]
    fn crc_roundtrip() {
        let image = b"fake application bytes";
        let crc = crc32fast::hash(image);
        let mut buf = make_header(10, 0, 1, 0, 10, "X");
        buf[OFF_CRC..OFF_CRC + 4].copy_from_slice(&crc.to_le_bytes());
        let hdr = AppHeader::parse(&buf).unwrap();
        assert!(hdr.verify_crc(image));
        assert!(!hdr.verify_crc(b"different bytes"));
    }

    #[test]
    fn display_errors() {
        let errors = [
            HeaderError::Truncated,
            HeaderError::BadMagic,
            HeaderError::InvalidOffset,
            HeaderError::InvalidVirtualSize,
        ];
        for err in &errors {
            let msg = std::format!("{err}");
            assert!(!msg.is_empty());
        }
    }
}
