//! Wire-format parser for on-flash watch application headers.
//!
//! Parses the fixed-layout header that precedes every application image in
//! flash, using safe field extraction (`from_le_bytes`). No unsafe code, no
//! allocations.
//!
//! ```
//! use appmgr_header::{AppHeader, MAGIC};
//!
//! let mut buf = vec![0u8; appmgr_header::HEADER_SIZE];
//! buf[0..6].copy_from_slice(MAGIC);
//! assert!(AppHeader::probe(&buf));
//! // A header with a bare magic and all-zero fields is otherwise invalid
//! // (app_size of 0 makes every offset out of bounds); full construction
//! // is exercised in this crate's unit tests.
//! assert!(AppHeader::parse(&buf).is_err());
//! ```

#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]

pub mod header;

pub use header::{AppHeader, HeaderError, HEADER_SIZE, MAGIC, NAME_LEN};
