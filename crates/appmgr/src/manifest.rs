//! In-memory catalogue of known applications (§4.A).

use core::fmt;

use planck_noalloc::vec::ArrayVec;

use crate::record::{AppRecord, MAX_SLOTS};

/// Maximum number of records the manifest can hold: one per flash slot
/// plus room for the OS's built-in applications.
pub const MAX_APPS: usize = MAX_SLOTS + 3;

/// Errors reported by manifest operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestError {
    /// The manifest is already at [`MAX_APPS`] capacity.
    Full,
    /// No record's name matched the query.
    NotFound,
    /// The manifest was queried (e.g. by the supervisor at boot) while
    /// empty. The specification treats this as a programming error (§7).
    Empty,
}

impl fmt::Display for ManifestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "manifest is at capacity"),
            Self::NotFound => write!(f, "no application matches the given name"),
            Self::Empty => write!(f, "manifest is empty"),
        }
    }
}

#[cfg(not(test))]
impl core::error::Error for ManifestError {}
#[cfg(test)]
impl std::error::Error for ManifestError {}

/// An ordered, append-only catalogue of [`AppRecord`]s.
///
/// Insertion order is preserved and matters: [`Manifest::lookup`] resolves
/// ties between a name and its prefix by insertion order, as documented on
/// that method. The manifest never removes a record once inserted (§3).
#[derive(Debug)]
pub struct Manifest {
    records: ArrayVec<AppRecord, MAX_APPS>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self::new()
    }
}

impl Manifest {
    /// Creates an empty manifest.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            records: ArrayVec::new(),
        }
    }

    /// Appends a record to the manifest.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Full`] if the manifest already holds
    /// [`MAX_APPS`] records. Non-fatal when called by the flash scanner
    /// (the slot is simply skipped); the caller bootstrapping built-in
    /// apps should treat it as fatal (§7's `allocation_failed`).
    pub fn insert(&mut self, record: AppRecord) -> Result<(), ManifestError> {
        self.records.try_push(record).map_err(|_| ManifestError::Full)
    }

    /// Looks up a record by **prefix match**: a query matches a record if
    /// the record's name is a prefix of the query string (§4.A).
    ///
    /// This is an intentional contract allowing callers to pass longer
    /// identifiers. When more than one record's name is a prefix of the
    /// query, the record inserted **first** wins (§8 S5, §9) — e.g. with
    /// records `{"S", "System"}` inserted in that order, looking up
    /// `"System"` returns the `"S"` record.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::NotFound`] if no record's name is a prefix
    /// of `query`.
    pub fn lookup(&self, query: &str) -> Result<&AppRecord, ManifestError> {
        let index = self.index_of(query).ok_or(ManifestError::NotFound)?;
        Ok(&self.records.as_slice()[index])
    }

    /// Same matching rule as [`Manifest::lookup`], but returns a mutable
    /// reference so the loader can cache a freshly parsed header on the
    /// record (§3 `header` field).
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::NotFound`] if no record's name is a prefix
    /// of `query`.
    pub fn lookup_mut(&mut self, query: &str) -> Result<&mut AppRecord, ManifestError> {
        let index = self.index_of(query).ok_or(ManifestError::NotFound)?;
        Ok(&mut self.records.as_mut_slice()[index])
    }

    /// Index of the record a prefix-match lookup for `query` would return,
    /// or `None` (§4.A).
    fn index_of(&self, query: &str) -> Option<usize> {
        self.records.iter().position(|r| {
            let name = r.name();
            query.len() >= name.len() && &query[..name.len()] == name
        })
    }

    /// Index-stable accessor: records are never freed or reordered once
    /// inserted (§3), so an index captured at load time (the running-app
    /// pointer, §5) always names the same record later.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&AppRecord> {
        self.records.as_slice().get(index)
    }

    /// Returns the first-inserted record, or `None` if the manifest is
    /// empty.
    #[must_use]
    pub fn head(&self) -> Option<&AppRecord> {
        self.records.as_slice().first()
    }

    /// Index of the first-inserted record matching `query`, for callers
    /// (the supervisor) that need to publish a running-app pointer.
    #[must_use]
    pub fn index_of_lookup(&self, query: &str) -> Option<usize> {
        self.index_of(query)
    }

    /// Returns all records in insertion order.
    #[must_use]
    pub fn iter(&self) -> core::slice::Iter<'_, AppRecord> {
        self.records.iter()
    }

    /// Number of records currently known.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the manifest holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
