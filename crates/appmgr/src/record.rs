//! Application records: the manifest's unit of bookkeeping.

use core::fmt;

use appmgr_header::{AppHeader, NAME_LEN};

/// The maximum number of flash slots probed by the scanner.
pub const MAX_SLOTS: usize = 32;

/// What kind of application a record describes.
///
/// Controls button-routing policy in the event router (§4.F): only
/// non-system apps get an automatic select-button hook back to the
/// system menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppType {
    /// One of the OS's built-in applications (system menu, settings, ...).
    System,
    /// A watch face, shown on the idle screen.
    WatchFace,
    /// An ordinary user-installed application.
    User,
}

/// A function pointer compiled into the OS image, used as the entry point
/// of an internal application. Internal apps never go through the dynamic
/// loader (§4.C).
pub type InternalEntryPoint = fn();

/// Copies `s` into a zero-padded `NAME_LEN`-byte buffer, the same
/// representation the on-flash header uses for its `name` field.
///
/// Truncates silently at `NAME_LEN` bytes; built-in names are short
/// literals chosen to fit well within that bound.
const fn pad_name(s: &str) -> [u8; NAME_LEN] {
    let bytes = s.as_bytes();
    let mut buf = [0u8; NAME_LEN];
    let mut i = 0;
    while i < bytes.len() && i < NAME_LEN {
        buf[i] = bytes[i];
        i += 1;
    }
    buf
}

fn trim_nul(raw: &[u8]) -> &str {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    core::str::from_utf8(&raw[..end]).unwrap_or("")
}

/// An owned, fixed-width application name.
///
/// `Start` messages (§3) carry a name across a task queue, so it must be
/// an owned value rather than a borrow with an unclear lifetime; this uses
/// the same zero-padded representation as [`AppRecord`] and the on-flash
/// header's `name` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppName([u8; NAME_LEN]);

impl AppName {
    /// Builds an `AppName` from a string, truncating silently at
    /// [`NAME_LEN`] bytes.
    #[must_use]
    pub const fn new(s: &str) -> Self {
        Self(pad_name(s))
    }

    /// The name, trimmed at the first NUL byte.
    #[must_use]
    pub fn as_str(&self) -> &str {
        trim_nul(&self.0)
    }
}

impl fmt::Display for AppName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One known application: either a compiled-in function, or a flash slot
/// that must be loaded through the dynamic loader before it can run.
///
/// Records are created once, during discovery or built-in registration,
/// and live for the lifetime of the process (§3): the manifest never frees
/// them. The name is stored in the same zero-padded fixed-width form as
/// the on-flash header's `name` field, so discovered records need no
/// separate naming side-channel.
#[derive(Debug, Clone, Copy)]
pub struct AppRecord {
    name: [u8; NAME_LEN],
    /// Category controlling button-routing policy.
    pub app_type: AppType,
    /// Internal apps have a fixed entry point; non-internal apps must be
    /// loaded from flash by `slot_id`.
    entry: Entry,
    /// Header parsed on the most recent load, if any. Absent until the
    /// first successful load of a non-internal app.
    pub header: Option<AppHeader>,
}

#[derive(Debug, Clone, Copy)]
enum Entry {
    Internal(InternalEntryPoint),
    Slot(usize),
}

impl AppRecord {
    /// Builds a record for a compiled-in application.
    #[must_use]
    pub const fn internal(name: &str, app_type: AppType, entry_point: InternalEntryPoint) -> Self {
        Self {
            name: pad_name(name),
            app_type,
            entry: Entry::Internal(entry_point),
            header: None,
        }
    }

    /// Builds a record for an application discovered in flash slot
    /// `slot_id`, taking its name from the parsed header (§4.B). The
    /// entry point is resolved later, at load time, from the header's
    /// offset field.
    #[must_use]
    pub fn external(header: &AppHeader, app_type: AppType, slot_id: usize) -> Self {
        Self {
            name: header.name,
            app_type,
            entry: Entry::Slot(slot_id),
            header: Some(*header),
        }
    }

    /// This record's name, trimmed at the first NUL byte.
    #[must_use]
    pub fn name(&self) -> &str {
        trim_nul(&self.name)
    }

    /// This record's name as an owned, queue-safe [`AppName`].
    #[must_use]
    pub fn name_handle(&self) -> AppName {
        AppName(self.name)
    }

    /// Whether this record's entry point is a compiled-in function pointer
    /// (`true`) or must be loaded from flash (`false`).
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self.entry, Entry::Internal(_))
    }

    /// The compiled-in entry point, if this is an internal app.
    #[must_use]
    pub const fn internal_entry(&self) -> Option<InternalEntryPoint> {
        match self.entry {
            Entry::Internal(f) => Some(f),
            Entry::Slot(_) => None,
        }
    }

    /// Caches `header` on the record after a successful load, so the next
    /// load of the same app can skip re-reading it from flash (§3: "may be
    /// absent until first load").
    pub fn set_header(&mut self, header: AppHeader) {
        self.header = Some(header);
    }

    /// The flash slot id holding this app's image, if non-internal.
    ///
    /// Also used as the resource-namespace key by resource-loading
    /// proxies (§4.G); internal apps report slot 0 here, which callers
    /// must not confuse with an external app actually occupying slot 0
    /// (an open question carried over from the original design, §9).
    #[must_use]
    pub const fn slot_id(&self) -> usize {
        match self.entry {
            Entry::Internal(_) => 0,
            Entry::Slot(id) => id,
        }
    }
}
