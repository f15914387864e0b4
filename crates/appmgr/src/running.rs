//! The process-wide running-app pointer (§3, §5).
//!
//! Represented as an index into the [`Manifest`](crate::manifest::Manifest)
//! rather than a raw pointer: records are append-only and never freed or
//! moved (§3), so an index captured once stays valid for the life of the
//! process. Written only by the supervisor, read by the application task
//! and by event posters / resource proxies that have no other context
//! (§9's acknowledged global-state design).

use core::sync::atomic::{AtomicUsize, Ordering};

use crate::manifest::Manifest;
use crate::record::AppRecord;

const NONE: usize = usize::MAX;

/// The currently-running application, or nothing.
///
/// Publication uses release/acquire ordering (§5: "publication must be via
/// a release/acquire pairing or equivalent barrier"), so a reader that
/// observes a non-`NONE` index also observes every write the supervisor
/// made before publishing it (e.g. the manifest record itself, which was
/// already present before the index could be published).
#[derive(Debug)]
pub struct RunningApp {
    index: AtomicUsize,
}

impl Default for RunningApp {
    fn default() -> Self {
        Self::none()
    }
}

impl RunningApp {
    /// No application currently running.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            index: AtomicUsize::new(NONE),
        }
    }

    /// Publishes `index` as the running application. Called only by the
    /// supervisor, and only *before* the app task is spawned (§5).
    pub fn publish(&self, index: usize) {
        self.index.store(index, Ordering::Release);
    }

    /// Clears the running-app pointer (app task exited, §4.E implicit
    /// `Running --app-task exits--> Idle` transition).
    pub fn clear(&self) {
        self.index.store(NONE, Ordering::Release);
    }

    /// Resolves the running-app pointer against `manifest`, if any app is
    /// running.
    ///
    /// Returns `None` both when nothing is running and — defensively — if
    /// the published index somehow no longer resolves; the manifest never
    /// shrinks in practice, so the latter would indicate a bug rather than
    /// a reachable runtime condition.
    #[must_use]
    pub fn get<'m>(&self, manifest: &'m Manifest) -> Option<&'m AppRecord> {
        let index = self.index.load(Ordering::Acquire);
        if index == NONE {
            return None;
        }
        manifest.get(index)
    }
}
