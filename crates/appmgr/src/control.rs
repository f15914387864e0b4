//! Public control surface (§4.G): the functions other OS subsystems call
//! to start, quit, and enumerate applications.

use crate::manifest::{Manifest, ManifestError};
use crate::messages::{EventMsg, ThreadMsg};
use crate::platform::{Platform, Queue};
use crate::record::{AppName, AppRecord};
use crate::router;
use crate::running::RunningApp;
use crate::{kerr, kwarn};

/// Timeout, in ticks, for the `Start` request enqueued by [`start`] (§5:
/// "additional starts block the caller up to 100 ticks and then fail
/// silently").
pub const START_TIMEOUT_TICKS: u32 = 100;

/// Requests that `name` be started.
///
/// Enqueues a `Quit` on the event queue (draining the current app's
/// mainloop) and a `Start(name)` on the thread queue (unblocking the
/// supervisor). Both sends are best-effort: a full queue is logged and
/// the request is dropped rather than retried (§7 `queue_full`).
pub fn start<P: Platform>(platform: &P, name: &str) {
    if router::quit(platform).is_err() {
        kwarn!("start({name}): event queue full, prior app's Quit was not delivered");
    }

    let msg = ThreadMsg::start(AppName::new(name));
    if platform
        .thread_queue()
        .send(msg, START_TIMEOUT_TICKS)
        .is_err()
    {
        kerr!("start({name}): thread queue still full after {START_TIMEOUT_TICKS} ticks, request dropped");
    }
}

/// Requests that the running application quit.
///
/// Thin delegation to [`router::quit`] — the same `Quit` send `start`
/// performs, exposed standalone for callers that don't want to start a
/// replacement application (§4.F, §4.G).
pub fn quit<P: Platform>(platform: &P) {
    if router::quit(platform).is_err() {
        kwarn!("quit(): event queue full, Quit not delivered");
    }
}

/// Looks up a known application by name (§4.A's prefix-match rule).
///
/// # Errors
///
/// Returns [`ManifestError::NotFound`] if no record matches.
pub fn get<'m>(manifest: &'m Manifest, name: &str) -> Result<&'m AppRecord, ManifestError> {
    manifest.lookup(name)
}

/// Returns the first-registered application, or `None` if the manifest is
/// empty.
#[must_use]
pub fn head(manifest: &Manifest) -> Option<&AppRecord> {
    manifest.head()
}

/// The flash slot id of the currently running application, used by
/// resource-loading proxies to namespace lookups (§4.G).
///
/// Internal apps report slot 0, same as [`AppRecord::slot_id`] — which may
/// collide with an external app actually occupying slot 0. This is an
/// acknowledged ambiguity carried over unchanged from the original design
/// (§9's open question), not resolved by this crate.
///
/// Returns 0 if no application is currently running.
#[must_use]
pub fn current_slot_id(manifest: &Manifest, running: &RunningApp) -> usize {
    running.get(manifest).map_or(0, AppRecord::slot_id)
}
