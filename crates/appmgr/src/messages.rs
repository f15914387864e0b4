//! The three message kinds that traverse the manager's internal queues (§3).

use crate::record::AppName;

/// A request to start a named application. Carried on the **thread queue**
/// (capacity 1); the supervisor blocks on this queue indefinitely (§4.E).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadMsg {
    /// Name of the application to start, resolved against the manifest
    /// with the prefix-match rule of §4.A.
    pub name: AppName,
}

impl ThreadMsg {
    /// Builds a `Start` request for `name`.
    #[must_use]
    pub const fn start(name: AppName) -> Self {
        Self { name }
    }
}

/// Units a [`EventMsg::Tick`] callback's `time` is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickUnit {
    /// Whole seconds elapsed.
    Second,
    /// Whole minutes elapsed.
    Minute,
    /// Whole hours elapsed.
    Hour,
    /// Whole days elapsed.
    Day,
}

/// An opaque button-click callback, invoked with the recognizer and
/// context that were registered alongside it.
pub type ButtonCallback = fn(recognizer: u32, context: usize);

/// An opaque tick callback, invoked with the current time and the unit it
/// is expressed in.
pub type TickCallback = fn(time: i64, units: TickUnit);

/// One event delivered to the running application's mainloop (§4.F).
/// Carried on the **event queue** (capacity 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventMsg {
    /// A button was pressed; `recognizer` and `context` are opaque values
    /// supplied by whoever registered `callback` with the UI subsystem.
    Button {
        /// Callback to invoke.
        callback: ButtonCallback,
        /// Click-recognizer identifier, passed through unmodified.
        recognizer: u32,
        /// Caller-supplied context, passed through unmodified.
        context: usize,
    },
    /// A timekeeping tick fired; may be posted from an interrupt context
    /// (§4.F `post_tick`).
    Tick {
        /// Callback to invoke.
        callback: TickCallback,
        /// Current time, in units of `units`.
        time: i64,
        /// Unit `time` is expressed in.
        units: TickUnit,
    },
    /// Request to terminate the running application's mainloop.
    Quit,
}
