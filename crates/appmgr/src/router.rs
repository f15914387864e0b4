//! The event router: the application's mainloop (§4.F).
//!
//! [`run_event_loop`] runs *inside the application task* once it has
//! initialized its UI; everything else in this module is a non-blocking
//! poster other tasks (and interrupt handlers) use to feed it.

use crate::manifest::Manifest;
use crate::messages::EventMsg;
use crate::platform::{Platform, Queue, QueueError};
use crate::record::AppType;
use crate::running::RunningApp;
use crate::{kdebug, kwarn};

/// Timeout, in ticks, for an ordinary (non-ISR) event post (§4.F
/// `post_button`).
pub const POST_TIMEOUT_TICKS: u32 = 10;

/// Timeout, in ticks, for [`quit`] (§4.F `quit()`).
pub const QUIT_TIMEOUT_TICKS: u32 = 10;

/// Blocking timeout on the event queue receive, expressed in the same
/// tick units as every other timeout in this crate (§4.F: "blocking up to
/// 1000 ms"). No action is currently required on timeout; it exists so a
/// future platform can hook periodic work into the idle path.
pub const EVENT_LOOP_TIMEOUT_TICKS: u32 = 1000;

/// Posts a button event to the running application. Ordinary send, 10-tick
/// timeout (§4.F).
///
/// # Errors
///
/// Returns [`QueueError::Full`] if the queue is still full once the
/// timeout elapses (§7 `queue_full`: treated as event loss, no retry).
pub fn post_button<P: Platform>(platform: &P, msg: EventMsg) -> Result<(), QueueError> {
    platform.event_queue().send(msg, POST_TIMEOUT_TICKS)
}

/// Posts a tick event from an interrupt context. Never blocks.
///
/// Returns whether a higher-priority task was woken, so the caller (the
/// ISR trampoline) can yield if required (§4.F, §8 S6).
///
/// # Errors
///
/// Returns [`QueueError::Full`] if the queue has no room.
pub fn post_tick_from_isr<P: Platform>(platform: &P, msg: EventMsg) -> Result<bool, QueueError> {
    platform.event_queue().send_from_isr(msg)
}

/// Sends `Quit` to the running application's mainloop. 10-tick timeout
/// (§4.F).
///
/// # Errors
///
/// Returns [`QueueError::Full`] if the event queue is still full once the
/// timeout elapses.
pub fn quit<P: Platform>(platform: &P) -> Result<(), QueueError> {
    platform.event_queue().send(EventMsg::Quit, QUIT_TIMEOUT_TICKS)
}

/// Runs the application's event mainloop to completion (§4.F).
///
/// Must be called from inside the application task, after it has
/// initialized its own UI. Blocks the calling task until a `Quit` message
/// is received, at which point button handlers and the tick service are
/// unsubscribed and this function returns (the task then terminates).
pub fn run_event_loop<P: Platform>(platform: &mut P, manifest: &Manifest, running: &RunningApp) {
    platform.install_default_click_config();

    let app_type = running.get(manifest).map(|r| r.app_type);
    match app_type {
        Some(AppType::System) => {}
        Some(other) => {
            platform.subscribe_select_button_to_system_menu();
            if matches!(other, AppType::WatchFace) {
                // Supplemented behavior (back-button long-click, see
                // crate docs): the original leaves this a logged no-op
                // for watch faces rather than terminating them.
                kdebug!("run_event_loop: back_long_click on watch face is a no-op (TODO: Quiet time)");
            }
        }
        None => kwarn!("run_event_loop: no running app published; button routing may be wrong"),
    }

    platform.mark_top_window_dirty();

    loop {
        match platform.event_queue().receive(Some(EVENT_LOOP_TIMEOUT_TICKS)) {
            Some(EventMsg::Button {
                callback,
                recognizer,
                context,
            }) => callback(recognizer, context),
            Some(EventMsg::Tick {
                callback,
                time,
                units,
            }) => callback(time, units),
            Some(EventMsg::Quit) => {
                platform.unsubscribe_all_buttons();
                platform.unsubscribe_tick_service();
                break;
            }
            None => {
                // Receive timed out; nothing to do yet (§4.F).
            }
        }
    }
}
