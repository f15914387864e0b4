//! The `Platform` trait: every external collaborator named in §1 bundled
//! into one generic parameter.
//!
//! The scheduler, queue primitives, UI subsystem, tick service and host
//! symbol table are all explicitly out of scope (§1: "assumed available
//! from an RTOS-grade platform"). Rather than hardcoding a particular
//! RTOS, the manager is generic over a `Platform` implementation that
//! supplies them, the way the host OS's process loader is generic over a
//! `Chip`/`AddressSpace` rather than a single concrete MMU.

use core::fmt;

use crate::flash::Flash;
use crate::messages::{EventMsg, ThreadMsg};

/// Errors reported by [`Queue`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// The send could not complete within its timeout (§7 `queue_full`);
    /// the event is dropped, not retried.
    Full,
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "queue full: send timed out"),
        }
    }
}

#[cfg(not(test))]
impl core::error::Error for QueueError {}
#[cfg(test)]
impl std::error::Error for QueueError {}

/// A bounded message queue with RTOS-style blocking semantics (§5).
///
/// Modeled directly on the suspension points the specification names:
/// a blocking send with a tick timeout, a non-blocking send usable from
/// an interrupt handler, a blocking receive with an optional timeout, and
/// a reset used to drain stale events on an application transition.
pub trait Queue<T> {
    /// Sends `msg`, blocking the calling task up to `timeout_ticks` if the
    /// queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Full`] if the queue is still full once the
    /// timeout elapses.
    fn send(&self, msg: T, timeout_ticks: u32) -> Result<(), QueueError>;

    /// Sends `msg` from an interrupt context. Never blocks.
    ///
    /// Returns whether a higher-priority task was woken as a result,
    /// matching the RTOS primitive's own signature (§4.F `post_tick`, §8
    /// S6) so the caller can yield if required.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Full`] if the queue has no room.
    fn send_from_isr(&self, msg: T) -> Result<bool, QueueError>;

    /// Blocks the calling task waiting for a message, up to `timeout_ticks`
    /// ticks. `None` blocks indefinitely (used by the supervisor's thread
    /// queue receive, §4.E).
    ///
    /// Returns `None` if the timeout elapsed with nothing received.
    fn receive(&self, timeout_ticks: Option<u32>) -> Option<T>;

    /// Drains any queued messages without delivering them, used on
    /// application transitions to discard stale events (§4.E, §8 reset
    /// semantics law).
    fn reset(&self);
}

/// Scheduling priority of the two long-lived application-subsystem tasks
/// (§5): the application task runs higher than the supervisor so it
/// preempts it while running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    /// `IDLE+5`.
    Supervisor,
    /// `IDLE+6`.
    Application,
}

/// Parameters needed to spawn the application task after a successful
/// load (§4.C step 7).
#[derive(Debug, Clone, Copy)]
pub struct TaskSpawnSpec {
    /// Absolute address of the first instruction to execute.
    pub entry_point: usize,
    /// Absolute address of the top of the application's stack region.
    pub stack_top: usize,
    /// Stack size in 32-bit words.
    pub stack_words: usize,
}

/// Bundles every collaborator the application manager needs but does not
/// implement itself (§1).
pub trait Platform: Sized {
    /// Block-read access to non-volatile storage holding application
    /// images.
    type Flash: Flash;
    /// Queue carrying `Start` requests to the supervisor. Capacity 1.
    type ThreadQueue: Queue<ThreadMsg>;
    /// Queue carrying `Button` / `Tick` / `Quit` events to the running
    /// application. Capacity 5.
    type EventQueue: Queue<EventMsg>;

    /// Application stack size, in 32-bit words (`MAX_APP_STACK_SIZE`, §6).
    const MAX_APP_STACK_SIZE_WORDS: usize;
    /// Total bytes of the shared application arena (`ARENA_SIZE`, §6).
    const ARENA_SIZE: usize;

    /// The absolute address of the shared application arena.
    fn arena_base(&self) -> usize;

    /// Mutable access to the shared application arena's bytes.
    fn arena_mut(&mut self) -> &mut [u8];

    /// Returns the flash driver and the arena buffer as two disjoint
    /// borrows of the same implementor.
    ///
    /// The loader's image copy (§4.C step 2) needs to read from flash
    /// directly into the arena; since both live behind `&mut self` a plain
    /// `flash()`/`arena_mut()` pair can't be held at once. Implementors
    /// split their own fields to satisfy this, the same way the host OS's
    /// `AddressSpace<M>` splits mapper and tracked-region state.
    fn flash_and_arena_mut(&mut self) -> (&Self::Flash, &mut [u8]);

    /// The host's symbol-table base address, written into loaded images
    /// at `header.sym_table_addr` (§4.C step 5).
    fn host_symbol_table_base(&self) -> u32;

    /// Hands the computed heap region off to the platform's allocator.
    ///
    /// The allocator itself is out of scope (§1: "assumed available from
    /// an RTOS-grade platform"); the manager only computes where the heap
    /// lives (§4.D) and tells the platform to start using it.
    fn init_app_heap(&mut self, heap_base: usize, heap_size: usize);

    /// Spawns the application task at the given priority, to begin
    /// executing at `spec.entry_point`.
    ///
    /// Per §5, the running-app pointer must already have been updated by
    /// the caller (the supervisor) before this is invoked, so the new
    /// task can observe its own record immediately.
    fn spawn_app_task(&mut self, spec: TaskSpawnSpec, priority: Priority);

    /// Forcibly terminates the current application task.
    ///
    /// A known limitation (§4.E, §9): this does not run the app's
    /// finalizers, so resources it holds outside the arena leak until
    /// restart. A future redesign should deliver `Quit` and wait for
    /// voluntary exit with a bounded deadline before escalating to this.
    fn terminate_app_task(&mut self);

    /// Installs the default UI click configuration (§4.F step 1).
    fn install_default_click_config(&mut self);

    /// Subscribes a select-button handler that triggers `Start("System")`
    /// (§4.F step 2). Only called for non-system apps.
    fn subscribe_select_button_to_system_menu(&mut self);

    /// Marks the top window dirty to force an initial repaint (§4.F
    /// step 3).
    fn mark_top_window_dirty(&mut self);

    /// Unsubscribes all button handlers (§4.F, on `Quit`).
    fn unsubscribe_all_buttons(&mut self);

    /// Unsubscribes the tick service (§4.F, on `Quit`).
    fn unsubscribe_tick_service(&mut self);

    /// Returns the thread (start-request) queue.
    fn thread_queue(&self) -> &Self::ThreadQueue;

    /// Returns the event queue.
    fn event_queue(&self) -> &Self::EventQueue;

    /// Returns the flash driver.
    fn flash(&self) -> &Self::Flash;
}
