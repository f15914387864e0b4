//! A `std`-backed reference [`Platform`](appmgr::Platform) implementation.
//!
//! Exists purely so [`appmgr`]'s core logic can be driven end-to-end without
//! real hardware, the same role `hadron-test`/`hadron-ktest` play for the
//! kernel. Not meant for embedded consumers: the queue primitive is a
//! `Mutex`+`Condvar`-backed bounded queue rather than an RTOS one, and flash
//! is an in-memory byte buffer rather than a block device.

mod flash;
mod queue;

pub use flash::{build_app_slot, SimFlash};
pub use queue::SimQueue;

use std::sync::Arc;

use appmgr::{Platform, Priority, TaskSpawnSpec};

/// Simulated arena base address. Arbitrary; chosen to look like a real
/// embedded RAM region rather than 0, so relocation bugs that assume a
/// zero base surface in tests.
pub const ARENA_BASE: usize = 0x2000_0000;

/// Total arena size used by every test scenario: generous enough that
/// `S3`'s 5120-byte image and a 512-word stack both fit comfortably.
pub const ARENA_SIZE: usize = 64 * 1024;

/// Application stack size used by every test scenario, in 32-bit words.
pub const STACK_WORDS: usize = 512;

/// One (spawn spec, priority) pair recorded by [`SimPlatform::spawn_app_task`].
#[derive(Debug, Clone, Copy)]
pub struct SpawnCall {
    /// Parameters the supervisor passed to spawn the app task.
    pub spec: TaskSpawnSpec,
    /// Priority the app task was spawned at.
    pub priority: Priority,
}

/// Observable side effects of UI-subsystem hooks, for test assertions.
#[derive(Debug, Default)]
pub struct UiCounters {
    /// Number of times the default click configuration was installed.
    pub click_installs: u32,
    /// Whether the select-button system-menu hook is currently active.
    pub select_hooked: bool,
    /// Number of times the top window was marked dirty.
    pub dirty_marks: u32,
    /// Whether `unsubscribe_all_buttons` has been called since the last
    /// click-config install.
    pub unsubscribed_buttons: bool,
    /// Whether `unsubscribe_tick_service` has been called since the last
    /// click-config install.
    pub unsubscribed_tick: bool,
}

/// A `std`-backed [`Platform`]: in-memory flash, a real bounded queue pair,
/// and plain fields standing in for the UI subsystem, tick service, and
/// RTOS scheduler primitives the specification treats as out of scope
/// (§1). Every mutating method takes `&mut self`, so plain fields suffice;
/// tests inspect them afterward through [`appmgr::AppManager::platform`].
pub struct SimPlatform {
    flash: SimFlash,
    arena: Vec<u8>,
    host_symbol_table_base: u32,
    thread_queue: Arc<SimQueue<appmgr::ThreadMsg>>,
    event_queue: Arc<SimQueue<appmgr::EventMsg>>,
    /// Every call the supervisor has made to spawn an app task, in order.
    pub spawned: Vec<SpawnCall>,
    /// Number of times the current app task has been forcibly terminated.
    pub terminate_calls: u32,
    /// Heap region handed off by the most recent load, if any.
    pub heap: Option<(usize, usize)>,
    /// UI-subsystem hook counters.
    pub ui: UiCounters,
}

impl SimPlatform {
    /// Builds a platform with the given flash contents and an empty arena.
    #[must_use]
    pub fn new(flash: SimFlash) -> Self {
        Self {
            flash,
            arena: vec![0u8; ARENA_SIZE],
            host_symbol_table_base: 0xC0FF_EE00,
            thread_queue: Arc::new(SimQueue::new(1)),
            event_queue: Arc::new(SimQueue::new(5)),
            spawned: Vec::new(),
            terminate_calls: 0,
            heap: None,
            ui: UiCounters::default(),
        }
    }

    /// A cloned handle to the thread queue. Since [`appmgr::AppManager`]'s
    /// driving methods (`supervisor_step`, `run_event_loop`) take `&mut
    /// self`, a test that wants to move the manager onto a worker thread
    /// and still post requests from the test thread needs to grab this
    /// *before* the move — the same way a real board's button-ISR
    /// trampoline holds a queue handle independent of whatever owns the
    /// `Platform` itself.
    #[must_use]
    pub fn thread_queue_handle(&self) -> Arc<SimQueue<appmgr::ThreadMsg>> {
        Arc::clone(&self.thread_queue)
    }

    /// A cloned handle to the event queue. See [`SimPlatform::thread_queue_handle`].
    #[must_use]
    pub fn event_queue_handle(&self) -> Arc<SimQueue<appmgr::EventMsg>> {
        Arc::clone(&self.event_queue)
    }

    /// Read-only access to the arena, for tests that want to inspect bytes
    /// a load wrote (bss zeroing, relocated GOT entries, the installed
    /// symbol-table pointer).
    #[must_use]
    pub fn arena(&self) -> &[u8] {
        &self.arena
    }
}

impl Platform for SimPlatform {
    type Flash = SimFlash;
    type ThreadQueue = SimQueue<appmgr::ThreadMsg>;
    type EventQueue = SimQueue<appmgr::EventMsg>;

    const MAX_APP_STACK_SIZE_WORDS: usize = STACK_WORDS;
    const ARENA_SIZE: usize = crate::ARENA_SIZE;

    fn arena_base(&self) -> usize {
        ARENA_BASE
    }

    fn arena_mut(&mut self) -> &mut [u8] {
        &mut self.arena
    }

    fn flash_and_arena_mut(&mut self) -> (&Self::Flash, &mut [u8]) {
        (&self.flash, &mut self.arena)
    }

    fn host_symbol_table_base(&self) -> u32 {
        self.host_symbol_table_base
    }

    fn init_app_heap(&mut self, heap_base: usize, heap_size: usize) {
        self.heap = Some((heap_base, heap_size));
    }

    fn spawn_app_task(&mut self, spec: TaskSpawnSpec, priority: Priority) {
        self.spawned.push(SpawnCall { spec, priority });
    }

    fn terminate_app_task(&mut self) {
        self.terminate_calls += 1;
    }

    fn install_default_click_config(&mut self) {
        self.ui.click_installs += 1;
        self.ui.unsubscribed_buttons = false;
        self.ui.unsubscribed_tick = false;
    }

    fn subscribe_select_button_to_system_menu(&mut self) {
        self.ui.select_hooked = true;
    }

    fn mark_top_window_dirty(&mut self) {
        self.ui.dirty_marks += 1;
    }

    fn unsubscribe_all_buttons(&mut self) {
        self.ui.unsubscribed_buttons = true;
    }

    fn unsubscribe_tick_service(&mut self) {
        self.ui.unsubscribed_tick = true;
    }

    fn thread_queue(&self) -> &Self::ThreadQueue {
        &self.thread_queue
    }

    fn event_queue(&self) -> &Self::EventQueue {
        &self.event_queue
    }

    fn flash(&self) -> &Self::Flash {
        &self.flash
    }
}
