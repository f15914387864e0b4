//! The supervisor task: owns the load-and-spawn state machine (§4.E).
//!
//! Modeled as a plain function generic over [`Platform`] rather than an OS
//! task — the scheduler that would run it on its own stack at `IDLE+5` is
//! explicitly out of scope (§1). `appmgr-sim` drives [`supervisor_step`] and
//! [`crate::router::run_event_loop`] end-to-end through [`crate::AppManager`];
//! `run_event_loop` is the one driven on a real `std::thread`, since it
//! blocks for the lifetime of an application.

use crate::loader::{self, LoadedImage, LoaderError};
use crate::manifest::Manifest;
use crate::platform::{Platform, Priority, Queue};
use crate::record::AppName;
use crate::running::RunningApp;
use crate::{kerr, kinfo};

/// Blocks on the thread queue and, once a `Start` request arrives, runs
/// one full load-and-spawn cycle (§4.E).
///
/// The supervisor's own suspension point: `thread_queue.receive(forever)`
/// (§5). Intended to be called in a loop for the lifetime of the process;
/// split out as a single step so tests can drive it deterministically.
pub fn supervisor_step<P: Platform>(platform: &mut P, manifest: &mut Manifest, running: &RunningApp) {
    let Some(msg) = platform.thread_queue().receive(None) else {
        return;
    };
    handle_start(platform, manifest, running, msg.name);
}

fn handle_start<P: Platform>(
    platform: &mut P,
    manifest: &mut Manifest,
    running: &RunningApp,
    name: AppName,
) {
    let query_owned = name;
    let query = query_owned.as_str();

    let Some(index) = manifest.index_of_lookup(query) else {
        kerr!("start({query}): not_found");
        return;
    };

    // Running --Start(name)--> forcibly terminate the current app task
    // before proceeding, per §4.E. A no-op from Idle (nothing running).
    if running.get(manifest).is_some() {
        platform.terminate_app_task();
    }

    // §4.E: "drain event queue"; §5's reset-semantics law depends on this
    // happening before the new app can observe any event.
    platform.event_queue().reset();

    // §5: the running-app pointer must be updated *before* the app task
    // is spawned, so the new task can observe its own record immediately.
    running.publish(index);

    // AppRecord is Copy: take an owned snapshot so the borrow of
    // `manifest` ends here, freeing it for the `lookup_mut` header-cache
    // write below.
    let record = *manifest
        .get(index)
        .expect("index_of_lookup returned a valid index");

    let load_result: Result<LoadedImage, LoaderError> = if record.is_internal() {
        let entry = record
            .internal_entry()
            .expect("internal record always has an entry point");
        loader::load_internal(platform, entry)
    } else {
        match loader::load_external(platform, record.slot_id()) {
            Ok((header, loaded)) => {
                if let Ok(r) = manifest.lookup_mut(query) {
                    r.set_header(header);
                }
                Ok(loaded)
            }
            Err(e) => Err(e),
        }
    };

    match load_result {
        Ok(loaded) => {
            kinfo!("start({query}): spawning at {:#x}", loaded.spawn.entry_point);
            platform.spawn_app_task(loaded.spawn, Priority::Application);
        }
        Err(e) => {
            // §4.C: "load is abandoned and supervisor returns to Idle."
            kerr!("start({query}): load failed ({e}), returning to Idle");
            running.clear();
        }
    }
}

/// Asserts the manifest holds at least one application.
///
/// Called once at boot, before the supervisor ever blocks on the thread
/// queue. §7 treats an empty manifest at startup as a programming error:
/// "aborts with assertion," not a recoverable `Result`.
///
/// # Panics
///
/// Panics if `manifest` is empty.
pub fn assert_bootstrapped(manifest: &Manifest) {
    assert!(!manifest.is_empty(), "empty_manifest: no applications registered at boot");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flash::{Flash, FlashError};
    use crate::messages::{EventMsg, ThreadMsg};
    use crate::platform::{QueueError, TaskSpawnSpec};
    use crate::record::{AppRecord, AppType};
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::vec::Vec;

    struct VecQueue<T> {
        items: RefCell<VecDeque<T>>,
    }
    impl<T> VecQueue<T> {
        fn new() -> Self {
            Self { items: RefCell::new(VecDeque::new()) }
        }
    }
    impl<T> Queue<T> for VecQueue<T> {
        fn send(&self, msg: T, _timeout_ticks: u32) -> Result<(), QueueError> {
            self.items.borrow_mut().push_back(msg);
            Ok(())
        }
        fn send_from_isr(&self, msg: T) -> Result<bool, QueueError> {
            self.send(msg, 0).map(|()| false)
        }
        fn receive(&self, _timeout_ticks: Option<u32>) -> Option<T> {
            self.items.borrow_mut().pop_front()
        }
        fn reset(&self) {
            self.items.borrow_mut().clear();
        }
    }

    struct FakeFlash {
        slots: Vec<Vec<u8>>,
    }
    impl Flash for FakeFlash {
        fn read(&self, slot: usize, offset: usize, buf: &mut [u8]) -> Result<(), FlashError> {
            let data = self.slots.get(slot).ok_or(FlashError::InvalidSlot)?;
            if offset + buf.len() > data.len() {
                return Err(FlashError::IoError);
            }
            buf.copy_from_slice(&data[offset..offset + buf.len()]);
            Ok(())
        }
    }

    struct TestPlatform {
        flash: FakeFlash,
        arena: Vec<u8>,
        thread_queue: VecQueue<ThreadMsg>,
        event_queue: VecQueue<EventMsg>,
        spawned: RefCell<Vec<(TaskSpawnSpec, Priority)>>,
        terminate_calls: RefCell<u32>,
        heap: RefCell<Option<(usize, usize)>>,
    }

    impl TestPlatform {
        fn new(slots: Vec<Vec<u8>>) -> Self {
            Self {
                flash: FakeFlash { slots },
                arena: vec![0u8; 65536],
                thread_queue: VecQueue::new(),
                event_queue: VecQueue::new(),
                spawned: RefCell::new(Vec::new()),
                terminate_calls: RefCell::new(0),
                heap: RefCell::new(None),
            }
        }
    }

    impl Platform for TestPlatform {
        type Flash = FakeFlash;
        type ThreadQueue = VecQueue<ThreadMsg>;
        type EventQueue = VecQueue<EventMsg>;

        const MAX_APP_STACK_SIZE_WORDS: usize = 512;
        const ARENA_SIZE: usize = 65536;

        fn arena_base(&self) -> usize {
            0x2000
        }
        fn arena_mut(&mut self) -> &mut [u8] {
            &mut self.arena
        }
        fn flash_and_arena_mut(&mut self) -> (&Self::Flash, &mut [u8]) {
            (&self.flash, &mut self.arena)
        }
        fn host_symbol_table_base(&self) -> u32 {
            0x9999
        }
        fn init_app_heap(&mut self, heap_base: usize, heap_size: usize) {
            *self.heap.borrow_mut() = Some((heap_base, heap_size));
        }
        fn spawn_app_task(&mut self, spec: TaskSpawnSpec, priority: Priority) {
            self.spawned.borrow_mut().push((spec, priority));
        }
        fn terminate_app_task(&mut self) {
            *self.terminate_calls.borrow_mut() += 1;
        }
        fn install_default_click_config(&mut self) {}
        fn subscribe_select_button_to_system_menu(&mut self) {}
        fn mark_top_window_dirty(&mut self) {}
        fn unsubscribe_all_buttons(&mut self) {}
        fn unsubscribe_tick_service(&mut self) {}
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

    fn noop() {}

    #[test]
    fn s2_start_an_internal_app() {
        let mut platform = TestPlatform::new(vec![]);
        let mut manifest = Manifest::new();
        manifest.insert(AppRecord::internal("System", AppType::System, noop)).unwrap();
        let running = RunningApp::none();

        platform.thread_queue.items.borrow_mut().push_back(ThreadMsg::start(AppName::new("System")));
        supervisor_step(&mut platform, &mut manifest, &running);

        assert_eq!(platform.spawned.borrow().len(), 1);
        assert_eq!(platform.spawned.borrow()[0].1, Priority::Application);
        assert_eq!(running.get(&manifest).unwrap().name(), "System");
        let (heap_base, heap_size) = platform.heap.borrow().unwrap();
        assert_eq!(heap_base, platform.arena_base());
        assert_eq!(heap_size, 65536 - TestPlatform::MAX_APP_STACK_SIZE_WORDS * 4);
    }

    #[test]
    fn s3_start_loads_external_app_and_caches_header() {
        let mut image = vec![0u8; appmgr_header::HEADER_SIZE];
        image[0..6].copy_from_slice(appmgr_header::MAGIC);
        image[12..14].copy_from_slice(&64u16.to_le_bytes());
        image[14..18].copy_from_slice(&8u32.to_le_bytes());
        image[22..22 + 7].copy_from_slice(b"TestApp");
        image[90..94].copy_from_slice(&4u32.to_le_bytes());
        image[96..100].copy_from_slice(&0u32.to_le_bytes());
        image[100..104].copy_from_slice(&80u32.to_le_bytes());
        image.extend(vec![0u8; 64]);

        let mut platform = TestPlatform::new(vec![image]);
        let mut manifest = Manifest::new();
        let mut header_buf = [0u8; appmgr_header::HEADER_SIZE];
        header_buf[0..6].copy_from_slice(appmgr_header::MAGIC);
        header_buf[12..14].copy_from_slice(&64u16.to_le_bytes());
        header_buf[100..104].copy_from_slice(&80u32.to_le_bytes());
        header_buf[22..22 + 7].copy_from_slice(b"TestApp");
        let header = appmgr_header::AppHeader::parse(&header_buf).unwrap();
        manifest.insert(AppRecord::external(&header, AppType::WatchFace, 0)).unwrap();
        let running = RunningApp::none();

        platform.thread_queue.items.borrow_mut().push_back(ThreadMsg::start(AppName::new("TestApp")));
        supervisor_step(&mut platform, &mut manifest, &running);

        assert_eq!(platform.spawned.borrow().len(), 1);
        assert_eq!(platform.spawned.borrow()[0].0.entry_point, platform.arena_base() + 8);
        assert!(manifest.lookup("TestApp").unwrap().header.is_some());
    }

    #[test]
    fn s4_running_to_start_terminates_prior_app_and_drains_events() {
        let mut platform = TestPlatform::new(vec![]);
        let mut manifest = Manifest::new();
        manifest.insert(AppRecord::internal("A", AppType::User, noop)).unwrap();
        manifest.insert(AppRecord::internal("B", AppType::User, noop)).unwrap();
        let running = RunningApp::none();
        running.publish(0);

        // Stale events from app A should be drained by the transition.
        platform.event_queue.items.borrow_mut().push_back(EventMsg::Quit);

        platform.thread_queue.items.borrow_mut().push_back(ThreadMsg::start(AppName::new("B")));
        supervisor_step(&mut platform, &mut manifest, &running);

        assert_eq!(*platform.terminate_calls.borrow(), 1);
        assert!(platform.event_queue.items.borrow().is_empty());
        assert_eq!(running.get(&manifest).unwrap().name(), "B");
    }

    #[test]
    fn start_of_unknown_app_logs_and_stays_idle() {
        let mut platform = TestPlatform::new(vec![]);
        let mut manifest = Manifest::new();
        manifest.insert(AppRecord::internal("System", AppType::System, noop)).unwrap();
        let running = RunningApp::none();

        platform.thread_queue.items.borrow_mut().push_back(ThreadMsg::start(AppName::new("Ghost")));
        supervisor_step(&mut platform, &mut manifest, &running);

        assert!(platform.spawned.borrow().is_empty());
        assert!(running.get(&manifest).is_none());
    }

    #[test]
    fn load_failure_returns_to_idle() {
        // virtual_size smaller than the arena minus stack is fine, but a
        // header whose virtual_size leaves no heap should abandon the load.
        let mut header_buf = [0u8; appmgr_header::HEADER_SIZE];
        header_buf[0..6].copy_from_slice(appmgr_header::MAGIC);
        header_buf[12..14].copy_from_slice(&4u16.to_le_bytes());
        header_buf[100..104].copy_from_slice(&65536u32.to_le_bytes());
        header_buf[22..22 + 1].copy_from_slice(b"X");
        let header = appmgr_header::AppHeader::parse(&header_buf).unwrap();

        let mut manifest = Manifest::new();
        manifest.insert(AppRecord::external(&header, AppType::WatchFace, 0)).unwrap();
        let mut image = header_buf.to_vec();
        image.extend(vec![0u8; 65536]);
        let mut platform = TestPlatform::new(vec![image]);
        let running = RunningApp::none();

        platform.thread_queue.items.borrow_mut().push_back(ThreadMsg::start(AppName::new("X")));
        supervisor_step(&mut platform, &mut manifest, &running);

        assert!(platform.spawned.borrow().is_empty());
        assert!(running.get(&manifest).is_none(), "failed load must return to Idle");
    }

    #[test]
    #[should_panic(expected = "empty_manifest")]
    fn assert_bootstrapped_panics_on_empty_manifest() {
        let manifest = Manifest::new();
        assert_bootstrapped(&manifest);
    }
}
