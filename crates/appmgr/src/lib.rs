//! Application manager for a watch-style embedded OS.
//!
//! Discovers installable applications in flash, dynamically loads
//! position-independent application images into a single shared RAM
//! arena, performs the relocation fix-ups that make those images
//! executable, and routes UI events to whichever application is currently
//! running. See the crate's specification for the full data model and
//! component design; this crate implements components A-G:
//!
//! - [`manifest`] — the in-memory application catalogue (A).
//! - [`flash`] — slot discovery and header reads (B).
//! - [`loader`] — the dynamic loader: copy, relocate, zero bss (C).
//! - [`arena`] — pure arena-layout arithmetic (D).
//! - [`supervisor`] — the load-and-spawn state machine (E).
//! - [`router`] — the application's event mainloop (F).
//! - [`control`] — the public start/quit/get/head surface (G).
//!
//! [`AppManager`] ties these together behind a single facade generic over
//! a [`Platform`] implementation, which stands in for every out-of-scope
//! collaborator (the UI subsystem, the tick service, the NVS driver, the
//! host symbol table, the RTOS scheduler and queue primitives).
//!
//! No code-signing, no multi-application concurrency, no virtual memory,
//! no demand paging, no inter-application IPC, and no persistence of
//! application state across restart — at most one application is ever
//! loaded at a time.

#![cfg_attr(not(test), no_std)]

/// Arena partitioning (§4.D).
pub mod arena;
/// Public control surface (§4.G).
pub mod control;
/// Flash access and application discovery (§4.B).
pub mod flash;
/// The dynamic loader (§4.C).
pub mod loader;
/// Logging facility.
pub mod log;
/// In-memory application catalogue (§4.A).
pub mod manifest;
/// Message kinds carried on the thread and event queues (§3).
pub mod messages;
/// The `Platform` trait bundling every out-of-scope collaborator (§1).
pub mod platform;
/// Application records.
pub mod record;
/// GOT relocation (§4.C step 3).
pub mod reloc;
/// The process-wide running-app pointer (§3, §5).
pub mod running;
/// The event router / application mainloop (§4.F).
pub mod router;
/// The supervisor's load-and-spawn state machine (§4.E).
pub mod supervisor;

pub use arena::{ArenaError, Partition};
pub use control::current_slot_id;
pub use flash::{Flash, FlashError};
pub use loader::{LoadedImage, LoaderError};
pub use manifest::{Manifest, ManifestError};
pub use messages::{ButtonCallback, EventMsg, ThreadMsg, TickCallback, TickUnit};
pub use platform::{Platform, Priority, Queue, QueueError, TaskSpawnSpec};
pub use record::{AppName, AppRecord, AppType, InternalEntryPoint, MAX_SLOTS};
pub use running::RunningApp;

/// Single-crate facade over components A-G, generic over a [`Platform`]
/// implementation.
///
/// Owns the manifest and the running-app pointer; the platform owns
/// everything else (arena, flash, queues, UI hooks). Methods mirror the
/// public entry points a board's bring-up code calls into: `start`,
/// `quit`, `post_button`, `post_tick_from_isr`, `run_event_loop`, `get`,
/// `head`, `current_slot_id`. `init`/`register_internal`/
/// `supervisor_step` are the bootstrap and driving calls a board makes
/// that the original implementation performs internally rather than
/// exposing as part of its public surface.
pub struct AppManager<P: Platform> {
    platform: P,
    manifest: manifest::Manifest,
    running: running::RunningApp,
}

impl<P: Platform> AppManager<P> {
    /// Creates a manager with an empty manifest and nothing running.
    #[must_use]
    pub fn new(platform: P) -> Self {
        Self {
            platform,
            manifest: manifest::Manifest::new(),
            running: running::RunningApp::none(),
        }
    }

    /// Registers a compiled-in application. Must be called, for each
    /// built-in, before [`AppManager::init`] — insertion order determines
    /// prefix-match winners (§4.A, §8 S5) and [`AppManager::head`]'s
    /// result (§8 S1).
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Full`] if the manifest is already at
    /// capacity; the caller should treat this as fatal during bootstrap
    /// (§7 `allocation_failed`).
    pub fn register_internal(
        &mut self,
        name: &str,
        app_type: record::AppType,
        entry_point: record::InternalEntryPoint,
    ) -> Result<(), manifest::ManifestError> {
        self.manifest
            .insert(record::AppRecord::internal(name, app_type, entry_point))
    }

    /// Populates the manifest from flash (§4.B) and asserts at least one
    /// application is known (§7 `empty_manifest`).
    ///
    /// Call after every [`AppManager::register_internal`] call.
    ///
    /// # Panics
    ///
    /// Panics if the manifest is still empty afterward.
    pub fn init(&mut self) {
        flash::discover(self.platform.flash(), &mut self.manifest);
        supervisor::assert_bootstrapped(&self.manifest);
    }

    /// Requests that `name` be started (§4.G).
    pub fn start(&self, name: &str) {
        control::start(&self.platform, name);
    }

    /// Requests that the running application quit (§4.F, §4.G).
    pub fn quit(&self) {
        control::quit(&self.platform);
    }

    /// Posts a button event to the running application (§4.F).
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Full`] if the event queue is still full once
    /// the post's timeout elapses.
    pub fn post_button(&self, msg: messages::EventMsg) -> Result<(), platform::QueueError> {
        router::post_button(&self.platform, msg)
    }

    /// Posts a tick event from an interrupt context (§4.F).
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Full`] if the event queue has no room.
    pub fn post_tick_from_isr(
        &self,
        msg: messages::EventMsg,
    ) -> Result<bool, platform::QueueError> {
        router::post_tick_from_isr(&self.platform, msg)
    }

    /// Runs the application mainloop to completion (§4.F). Call from
    /// inside the spawned application task.
    pub fn run_event_loop(&mut self) {
        router::run_event_loop(&mut self.platform, &self.manifest, &self.running);
    }

    /// One supervisor iteration: blocks for a `Start` request, then loads
    /// and spawns it (§4.E). Call in a loop from the supervisor task.
    pub fn supervisor_step(&mut self) {
        supervisor::supervisor_step(&mut self.platform, &mut self.manifest, &self.running);
    }

    /// Looks up a known application by name (§4.A).
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::NotFound`] if no record matches.
    pub fn get(&self, name: &str) -> Result<&record::AppRecord, manifest::ManifestError> {
        control::get(&self.manifest, name)
    }

    /// Returns the first-registered application, if any (§4.A).
    #[must_use]
    pub fn head(&self) -> Option<&record::AppRecord> {
        control::head(&self.manifest)
    }

    /// The flash slot id of the running application, for resource-proxy
    /// namespacing (§4.G).
    #[must_use]
    pub fn current_slot_id(&self) -> usize {
        control::current_slot_id(&self.manifest, &self.running)
    }

    /// Borrows the underlying platform.
    #[must_use]
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Mutably borrows the underlying platform.
    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    /// Borrows the manifest directly, for callers that need more than the
    /// control-surface accessors expose (e.g. enumerating every record).
    #[must_use]
    pub fn manifest(&self) -> &manifest::Manifest {
        &self.manifest
    }

    /// Borrows the running-app pointer directly.
    #[must_use]
    pub fn running(&self) -> &running::RunningApp {
        &self.running
    }
}
