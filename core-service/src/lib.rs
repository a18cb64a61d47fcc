//! Core service façade and task orchestration.
//!
//! This crate wires host-provided bridges (job scheduler, catalog store,
//! notification sink, remote drives) into the scan engine and the task
//! sequencer, and exposes the named operations chat front ends call.
//!
//! ## Operations
//!
//! | Command       | Operation                       |
//! |---------------|---------------------------------|
//! | `strm_inc`    | Incremental sync                |
//! | `strm_sync`   | Full sync                       |
//! | `scrape`      | Scrape                          |
//! | `scrape_sync` | Scrape, then sync               |
//! | `sync_scrape` | Sync, then scrape (may refresh) |
//!
//! Every operation validates its `#<id>` arguments synchronously, replies
//! at once, and runs the actual work in the background.

pub mod commands;
pub mod effects;
pub mod error;
pub mod pipeline;
pub mod selector;
pub mod sequencer;

pub use commands::{commands, lookup, COMMANDS};
pub use effects::EffectRunner;
pub use error::{Result, ServiceError};
pub use pipeline::{Operation, Plan, ScheduledEffect, StageReport};
pub use selector::{parse_selector, Selector};
pub use sequencer::{Dispatch, SequenceReport, TaskHandle, TaskSequencer};

use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, Receiver};
use core_sync::SyncEngine;
use std::sync::Arc;

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    config: Arc<CoreConfig>,
    events: EventBus,
    engine: Arc<SyncEngine>,
    sequencer: TaskSequencer,
}

impl CoreService {
    /// Build the engine and sequencer from a validated configuration.
    pub fn new(config: CoreConfig) -> Result<Self> {
        config.validate()?;

        let events = EventBus::new(config.event_capacity);
        let engine = Arc::new(SyncEngine::from_config(&config, events.clone()));
        let sequencer = TaskSequencer::new(&config, events.clone());

        Ok(Self {
            config: Arc::new(config),
            events,
            engine,
            sequencer,
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Scan engine; register remote drives here before running jobs.
    pub fn engine(&self) -> Arc<SyncEngine> {
        Arc::clone(&self.engine)
    }

    pub fn sequencer(&self) -> &TaskSequencer {
        &self.sequencer
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.events.subscribe()
    }

    /// Route a chat command to the sequencer.
    pub fn handle_command<S: AsRef<str>>(&self, name: &str, args: &[S]) -> Result<String> {
        self.sequencer.handle_command(name, args)
    }
}
