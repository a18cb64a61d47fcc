//! Runner for deferred side effects.
//!
//! A sequence never waits for its effects. Each scheduled effect gets its own
//! task that sleeps out the delay, then asks the scheduler to refresh the
//! media library of every listed sync target. Refresh failures are logged and
//! skipped; there is no retry.

use crate::pipeline::ScheduledEffect;
use bridge_traits::JobScheduler;
use core_async::task::{self, JoinHandle};
use core_async::time::sleep;
use core_runtime::events::{CoreEvent, EventBus, TaskEvent};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct EffectRunner {
    scheduler: Arc<dyn JobScheduler>,
    events: EventBus,
}

impl EffectRunner {
    pub fn new(scheduler: Arc<dyn JobScheduler>, events: EventBus) -> Self {
        Self { scheduler, events }
    }

    /// Detach `effect`. The handle may be dropped.
    pub fn schedule(&self, effect: ScheduledEffect) -> JoinHandle<()> {
        let scheduler = Arc::clone(&self.scheduler);
        let events = self.events.clone();

        task::spawn(async move {
            sleep(effect.delay).await;

            for id in &effect.target_ids {
                match scheduler.refresh_library(*id).await {
                    Ok(()) => info!(target_id = id, "library refresh triggered"),
                    Err(err) => warn!(target_id = id, error = %err, "library refresh failed"),
                }
            }

            events
                .emit(CoreEvent::Task(TaskEvent::RefreshFired {
                    target_ids: effect.target_ids,
                }))
                .ok();
        })
    }
}
