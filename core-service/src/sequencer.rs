//! # Task Sequencer
//!
//! Runs chat-style operations against the host's job scheduler.
//!
//! ## Lifecycle
//!
//! ```text
//! Validate ─▶ Dispatch ─▶ AwaitCompletion ─▶ (next stage | deferred effect)* ─▶ Notify
//! ```
//!
//! Validation happens on the caller's task. Everything after it runs on a
//! spawned task whose [`TaskHandle`] is returned alongside the
//! acknowledgement, so callers (and tests) can await the whole sequence or
//! simply drop the handle.
//!
//! ## Stages
//!
//! For every stage, in order:
//!
//! 1. Resolve targets: one explicit id, or every configured target of the kind.
//!    A single job whose id is unknown falls back to every target; a pipeline
//!    stage with an unknown id dispatches nothing
//! 2. Full sync only: flag each target for a full resync
//! 3. Scrape only: note whether any target has files pending scrape
//! 4. Submit, wait the settle delay, then poll until every job is terminal
//! 5. After the first stage of a pipeline, wait the drain delay
//! 6. Hand a deferred library refresh to the [`EffectRunner`] when warranted
//!
//! Stage `i + 1` is never dispatched before every job of stage `i` reports a
//! terminal status.

use crate::effects::EffectRunner;
use crate::pipeline::{
    compose_body, failed_targets, refresh_effect, result_line, Operation, Plan, ResolvedStage,
    ScheduledEffect, StageReport, StageSpec,
};
use crate::selector::Selector;
use crate::{Result, ServiceError};
use bridge_traits::{
    Clock, JobScheduler, JobStatus, Notification, NotificationSink, TargetInfo, TaskKind,
};
use core_async::task::{self, JoinHandle};
use core_async::time::{sleep, Duration};
use core_runtime::config::{CoreConfig, TaskTimings};
use core_runtime::events::{CoreEvent, EventBus, TaskEvent};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Everything a finished sequence did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceReport {
    pub sequence_id: String,
    pub operation: Operation,
    pub title: String,
    pub body: String,
    pub stages: Vec<StageReport>,
    pub effects: Vec<ScheduledEffect>,
    /// Whether a notification was handed to the sink
    pub notified: bool,
}

/// Handle to a running sequence.
#[derive(Debug)]
pub struct TaskHandle {
    sequence_id: String,
    join: JoinHandle<SequenceReport>,
}

impl TaskHandle {
    pub fn sequence_id(&self) -> &str {
        &self.sequence_id
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    pub fn abort(&self) {
        self.join.abort();
    }

    /// Wait for the sequence, notification included.
    pub async fn wait(self) -> Result<SequenceReport> {
        self.join
            .await
            .map_err(|err| ServiceError::SequenceAborted {
                sequence_id: self.sequence_id,
                message: err.to_string(),
            })
    }
}

/// Acknowledgement plus the handle of the work it acknowledges.
#[derive(Debug)]
pub struct Dispatch {
    pub ack: &'static str,
    pub handle: TaskHandle,
}

struct Inner {
    scheduler: Arc<dyn JobScheduler>,
    notifier: Option<Arc<dyn NotificationSink>>,
    clock: Arc<dyn Clock>,
    timings: TaskTimings,
    events: EventBus,
    effects: EffectRunner,
}

#[derive(Clone)]
pub struct TaskSequencer {
    inner: Arc<Inner>,
}

impl TaskSequencer {
    pub fn new(config: &CoreConfig, events: EventBus) -> Self {
        Self {
            inner: Arc::new(Inner {
                scheduler: config.scheduler.clone(),
                notifier: config.notifier.clone(),
                clock: config.clock.clone(),
                timings: config.timings,
                effects: EffectRunner::new(config.scheduler.clone(), events.clone()),
                events,
            }),
        }
    }

    /// Validate `args` and start `operation` in the background.
    #[instrument(skip(self, args))]
    pub fn start<S: AsRef<str>>(&self, operation: Operation, args: &[S]) -> Result<Dispatch> {
        let plan = Plan::from_args(operation, args)?;
        let sequence_id = Uuid::new_v4().to_string();
        info!(sequence_id = %sequence_id, stages = plan.stages.len(), "task sequence accepted");

        let inner = Arc::clone(&self.inner);
        let id = sequence_id.clone();
        let join = task::spawn(async move { inner.run(plan, id).await });

        Ok(Dispatch {
            ack: operation.acknowledgement(),
            handle: TaskHandle { sequence_id, join },
        })
    }

    /// Front-end form of [`start`](Self::start): the reply text, with the
    /// background work detached.
    pub fn run<S: AsRef<str>>(&self, operation: Operation, args: &[S]) -> String {
        match self.start(operation, args) {
            Ok(dispatch) => dispatch.ack.to_string(),
            Err(err) => {
                debug!(error = %err, "rejected task arguments");
                operation.usage_error().to_string()
            }
        }
    }

    /// Incremental STRM sync of one target (`#id`) or all of them.
    pub fn sync_incremental<S: AsRef<str>>(&self, args: &[S]) -> String {
        self.run(Operation::SyncIncremental, args)
    }

    /// Full STRM sync of one target or all of them.
    pub fn sync_full<S: AsRef<str>>(&self, args: &[S]) -> String {
        self.run(Operation::SyncFull, args)
    }

    pub fn scrape<S: AsRef<str>>(&self, args: &[S]) -> String {
        self.run(Operation::Scrape, args)
    }

    /// `#scrape_id #sync_id`
    pub fn scrape_then_sync<S: AsRef<str>>(&self, args: &[S]) -> String {
        self.run(Operation::ScrapeThenSync, args)
    }

    /// `#sync_id #scrape_id`
    pub fn sync_then_scrape<S: AsRef<str>>(&self, args: &[S]) -> String {
        self.run(Operation::SyncThenScrape, args)
    }
}

impl Inner {
    fn emit(&self, event: TaskEvent) {
        self.events.emit(CoreEvent::Task(event)).ok();
    }

    /// Queue warm-up pause between a stage's dispatch and its first poll.
    fn settle_delay(&self, operation: Operation) -> Duration {
        if operation.is_pipeline() {
            self.timings.stage_settle()
        } else {
            self.timings.single_settle()
        }
    }

    #[instrument(skip(self, plan), fields(operation = ?plan.operation))]
    async fn run(&self, plan: Plan, sequence_id: String) -> SequenceReport {
        let operation = plan.operation;
        let mut resolved: Vec<ResolvedStage> = Vec::with_capacity(plan.stages.len());
        let mut reports = Vec::with_capacity(plan.stages.len());
        let mut lines = Vec::new();
        let mut effects = Vec::new();

        for (index, spec) in plan.stages.iter().enumerate() {
            let stage = self.dispatch_stage(&sequence_id, operation, index, *spec).await;

            sleep(self.settle_delay(operation)).await;

            let statuses = self.await_completion(&stage.target_ids(), spec.kind).await;
            let failed = failed_targets(&stage, &statuses);

            if operation.is_pipeline() && index == 0 {
                sleep(self.timings.first_stage_drain()).await;
            }

            let line = result_line(operation, &stage, failed.len());
            if let Some(line) = &line {
                lines.push(line.clone());
            }
            if !failed.is_empty() {
                warn!(sequence_id = %sequence_id, stage = index, failed = ?failed, "stage finished with failed jobs");
            }
            self.emit(TaskEvent::StageCompleted {
                sequence_id: sequence_id.clone(),
                stage: index,
                kind: spec.kind.to_string(),
                failed: failed.clone(),
            });

            if let Some(effect) = refresh_effect(
                &plan,
                &stage,
                resolved.first(),
                self.timings.refresh_delay(),
            ) {
                info!(
                    sequence_id = %sequence_id,
                    targets = ?effect.target_ids,
                    delay_secs = effect.delay.as_secs(),
                    "library refresh scheduled"
                );
                self.emit(TaskEvent::RefreshScheduled {
                    sequence_id: sequence_id.clone(),
                    target_ids: effect.target_ids.clone(),
                    delay_secs: effect.delay.as_secs(),
                });
                self.effects.schedule(effect.clone());
                effects.push(effect);
            }

            reports.push(StageReport {
                kind: spec.kind,
                target_ids: stage.target_ids(),
                failed,
                has_new_files: stage.has_new_files,
                line,
            });
            resolved.push(stage);
        }

        let title = plan.title().to_string();
        let body = compose_body(&lines);
        let notified = self.notify(&title, &body).await;

        info!(sequence_id = %sequence_id, "task sequence completed");
        self.emit(TaskEvent::SequenceCompleted {
            sequence_id: sequence_id.clone(),
            title: title.clone(),
        });

        SequenceReport {
            sequence_id,
            operation,
            title,
            body,
            stages: reports,
            effects,
            notified,
        }
    }

    async fn list_all(&self, kind: TaskKind) -> Vec<TargetInfo> {
        self.scheduler.list_targets(kind).await.unwrap_or_else(|err| {
            error!(kind = %kind, error = %err, "failed to list targets");
            Vec::new()
        })
    }

    async fn dispatch_stage(
        &self,
        sequence_id: &str,
        operation: Operation,
        index: usize,
        mut spec: StageSpec,
    ) -> ResolvedStage {
        let mut targets = match spec.selector {
            Selector::All => self.list_all(spec.kind).await,
            Selector::Target(id) => match self.scheduler.get_target(spec.kind, id).await {
                Ok(Some(target)) => vec![target],
                Ok(None) => {
                    warn!(kind = %spec.kind, target_id = id, "unknown target");
                    Vec::new()
                }
                Err(err) => {
                    error!(kind = %spec.kind, target_id = id, error = %err, "failed to look up target");
                    Vec::new()
                }
            },
        };

        // A single job whose explicit target is unknown runs every target instead.
        // Pipeline stages keep skipping it.
        if targets.is_empty() && !operation.is_pipeline() && spec.selector != Selector::All {
            info!(kind = %spec.kind, "falling back to all targets");
            spec.selector = Selector::All;
            targets = self.list_all(spec.kind).await;
        }

        if operation.full_resync() && spec.kind == TaskKind::Sync {
            for target in &targets {
                if let Err(err) = self.scheduler.mark_full_resync(target.id).await {
                    warn!(target_id = target.id, error = %err, "could not flag full resync");
                }
            }
        }

        let mut has_new_files = false;
        if spec.kind == TaskKind::Scrape {
            for target in &targets {
                match self
                    .scheduler
                    .count_pending_scrape_files(target.id, &target.media_type)
                    .await
                {
                    Ok(count) if count > 0 => {
                        debug!(target_id = target.id, count, "new files pending scrape");
                        has_new_files = true;
                    }
                    Ok(_) => {}
                    Err(err) => warn!(target_id = target.id, error = %err, "pending scrape count failed"),
                }
            }
        }

        for target in &targets {
            if let Err(err) = self.scheduler.submit_job(target.id, spec.kind).await {
                error!(target_id = target.id, kind = %spec.kind, error = %err, "job submission failed");
            }
        }

        let stage = ResolvedStage {
            index,
            spec,
            targets,
            has_new_files,
        };
        info!(
            sequence_id,
            stage = index,
            kind = %spec.kind,
            targets = ?stage.target_ids(),
            "stage dispatched"
        );
        self.emit(TaskEvent::Dispatched {
            sequence_id: sequence_id.to_string(),
            stage: index,
            kind: spec.kind.to_string(),
            target_ids: stage.target_ids(),
        });

        stage
    }

    /// Poll every `poll_interval` until all jobs are terminal. A status query
    /// that errors counts as a failed, finished job.
    async fn await_completion(&self, ids: &[u32], kind: TaskKind) -> HashMap<u32, JobStatus> {
        let mut statuses = HashMap::with_capacity(ids.len());
        if ids.is_empty() {
            return statuses;
        }

        loop {
            sleep(self.timings.poll_interval()).await;

            for id in ids {
                if statuses.get(id).is_some_and(|s: &JobStatus| s.is_done()) {
                    continue;
                }
                let status = self.scheduler.job_status(*id, kind).await.unwrap_or_else(|err| {
                    warn!(target_id = id, kind = %kind, error = %err, "status query failed, treating job as failed");
                    JobStatus::Failed
                });
                statuses.insert(*id, status);
            }

            if ids.iter().all(|id| statuses.get(id).is_some_and(|s| s.is_done())) {
                return statuses;
            }
        }
    }

    /// Best effort; a missing sink or a delivery error only gets logged.
    async fn notify(&self, title: &str, body: &str) -> bool {
        let Some(notifier) = &self.notifier else {
            debug!("no notification sink configured");
            return false;
        };

        let notification = Notification::system_alert(title, body, self.clock.now());
        match notifier.send(notification).await {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "completion notification not delivered");
                false
            }
        }
    }
}
