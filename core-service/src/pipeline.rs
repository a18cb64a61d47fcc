//! # Task Plans
//!
//! Pure sequencing rules, kept apart from the timers and collaborators so they
//! can be checked against plain values:
//!
//! - which stages an operation runs, and in what order
//! - the acknowledgement, title and per-stage result line of each operation
//! - when a finished stage warrants a deferred library refresh
//!
//! The sequencer feeds observed facts (resolved targets, pending scrape
//! counts, terminal statuses) into these functions and executes whatever they
//! return.

use crate::selector::{parse_selectors, Selector};
use crate::Result;
use bridge_traits::{JobStatus, TargetInfo, TaskKind};
use core_async::time::Duration;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Body used when no stage produced a result line.
pub const ALL_TASKS_COMPLETED: &str = "all tasks completed";

/// A named front-end operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    SyncIncremental,
    SyncFull,
    Scrape,
    ScrapeThenSync,
    SyncThenScrape,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::SyncIncremental,
        Operation::SyncFull,
        Operation::Scrape,
        Operation::ScrapeThenSync,
        Operation::SyncThenScrape,
    ];

    pub fn stages(&self) -> &'static [TaskKind] {
        match self {
            Operation::SyncIncremental | Operation::SyncFull => &[TaskKind::Sync],
            Operation::Scrape => &[TaskKind::Scrape],
            Operation::ScrapeThenSync => &[TaskKind::Scrape, TaskKind::Sync],
            Operation::SyncThenScrape => &[TaskKind::Sync, TaskKind::Scrape],
        }
    }

    pub fn is_pipeline(&self) -> bool {
        self.stages().len() > 1
    }

    /// Whether sync targets are flagged for a full resync before submission.
    pub fn full_resync(&self) -> bool {
        matches!(self, Operation::SyncFull)
    }

    /// Immediate reply once the arguments validate.
    pub fn acknowledgement(&self) -> &'static str {
        match self {
            Operation::SyncIncremental => "🔄 Started incremental STRM sync",
            Operation::SyncFull => "🔄 Started full STRM sync",
            Operation::Scrape => "🔄 Started scrape task",
            Operation::ScrapeThenSync | Operation::SyncThenScrape => "🔄 Started task sequence",
        }
    }

    /// Reply for arguments that fail validation.
    pub fn usage_error(&self) -> &'static str {
        if self.is_pipeline() {
            "❌ Invalid arguments, use #<number> #<number>"
        } else {
            "❌ Invalid argument, use #<number>"
        }
    }

    /// Title of the completion notification.
    pub fn title(&self) -> &'static str {
        match self {
            Operation::SyncIncremental => "✅ Incremental STRM sync completed",
            Operation::SyncFull => "✅ Full STRM sync completed",
            Operation::Scrape => "✅ Scrape completed",
            Operation::ScrapeThenSync => "✅ Scrape then sync completed",
            Operation::SyncThenScrape => "✅ Sync then scrape completed",
        }
    }

    fn stage_phrase(&self, kind: TaskKind) -> &'static str {
        match (self, kind) {
            (Operation::SyncFull, TaskKind::Sync) => "full STRM sync tasks finished",
            (Operation::SyncIncremental, TaskKind::Sync) => "incremental STRM sync tasks finished",
            (Operation::Scrape, TaskKind::Scrape) => "scrape tasks finished",
            (_, TaskKind::Sync) => "incremental STRM sync completed",
            (_, TaskKind::Scrape) => "scrape completed",
        }
    }
}

/// One stage before its targets are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageSpec {
    pub kind: TaskKind,
    pub selector: Selector,
}

/// Validated stages of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub operation: Operation,
    pub stages: Vec<StageSpec>,
}

impl Plan {
    /// Validate `args` against the operation's stage count.
    pub fn from_args<S: AsRef<str>>(operation: Operation, args: &[S]) -> Result<Self> {
        let kinds = operation.stages();
        let selectors = parse_selectors(args, kinds.len())?;
        let stages = kinds
            .iter()
            .zip(selectors)
            .map(|(kind, selector)| StageSpec {
                kind: *kind,
                selector,
            })
            .collect();

        Ok(Self { operation, stages })
    }

    pub fn title(&self) -> &'static str {
        self.operation.title()
    }
}

/// A stage after target resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStage {
    pub index: usize,
    pub spec: StageSpec,
    pub targets: Vec<TargetInfo>,
    /// Scrape stages only: some target had files pending scrape at dispatch
    pub has_new_files: bool,
}

impl ResolvedStage {
    pub fn target_ids(&self) -> Vec<u32> {
        self.targets.iter().map(|t| t.id).collect()
    }

    /// Label used in result lines: the target's path, or "all".
    pub fn label(&self) -> String {
        match (self.spec.selector, self.targets.as_slice()) {
            (Selector::Target(_), [target]) => target.path.clone(),
            _ => "all".to_string(),
        }
    }
}

/// Outcome of one stage, as reported in the completion summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReport {
    pub kind: TaskKind,
    pub target_ids: Vec<u32>,
    pub failed: Vec<u32>,
    pub has_new_files: bool,
    pub line: Option<String>,
}

/// Targets whose terminal status was `Failed`, in dispatch order.
pub fn failed_targets(stage: &ResolvedStage, statuses: &HashMap<u32, JobStatus>) -> Vec<u32> {
    stage
        .target_ids()
        .into_iter()
        .filter(|id| statuses.get(id) == Some(&JobStatus::Failed))
        .collect()
}

/// Result line for a finished stage. `None` when an explicit target could
/// not be resolved, so nothing ran.
pub fn result_line(operation: Operation, stage: &ResolvedStage, failed: usize) -> Option<String> {
    if stage.targets.is_empty() && stage.spec.selector != Selector::All {
        return None;
    }

    let mut line = format!(
        "Directory: {}, {}",
        stage.label(),
        operation.stage_phrase(stage.spec.kind)
    );
    if failed > 0 {
        line.push_str(&format!(", {failed} failed"));
    }
    Some(line)
}

/// Notification body from the collected result lines.
pub fn compose_body(lines: &[String]) -> String {
    if lines.is_empty() {
        ALL_TASKS_COMPLETED.to_string()
    } else {
        lines.join("\n")
    }
}

/// A side effect to run later, detached from the sequence that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledEffect {
    /// Sync targets whose media library should be refreshed
    pub target_ids: Vec<u32>,
    pub delay: Duration,
}

/// Deferred library refresh after the scrape stage of a sync-then-scrape
/// pipeline, when that scrape had new files to work on. Always aimed at the
/// sync stage's targets.
pub fn refresh_effect(
    plan: &Plan,
    finished: &ResolvedStage,
    sync_stage: Option<&ResolvedStage>,
    delay: Duration,
) -> Option<ScheduledEffect> {
    let syncs_first = plan.stages.len() > 1 && plan.stages[0].kind == TaskKind::Sync;
    if finished.spec.kind != TaskKind::Scrape || !syncs_first || !finished.has_new_files {
        return None;
    }

    let target_ids = sync_stage.filter(|s| s.index == 0)?.target_ids();
    if target_ids.is_empty() {
        return None;
    }

    Some(ScheduledEffect { target_ids, delay })
}
