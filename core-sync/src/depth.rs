//! Preload depth estimation from a reference file's breadcrumb.
//!
//! The breadcrumb of a file known to sit inside the job's source root tells
//! how far below the root media files live. One or two levels means a short
//! directory lookahead warms everything incremental sync will touch; the
//! preload is skipped for any other depth.

use crate::job::relative_logical;
use bridge_traits::BreadcrumbSegment;
use std::ops::RangeInclusive;

/// Depths for which the directory preload is worth running.
pub const PRELOAD_DEPTH_RANGE: RangeInclusive<usize> = 1..=2;

#[derive(Debug, Clone)]
pub struct DepthEstimator {
    source_root: String,
}

impl DepthEstimator {
    pub fn new(source_root: impl Into<String>) -> Self {
        Self {
            source_root: source_root.into(),
        }
    }

    /// Logical path of the breadcrumb with the synthetic root dropped.
    pub fn breadcrumb_path(segments: &[BreadcrumbSegment]) -> String {
        segments
            .iter()
            .filter(|segment| !segment.is_synthetic_root())
            .map(|segment| segment.name.trim_matches('/'))
            .filter(|name| !name.is_empty())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Number of path segments between the source root and the file
    /// (file included). `None` when the file is not under the root.
    pub fn estimate(&self, segments: &[BreadcrumbSegment]) -> Option<usize> {
        let path = Self::breadcrumb_path(segments);
        let relative = relative_logical(&self.source_root, &path)?;
        Some(relative.split('/').filter(|s| !s.is_empty()).count())
    }

    /// The estimated depth, only when it lies in [`PRELOAD_DEPTH_RANGE`].
    pub fn preload_depth(&self, segments: &[BreadcrumbSegment]) -> Option<usize> {
        self.estimate(segments)
            .filter(|depth| PRELOAD_DEPTH_RANGE.contains(depth))
    }
}
