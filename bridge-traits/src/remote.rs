//! Remote Storage Abstraction
//!
//! Read-only view of a cloud drive account as the scan engine needs it:
//! paginated child listings, existence probes, breadcrumb lookups and a
//! directory-only listing used by the preloader.

use core_async::sync::CancellationToken;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One child of a remote directory, as returned by a listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    /// Opaque remote id (directory id for folders, file id otherwise)
    pub id: String,
    pub name: String,
    /// Size in bytes; zero for directories
    pub size: u64,
    pub is_dir: bool,
    /// Content handle used to fetch the file's bytes later
    pub pick_code: String,
    /// Remote modification time, unix seconds
    pub modified_at: i64,
}

impl RemoteEntry {
    pub fn file(id: impl Into<String>, name: impl Into<String>, size: u64) -> Self {
        let id = id.into();
        Self {
            pick_code: format!("pc-{id}"),
            id,
            name: name.into(),
            size,
            is_dir: false,
            modified_at: 0,
        }
    }

    pub fn dir(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            size: 0,
            is_dir: true,
            pick_code: String::new(),
            modified_at: 0,
        }
    }

    pub fn with_modified_at(mut self, modified_at: i64) -> Self {
        self.modified_at = modified_at;
        self
    }
}

/// One ancestor in a file's breadcrumb chain.
///
/// Drives expose a synthetic root whose id is [`BreadcrumbSegment::ROOT_ID`];
/// consumers skip it when rebuilding logical paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreadcrumbSegment {
    pub id: String,
    pub name: String,
}

impl BreadcrumbSegment {
    pub const ROOT_ID: &'static str = "0";

    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    pub fn is_synthetic_root(&self) -> bool {
        self.id == Self::ROOT_ID
    }
}

/// A child directory returned by the directory-only listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteDirectory {
    pub id: String,
    /// Full logical path of the directory, `/`-separated
    pub path: String,
    pub modified_at: i64,
}

/// Remote drive trait
///
/// Implemented once per backend (115, Baidu, OpenList, local mounts). Every
/// call receives the run's cancellation token; implementations should return
/// [`BridgeError::Cancelled`](crate::BridgeError::Cancelled) promptly once it
/// fires instead of finishing the request.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::remote::RemoteStorage;
///
/// async fn count_children(drive: &dyn RemoteStorage, token: &CancellationToken) -> usize {
///     drive.list_children(token, "0", 0, 1000).await.map(|page| page.len()).unwrap_or(0)
/// }
/// ```
#[async_trait::async_trait]
pub trait RemoteStorage: Send + Sync {
    /// List one page of a directory's children starting at `offset`.
    ///
    /// A page shorter than `limit` (or empty) marks the end of the listing.
    async fn list_children(
        &self,
        cancel: &CancellationToken,
        dir_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<RemoteEntry>>;

    /// Whether a file or directory id still exists on the drive.
    async fn path_exists(&self, cancel: &CancellationToken, id: &str) -> Result<bool>;

    /// Breadcrumb of a file, root first, file itself last.
    async fn file_detail_by_handle(
        &self,
        cancel: &CancellationToken,
        handle: &str,
    ) -> Result<Vec<BreadcrumbSegment>>;

    /// Child directories of `dir_id`, without files and without pagination.
    async fn dirs_by_path_id(
        &self,
        cancel: &CancellationToken,
        dir_id: &str,
    ) -> Result<Vec<RemoteDirectory>>;
}
