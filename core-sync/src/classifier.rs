//! # File Classifier
//!
//! Pure name/size rules: which directories to skip, which files to keep, and
//! what kind of catalog record a kept file becomes.
//!
//! Videos are recognised in two tiers. Unambiguous containers (`mkv`, `mp4`,
//! ...) always count. Containers that are also used for non-video content
//! (`ts` transport streams vs. TypeScript sources, for instance) only count
//! when the file name carries a codec or release token such as `x265`,
//! `1080p` or `WEB-DL`.

use crate::{Result, SyncError};
use bridge_traits::{FileKind, RemoteEntry};
use glob::{MatchOptions, Pattern};
use regex::Regex;
use serde::{Deserialize, Serialize};

const NFO_EXTENSION: &str = "nfo";

const RELEASE_TOKEN_PATTERN: &str = r"(?i)(?:^|[.\s_\-\[\(])(?:x26[45]|h\.?26[45]|hevc|avc|av1|xvid|divx|remux|blu-?ray|bdrip|web-?dl|webrip|hdtv|dvdrip|2160p|1080[pi]|720p|480p|4k|uhd)(?:$|[.\s_\-\]\)])";

/// Extension and size policy for one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaRules {
    pub video_extensions: Vec<String>,
    /// Containers that need a release token in the name to count as video
    pub ambiguous_video_extensions: Vec<String>,
    pub image_extensions: Vec<String>,
    pub subtitle_extensions: Vec<String>,
    /// Directory-name globs, matched case-insensitively
    pub exclude_patterns: Vec<String>,
    /// Videos smaller than this are treated as samples and refused
    pub min_video_size_mb: u64,
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

impl Default for MediaRules {
    fn default() -> Self {
        Self {
            video_extensions: strings(&[
                "mkv", "mp4", "m4v", "avi", "mov", "wmv", "flv", "webm", "rmvb", "rm", "mpg",
                "mpeg", "m2ts", "mts", "vob", "iso",
            ]),
            ambiguous_video_extensions: strings(&["ts"]),
            image_extensions: strings(&["jpg", "jpeg", "png", "webp", "bmp", "gif"]),
            subtitle_extensions: strings(&["srt", "ass", "ssa", "sub", "idx", "sup", "vtt", "smi"]),
            exclude_patterns: strings(&["@eaDir", "#recycle", "$RECYCLE.BIN", ".*"]),
            min_video_size_mb: 0,
        }
    }
}

/// Outcome of classifying one remote entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryClass {
    Directory,
    Video,
    Image,
    Nfo,
    Subtitle,
    Ignored,
}

impl EntryClass {
    /// Catalog kind for files; `None` for directories and ignored entries.
    pub fn file_kind(&self) -> Option<FileKind> {
        match self {
            EntryClass::Video => Some(FileKind::Video),
            EntryClass::Image => Some(FileKind::Image),
            EntryClass::Nfo => Some(FileKind::Nfo),
            EntryClass::Subtitle => Some(FileKind::Subtitle),
            EntryClass::Directory | EntryClass::Ignored => None,
        }
    }
}

/// Lower-cased extension after the last dot, if any.
pub fn extension(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Name without its last extension.
pub fn stem(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}

#[derive(Debug, Clone)]
pub struct FileClassifier {
    rules: MediaRules,
    exclude: Vec<Pattern>,
    release_token: Regex,
}

impl FileClassifier {
    pub fn new(rules: &MediaRules) -> Result<Self> {
        let exclude = rules
            .exclude_patterns
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|e| {
                    SyncError::InvalidJob(format!("bad exclude pattern '{p}': {e}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let release_token = Regex::new(RELEASE_TOKEN_PATTERN)
            .map_err(|e| SyncError::InvalidJob(format!("release token pattern: {e}")))?;

        let mut rules = rules.clone();
        for list in [
            &mut rules.video_extensions,
            &mut rules.ambiguous_video_extensions,
            &mut rules.image_extensions,
            &mut rules.subtitle_extensions,
        ] {
            for ext in list.iter_mut() {
                *ext = ext.trim_start_matches('.').to_ascii_lowercase();
            }
        }

        Ok(Self {
            rules,
            exclude,
            release_token,
        })
    }

    /// Whether a directory name matches one of the job's exclusion globs.
    pub fn is_excluded(&self, name: &str) -> bool {
        let options = MatchOptions {
            case_sensitive: false,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };
        self.exclude
            .iter()
            .any(|pattern| pattern.matches_with(name, options))
    }

    /// Extension-driven classification of a file name.
    pub fn classify(&self, name: &str) -> EntryClass {
        let Some(ext) = extension(name) else {
            return EntryClass::Ignored;
        };
        if ext == NFO_EXTENSION {
            EntryClass::Nfo
        } else if self.rules.subtitle_extensions.contains(&ext) {
            EntryClass::Subtitle
        } else if self.rules.image_extensions.contains(&ext) {
            EntryClass::Image
        } else if self.rules.video_extensions.contains(&ext) {
            EntryClass::Video
        } else if self.rules.ambiguous_video_extensions.contains(&ext)
            && self.release_token.is_match(stem(name))
        {
            EntryClass::Video
        } else {
            EntryClass::Ignored
        }
    }

    /// Classification of a listing entry, directories included.
    pub fn classify_entry(&self, entry: &RemoteEntry) -> EntryClass {
        if entry.is_dir {
            EntryClass::Directory
        } else {
            self.classify(&entry.name)
        }
    }

    /// Allow/deny policy: known kind, and videos above the sample threshold.
    pub fn is_allowed(&self, name: &str, size: u64) -> bool {
        match self.classify(name) {
            EntryClass::Ignored | EntryClass::Directory => false,
            EntryClass::Video => size >= self.rules.min_video_size_mb.saturating_mul(1024 * 1024),
            _ => true,
        }
    }
}
