//! # contract: data model and collaborator interfaces
//!
//! This module defines the plain data types that flow through the sync
//! pipeline and the two async traits at its seams:
//!
//! - [`ContentApi`]: pulls a [`ContentBundle`] from the remote content API.
//! - [`FileStore`]: the filesystem primitives the write stage relies on.
//!
//! ## Mocking & Testing
//! - Both traits are annotated for `mockall` so consumers can generate
//!   deterministic mocks for unit/integration tests (`MockContentApi`,
//!   `MockFileStore`).
//!
//! ## Adding New Backends
//! - Implement [`ContentApi`] for a different transport, or [`FileStore`] for a
//!   different storage target, and hand it to the [`crate::scheduler::Registry`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Identifies one remote content origin and where its content lands on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Domain used for API routing and logging.
    pub domain: String,
    /// Opaque identifier embedded in request URLs.
    pub install_id: String,
    /// Root directory that receives sitemap, robots and page files.
    pub target_directory: PathBuf,
}

/// A partial [`SourceConfig`]: `Some` fields overlay, `None` fields are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceConfigUpdate {
    pub domain: Option<String>,
    pub install_id: Option<String>,
    pub target_directory: Option<PathBuf>,
}

impl SourceConfig {
    /// Shallow field-wise merge. No validation is performed.
    pub fn apply(&mut self, update: SourceConfigUpdate) {
        if let Some(domain) = update.domain {
            self.domain = domain;
        }
        if let Some(install_id) = update.install_id {
            self.install_id = install_id;
        }
        if let Some(target_directory) = update.target_directory {
            self.target_directory = target_directory;
        }
    }
}

impl From<SourceConfig> for SourceConfigUpdate {
    fn from(config: SourceConfig) -> Self {
        SourceConfigUpdate {
            domain: Some(config.domain),
            install_id: Some(config.install_id),
            target_directory: Some(config.target_directory),
        }
    }
}

/// One generated page as returned by the content API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContentPage {
    pub url_path: String,
    pub title: String,
    pub html: String,
}

/// Sitemap, robots file and pages returned by a fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContentBundle {
    pub sitemap_xml: String,
    pub robot_txt: String,
    pub pages: Vec<ContentPage>,
}

impl ContentBundle {
    pub fn is_empty(&self) -> bool {
        self.sitemap_xml.is_empty() && self.robot_txt.is_empty() && self.pages.is_empty()
    }

    /// Merges newly fetched content over previously published content.
    ///
    /// Sitemap and robots prefer the new value when it is non-empty. Pages keep
    /// the previously published ones first, new ones appended.
    pub fn merge(previous: ContentBundle, new: ContentBundle) -> ContentBundle {
        let sitemap_xml = if new.sitemap_xml.is_empty() {
            previous.sitemap_xml
        } else {
            new.sitemap_xml
        };
        let robot_txt = if new.robot_txt.is_empty() {
            previous.robot_txt
        } else {
            new.robot_txt
        };
        let mut pages = previous.pages;
        pages.extend(new.pages);
        ContentBundle {
            sitemap_xml,
            robot_txt,
            pages,
        }
    }
}

/// Result of one synchronisation (or manual fetch-and-write) attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    /// True iff no per-item error occurred.
    pub success: bool,
    pub message: String,
    /// Paths relative to the target directory, in write order.
    pub files_created: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

impl SyncOutcome {
    pub(crate) fn failed(message: String, error: String) -> Self {
        SyncOutcome {
            success: false,
            message,
            files_created: Vec::new(),
            errors: Some(vec![error]),
        }
    }

    pub fn error_count(&self) -> usize {
        self.errors.as_ref().map_or(0, Vec::len)
    }
}

/// Which endpoint(s) a manual fetch pulls from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    /// Only content generated since the last publish.
    New,
    /// Only content that was already published.
    Previous,
    /// Both, merged.
    All,
}

impl std::str::FromStr for FetchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(FetchMode::New),
            "previous" | "previously-published" => Ok(FetchMode::Previous),
            "all" => Ok(FetchMode::All),
            other => Err(format!(
                "unknown fetch mode '{other}' (expected new, previous or all)"
            )),
        }
    }
}

/// What a first sync does when the merged fetch cannot produce a bundle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FirstSyncFallback {
    /// Retry with the new-content endpoint alone, then leave the first-sync state.
    #[default]
    NewOnly,
    /// Report the failure and keep the first-sync state for the next attempt.
    Disabled,
}

/// Trait for pulling generated content from the remote content API.
///
/// Implementors map the API's "nothing to publish" sentinel to an empty
/// [`ContentBundle`]; every other failure is a [`SyncError::Fetch`].
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ContentApi: Send + Sync {
    /// Fetch content generated since the last publish.
    async fn fetch_new(&self, config: &SourceConfig) -> Result<ContentBundle, SyncError>;

    /// Fetch content that has been published before.
    async fn fetch_previously_published(
        &self,
        config: &SourceConfig,
    ) -> Result<ContentBundle, SyncError>;
}

/// Filesystem primitives used by the write stage.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Create a directory and all of its parents. Succeeds if it already exists.
    async fn ensure_directory(&self, path: &Path) -> std::io::Result<()>;

    /// Write a file, creating parent directories first.
    async fn write_file(&self, path: &Path, contents: &str) -> std::io::Result<()>;

    async fn exists(&self, path: &Path) -> bool;
}
