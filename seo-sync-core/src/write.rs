//! Write stage: materialises a [`ContentBundle`] under a target directory.
//!
//! Every item (sitemap, robots, each page) gets exactly one isolated write
//! attempt, in that order. A failed item is recorded in the outcome's `errors`
//! and never stops the items after it.
//!
//! # Page paths
//! A page's `url_path` becomes a file path relative to the target directory:
//! - leading `/` is dropped,
//! - an empty path or one ending in `/` maps to `index.html` inside it,
//! - `.html` is appended unless the path already ends in `.html` or `.htm`,
//! - the result is split into a directory (created recursively) and a file name.
//!
//! Paths with `.` or `..` segments are refused so a page can never land outside
//! the target directory.

use std::path::Path;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::contract::{ContentBundle, ContentPage, FileStore, SyncOutcome};
use crate::error::SyncError;

pub const SITEMAP_FILE: &str = "sitemap.xml";
pub const ROBOTS_FILE: &str = "robots.txt";

const PAGE_EXTENSIONS: [&str; 2] = [".html", ".htm"];

/// Derives the `/`-separated path, relative to the target directory, that a
/// page is written to.
pub fn page_relative_path(url_path: &str) -> Result<String, String> {
    let trimmed = url_path.trim().trim_start_matches('/');

    let mut path = if trimmed.is_empty() || trimmed.ends_with('/') {
        format!("{trimmed}index.html")
    } else {
        trimmed.to_string()
    };
    let lower = path.to_ascii_lowercase();
    if !PAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
        path.push_str(".html");
    }

    let mut segments = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" => continue,
            "." | ".." => return Err(format!("unsafe path segment '{segment}' in '{url_path}'")),
            s if s.contains('\\') => {
                return Err(format!("backslash in path segment '{s}' of '{url_path}'"));
            }
            s => segments.push(s),
        }
    }
    Ok(segments.join("/"))
}

fn page_label(page: &ContentPage) -> String {
    if page.title.is_empty() {
        format!("page {}", page.url_path)
    } else {
        format!("page {} ({})", page.url_path, page.title)
    }
}

struct WriteLog {
    files_created: Vec<String>,
    errors: Vec<String>,
}

impl WriteLog {
    fn record(&mut self, relative: String, item: String, result: std::io::Result<()>) {
        match result {
            Ok(()) => {
                debug!(file = %relative, "[WRITE] Wrote item");
                self.files_created.push(relative);
            }
            Err(e) => {
                error!(item = %item, error = ?e, "[WRITE][ERROR] Failed to write item");
                self.errors.push(
                    SyncError::Write {
                        item,
                        message: e.to_string(),
                    }
                    .to_string(),
                );
            }
        }
    }
}

/// Writes sitemap, robots and pages under `target_directory`.
///
/// `started` is when the surrounding operation began; the outcome's message
/// reports the time elapsed since then.
pub async fn write_bundle(
    store: &dyn FileStore,
    domain: &str,
    target_directory: &Path,
    bundle: &ContentBundle,
    started: Instant,
) -> SyncOutcome {
    let mut log = WriteLog {
        files_created: Vec::new(),
        errors: Vec::new(),
    };

    if !bundle.is_empty() && !store.exists(target_directory).await {
        if let Err(e) = store.ensure_directory(target_directory).await {
            warn!(
                error = ?e,
                path = %target_directory.display(),
                "[WRITE] Failed to create target directory"
            );
        }
    }

    if !bundle.sitemap_xml.is_empty() {
        let result = store
            .write_file(&target_directory.join(SITEMAP_FILE), &bundle.sitemap_xml)
            .await;
        log.record(SITEMAP_FILE.to_string(), SITEMAP_FILE.to_string(), result);
    }

    if !bundle.robot_txt.is_empty() {
        let result = store
            .write_file(&target_directory.join(ROBOTS_FILE), &bundle.robot_txt)
            .await;
        log.record(ROBOTS_FILE.to_string(), ROBOTS_FILE.to_string(), result);
    }

    for page in &bundle.pages {
        let item = page_label(page);
        let relative = match page_relative_path(&page.url_path) {
            Ok(relative) => relative,
            Err(reason) => {
                let invalid = std::io::Error::new(std::io::ErrorKind::InvalidInput, reason);
                log.record(String::new(), item, Err(invalid));
                continue;
            }
        };

        let full_path = target_directory.join(&relative);
        let result = match full_path.parent() {
            Some(dir) => match store.ensure_directory(dir).await {
                Ok(()) => store.write_file(&full_path, &page.html).await,
                Err(e) => Err(e),
            },
            None => store.write_file(&full_path, &page.html).await,
        };
        log.record(relative, item, result);
    }

    let elapsed_ms = started.elapsed().as_millis();
    let message = format!(
        "Synced {domain}: {} files created, {} errors in {elapsed_ms}ms",
        log.files_created.len(),
        log.errors.len()
    );
    info!(
        domain = %domain,
        files_created = log.files_created.len(),
        errors = log.errors.len(),
        elapsed_ms = elapsed_ms as u64,
        "[WRITE] Bundle written"
    );

    SyncOutcome {
        success: log.errors.is_empty(),
        message,
        files_created: log.files_created,
        errors: if log.errors.is_empty() {
            None
        } else {
            Some(log.errors)
        },
    }
}
