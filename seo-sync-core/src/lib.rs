#![doc = "seo-sync-core: scheduling and synchronisation core for seo-sync."]

//! This crate pulls a domain's generated SEO content (sitemap, robots.txt and
//! HTML pages) from the content API and writes it under a target directory,
//! once on demand or on a recurring schedule per source.
//!
//! # Usage
//! Build a [`scheduler::Registry`] from a [`contract::ContentApi`]
//! (usually [`api::HttpContentApi`]) and a [`contract::FileStore`] (usually
//! [`store::LocalFileStore`]), register sources, then `start` them or call
//! `sync_one`/`sync_all` directly.

pub mod api;
pub mod contract;
pub mod error;
pub mod scheduler;
pub mod source;
pub mod store;
pub mod write;

pub use error::{ErrorKind, SyncError};
