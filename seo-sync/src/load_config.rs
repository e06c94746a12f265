//! `load_config` module: loads a static YAML config, injects secrets from the
//! environment, and turns it into a ready-to-use [`Registry`].
//!
//! This is the only place where untrusted YAML is parsed and mapped to the
//! strongly-typed core structs.
//!
//! # Responsibilities
//! - Parse the YAML file into intermediate structs
//! - Inject environment variables for secret fields (install ids) and the API base URL override
//! - Reject configs the registry cannot serve (no sources, duplicate ids, missing install id)
//!
//! # Errors
//! All errors use `anyhow::Error` and are surfaced at the CLI boundary.
//!
//! Accepted YAML:
//!
//! ```yaml
//! api_base_url: https://api.example.com/v1
//! sync_interval_hours: 24
//! first_sync_fallback: new_only
//! sources:
//!   - id: main
//!     domain: example.com
//!     install_id_env: MAIN_INSTALL_ID
//!     target_directory: ./public
//! ```
use anyhow::{bail, Result};
use seo_sync_core::api::HttpContentApi;
use seo_sync_core::contract::{FirstSyncFallback, SourceConfig};
use seo_sync_core::scheduler::{Registry, DEFAULT_SYNC_INTERVAL, MAX_SYNC_INTERVAL};
use seo_sync_core::store::LocalFileStore;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Overrides `api_base_url` from the config file when set.
pub const API_BASE_URL_ENV: &str = "SEO_SYNC_API_BASE_URL";

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    api_base_url: Option<String>,
    #[serde(default)]
    sync_interval_hours: Option<u64>,
    #[serde(default)]
    first_sync_fallback: FirstSyncFallback,
    #[serde(default)]
    sources: Vec<RawSource>,
}

#[derive(Debug, Deserialize)]
struct RawSource {
    id: String,
    domain: String,
    #[serde(default)]
    install_id: Option<String>,
    #[serde(default)]
    install_id_env: Option<String>,
    target_directory: PathBuf,
}

/// A source as declared in the config file, with its secrets resolved.
#[derive(Debug, Clone)]
pub struct NamedSource {
    pub id: String,
    pub config: SourceConfig,
}

#[derive(Debug, Clone)]
pub struct CliConfig {
    pub api_base_url: String,
    pub sync_interval: Duration,
    pub first_sync_fallback: FirstSyncFallback,
    pub sources: Vec<NamedSource>,
}

impl CliConfig {
    pub fn trace_loaded(&self) {
        info!(
            api_base_url = %self.api_base_url,
            sources_count = self.sources.len(),
            interval_secs = self.sync_interval.as_secs(),
            "Loaded config"
        );
        for source in &self.sources {
            debug!(
                source_id = %source.id,
                domain = %source.config.domain,
                target_directory = %source.config.target_directory.display(),
                "Loaded source"
            );
        }
    }

    /// Builds a registry talking to the configured API and writing to local disk.
    pub fn build_registry(&self) -> Registry {
        let mut registry = Registry::new(
            Arc::new(HttpContentApi::new(self.api_base_url.clone())),
            Arc::new(LocalFileStore),
        )
        .with_interval(self.sync_interval)
        .with_first_sync_fallback(self.first_sync_fallback);
        for source in &self.sources {
            registry.add_source(&source.id, source.config.clone());
        }
        registry
    }
}

fn resolve_install_id(source: &RawSource) -> Result<String> {
    if let Some(var) = &source.install_id_env {
        return match std::env::var(var) {
            Ok(value) if !value.is_empty() => {
                info!(source_id = %source.id, env = %var, "Install id found in env");
                Ok(value)
            }
            Ok(_) | Err(_) => {
                error!(source_id = %source.id, env = %var, "Install id environment variable not set");
                bail!(
                    "install id environment variable {var} for source '{}' is not set",
                    source.id
                )
            }
        };
    }
    match &source.install_id {
        Some(id) => Ok(id.clone()),
        None => {
            error!(source_id = %source.id, "Source has no install id");
            bail!(
                "source '{}' needs either install_id or install_id_env",
                source.id
            )
        }
    }
}

/// Loads a static YAML config file and injects required env vars for secrets.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let raw: RawConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    let api_base_url = match std::env::var(API_BASE_URL_ENV) {
        Ok(url) if !url.is_empty() => {
            info!(env = API_BASE_URL_ENV, "API base URL overridden from env");
            url
        }
        _ => match raw.api_base_url {
            Some(url) => url,
            None => {
                error!("No API base URL configured");
                bail!("api_base_url must be set in the config file or via {API_BASE_URL_ENV}");
            }
        },
    };

    if raw.sources.is_empty() {
        bail!("config declares no sources");
    }

    let mut seen = HashSet::new();
    let mut sources = Vec::with_capacity(raw.sources.len());
    for source in &raw.sources {
        if !seen.insert(source.id.as_str()) {
            error!(source_id = %source.id, "Duplicate source id in config");
            bail!("duplicate source id '{}'", source.id);
        }
        let install_id = resolve_install_id(source)?;
        sources.push(NamedSource {
            id: source.id.clone(),
            config: SourceConfig {
                domain: source.domain.clone(),
                install_id,
                target_directory: source.target_directory.clone(),
            },
        });
    }

    let sync_interval = match raw.sync_interval_hours {
        Some(0) => bail!("sync_interval_hours must be at least 1"),
        Some(hours) => match hours.checked_mul(60 * 60).map(Duration::from_secs) {
            Some(interval) if interval <= MAX_SYNC_INTERVAL => interval,
            _ => {
                error!(sync_interval_hours = hours, "Sync interval too large");
                bail!(
                    "sync_interval_hours must be at most {}",
                    MAX_SYNC_INTERVAL.as_secs() / 3600
                )
            }
        },
        None => DEFAULT_SYNC_INTERVAL,
    };

    let config = CliConfig {
        api_base_url,
        sync_interval,
        first_sync_fallback: raw.first_sync_fallback,
        sources,
    };
    config.trace_loaded();
    Ok(config)
}
