//! Runtime configuration
//!
//! Every setting has a default matching the working-directory layout the
//! import commands expect (`data.json`, `data/`, `db.sqlite3`, ...), so a
//! configuration file is optional and may set any subset of sections.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::CatalogError;
use crate::model::SiteUrls;

#[derive(Clone, Default, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub media: MediaConfig,
    pub import: ImportConfig,
    pub vocabulary: VocabularyConfig,
    pub fetch: FetchConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Directory attached files are copied into
    pub root: PathBuf,
    /// Public URL of the catalog site
    pub base_url: String,
    /// Public URL of `root`, absolute or relative to `base_url`
    pub url: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub document: PathBuf,
    pub data_root: PathBuf,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct VocabularyConfig {
    pub filetypes: PathBuf,
    pub licences: PathBuf,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub workers: usize,
    pub connect_timeout_secs: u64,
    pub tries: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("db.sqlite3"),
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("media"),
            base_url: "http://localhost:8000/".to_string(),
            url: "/media/".to_string(),
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            document: PathBuf::from("data.json"),
            data_root: PathBuf::from("data"),
        }
    }
}

impl Default for VocabularyConfig {
    fn default() -> Self {
        Self {
            filetypes: PathBuf::from("filetypes.xml"),
            licences: PathBuf::from("licences.xml"),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            connect_timeout_secs: 3,
            tries: 2,
        }
    }
}

impl FetchConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Config {
    /// Read a TOML configuration file
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text, path)
    }

    fn parse(text: &str, path: &Path) -> Result<Self, CatalogError> {
        toml::from_str(text).map_err(|source| CatalogError::Config {
            path: path.display().to_string(),
            source,
        })
    }

    /// Load `path` when given, otherwise use the defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, CatalogError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn site_urls(&self) -> Result<SiteUrls, CatalogError> {
        SiteUrls::new(&self.media.base_url, &self.media.url)
    }
}
