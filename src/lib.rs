//! DCAT Catalog Library
//!
//! This library keeps a DCAT catalog (catalogs, datasets, distributions and
//! data services) in SQLite, fills it from `data.json` exports and the EU
//! vocabularies, and publishes it as JSON-LD.
//!
//! # Overview
//!
//! A typical deployment goes through three stages:
//!
//! 1. Load the reference vocabularies (file types and licences) from the EU
//!    Publications Office XML tables
//! 2. Import a `data.json` export (ckanext-datajson, DCAT-US) together with a
//!    folder of downloaded distribution files
//! 3. Serialize each catalog as a JSON-LD document using the `dct:`, `dcat:`,
//!    `foaf:` and `spdx:` vocabularies
//!
//! Reference rows (media types, licences, themes, keywords and agents) are
//! resolved by code, so repeating an import never duplicates them. Problems
//! with individual records never abort an import; they are logged and
//! collected in the returned report.
//!
//! # Usage
//!
//! ## Import an export and publish it
//!
//! ```ignore
//! use dcat_catalog::{import_catalog, to_document, to_json_string, ImportOptions, SiteUrls, Store};
//!
//! let store = Store::open("db.sqlite3")?;
//! let report = import_catalog(
//!     &store,
//!     &ImportOptions {
//!         document: "data.json".into(),
//!         data_root: "data".into(),
//!         media_root: "media".into(),
//!     },
//! )?;
//!
//! let urls = SiteUrls::new("https://catalog.example.org/", "/media/")?;
//! let graph = store.load_catalog_graph(report.catalog_id)?;
//! println!("{}", to_json_string(&to_document(&graph, &urls), true)?);
//! ```
//!
//! ## Load the vocabularies
//!
//! ```ignore
//! use dcat_catalog::{import_licences, import_media_types, Store};
//!
//! let store = Store::open("db.sqlite3")?;
//! import_media_types(&store, "filetypes.xml".as_ref())?;
//! import_licences(&store, "licences.xml".as_ref())?;
//! ```

pub mod config;
pub mod error;
pub mod fetch;
pub mod import;
pub mod jsonld;
pub mod model;
pub mod report;
pub mod store;
pub mod vocab;
pub mod vocabulary;

// Re-export main types for convenience
pub use crate::config::Config;
pub use crate::error::CatalogError;
pub use crate::fetch::{fetch_document, fetch_from_file, FetchOptions, FetchReport};
pub use crate::import::{
    import_catalog, import_document, ExportDocument, ImportOptions, ImportReport,
};
pub use crate::jsonld::{to_document, to_graph_document, to_json_string, LinkedData};
pub use crate::model::SiteUrls;
pub use crate::report::{ImportIssue, IssueKind, Issues, Severity};
pub use crate::store::{Lookup, Reference, ReferenceKind, Store, Table};
pub use crate::vocabulary::{import_licences, import_media_types, VocabularyReport};
