//! Import of a `data.json` export into the catalog store
//!
//! One run creates one catalog. Publishers, themes, keywords, media types
//! and licences are resolved against the reference store so re-running never
//! duplicates them; catalogs, datasets and distributions are always created
//! anew.
//!
//! Only missing top-level input is fatal, and it is detected before the
//! first write. Every problem with a single record is logged, collected in
//! the [`ImportReport`] and the run moves on to the next record.

pub mod document;
pub mod files;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use url::Url;

use crate::error::CatalogError;
use crate::model::{NewCatalog, NewDataset, NewDistribution};
use crate::report::{ImportIssue, IssueKind, Issues};
use crate::store::{Lookup, NewKeyword, NewTheme, Reference, ReferenceKind, Store};

pub use document::{raw_label, DatasetRecord, DistributionRecord, ExportDocument, Record};
pub use files::{LocatedFile, StoredFile};

#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// The export document, usually `data.json`
    pub document: PathBuf,
    /// Root of the `<dataset>/<distribution>/<file>` tree
    pub data_root: PathBuf,
    /// Where attached files are copied to
    pub media_root: PathBuf,
}

/// Summary of one import run
#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    pub catalog_id: i64,
    pub datasets: usize,
    pub distributions: usize,
    pub files_attached: usize,
    pub catalog_themes: usize,
    pub dataset_themes: usize,
    pub keywords_linked: usize,
    pub issues: Issues,
}

/// Import the export document named in `options`
pub fn import_catalog(
    store: &Store,
    options: &ImportOptions,
) -> Result<ImportReport, CatalogError> {
    if !options.document.is_file() {
        return Err(CatalogError::missing_input(
            "export document",
            &options.document,
        ));
    }
    if !options.data_root.is_dir() {
        return Err(CatalogError::missing_input("data root", &options.data_root));
    }

    let text = fs::read_to_string(&options.document)?;
    let document = ExportDocument::parse(&text)?;
    import_document(store, &document, &options.data_root, &options.media_root)
}

/// Import an already parsed document
pub fn import_document(
    store: &Store,
    document: &ExportDocument,
    data_root: &Path,
    media_root: &Path,
) -> Result<ImportReport, CatalogError> {
    let _span = tracing::info_span!("import", catalog = %document.title).entered();
    info!(
        datasets = document.dataset.len(),
        themes = document.theme_taxonomy.len(),
        "starting import"
    );

    let mut importer = Importer {
        store,
        data_root,
        media_root,
        report: ImportReport::default(),
    };
    importer.run(document)?;

    let report = importer.report;
    info!(
        catalog_id = report.catalog_id,
        datasets = report.datasets,
        distributions = report.distributions,
        files = report.files_attached,
        warnings = report.issues.warnings(),
        errors = report.issues.errors(),
        "import finished"
    );
    Ok(report)
}

struct Importer<'a> {
    store: &'a Store,
    data_root: &'a Path,
    media_root: &'a Path,
    report: ImportReport,
}

impl Importer<'_> {
    fn run(&mut self, document: &ExportDocument) -> Result<(), CatalogError> {
        let publisher_id = self.store.resolve_agent(&document.publisher.to_new_agent())?;
        let license_id = self.catalog_licence(document)?;
        let theme_ids = self.catalog_themes(document)?;

        let catalog_id = self.store.create_catalog(&NewCatalog {
            title: document.title.clone(),
            description: document.description.clone(),
            homepage: non_blank(&document.homepage).map(String::from),
            publisher_id,
            license_id,
        })?;
        self.report.catalog_id = catalog_id;
        for theme_id in theme_ids {
            if self.store.add_catalog_theme(catalog_id, theme_id)? {
                self.report.catalog_themes += 1;
            }
        }

        for record in &document.dataset {
            match record {
                Record::Valid(dataset) => self.import_dataset(catalog_id, dataset)?,
                Record::Invalid(raw) => self.report.issues.record(ImportIssue::warning(
                    IssueKind::MalformedRecord,
                    raw_label(raw),
                    "dataset record does not match the export schema, skipped",
                )),
            }
        }
        Ok(())
    }

    fn catalog_licence(&mut self, document: &ExportDocument) -> Result<Option<i64>, CatalogError> {
        let Some(code) = non_blank(&document.license) else {
            self.report.issues.record(ImportIssue::warning(
                IssueKind::UnresolvedReference(ReferenceKind::LicenceDocument),
                &document.title,
                "catalog does not declare a licence, leaving it unset",
            ));
            return Ok(None);
        };

        let found = self.find_licence(code)?;
        if found.is_none() {
            self.report.issues.record(ImportIssue::warning(
                IssueKind::UnresolvedReference(ReferenceKind::LicenceDocument),
                &document.title,
                format!(
                    "could not match catalog licence {} with a licence, leaving it unset",
                    code
                ),
            ));
        }
        Ok(found)
    }

    fn catalog_themes(&mut self, document: &ExportDocument) -> Result<Vec<i64>, CatalogError> {
        let mut ids = Vec::with_capacity(document.theme_taxonomy.len());
        for record in &document.theme_taxonomy {
            let theme = match record {
                Record::Valid(theme) => theme,
                Record::Invalid(raw) => {
                    self.report.issues.record(ImportIssue::warning(
                        IssueKind::MalformedRecord,
                        raw_label(raw),
                        "theme needs an id and a label, skipped",
                    ));
                    continue;
                }
            };

            let reference = Reference::Theme(NewTheme {
                code: theme.id.trim().to_string(),
                label: theme.label.clone(),
                description: theme.description.clone().filter(|d| !d.is_empty()),
            });
            match self.store.resolve_or_create(&reference, Lookup::CodeOnly)? {
                Some(resolved) => ids.push(resolved.id),
                None => self.report.issues.record(ImportIssue::warning(
                    IssueKind::MalformedRecord,
                    &theme.label,
                    "theme has an empty id, skipped",
                )),
            }
        }
        Ok(ids)
    }

    fn import_dataset(
        &mut self,
        catalog_id: i64,
        record: &DatasetRecord,
    ) -> Result<(), CatalogError> {
        let label = record.label().to_string();
        let _span = tracing::debug_span!("dataset", id = %label).entered();

        let publisher_id = match &record.publisher {
            Some(Record::Valid(publisher)) if !publisher.name.trim().is_empty() => {
                Some(self.store.resolve_agent(&publisher.to_new_agent())?)
            }
            None => None,
            Some(_) => {
                self.report.issues.record(ImportIssue::warning(
                    IssueKind::MalformedRecord,
                    &label,
                    "publisher has no usable name, dataset left without one",
                ));
                None
            }
        };

        let dataset_id = self.store.create_dataset(&NewDataset {
            catalog_id,
            title: record.title.clone(),
            description: non_blank(&record.description).map(String::from),
            publisher_id,
            issued: non_blank(&record.issued).map(String::from),
            modified: non_blank(&record.modified).map(String::from),
            landing_page: non_blank(&record.landing_page).map(String::from),
        })?;
        self.report.datasets += 1;

        for entry in &record.theme {
            let code = match entry {
                Record::Valid(code) => code.trim(),
                Record::Invalid(raw) => {
                    self.report.issues.record(ImportIssue::warning(
                        IssueKind::MalformedRecord,
                        &label,
                        format!("theme {} is not a code, not attached", raw),
                    ));
                    continue;
                }
            };
            match self.store.find(ReferenceKind::DataTheme, code)? {
                Some(theme_id) => {
                    if self.store.add_dataset_theme(dataset_id, theme_id)? {
                        self.report.dataset_themes += 1;
                    }
                }
                None => self.report.issues.record(ImportIssue::warning(
                    IssueKind::UnresolvedReference(ReferenceKind::DataTheme),
                    &label,
                    format!("theme {} does not exist, not attached", code),
                )),
            }
        }

        for entry in &record.keyword {
            let name = match entry {
                Record::Valid(name) => name.trim(),
                Record::Invalid(raw) => {
                    self.report.issues.record(ImportIssue::warning(
                        IssueKind::MalformedRecord,
                        &label,
                        format!("keyword {} is not text, skipped", raw),
                    ));
                    continue;
                }
            };
            let keyword = NewKeyword::new(name);
            if keyword.slug.is_empty() {
                debug!(keyword = %name, "keyword has no usable characters, skipped");
                continue;
            }
            let reference = Reference::Keyword(keyword);
            if let Some(resolved) = self.store.resolve_or_create(&reference, Lookup::CodeOnly)? {
                if self.store.add_dataset_keyword(dataset_id, resolved.id)? {
                    self.report.keywords_linked += 1;
                }
            }
        }

        for distribution in &record.distribution {
            match distribution {
                Record::Valid(distribution) => {
                    self.import_distribution(dataset_id, record, distribution)?
                }
                Record::Invalid(raw) => self.report.issues.record(ImportIssue::warning(
                    IssueKind::MalformedRecord,
                    raw_label(raw),
                    format!(
                        "distribution of dataset {} does not match the export schema, skipped",
                        label
                    ),
                )),
            }
        }
        Ok(())
    }

    fn import_distribution(
        &mut self,
        dataset_id: i64,
        dataset: &DatasetRecord,
        record: &DistributionRecord,
    ) -> Result<(), CatalogError> {
        let label = record.label().to_string();

        let local_file = self.local_file(dataset, record, &label);

        let mut external_download_url = None;
        if record.file_name().is_none() {
            // No file name: the content is hosted by another portal
            match record.download_url() {
                Some(url) => external_download_url = self.valid_url(url, "downloadURL", &label),
                None => self.report.issues.record(ImportIssue::error(
                    IssueKind::MissingAsset,
                    &label,
                    "distribution has neither a file name nor a download URL",
                )),
            }
        }
        let external_access_url = match non_blank(&record.access_url) {
            Some(url) => self.valid_url(url, "accessURL", &label),
            None => None,
        };

        let format_id = self.distribution_format(record, &label)?;
        let license_id = match non_blank(&record.license) {
            Some(code) => {
                let found = self.find_licence(code)?;
                if found.is_none() {
                    self.report.issues.record(ImportIssue::warning(
                        IssueKind::UnresolvedReference(ReferenceKind::LicenceDocument),
                        &label,
                        format!("could not match {} with a licence", code),
                    ));
                }
                found
            }
            None => None,
        };

        let (file, checksum_id) = match local_file {
            Some(source) => self.attach_file(dataset_id, record, &source, &label)?,
            None => (None, None),
        };

        self.store.create_distribution(&NewDistribution {
            dataset_id,
            title: record.title.clone().unwrap_or_default(),
            description: record.description.clone().unwrap_or_default(),
            file,
            external_download_url,
            external_access_url,
            format_id,
            license_id,
            checksum_id,
        })?;
        self.report.distributions += 1;
        Ok(())
    }

    /// The downloaded file of a distribution, if there is one
    fn local_file(
        &mut self,
        dataset: &DatasetRecord,
        record: &DistributionRecord,
        label: &str,
    ) -> Option<PathBuf> {
        let (Some(dataset_id), Some(distribution_id)) = (
            non_blank(&dataset.identifier),
            non_blank(&record.identifier),
        ) else {
            self.report.issues.record(ImportIssue::warning(
                IssueKind::MissingAsset,
                label,
                "dataset or distribution has no identifier, cannot look for a local file",
            ));
            return None;
        };

        match files::locate_file(self.data_root, dataset_id, distribution_id) {
            LocatedFile::Found(path) => Some(path),
            LocatedFile::Ambiguous { chosen, count } => {
                warn!(
                    distribution = %label,
                    count,
                    chosen = %chosen.display(),
                    "several files found, using the first"
                );
                Some(chosen)
            }
            LocatedFile::Missing { folder } => {
                self.report.issues.record(ImportIssue::warning(
                    IssueKind::MissingAsset,
                    label,
                    format!("{} does not have a file", folder.display()),
                ));
                None
            }
            LocatedFile::Rejected { identifier } => {
                self.report.issues.record(ImportIssue::warning(
                    IssueKind::MalformedRecord,
                    label,
                    format!(
                        "identifier {:?} is not a plain folder name, no local file used",
                        identifier
                    ),
                ));
                None
            }
        }
    }

    /// Copy a located file into the media root and record its checksum
    ///
    /// A copy failure is a per-record problem: the distribution is created
    /// without the file.
    fn attach_file(
        &mut self,
        dataset_id: i64,
        record: &DistributionRecord,
        source: &Path,
        label: &str,
    ) -> Result<(Option<String>, Option<i64>), CatalogError> {
        let name = record
            .file_name()
            .map(String::from)
            .or_else(|| {
                source
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| label.to_string());

        match files::store_file(self.media_root, dataset_id, &name, source) {
            Ok(stored) => {
                let checksum_id = self
                    .store
                    .create_checksum(&stored.sha256, files::CHECKSUM_ALGORITHM)?;
                self.report.files_attached += 1;
                debug!(distribution = %label, path = %stored.relative_path, "attached file");
                Ok((Some(stored.relative_path), Some(checksum_id)))
            }
            Err(e) => {
                self.report.issues.record(ImportIssue::error(
                    IssueKind::MissingAsset,
                    label,
                    format!("could not copy {}: {}", source.display(), e),
                ));
                Ok((None, None))
            }
        }
    }

    /// Resolve the format of a distribution
    ///
    /// A declared `format` code must match; without one the `mediaType` and
    /// then the file extension are tried silently.
    fn distribution_format(
        &mut self,
        record: &DistributionRecord,
        label: &str,
    ) -> Result<Option<i64>, CatalogError> {
        if let Some(code) = non_blank(&record.format) {
            let found = self.store.find(ReferenceKind::MediaType, code)?;
            if found.is_none() {
                self.report.issues.record(ImportIssue::warning(
                    IssueKind::UnresolvedReference(ReferenceKind::MediaType),
                    label,
                    format!("could not match {} with a media type", code),
                ));
            }
            return Ok(found);
        }

        if let Some(mime) = non_blank(&record.media_type) {
            if let Some(id) = self.store.find_media_type_by_mime(mime)? {
                return Ok(Some(id));
            }
        }

        let candidates = [
            record.file_name().map(String::from),
            record.download_url().map(url_file_name),
        ];
        for name in candidates.into_iter().flatten() {
            if let Some(extension) = extension_of(&name) {
                if let Some(id) = self.store.find_media_type_by_extension(extension)? {
                    return Ok(Some(id));
                }
            }
        }
        Ok(None)
    }

    /// Licence by code, falling back to a match on its URLs
    fn find_licence(&self, code: &str) -> Result<Option<i64>, CatalogError> {
        match self.store.find(ReferenceKind::LicenceDocument, code)? {
            Some(id) => Ok(Some(id)),
            None => self.store.find_licence_by_url(code),
        }
    }

    fn valid_url(&mut self, raw: &str, field: &str, label: &str) -> Option<String> {
        match Url::parse(raw) {
            Ok(_) => Some(raw.to_string()),
            Err(e) => {
                self.report.issues.record(ImportIssue::warning(
                    IssueKind::MalformedRecord,
                    label,
                    format!("{} {} is not a valid URL ({}), leaving it unset", field, raw, e),
                ));
                None
            }
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Last path segment of a URL, or the input when it does not parse
fn url_file_name(raw: &str) -> String {
    Url::parse(raw)
        .ok()
        .and_then(|url| {
            url.path_segments()
                .and_then(|mut segments| segments.next_back().map(String::from))
        })
        .unwrap_or_else(|| raw.to_string())
}

fn extension_of(name: &str) -> Option<&str> {
    let (stem, extension) = name.rsplit_once('.')?;
    if stem.is_empty() || extension.is_empty() || extension.contains('/') {
        None
    } else {
        Some(extension)
    }
}
