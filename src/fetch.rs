//! Bulk download of distribution files ahead of an import
//!
//! Files land in `<data_root>/<dataset>/<distribution>/<file>`, the layout
//! the importer looks for. A distribution whose folder already exists is
//! assumed to be downloaded and left alone, so an interrupted run can simply
//! be started again. Datasets are spread over a bounded pool of threads.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::error::CatalogError;
use crate::import::files::path_segment;
use crate::import::{DatasetRecord, DistributionRecord, ExportDocument};

/// Name used when a URL path ends with `/`
const INDEX_FILE: &str = "index.html";

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub data_root: PathBuf,
    pub workers: usize,
    pub connect_timeout: Duration,
    /// Attempts per file, the first one included
    pub tries: u32,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("data"),
            workers: 8,
            connect_timeout: Duration::from_secs(3),
            tries: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub dataset: String,
    pub distribution: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    pub datasets: usize,
    pub downloaded: usize,
    pub already_present: usize,
    pub failures: Vec<FetchFailure>,
}

impl FetchReport {
    fn merge(&mut self, other: FetchReport) {
        self.datasets += other.datasets;
        self.downloaded += other.downloaded;
        self.already_present += other.already_present;
        self.failures.extend(other.failures);
    }
}

/// Read an export document and download every distribution it lists
pub fn fetch_from_file(
    document: &Path,
    options: &FetchOptions,
) -> Result<FetchReport, CatalogError> {
    if !document.is_file() {
        return Err(CatalogError::missing_input("export document", document));
    }
    let document = ExportDocument::parse(&fs::read_to_string(document)?)?;
    fetch_document(&document, options)
}

pub fn fetch_document(
    document: &ExportDocument,
    options: &FetchOptions,
) -> Result<FetchReport, CatalogError> {
    fs::create_dir_all(&options.data_root)?;
    let client = Client::builder()
        .connect_timeout(options.connect_timeout)
        .build()
        .map_err(|e| CatalogError::Fetch {
            url: String::new(),
            reason: format!("could not build HTTP client: {}", e),
        })?;

    let datasets: Vec<&DatasetRecord> = document.datasets().collect();
    let workers = options.workers.clamp(1, datasets.len().max(1));
    let next = AtomicUsize::new(0);
    info!(datasets = datasets.len(), workers, "starting downloads");

    let mut report = FetchReport::default();
    let (datasets, next, client) = (&datasets, &next, &client);
    thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                scope.spawn(move || {
                    let mut local = FetchReport::default();
                    loop {
                        let index = next.fetch_add(1, Ordering::Relaxed);
                        let Some(dataset) = datasets.get(index) else {
                            break;
                        };
                        local.merge(fetch_dataset(client, dataset, options));
                    }
                    local
                })
            })
            .collect();

        for handle in handles {
            match handle.join() {
                Ok(local) => report.merge(local),
                Err(_) => error!("download worker panicked"),
            }
        }
    });

    info!(
        downloaded = report.downloaded,
        already_present = report.already_present,
        failed = report.failures.len(),
        "finished downloading all resources"
    );
    Ok(report)
}

fn fetch_dataset(client: &Client, dataset: &DatasetRecord, options: &FetchOptions) -> FetchReport {
    let mut report = FetchReport {
        datasets: 1,
        ..Default::default()
    };
    let label = dataset.label().to_string();

    let dataset_id = match dataset.identifier.as_deref().filter(|id| !id.is_empty()) {
        None => Err("dataset has no identifier".to_string()),
        Some(id) => path_segment(id)
            .ok_or_else(|| format!("identifier {:?} is not a plain folder name", id)),
    };
    let dataset_id = match dataset_id {
        Ok(id) => id,
        Err(reason) => {
            error!(dataset = %label, "{}, nothing downloaded", reason);
            report.failures.push(FetchFailure {
                dataset: label,
                distribution: String::new(),
                reason,
            });
            return report;
        }
    };
    let dataset_dir = options.data_root.join(dataset_id);
    if let Err(e) = fs::create_dir_all(&dataset_dir) {
        error!(dataset = %label, error = %e, "could not create dataset folder");
        report.failures.push(FetchFailure {
            dataset: label,
            distribution: String::new(),
            reason: e.to_string(),
        });
        return report;
    }

    info!(
        dataset = %dataset.title,
        resources = dataset.distribution.len(),
        "downloading resources"
    );
    for distribution in dataset.distributions() {
        let fetched = fetch_distribution(client, &dataset_dir, distribution, options, &mut report);
        if let Err(reason) = fetched {
            error!(dataset = %label, distribution = %distribution.label(), "{}", reason);
            report.failures.push(FetchFailure {
                dataset: label.clone(),
                distribution: distribution.label().to_string(),
                reason,
            });
        }
    }
    report
}

fn fetch_distribution(
    client: &Client,
    dataset_dir: &Path,
    distribution: &DistributionRecord,
    options: &FetchOptions,
    report: &mut FetchReport,
) -> Result<(), String> {
    let distribution_id = match distribution.identifier.as_deref().filter(|id| !id.is_empty()) {
        Some(id) => path_segment(id)
            .ok_or_else(|| format!("identifier {:?} is not a plain folder name", id))?,
        None => return Err("distribution has no identifier".to_string()),
    };
    let dir = dataset_dir.join(distribution_id);
    if dir.exists() {
        debug!(path = %dir.display(), "already downloaded");
        report.already_present += 1;
        return Ok(());
    }

    let Some(url) = distribution.download_url() else {
        return Err(format!(
            "resource {} does not have a download URL",
            distribution.label()
        ));
    };

    fs::create_dir_all(&dir).map_err(|e| e.to_string())?;
    match download(client, url, &dir, options.tries) {
        Ok(path) => {
            debug!(url, path = %path.display(), "downloaded");
            report.downloaded += 1;
            Ok(())
        }
        Err(e) => {
            // Leave no folder behind so the next run tries again
            let _ = fs::remove_dir_all(&dir);
            Err(e.to_string())
        }
    }
}

/// Download `url` into `dir`, trying up to `tries` times
pub fn download(
    client: &Client,
    url: &str,
    dir: &Path,
    tries: u32,
) -> Result<PathBuf, CatalogError> {
    let target = dir.join(file_name_for_url(url));
    let tries = tries.max(1);

    let mut last_error = String::new();
    for attempt in 1..=tries {
        match download_once(client, url, &target) {
            Ok(()) => return Ok(target),
            Err(reason) => {
                if attempt < tries {
                    warn!(url, attempt, %reason, "download failed, retrying");
                }
                last_error = reason;
            }
        }
    }

    let _ = fs::remove_file(&target);
    Err(CatalogError::Fetch {
        url: url.to_string(),
        reason: last_error,
    })
}

fn download_once(client: &Client, url: &str, target: &Path) -> Result<(), String> {
    let mut response = client
        .get(url)
        .send()
        .and_then(|r| r.error_for_status())
        .map_err(|e| format!("HTTP request failed: {}", e))?;
    let mut file = File::create(target).map_err(|e| e.to_string())?;
    response
        .copy_to(&mut file)
        .map_err(|e| format!("failed to read response: {}", e))?;
    Ok(())
}

/// File name a URL is saved under: its last path segment
pub fn file_name_for_url(url: &str) -> String {
    let segment = Url::parse(url).ok().and_then(|parsed| {
        parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back().map(String::from))
    });
    match segment {
        Some(name) if path_segment(&name).is_some() => name,
        _ => INDEX_FILE.to_string(),
    }
}
