//! Locating downloaded distribution files and copying them into the media root

use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

use sha2::{Digest, Sha256};

/// Algorithm recorded for checksums computed here
pub const CHECKSUM_ALGORITHM: &str = "sha256";

/// Outcome of looking for the file of a distribution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocatedFile {
    /// Exactly one file in the distribution folder
    Found(PathBuf),
    /// Several files; the first in name order is used
    Ambiguous { chosen: PathBuf, count: usize },
    /// No folder, or a folder without regular files
    Missing { folder: PathBuf },
    /// An identifier that is not a single folder name, never looked up
    Rejected { identifier: String },
}

/// `id` when it names exactly one entry inside a folder
///
/// Absolute paths, `..`, `.` and anything with a separator are refused, so
/// joining the result onto a root can never leave that root.
pub fn path_segment(id: &str) -> Option<&str> {
    let mut components = Path::new(id).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) if name == id => Some(id),
        _ => None,
    }
}

/// Look for the file of a distribution under
/// `<data_root>/<dataset_id>/<distribution_id>/`
pub fn locate_file(data_root: &Path, dataset_id: &str, distribution_id: &str) -> LocatedFile {
    for id in [dataset_id, distribution_id] {
        if path_segment(id).is_none() {
            return LocatedFile::Rejected {
                identifier: id.to_string(),
            };
        }
    }
    let folder = data_root.join(dataset_id).join(distribution_id);

    let mut files: Vec<PathBuf> = match fs::read_dir(&folder) {
        Ok(entries) => entries
            .flatten()
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|entry| entry.path())
            .collect(),
        Err(_) => Vec::new(),
    };
    files.sort();

    let count = files.len();
    let mut files = files.into_iter();
    match (files.next(), count) {
        (None, _) => LocatedFile::Missing { folder },
        (Some(path), 1) => LocatedFile::Found(path),
        (Some(chosen), count) => LocatedFile::Ambiguous { chosen, count },
    }
}

/// A file copied into the media root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Path relative to the media root, `/`-separated
    pub relative_path: String,
    /// Lowercase hex SHA-256 of the content
    pub sha256: String,
}

/// Copy `source` to `<media_root>/files/datasets/<dataset_pk>/<name>`
///
/// An existing file is never overwritten: the name gets a `_<n>` suffix
/// before its extension instead.
pub fn store_file(
    media_root: &Path,
    dataset_pk: i64,
    name: &str,
    source: &Path,
) -> io::Result<StoredFile> {
    let relative_dir = format!("files/datasets/{}", dataset_pk);
    let dir = media_root.join(&relative_dir);
    fs::create_dir_all(&dir)?;

    let name = sanitize_file_name(name);
    let (target, file_name) = available_name(&dir, &name);
    fs::copy(source, &target)?;

    Ok(StoredFile {
        relative_path: format!("{}/{}", relative_dir, file_name),
        sha256: sha256_file(&target)?,
    })
}

/// Streaming SHA-256 of a file, as lowercase hex
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Keep the last path component and drop characters that are awkward in URLs
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name).trim();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}

fn available_name(dir: &Path, name: &str) -> (PathBuf, String) {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return (candidate, name.to_string());
    }

    let (stem, extension) = match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    };
    let mut n = 1;
    loop {
        let file_name = format!("{}_{}{}", stem, n, extension);
        let candidate = dir.join(&file_name);
        if !candidate.exists() {
            return (candidate, file_name);
        }
        n += 1;
    }
}
