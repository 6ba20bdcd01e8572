//! EU file-type vocabulary (`filetypes.xml`)

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::error::CatalogError;
use crate::report::{ImportIssue, IssueKind};
use crate::store::{Lookup, NewMediaType, Reference, Store};
use crate::vocabulary::{parse_tree, VocabularyReport, XmlElement};

/// Where the vocabulary can be downloaded
pub const SOURCE_URL: &str = "https://op.europa.eu/s/y52f";

/// Import every `<record>` of the file-type table as a media type
///
/// Records without a `file-extension` are reported and skipped. Existing
/// codes are left untouched, so the import can be repeated.
pub fn import_media_types(store: &Store, path: &Path) -> Result<VocabularyReport, CatalogError> {
    if !path.is_file() {
        return Err(CatalogError::missing_input("file types vocabulary", path));
    }
    let root = parse_tree(&fs::read_to_string(path)?)?;

    let mut report = VocabularyReport::default();
    for record in root.children_named("record") {
        import_record(store, record, &mut report)?;
    }

    info!(
        created = report.created,
        existing = report.existing,
        skipped = report.skipped(),
        "imported file types"
    );
    Ok(report)
}

fn import_record(
    store: &Store,
    record: &XmlElement,
    report: &mut VocabularyReport,
) -> Result<(), CatalogError> {
    let code = record.child_text("authority-code");
    let label = code.or_else(|| record.attr("id")).unwrap_or("<no authority code>");

    let Some(extension) = record.child_text("file-extension") else {
        report.issues.record(ImportIssue::warning(
            IssueKind::MalformedVocabularyRecord,
            label,
            "file type does not have a file extension, skipped",
        ));
        return Ok(());
    };

    let media_type = NewMediaType {
        code: code.map(String::from),
        extension: extension.to_string(),
        media_type: record
            .child_text("internet-media-type")
            .unwrap_or_default()
            .to_string(),
        description: record
            .path_text("sources/source/description")
            .unwrap_or_default()
            .to_string(),
    };

    match store.resolve_or_create(&Reference::MediaType(media_type), Lookup::AttributeFallback)? {
        Some(resolved) if resolved.created => report.created += 1,
        Some(_) => {
            debug!(code = label, "file type already exists");
            report.existing += 1;
        }
        None => {}
    }
    Ok(())
}
