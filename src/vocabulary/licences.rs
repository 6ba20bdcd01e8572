//! EU licence vocabulary (`licences.xml`)

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::error::CatalogError;
use crate::report::{ImportIssue, IssueKind};
use crate::store::{Lookup, NewLicence, Reference, Store};
use crate::vocabulary::{parse_tree, VocabularyReport, XmlElement};

pub const SOURCE_URL: &str = "https://op.europa.eu/s/y52h";

/// Language of the label kept for each licence
const LABEL_LANGUAGE: &str = "eng";

/// Import the non-deprecated `<record>`s of the licence table
pub fn import_licences(store: &Store, path: &Path) -> Result<VocabularyReport, CatalogError> {
    if !path.is_file() {
        return Err(CatalogError::missing_input("licences vocabulary", path));
    }
    let root = parse_tree(&fs::read_to_string(path)?)?;

    let mut report = VocabularyReport::default();
    for record in root.children_named("record") {
        import_record(store, record, &mut report)?;
    }

    info!(
        created = report.created,
        existing = report.existing,
        deprecated = report.skipped_deprecated,
        "imported licences"
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

    if record.attr("deprecated") == Some("true") {
        debug!(code = label, "licence is deprecated, skipped");
        report.skipped_deprecated += 1;
        return Ok(());
    }

    let english = record.child("label").and_then(|labels| {
        labels
            .children_named("lg.version")
            .find(|version| version.attr("lg") == Some(LABEL_LANGUAGE))
            .map(|version| version.text.trim())
            .filter(|text| !text.is_empty())
    });
    let Some(english) = english else {
        report.issues.record(ImportIssue::warning(
            IssueKind::MalformedVocabularyRecord,
            label,
            "licence does not have an English label, skipped",
        ));
        return Ok(());
    };

    let url_general = record.child_text("url.general").map(String::from);
    if url_general.is_none() {
        debug!(code = label, "licence has no url.general");
    }
    let url_document = record.child_text("url.document").map(String::from);

    let licence = NewLicence {
        code: code.map(String::from),
        label: english.to_string(),
        url_general,
        url_document,
    };
    match store.resolve_or_create(&Reference::Licence(licence), Lookup::AttributeFallback)? {
        Some(resolved) if resolved.created => report.created += 1,
        Some(_) => {
            debug!(code = label, "licence already exists");
            report.existing += 1;
        }
        None => {}
    }
    Ok(())
}
