//! Per-record problems found while importing
//!
//! Problems with a single record never abort a run. They are logged where
//! they are detected and collected here, tagged with the identifier of the
//! offending record so an operator can fix the source data.

use std::fmt;

use tracing::{error, warn};

use crate::store::ReferenceKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueKind {
    /// A declared code matched no stored reference row
    UnresolvedReference(ReferenceKind),
    /// A distribution has no local file, or nothing to download at all
    MissingAsset,
    /// An export record lacks a required field or has an invalid value
    MalformedRecord,
    /// A vocabulary row lacks a required sub-field and was skipped
    MalformedVocabularyRecord,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueKind::UnresolvedReference(kind) => write!(f, "unresolved {}", kind.as_str()),
            IssueKind::MissingAsset => f.write_str("missing asset"),
            IssueKind::MalformedRecord => f.write_str("malformed record"),
            IssueKind::MalformedVocabularyRecord => f.write_str("malformed vocabulary record"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportIssue {
    pub kind: IssueKind,
    pub severity: Severity,
    /// Identifier (or title) of the record the issue belongs to
    pub record: String,
    pub detail: String,
}

impl ImportIssue {
    pub fn warning(kind: IssueKind, record: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Warning,
            record: record.into(),
            detail: detail.into(),
        }
    }

    pub fn error(kind: IssueKind, record: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Error,
            record: record.into(),
            detail: detail.into(),
        }
    }

    fn log(&self) {
        match self.severity {
            Severity::Warning => warn!(kind = %self.kind, record = %self.record, "{}", self.detail),
            Severity::Error => error!(kind = %self.kind, record = %self.record, "{}", self.detail),
        }
    }
}

impl fmt::Display for ImportIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.record, self.kind, self.detail)
    }
}

/// Ordered collection of issues; every issue is logged when recorded
#[derive(Debug, Clone, Default)]
pub struct Issues(Vec<ImportIssue>);

impl Issues {
    pub fn record(&mut self, issue: ImportIssue) {
        issue.log();
        self.0.push(issue);
    }

    pub fn all(&self) -> &[ImportIssue] {
        &self.0
    }

    pub fn of_kind(&self, kind: IssueKind) -> impl Iterator<Item = &ImportIssue> {
        self.0.iter().filter(move |i| i.kind == kind)
    }

    pub fn warnings(&self) -> usize {
        self.0
            .iter()
            .filter(|i| i.severity == Severity::Warning)
            .count()
    }

    pub fn errors(&self) -> usize {
        self.0
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}
