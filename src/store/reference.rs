//! Reference vocabularies: media types, licences, data themes and keywords
//!
//! Reference rows are keyed by a stable external code (the slug for
//! keywords). Resolution is get-or-create and safe to repeat: the code
//! columns carry UNIQUE constraints, rows are inserted with
//! `ON CONFLICT DO NOTHING` and then selected again, so two importers racing
//! on the same code end up sharing one row.

use rusqlite::{params, OptionalExtension, Row};
use tracing::debug;

use crate::error::CatalogError;
use crate::model::{DataTheme, Keyword, LicenceDocument, MediaType};
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    MediaType,
    LicenceDocument,
    DataTheme,
    Keyword,
}

impl ReferenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceKind::MediaType => "media type",
            ReferenceKind::LicenceDocument => "licence",
            ReferenceKind::DataTheme => "theme",
            ReferenceKind::Keyword => "keyword",
        }
    }

    fn table(&self) -> &'static str {
        match self {
            ReferenceKind::MediaType => "media_type",
            ReferenceKind::LicenceDocument => "licence_document",
            ReferenceKind::DataTheme => "data_theme",
            ReferenceKind::Keyword => "keyword",
        }
    }

    fn key_column(&self) -> &'static str {
        match self {
            ReferenceKind::Keyword => "slug",
            _ => "code",
        }
    }
}

/// What to do when a reference comes without a code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// No code, no match
    CodeOnly,
    /// Match by extension (media types) or label (licences, themes) instead
    AttributeFallback,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewMediaType {
    pub code: Option<String>,
    pub extension: String,
    pub media_type: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewLicence {
    pub code: Option<String>,
    pub label: String,
    pub url_general: Option<String>,
    pub url_document: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTheme {
    pub code: String,
    pub label: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewKeyword {
    pub name: String,
    pub slug: String,
}

impl NewKeyword {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let slug = Keyword::slugify(&name);
        Self { name, slug }
    }
}

/// A reference entity to resolve, with the attributes used on creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    MediaType(NewMediaType),
    Licence(NewLicence),
    Theme(NewTheme),
    Keyword(NewKeyword),
}

impl Reference {
    pub fn kind(&self) -> ReferenceKind {
        match self {
            Reference::MediaType(_) => ReferenceKind::MediaType,
            Reference::Licence(_) => ReferenceKind::LicenceDocument,
            Reference::Theme(_) => ReferenceKind::DataTheme,
            Reference::Keyword(_) => ReferenceKind::Keyword,
        }
    }

    /// The lookup key, if the reference has a usable one
    pub fn code(&self) -> Option<&str> {
        let code = match self {
            Reference::MediaType(m) => m.code.as_deref(),
            Reference::Licence(l) => l.code.as_deref(),
            Reference::Theme(t) => Some(t.code.as_str()),
            Reference::Keyword(k) => Some(k.slug.as_str()),
        };
        code.map(str::trim).filter(|c| !c.is_empty())
    }
}

/// Outcome of a successful resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    pub id: i64,
    /// Whether this call inserted the row
    pub created: bool,
}

impl Store {
    /// Get or create a reference row
    ///
    /// Returns `None` when the reference has no code and `lookup` does not
    /// allow matching on other attributes, or when the fallback finds nothing
    /// it may create (themes are never created without a code).
    pub fn resolve_or_create(
        &self,
        reference: &Reference,
        lookup: Lookup,
    ) -> Result<Option<Resolved>, CatalogError> {
        let kind = reference.kind();
        match reference.code() {
            Some(code) => {
                if let Some(id) = self.find(kind, code)? {
                    return Ok(Some(Resolved { id, created: false }));
                }
                let created = self.insert_reference(reference, Some(code))?;
                // Another writer may have won the race; the row exists either way
                let id = self.find(kind, code)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
                if created {
                    debug!(kind = kind.as_str(), code, id, "created reference row");
                }
                Ok(Some(Resolved { id, created }))
            }
            None => match lookup {
                Lookup::CodeOnly => Ok(None),
                Lookup::AttributeFallback => self.resolve_by_attribute(reference),
            },
        }
    }

    /// Find the id of a reference row by its code (slug for keywords)
    pub fn find(&self, kind: ReferenceKind, code: &str) -> Result<Option<i64>, CatalogError> {
        let sql = format!(
            "SELECT id FROM {} WHERE {} = ?1",
            kind.table(),
            kind.key_column()
        );
        Ok(self
            .conn()
            .query_row(&sql, [code.trim()], |row| row.get(0))
            .optional()?)
    }

    /// Case-insensitive match on the file extension, leading dots ignored on
    /// both sides
    pub fn find_media_type_by_extension(
        &self,
        extension: &str,
    ) -> Result<Option<i64>, CatalogError> {
        let extension = extension.trim().trim_start_matches('.');
        if extension.is_empty() {
            return Ok(None);
        }
        Ok(self
            .conn()
            .query_row(
                "SELECT id FROM media_type WHERE lower(ltrim(extension, '.')) = lower(?1)
                 ORDER BY id LIMIT 1",
                [extension],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// Match on the internet media type, e.g. `text/csv`
    pub fn find_media_type_by_mime(&self, mime: &str) -> Result<Option<i64>, CatalogError> {
        let mime = mime.trim();
        if mime.is_empty() {
            return Ok(None);
        }
        Ok(self
            .conn()
            .query_row(
                "SELECT id FROM media_type WHERE lower(media_type) = lower(?1) ORDER BY id LIMIT 1",
                [mime],
                |row| row.get(0),
            )
            .optional()?)
    }

    /// Match a licence on either of its URLs
    pub fn find_licence_by_url(&self, url: &str) -> Result<Option<i64>, CatalogError> {
        let url = url.trim();
        if url.is_empty() {
            return Ok(None);
        }
        Ok(self
            .conn()
            .query_row(
                "SELECT id FROM licence_document
                 WHERE url_general = ?1 OR url_document = ?1 ORDER BY id LIMIT 1",
                [url],
                |row| row.get(0),
            )
            .optional()?)
    }

    pub fn get_media_type(&self, id: i64) -> Result<MediaType, CatalogError> {
        self.conn()
            .query_row(
                "SELECT id, extension, code, media_type, description FROM media_type WHERE id = ?1",
                [id],
                media_type_from_row,
            )
            .optional()?
            .ok_or(CatalogError::NotFound {
                entity: "media type",
                id,
            })
    }

    pub fn get_licence(&self, id: i64) -> Result<LicenceDocument, CatalogError> {
        self.conn()
            .query_row(
                "SELECT id, label, code, url_general, url_document
                 FROM licence_document WHERE id = ?1",
                [id],
                licence_from_row,
            )
            .optional()?
            .ok_or(CatalogError::NotFound {
                entity: "licence",
                id,
            })
    }

    pub fn get_theme(&self, id: i64) -> Result<DataTheme, CatalogError> {
        self.conn()
            .query_row(
                "SELECT id, code, label, description FROM data_theme WHERE id = ?1",
                [id],
                theme_from_row,
            )
            .optional()?
            .ok_or(CatalogError::NotFound { entity: "theme", id })
    }

    /// Themes attached to a catalog, in the order they were linked
    pub fn themes_of_catalog(&self, catalog_id: i64) -> Result<Vec<DataTheme>, CatalogError> {
        let mut stmt = self.conn().prepare(
            "SELECT t.id, t.code, t.label, t.description
             FROM data_theme t JOIN catalog_theme ct ON ct.theme_id = t.id
             WHERE ct.catalog_id = ?1 ORDER BY ct.rowid",
        )?;
        let themes = stmt
            .query_map([catalog_id], theme_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(themes)
    }

    /// Themes attached to a dataset, in the order they were linked
    pub fn themes_of_dataset(&self, dataset_id: i64) -> Result<Vec<DataTheme>, CatalogError> {
        let mut stmt = self.conn().prepare(
            "SELECT t.id, t.code, t.label, t.description
             FROM data_theme t JOIN dataset_theme dt ON dt.theme_id = t.id
             WHERE dt.dataset_id = ?1 ORDER BY dt.rowid",
        )?;
        let themes = stmt
            .query_map([dataset_id], theme_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(themes)
    }

    /// Keywords attached to a dataset, in the order they were linked
    pub fn keywords_of_dataset(&self, dataset_id: i64) -> Result<Vec<Keyword>, CatalogError> {
        let mut stmt = self.conn().prepare(
            "SELECT k.id, k.name, k.slug
             FROM keyword k JOIN dataset_keyword dk ON dk.keyword_id = k.id
             WHERE dk.dataset_id = ?1 ORDER BY dk.rowid",
        )?;
        let keywords = stmt
            .query_map([dataset_id], |row| {
                Ok(Keyword {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    slug: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keywords)
    }

    /// Media types served by a data service, in the order they were linked
    pub fn media_types_of_service(
        &self,
        service_id: i64,
    ) -> Result<Vec<MediaType>, CatalogError> {
        let mut stmt = self.conn().prepare(
            "SELECT m.id, m.extension, m.code, m.media_type, m.description
             FROM media_type m JOIN data_service_media_type sm ON sm.media_type_id = m.id
             WHERE sm.service_id = ?1 ORDER BY sm.rowid",
        )?;
        let media_types = stmt
            .query_map([service_id], media_type_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(media_types)
    }

    /// Insert a reference row, ignoring a conflict on its code
    ///
    /// Returns whether a row was inserted.
    fn insert_reference(
        &self,
        reference: &Reference,
        code: Option<&str>,
    ) -> Result<bool, CatalogError> {
        let inserted = match reference {
            Reference::MediaType(m) => self.conn().execute(
                "INSERT INTO media_type (extension, code, media_type, description)
                 VALUES (?1, ?2, ?3, ?4) ON CONFLICT DO NOTHING",
                params![m.extension, code, m.media_type, m.description],
            )?,
            Reference::Licence(l) => self.conn().execute(
                "INSERT INTO licence_document (label, code, url_general, url_document)
                 VALUES (?1, ?2, ?3, ?4) ON CONFLICT DO NOTHING",
                params![l.label, code, l.url_general, l.url_document],
            )?,
            Reference::Theme(t) => self.conn().execute(
                "INSERT INTO data_theme (code, label, description)
                 VALUES (?1, ?2, ?3) ON CONFLICT DO NOTHING",
                params![code, t.label, t.description],
            )?,
            Reference::Keyword(k) => self.conn().execute(
                "INSERT INTO keyword (name, slug) VALUES (?1, ?2) ON CONFLICT DO NOTHING",
                params![k.name, code],
            )?,
        };
        Ok(inserted > 0)
    }

    fn resolve_by_attribute(
        &self,
        reference: &Reference,
    ) -> Result<Option<Resolved>, CatalogError> {
        let existing = match reference {
            Reference::MediaType(m) => {
                if m.extension.trim().is_empty() {
                    return Ok(None);
                }
                self.find_media_type_by_extension(&m.extension)?
            }
            Reference::Licence(l) => {
                if l.label.trim().is_empty() {
                    return Ok(None);
                }
                self.conn()
                    .query_row(
                        "SELECT id FROM licence_document WHERE label = ?1 ORDER BY id LIMIT 1",
                        [l.label.trim()],
                        |row| row.get(0),
                    )
                    .optional()?
            }
            Reference::Theme(t) => {
                return Ok(self
                    .conn()
                    .query_row(
                        "SELECT id FROM data_theme WHERE label = ?1 ORDER BY id LIMIT 1",
                        [t.label.trim()],
                        |row| row.get(0),
                    )
                    .optional()?
                    .map(|id| Resolved { id, created: false }));
            }
            // A keyword without a slug has nothing to match on
            Reference::Keyword(_) => return Ok(None),
        };

        if let Some(id) = existing {
            return Ok(Some(Resolved { id, created: false }));
        }
        self.insert_reference(reference, None)?;
        let id = self.conn().last_insert_rowid();
        debug!(kind = reference.kind().as_str(), id, "created code-less reference row");
        Ok(Some(Resolved { id, created: true }))
    }
}

fn media_type_from_row(row: &Row) -> rusqlite::Result<MediaType> {
    Ok(MediaType {
        id: row.get(0)?,
        extension: row.get(1)?,
        code: row.get(2)?,
        media_type: row.get(3)?,
        description: row.get(4)?,
    })
}

fn licence_from_row(row: &Row) -> rusqlite::Result<LicenceDocument> {
    Ok(LicenceDocument {
        id: row.get(0)?,
        label: row.get(1)?,
        code: row.get(2)?,
        url_general: row.get(3)?,
        url_document: row.get(4)?,
    })
}

fn theme_from_row(row: &Row) -> rusqlite::Result<DataTheme> {
    Ok(DataTheme {
        id: row.get(0)?,
        code: row.get(1)?,
        label: row.get(2)?,
        description: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Table;

    fn csv(code: Option<&str>) -> Reference {
        Reference::MediaType(NewMediaType {
            code: code.map(String::from),
            extension: "csv".to_string(),
            media_type: "text/csv".to_string(),
            description: "Comma-separated values".to_string(),
        })
    }

    #[test]
    fn test_resolve_or_create_is_idempotent() {
        let store = Store::open_in_memory().unwrap();

        let first = store.resolve_or_create(&csv(Some("CSV")), Lookup::CodeOnly).unwrap().unwrap();
        let second = store.resolve_or_create(&csv(Some("CSV")), Lookup::CodeOnly).unwrap().unwrap();

        assert_eq!(first.id, second.id);
        assert!(first.created);
        assert!(!second.created);
        assert_eq!(store.count(Table::MediaType).unwrap(), 1);
    }

    #[test]
    fn test_code_only_without_code_is_no_match() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.resolve_or_create(&csv(None), Lookup::CodeOnly).unwrap(), None);
        assert_eq!(store.resolve_or_create(&csv(Some("  ")), Lookup::CodeOnly).unwrap(), None);
        assert_eq!(store.count(Table::MediaType).unwrap(), 0);
    }

    #[test]
    fn test_attribute_fallback_matches_extension() {
        let store = Store::open_in_memory().unwrap();
        let coded = store.resolve_or_create(&csv(Some("CSV")), Lookup::CodeOnly).unwrap().unwrap();

        let fallback = store
            .resolve_or_create(&csv(None), Lookup::AttributeFallback)
            .unwrap()
            .unwrap();
        assert_eq!(fallback.id, coded.id);
        assert_eq!(store.count(Table::MediaType).unwrap(), 1);
    }

    #[test]
    fn test_attribute_fallback_creates_codeless_row_once() {
        let store = Store::open_in_memory().unwrap();
        let licence = Reference::Licence(NewLicence {
            code: None,
            label: "Open Government Licence".to_string(),
            ..Default::default()
        });

        let first = store.resolve_or_create(&licence, Lookup::AttributeFallback).unwrap().unwrap();
        let second = store.resolve_or_create(&licence, Lookup::AttributeFallback).unwrap().unwrap();
        assert!(first.created);
        assert_eq!(first.id, second.id);
        assert_eq!(store.get_licence(first.id).unwrap().code, None);
    }

    #[test]
    fn test_get_theme() {
        let store = Store::open_in_memory().unwrap();
        let theme = Reference::Theme(NewTheme {
            code: "AGRI".to_string(),
            label: "Agriculture, fisheries, forestry and food".to_string(),
            description: None,
        });
        let id = store.resolve_or_create(&theme, Lookup::CodeOnly).unwrap().unwrap().id;

        let loaded = store.get_theme(id).unwrap();
        assert_eq!(loaded.code, "AGRI");
        assert_eq!(loaded.label, "Agriculture, fisheries, forestry and food");
        assert!(matches!(
            store.get_theme(id + 1),
            Err(CatalogError::NotFound { entity: "theme", .. })
        ));
    }

    #[test]
    fn test_theme_is_never_created_without_code() {
        let store = Store::open_in_memory().unwrap();
        let theme = Reference::Theme(NewTheme {
            code: String::new(),
            label: "Agriculture".to_string(),
            description: None,
        });
        assert_eq!(store.resolve_or_create(&theme, Lookup::AttributeFallback).unwrap(), None);
        assert_eq!(store.count(Table::DataTheme).unwrap(), 0);
    }

    #[test]
    fn test_keywords_resolve_by_slug() {
        let store = Store::open_in_memory().unwrap();
        let keyword = |name: &str| {
            store
                .resolve_or_create(&Reference::Keyword(NewKeyword::new(name)), Lookup::CodeOnly)
                .unwrap()
                .unwrap()
        };
        let a = keyword("Food Security");
        let b = keyword("food security");
        assert_eq!(a.id, b.id);
        assert_eq!(store.count(Table::Keyword).unwrap(), 1);
    }

    #[test]
    fn test_find_helpers() {
        let store = Store::open_in_memory().unwrap();
        let csv_id = store
            .resolve_or_create(&csv(Some("CSV")), Lookup::CodeOnly)
            .unwrap()
            .unwrap()
            .id;
        let licence_id = store
            .resolve_or_create(
                &Reference::Licence(NewLicence {
                    code: Some("CC_BY_4_0".to_string()),
                    label: "Creative Commons Attribution 4.0 International".to_string(),
                    url_general: Some("https://creativecommons.org/licenses/by/4.0/".to_string()),
                    url_document: None,
                }),
                Lookup::CodeOnly,
            )
            .unwrap()
            .unwrap()
            .id;

        assert_eq!(store.find(ReferenceKind::MediaType, "CSV").unwrap(), Some(csv_id));
        assert_eq!(store.find(ReferenceKind::MediaType, "XLSX").unwrap(), None);
        assert_eq!(store.find_media_type_by_extension(".CSV").unwrap(), Some(csv_id));
        assert_eq!(store.find_media_type_by_mime("text/csv").unwrap(), Some(csv_id));
        assert_eq!(
            store
                .find_licence_by_url("https://creativecommons.org/licenses/by/4.0/")
                .unwrap(),
            Some(licence_id)
        );
    }
}
