//! Persistent catalog store
//!
//! A thin layer over SQLite exposing create/get operations for catalog
//! entities. Reference vocabularies live in [`reference`], graph loading for
//! serialization in [`graph`].

pub mod graph;
pub mod reference;
pub mod schema;

use std::path::Path;
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use crate::error::CatalogError;
use crate::model::{
    Agent, Catalog, Checksum, DataService, Dataset, Distribution, NewAgent, NewCatalog,
    NewDataService, NewDataset, NewDistribution,
};

pub use crate::store::reference::{
    Lookup, NewKeyword, NewLicence, NewMediaType, NewTheme, Reference, ReferenceKind, Resolved,
};

/// How long a writer waits for a lock held by another process
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Tables that can be counted through [`Store::count`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Agent,
    Catalog,
    Dataset,
    Distribution,
    DataService,
    Checksum,
    MediaType,
    LicenceDocument,
    DataTheme,
    Keyword,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Agent => "agent",
            Table::Catalog => "catalog",
            Table::Dataset => "dataset",
            Table::Distribution => "distribution",
            Table::DataService => "data_service",
            Table::Checksum => "checksum",
            Table::MediaType => "media_type",
            Table::LicenceDocument => "licence_document",
            Table::DataTheme => "data_theme",
            Table::Keyword => "keyword",
        }
    }
}

pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) a database file and migrate it
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let conn = Connection::open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "opened catalog database");
        Self::init(conn)
    }

    /// Private in-memory database, mostly for tests
    pub fn open_in_memory() -> Result<Self, CatalogError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(mut conn: Connection) -> Result<Self, CatalogError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update(None, "foreign_keys", true)?;
        schema::migrate(&mut conn)?;
        Ok(Self { conn })
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn count(&self, table: Table) -> Result<i64, CatalogError> {
        let sql = format!("SELECT COUNT(*) FROM {}", table.as_str());
        Ok(self.conn.query_row(&sql, [], |row| row.get(0))?)
    }

    // -- agents -------------------------------------------------------------

    /// Get or create an agent by its (name, mbox) identity
    ///
    /// The type of an existing agent is left untouched.
    pub fn resolve_agent(&self, agent: &NewAgent) -> Result<i64, CatalogError> {
        self.conn.execute(
            "INSERT INTO agent (name, type, mbox) VALUES (?1, ?2, ?3) ON CONFLICT DO NOTHING",
            params![agent.name, agent.agent_type, agent.mbox],
        )?;
        let id = self.conn.query_row(
            "SELECT id FROM agent WHERE name = ?1 AND COALESCE(mbox, '') = COALESCE(?2, '')",
            params![agent.name, agent.mbox],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn get_agent(&self, id: i64) -> Result<Agent, CatalogError> {
        self.conn
            .query_row(
                "SELECT id, name, type, mbox FROM agent WHERE id = ?1",
                [id],
                agent_from_row,
            )
            .optional()?
            .ok_or(CatalogError::NotFound { entity: "agent", id })
    }

    // -- catalogs -----------------------------------------------------------

    pub fn create_catalog(&self, catalog: &NewCatalog) -> Result<i64, CatalogError> {
        self.conn.execute(
            "INSERT INTO catalog (title, description, homepage, publisher_id, license_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                catalog.title,
                catalog.description,
                catalog.homepage,
                catalog.publisher_id,
                catalog.license_id
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_catalog(&self, id: i64) -> Result<Catalog, CatalogError> {
        self.conn
            .query_row(
                "SELECT id, title, description, homepage, publisher_id, license_id
                 FROM catalog WHERE id = ?1",
                [id],
                catalog_from_row,
            )
            .optional()?
            .ok_or(CatalogError::NotFound {
                entity: "catalog",
                id,
            })
    }

    /// All catalog ids in creation order
    pub fn catalog_ids(&self) -> Result<Vec<i64>, CatalogError> {
        let mut stmt = self.conn.prepare("SELECT id FROM catalog ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;
        Ok(ids)
    }

    /// Link a theme to a catalog; `false` when the link already existed
    pub fn add_catalog_theme(&self, catalog_id: i64, theme_id: i64) -> Result<bool, CatalogError> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO catalog_theme (catalog_id, theme_id) VALUES (?1, ?2)",
            [catalog_id, theme_id],
        )?;
        Ok(inserted > 0)
    }

    /// Delete a catalog with its datasets, distributions and services
    pub fn delete_catalog(&self, id: i64) -> Result<bool, CatalogError> {
        let deleted = self.conn.execute("DELETE FROM catalog WHERE id = ?1", [id])?;
        Ok(deleted > 0)
    }

    // -- datasets -----------------------------------------------------------

    pub fn create_dataset(&self, dataset: &NewDataset) -> Result<i64, CatalogError> {
        self.conn.execute(
            "INSERT INTO dataset
                (catalog_id, title, description, publisher_id, issued, modified, landing_page)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                dataset.catalog_id,
                dataset.title,
                dataset.description,
                dataset.publisher_id,
                dataset.issued,
                dataset.modified,
                dataset.landing_page
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_dataset(&self, id: i64) -> Result<Dataset, CatalogError> {
        self.conn
            .query_row(
                &format!("{DATASET_COLUMNS} WHERE id = ?1"),
                [id],
                dataset_from_row,
            )
            .optional()?
            .ok_or(CatalogError::NotFound {
                entity: "dataset",
                id,
            })
    }

    /// Datasets of a catalog in creation order
    pub fn datasets_of(&self, catalog_id: i64) -> Result<Vec<Dataset>, CatalogError> {
        let mut stmt = self
            .conn
            .prepare(&format!("{DATASET_COLUMNS} WHERE catalog_id = ?1 ORDER BY id"))?;
        let datasets = stmt
            .query_map([catalog_id], dataset_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(datasets)
    }

    pub fn add_dataset_theme(&self, dataset_id: i64, theme_id: i64) -> Result<bool, CatalogError> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO dataset_theme (dataset_id, theme_id) VALUES (?1, ?2)",
            [dataset_id, theme_id],
        )?;
        Ok(inserted > 0)
    }

    /// Link a keyword to a dataset; `false` when the link already existed
    pub fn add_dataset_keyword(
        &self,
        dataset_id: i64,
        keyword_id: i64,
    ) -> Result<bool, CatalogError> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO dataset_keyword (dataset_id, keyword_id) VALUES (?1, ?2)",
            [dataset_id, keyword_id],
        )?;
        Ok(inserted > 0)
    }

    pub fn delete_dataset(&self, id: i64) -> Result<bool, CatalogError> {
        let deleted = self.conn.execute("DELETE FROM dataset WHERE id = ?1", [id])?;
        Ok(deleted > 0)
    }

    // -- distributions ------------------------------------------------------

    pub fn create_distribution(&self, distribution: &NewDistribution) -> Result<i64, CatalogError> {
        self.conn.execute(
            "INSERT INTO distribution
                (dataset_id, title, description, file, external_download_url,
                 external_access_url, format_id, license_id, checksum_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                distribution.dataset_id,
                distribution.title,
                distribution.description,
                distribution.file,
                distribution.external_download_url,
                distribution.external_access_url,
                distribution.format_id,
                distribution.license_id,
                distribution.checksum_id
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_distribution(&self, id: i64) -> Result<Distribution, CatalogError> {
        self.conn
            .query_row(
                &format!("{DISTRIBUTION_COLUMNS} WHERE id = ?1"),
                [id],
                distribution_from_row,
            )
            .optional()?
            .ok_or(CatalogError::NotFound {
                entity: "distribution",
                id,
            })
    }

    /// Distributions of a dataset in creation order
    pub fn distributions_of(&self, dataset_id: i64) -> Result<Vec<Distribution>, CatalogError> {
        let mut stmt = self.conn.prepare(&format!(
            "{DISTRIBUTION_COLUMNS} WHERE dataset_id = ?1 ORDER BY id"
        ))?;
        let distributions = stmt
            .query_map([dataset_id], distribution_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(distributions)
    }

    pub fn delete_distribution(&self, id: i64) -> Result<bool, CatalogError> {
        let deleted = self
            .conn
            .execute("DELETE FROM distribution WHERE id = ?1", [id])?;
        Ok(deleted > 0)
    }

    pub fn create_checksum(&self, value: &str, algorithm: &str) -> Result<i64, CatalogError> {
        self.conn.execute(
            "INSERT INTO checksum (checksum_value, algorithm) VALUES (?1, ?2)",
            params![value, algorithm],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_checksum(&self, id: i64) -> Result<Checksum, CatalogError> {
        self.conn
            .query_row(
                "SELECT id, checksum_value, algorithm FROM checksum WHERE id = ?1",
                [id],
                |row| {
                    Ok(Checksum {
                        id: row.get(0)?,
                        checksum_value: row.get(1)?,
                        algorithm: row.get(2)?,
                    })
                },
            )
            .optional()?
            .ok_or(CatalogError::NotFound {
                entity: "checksum",
                id,
            })
    }

    // -- data services ------------------------------------------------------

    pub fn create_data_service(&self, service: &NewDataService) -> Result<i64, CatalogError> {
        self.conn.execute(
            "INSERT INTO data_service (catalog_id, title, endpoint_url, license_id)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                service.catalog_id,
                service.title,
                service.endpoint_url,
                service.license_id
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn add_service_media_type(
        &self,
        service_id: i64,
        media_type_id: i64,
    ) -> Result<bool, CatalogError> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO data_service_media_type (service_id, media_type_id)
             VALUES (?1, ?2)",
            [service_id, media_type_id],
        )?;
        Ok(inserted > 0)
    }

    /// Data services of a catalog in creation order
    pub fn services_of(&self, catalog_id: i64) -> Result<Vec<DataService>, CatalogError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, catalog_id, title, endpoint_url, license_id
             FROM data_service WHERE catalog_id = ?1 ORDER BY id",
        )?;
        let services = stmt
            .query_map([catalog_id], |row| {
                Ok(DataService {
                    id: row.get(0)?,
                    catalog_id: row.get(1)?,
                    title: row.get(2)?,
                    endpoint_url: row.get(3)?,
                    license_id: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(services)
    }
}

const DATASET_COLUMNS: &str = "SELECT id, catalog_id, title, description, publisher_id, \
     issued, modified, landing_page FROM dataset";

const DISTRIBUTION_COLUMNS: &str = "SELECT id, dataset_id, title, description, file, \
     external_download_url, external_access_url, format_id, license_id, checksum_id \
     FROM distribution";

fn agent_from_row(row: &Row) -> rusqlite::Result<Agent> {
    Ok(Agent {
        id: row.get(0)?,
        name: row.get(1)?,
        agent_type: row.get(2)?,
        mbox: row.get(3)?,
    })
}

fn catalog_from_row(row: &Row) -> rusqlite::Result<Catalog> {
    Ok(Catalog {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        homepage: row.get(3)?,
        publisher_id: row.get(4)?,
        license_id: row.get(5)?,
    })
}

fn dataset_from_row(row: &Row) -> rusqlite::Result<Dataset> {
    Ok(Dataset {
        id: row.get(0)?,
        catalog_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        publisher_id: row.get(4)?,
        issued: row.get(5)?,
        modified: row.get(6)?,
        landing_page: row.get(7)?,
    })
}

fn distribution_from_row(row: &Row) -> rusqlite::Result<Distribution> {
    Ok(Distribution {
        id: row.get(0)?,
        dataset_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        file: row.get(4)?,
        external_download_url: row.get(5)?,
        external_access_url: row.get(6)?,
        format_id: row.get(7)?,
        license_id: row.get(8)?,
        checksum_id: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn publisher(store: &Store) -> i64 {
        store
            .resolve_agent(&NewAgent {
                name: "Food and Agriculture Organization of the United Nations".to_string(),
                agent_type: "foaf:Agent".to_string(),
                mbox: None,
            })
            .unwrap()
    }

    fn catalog(store: &Store) -> i64 {
        let publisher_id = publisher(store);
        store
            .create_catalog(&NewCatalog {
                title: "FAO Data in Emergencies".to_string(),
                description: "A testing catalog based on true data.".to_string(),
                homepage: None,
                publisher_id,
                license_id: None,
            })
            .unwrap()
    }

    #[test]
    fn test_resolve_agent_by_name_and_mbox() {
        let store = Store::open_in_memory().unwrap();
        let a = publisher(&store);
        let b = publisher(&store);
        assert_eq!(a, b);

        let with_mail = store
            .resolve_agent(&NewAgent {
                name: "Food and Agriculture Organization of the United Nations".to_string(),
                agent_type: "foaf:Agent".to_string(),
                mbox: Some("data@fao.org".to_string()),
            })
            .unwrap();
        assert_ne!(a, with_mail);
        assert_eq!(store.count(Table::Agent).unwrap(), 2);
    }

    #[test]
    fn test_children_in_creation_order() {
        let store = Store::open_in_memory().unwrap();
        let catalog_id = catalog(&store);

        for title in ["Colombia - Round 3", "Afghanistan - Round 6"] {
            store
                .create_dataset(&NewDataset {
                    catalog_id,
                    title: title.to_string(),
                    ..Default::default()
                })
                .unwrap();
        }

        let titles: Vec<_> = store
            .datasets_of(catalog_id)
            .unwrap()
            .into_iter()
            .map(|d| d.title)
            .collect();
        assert_eq!(titles, vec!["Colombia - Round 3", "Afghanistan - Round 6"]);
    }

    #[test]
    fn test_delete_catalog_cascades() {
        let store = Store::open_in_memory().unwrap();
        let catalog_id = catalog(&store);
        let dataset_id = store
            .create_dataset(&NewDataset {
                catalog_id,
                title: "Household Questionnaire".to_string(),
                ..Default::default()
            })
            .unwrap();
        let checksum_id = store.create_checksum("abc123", "sha256").unwrap();
        store
            .create_distribution(&NewDistribution {
                dataset_id,
                title: "CSV".to_string(),
                checksum_id: Some(checksum_id),
                ..Default::default()
            })
            .unwrap();

        assert!(store.delete_catalog(catalog_id).unwrap());
        assert_eq!(store.count(Table::Catalog).unwrap(), 0);
        assert_eq!(store.count(Table::Dataset).unwrap(), 0);
        assert_eq!(store.count(Table::Distribution).unwrap(), 0);
        assert_eq!(store.count(Table::Checksum).unwrap(), 0);
        // Agents are shared and survive
        assert_eq!(store.count(Table::Agent).unwrap(), 1);
    }

    fn dataset(store: &Store, catalog_id: i64) -> i64 {
        store
            .create_dataset(&NewDataset {
                catalog_id,
                title: "Household Questionnaire".to_string(),
                modified: Some("2022-03-01".to_string()),
                ..Default::default()
            })
            .unwrap()
    }

    fn distribution_with_checksum(store: &Store, dataset_id: i64, value: &str) -> i64 {
        let checksum_id = store.create_checksum(value, "sha256").unwrap();
        store
            .create_distribution(&NewDistribution {
                dataset_id,
                title: "CSV".to_string(),
                file: Some(format!("files/datasets/{}/{}.csv", dataset_id, value)),
                checksum_id: Some(checksum_id),
                ..Default::default()
            })
            .unwrap()
    }

    #[test]
    fn test_delete_distribution_removes_its_checksum() {
        let store = Store::open_in_memory().unwrap();
        let dataset_id = dataset(&store, catalog(&store));
        let kept = distribution_with_checksum(&store, dataset_id, "kept");
        let dropped = distribution_with_checksum(&store, dataset_id, "dropped");

        let distribution = store.get_distribution(dropped).unwrap();
        assert_eq!(distribution.dataset_id, dataset_id);
        assert_eq!(
            distribution.file.as_deref(),
            Some(format!("files/datasets/{}/dropped.csv", dataset_id).as_str())
        );
        let checksum_id = distribution.checksum_id.unwrap();

        assert!(store.delete_distribution(dropped).unwrap());
        assert!(!store.delete_distribution(dropped).unwrap());
        assert!(matches!(
            store.get_distribution(dropped),
            Err(CatalogError::NotFound { entity: "distribution", .. })
        ));
        assert!(matches!(
            store.get_checksum(checksum_id),
            Err(CatalogError::NotFound { .. })
        ));
        assert_eq!(store.count(Table::Checksum).unwrap(), 1);

        let survivor = store.get_distribution(kept).unwrap();
        let checksum = store.get_checksum(survivor.checksum_id.unwrap()).unwrap();
        assert_eq!(checksum.checksum_value, "kept");
    }

    #[test]
    fn test_delete_dataset_cascades_to_distributions() {
        let store = Store::open_in_memory().unwrap();
        let catalog_id = catalog(&store);
        let dataset_id = dataset(&store, catalog_id);
        distribution_with_checksum(&store, dataset_id, "a");
        distribution_with_checksum(&store, dataset_id, "b");

        let loaded = store.get_dataset(dataset_id).unwrap();
        assert_eq!(loaded.catalog_id, catalog_id);
        assert_eq!(loaded.title, "Household Questionnaire");
        assert_eq!(loaded.modified.as_deref(), Some("2022-03-01"));

        assert!(store.delete_dataset(dataset_id).unwrap());
        assert!(matches!(
            store.get_dataset(dataset_id),
            Err(CatalogError::NotFound { entity: "dataset", .. })
        ));
        assert_eq!(store.count(Table::Distribution).unwrap(), 0);
        assert_eq!(store.count(Table::Checksum).unwrap(), 0);
        // The catalog itself stays
        assert_eq!(store.get_catalog(catalog_id).unwrap().id, catalog_id);
        assert!(!store.delete_dataset(dataset_id).unwrap());
    }

    #[test]
    fn test_links_keep_insertion_order() {
        let store = Store::open_in_memory().unwrap();
        let dataset_id = dataset(&store, catalog(&store));

        for code in ["SOCI", "AGRI"] {
            let theme = Reference::Theme(NewTheme {
                code: code.to_string(),
                label: code.to_string(),
                description: None,
            });
            let id = store.resolve_or_create(&theme, Lookup::CodeOnly).unwrap().unwrap().id;
            assert!(store.add_dataset_theme(dataset_id, id).unwrap());
        }
        for name in ["Zebra mussels", "Food Security", "food security"] {
            let keyword = Reference::Keyword(NewKeyword::new(name));
            let id = store.resolve_or_create(&keyword, Lookup::CodeOnly).unwrap().unwrap().id;
            store.add_dataset_keyword(dataset_id, id).unwrap();
        }

        let themes: Vec<_> = store
            .themes_of_dataset(dataset_id)
            .unwrap()
            .into_iter()
            .map(|t| t.code)
            .collect();
        assert_eq!(themes, vec!["SOCI", "AGRI"]);
        let keywords: Vec<_> = store
            .keywords_of_dataset(dataset_id)
            .unwrap()
            .into_iter()
            .map(|k| k.name)
            .collect();
        assert_eq!(keywords, vec!["Zebra mussels", "Food Security"]);

        let agri = store.find(ReferenceKind::DataTheme, "AGRI").unwrap().unwrap();
        assert!(!store.add_dataset_theme(dataset_id, agri).unwrap());
    }

    #[test]
    fn test_dataset_requires_catalog() {
        let store = Store::open_in_memory().unwrap();
        let result = store.create_dataset(&NewDataset {
            catalog_id: 42,
            title: "Orphan".to_string(),
            ..Default::default()
        });
        assert!(matches!(result, Err(CatalogError::Store(_))));
    }

    #[test]
    fn test_get_missing_entity() {
        let store = Store::open_in_memory().unwrap();
        assert!(matches!(
            store.get_catalog(1),
            Err(CatalogError::NotFound { entity: "catalog", id: 1 })
        ));
    }
}
