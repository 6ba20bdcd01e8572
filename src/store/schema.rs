//! Relational schema and migrations
//!
//! Migrations are applied in order and tracked through `PRAGMA user_version`.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::CatalogError;

/// Ordered schema migrations; index + 1 is the resulting `user_version`
const MIGRATIONS: &[&str] = &[
    // 1: reference vocabularies and agents
    r#"
    CREATE TABLE agent (
        id      INTEGER PRIMARY KEY,
        name    TEXT NOT NULL,
        type    TEXT NOT NULL DEFAULT '',
        mbox    TEXT
    );
    CREATE UNIQUE INDEX agent_identity ON agent (name, COALESCE(mbox, ''));

    CREATE TABLE media_type (
        id          INTEGER PRIMARY KEY,
        extension   TEXT NOT NULL,
        code        TEXT UNIQUE,
        media_type  TEXT NOT NULL DEFAULT '',
        description TEXT NOT NULL DEFAULT ''
    );
    CREATE INDEX media_type_extension ON media_type (extension);

    CREATE TABLE licence_document (
        id           INTEGER PRIMARY KEY,
        label        TEXT NOT NULL,
        code         TEXT UNIQUE,
        url_general  TEXT,
        url_document TEXT
    );

    CREATE TABLE data_theme (
        id          INTEGER PRIMARY KEY,
        code        TEXT NOT NULL UNIQUE,
        label       TEXT NOT NULL,
        description TEXT
    );

    CREATE TABLE keyword (
        id   INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        slug TEXT NOT NULL UNIQUE
    );
    "#,
    // 2: catalog entities
    r#"
    CREATE TABLE catalog (
        id           INTEGER PRIMARY KEY,
        title        TEXT NOT NULL,
        description  TEXT NOT NULL,
        homepage     TEXT,
        publisher_id INTEGER NOT NULL REFERENCES agent (id) ON DELETE CASCADE,
        license_id   INTEGER REFERENCES licence_document (id) ON DELETE SET NULL
    );

    CREATE TABLE catalog_theme (
        catalog_id INTEGER NOT NULL REFERENCES catalog (id) ON DELETE CASCADE,
        theme_id   INTEGER NOT NULL REFERENCES data_theme (id) ON DELETE CASCADE,
        PRIMARY KEY (catalog_id, theme_id)
    );

    CREATE TABLE dataset (
        id           INTEGER PRIMARY KEY,
        catalog_id   INTEGER NOT NULL REFERENCES catalog (id) ON DELETE CASCADE,
        title        TEXT NOT NULL,
        description  TEXT,
        publisher_id INTEGER REFERENCES agent (id) ON DELETE SET NULL,
        issued       TEXT,
        modified     TEXT,
        landing_page TEXT
    );
    CREATE INDEX dataset_catalog ON dataset (catalog_id);

    CREATE TABLE dataset_theme (
        dataset_id INTEGER NOT NULL REFERENCES dataset (id) ON DELETE CASCADE,
        theme_id   INTEGER NOT NULL REFERENCES data_theme (id) ON DELETE CASCADE,
        PRIMARY KEY (dataset_id, theme_id)
    );

    CREATE TABLE dataset_keyword (
        dataset_id INTEGER NOT NULL REFERENCES dataset (id) ON DELETE CASCADE,
        keyword_id INTEGER NOT NULL REFERENCES keyword (id) ON DELETE CASCADE,
        PRIMARY KEY (dataset_id, keyword_id)
    );

    CREATE TABLE checksum (
        id             INTEGER PRIMARY KEY,
        checksum_value TEXT NOT NULL,
        algorithm      TEXT NOT NULL
    );

    CREATE TABLE distribution (
        id                    INTEGER PRIMARY KEY,
        dataset_id            INTEGER NOT NULL REFERENCES dataset (id) ON DELETE CASCADE,
        title                 TEXT NOT NULL DEFAULT '',
        description           TEXT NOT NULL DEFAULT '',
        file                  TEXT,
        external_download_url TEXT,
        external_access_url   TEXT,
        format_id             INTEGER REFERENCES media_type (id) ON DELETE SET NULL,
        license_id            INTEGER REFERENCES licence_document (id) ON DELETE SET NULL,
        checksum_id           INTEGER UNIQUE REFERENCES checksum (id) ON DELETE SET NULL
    );
    CREATE INDEX distribution_dataset ON distribution (dataset_id);

    CREATE TRIGGER distribution_drop_checksum AFTER DELETE ON distribution
    WHEN OLD.checksum_id IS NOT NULL
    BEGIN
        DELETE FROM checksum WHERE id = OLD.checksum_id;
    END;

    CREATE TABLE data_service (
        id           INTEGER PRIMARY KEY,
        catalog_id   INTEGER NOT NULL REFERENCES catalog (id) ON DELETE CASCADE,
        title        TEXT NOT NULL,
        endpoint_url TEXT NOT NULL,
        license_id   INTEGER REFERENCES licence_document (id) ON DELETE SET NULL
    );

    CREATE TABLE data_service_media_type (
        service_id    INTEGER NOT NULL REFERENCES data_service (id) ON DELETE CASCADE,
        media_type_id INTEGER NOT NULL REFERENCES media_type (id) ON DELETE CASCADE,
        PRIMARY KEY (service_id, media_type_id)
    );
    "#,
];

/// Bring the database schema up to date
///
/// Returns the number of migrations applied.
pub fn migrate(conn: &mut Connection) -> Result<usize, CatalogError> {
    let current: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    let current = usize::try_from(current).unwrap_or(0);

    let mut applied = 0;
    for (index, sql) in MIGRATIONS.iter().enumerate().skip(current) {
        let version = index + 1;
        debug!(version, "applying schema migration");
        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", version as i64)?;
        tx.commit()?;
        applied += 1;
    }

    if applied > 0 {
        info!(applied, version = MIGRATIONS.len(), "database schema migrated");
    }
    Ok(applied)
}

/// Schema version a fully migrated database reports
pub fn latest_version() -> usize {
    MIGRATIONS.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrate_is_repeatable() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert_eq!(migrate(&mut conn).unwrap(), latest_version());
        assert_eq!(migrate(&mut conn).unwrap(), 0);

        let version: i64 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version as usize, latest_version());
    }
}
