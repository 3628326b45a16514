//! Read-only access probes for catalog collections.

use crate::repo::{ensure_connection_ready, Collection, RepoError, RepoResult};
use rusqlite::Connection;

/// Bounded reads used to confirm a collection is reachable.
pub trait CatalogRepository {
    /// Reads at most `limit` rows and returns how many came back.
    fn probe(&self, collection: Collection, limit: usize) -> RepoResult<usize>;
    /// Requires the collection to hold exactly one row.
    fn probe_single(&self, collection: Collection) -> RepoResult<()>;
}

pub struct SqliteCatalogRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCatalogRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(
            conn,
            &[
                Collection::Categories,
                Collection::TemplateSettings,
                Collection::PresetValues,
            ],
        )?;
        Ok(Self { conn })
    }
}

impl CatalogRepository for SqliteCatalogRepository<'_> {
    fn probe(&self, collection: Collection, limit: usize) -> RepoResult<usize> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT 1 FROM {} LIMIT ?1;",
            collection.table_name()
        ))?;
        let mut rows = stmt.query([limit])?;
        let mut count = 0;
        while rows.next()?.is_some() {
            count += 1;
        }
        Ok(count)
    }

    fn probe_single(&self, collection: Collection) -> RepoResult<()> {
        // Two rows are enough to tell "one" from "many".
        let actual = self.probe(collection, 2)?;
        if actual != 1 {
            return Err(RepoError::RowCount {
                collection,
                expected: 1,
                actual,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_db_in_memory;

    #[test]
    fn seeded_settings_hold_exactly_one_row() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteCatalogRepository::try_new(&conn).unwrap();
        repo.probe_single(Collection::TemplateSettings).unwrap();
        repo.probe_single(Collection::PresetValues).unwrap();
    }

    #[test]
    fn empty_categories_probe_reads_zero_rows() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteCatalogRepository::try_new(&conn).unwrap();
        assert_eq!(repo.probe(Collection::Categories, 1).unwrap(), 0);

        let err = repo.probe_single(Collection::Categories).unwrap_err();
        assert!(matches!(
            err,
            RepoError::RowCount {
                expected: 1,
                actual: 0,
                ..
            }
        ));
    }

    #[test]
    fn probe_respects_limit() {
        let conn = open_db_in_memory().unwrap();
        conn.execute_batch(
            "INSERT INTO categories (name) VALUES ('Kitchens'), ('Closets'), ('Doors');",
        )
        .unwrap();
        let repo = SqliteCatalogRepository::try_new(&conn).unwrap();
        assert_eq!(repo.probe(Collection::Categories, 1).unwrap(), 1);
        assert_eq!(repo.probe(Collection::Categories, 10).unwrap(), 3);
    }
}
