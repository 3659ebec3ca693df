//! Database statistics and maintenance statements

use super::Database;
use crate::error::Result;
use tracing::info;

/// File-level page statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct DatabaseStats {
    pub page_size: u64,
    pub page_count: u64,
    pub freelist_count: u64,
}

impl DatabaseStats {
    /// Bytes VACUUM would reclaim
    pub fn reclaimable_bytes(&self) -> u64 {
        self.page_size * self.freelist_count
    }
}

impl Database {
    /// Get database statistics
    pub fn get_stats(&self) -> Result<DatabaseStats> {
        let page_size: i64 = self.conn.query_row("PRAGMA page_size", [], |row| row.get(0))?;
        let page_count: i64 = self.conn.query_row("PRAGMA page_count", [], |row| row.get(0))?;
        let freelist_count: i64 = self
            .conn
            .query_row("PRAGMA freelist_count", [], |row| row.get(0))?;

        Ok(DatabaseStats {
            page_size: page_size as u64,
            page_count: page_count as u64,
            freelist_count: freelist_count as u64,
        })
    }

    /// Vacuum the database
    pub fn vacuum(&self) -> Result<()> {
        self.conn.execute("VACUUM", [])?;
        info!("database vacuumed");
        Ok(())
    }

    /// Run one statement inside an explicit transaction and return the
    /// affected-row count. Any error rolls the transaction back.
    pub fn execute_in_transaction(&self, sql: &str) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let affected = tx.execute(sql, [])?;
        tx.commit()?;
        Ok(affected)
    }
}
