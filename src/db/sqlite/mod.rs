//! SQLite database module

pub mod models;
mod migrations;
mod watchlist;

use crate::error::Result;
pub use models::{NewTrackedStock, TrackedStock};
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;

/// SQLite database wrapper
pub struct SqliteDb {
    conn: Mutex<Connection>,
}

impl SqliteDb {
    /// Open (or create) the database file and run migrations
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent access
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        Self::with_connection(conn)
    }

    /// Private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn.lock();
        migrations::run_migrations(&conn)
    }

    // ========== Watchlist Methods ==========

    /// Insert a watchlist row
    pub fn add_stock(&self, stock: &NewTrackedStock) -> Result<i64> {
        let mut conn = self.conn.lock();
        watchlist::add_stock(&mut conn, stock)
    }

    /// All watchlist rows, newest first
    pub fn get_all_stocks(&self) -> Result<Vec<TrackedStock>> {
        let conn = self.conn.lock();
        watchlist::get_all_stocks(&conn)
    }

    /// Watchlist row by id
    pub fn get_stock(&self, id: i64) -> Result<Option<TrackedStock>> {
        let conn = self.conn.lock();
        watchlist::get_stock(&conn, id)
    }

    /// Delete a watchlist row
    pub fn delete_stock(&self, id: i64) -> Result<bool> {
        let mut conn = self.conn.lock();
        watchlist::delete_stock(&mut conn, id)
    }

    /// Delete every row for a symbol
    pub fn delete_stocks_by_symbol(&self, symbol: &str) -> Result<usize> {
        let mut conn = self.conn.lock();
        watchlist::delete_stocks_by_symbol(&mut conn, symbol)
    }
}
