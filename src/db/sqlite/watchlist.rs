//! Watchlist rows
//!
//! Writes run inside a transaction so a failed statement leaves the
//! table untouched.

use crate::db::sqlite::models::{NewTrackedStock, TrackedStock};
use crate::error::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

const STOCK_COLUMNS: &str = "id, symbol, date_noticed, price_noticed, notes, created_at";

fn map_stock(row: &Row<'_>) -> rusqlite::Result<TrackedStock> {
    Ok(TrackedStock {
        id: row.get(0)?,
        symbol: row.get(1)?,
        date_noticed: row.get(2)?,
        price_noticed: row.get(3)?,
        notes: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        created_at: row.get(5)?,
    })
}

/// Insert a row and return its id
pub fn add_stock(conn: &mut Connection, stock: &NewTrackedStock) -> Result<i64> {
    let tx = conn.transaction()?;

    tx.execute(
        "INSERT INTO tracked_stocks (symbol, date_noticed, price_noticed, notes)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            stock.symbol.to_uppercase(),
            stock.date_noticed,
            stock.price_noticed,
            stock.notes,
        ],
    )?;
    let id = tx.last_insert_rowid();

    tx.commit()?;
    Ok(id)
}

/// All rows, newest first
pub fn get_all_stocks(conn: &Connection) -> Result<Vec<TrackedStock>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM tracked_stocks ORDER BY created_at DESC, id DESC",
        STOCK_COLUMNS
    ))?;

    let stocks = stmt
        .query_map([], map_stock)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(stocks)
}

/// Row by id
pub fn get_stock(conn: &Connection, id: i64) -> Result<Option<TrackedStock>> {
    let stock = conn
        .query_row(
            &format!("SELECT {} FROM tracked_stocks WHERE id = ?", STOCK_COLUMNS),
            [id],
            map_stock,
        )
        .optional()?;

    Ok(stock)
}

/// Delete a row; `false` when no row had that id
pub fn delete_stock(conn: &mut Connection, id: i64) -> Result<bool> {
    let tx = conn.transaction()?;
    let rows = tx.execute("DELETE FROM tracked_stocks WHERE id = ?", [id])?;
    tx.commit()?;
    Ok(rows > 0)
}

/// Delete every row for a symbol, returning how many went
pub fn delete_stocks_by_symbol(conn: &mut Connection, symbol: &str) -> Result<usize> {
    let tx = conn.transaction()?;
    let rows = tx.execute(
        "DELETE FROM tracked_stocks WHERE symbol = ?",
        [symbol.to_uppercase()],
    )?;
    tx.commit()?;
    Ok(rows)
}
