//! SQLite price store.
//!
//! One long-format table, `stock_price(Date, Symbol, Close)`, keyed on
//! (Date, Symbol). Re-inserting an existing row is a no-op, so repeated
//! imports never create duplicates.

use crate::domain::error::AllocsimError;
use crate::domain::price_table::PriceRecord;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn query_error(e: rusqlite::Error) -> AllocsimError {
    AllocsimError::DatabaseQuery {
        reason: e.to_string(),
    }
}

/// Accepts `YYYY-MM-DD` with or without a trailing time part.
fn parse_stored_date(value: &str) -> Result<NaiveDate, chrono::ParseError> {
    let day = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, AllocsimError> {
        let db_path = config
            .get_string("sqlite", "path")
            .ok_or_else(|| AllocsimError::missing("sqlite", "path"))?;

        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(|e: r2d2::Error| AllocsimError::Database {
                reason: e.to_string(),
            })?;

        log::debug!("opened sqlite store {db_path} (pool size {pool_size})");
        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, AllocsimError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| AllocsimError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, AllocsimError> {
        self.pool.get().map_err(|e: r2d2::Error| AllocsimError::Database {
            reason: e.to_string(),
        })
    }

    pub fn initialize_schema(&self) -> Result<(), AllocsimError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS stock_price (
                    Date TEXT NOT NULL,
                    Symbol TEXT NOT NULL,
                    Close REAL,
                    PRIMARY KEY (Date, Symbol)
                );
                CREATE INDEX IF NOT EXISTS idx_stock_price_symbol ON stock_price(Symbol);",
            )
            .map_err(query_error)
    }

    /// Insert in one transaction. Returns how many rows were new.
    pub fn insert_records(&self, records: &[PriceRecord]) -> Result<usize, AllocsimError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_error)?;

        let mut inserted = 0;
        for record in records {
            inserted += tx
                .execute(
                    "INSERT OR IGNORE INTO stock_price (Date, Symbol, Close) VALUES (?1, ?2, ?3)",
                    params![
                        record.date.format("%Y-%m-%d").to_string(),
                        record.ticker,
                        record.close
                    ],
                )
                .map_err(query_error)?;
        }

        tx.commit().map_err(query_error)?;
        Ok(inserted)
    }
}

impl DataPort for SqliteAdapter {
    fn fetch_closes(
        &self,
        tickers: &[String],
        since: NaiveDate,
    ) -> Result<Vec<PriceRecord>, AllocsimError> {
        if tickers.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn()?;

        let placeholders = (2..tickers.len() + 2)
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let query = format!(
            "SELECT Date, Symbol, Close FROM stock_price
             WHERE Date >= ?1 AND Symbol IN ({placeholders})
             ORDER BY Date ASC"
        );

        let mut stmt = conn.prepare(&query).map_err(query_error)?;

        let since_str = since.format("%Y-%m-%d").to_string();
        let mut values: Vec<&dyn rusqlite::ToSql> = vec![&since_str];
        values.extend(tickers.iter().map(|t| t as &dyn rusqlite::ToSql));

        let rows = stmt
            .query_map(values.as_slice(), |row| {
                let date_str: String = row.get(0)?;
                let date = parse_stored_date(&date_str).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        0,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;
                let close: Option<f64> = row.get(2)?;
                Ok(PriceRecord {
                    date,
                    ticker: row.get(1)?,
                    close: close.unwrap_or(f64::NAN),
                })
            })
            .map_err(query_error)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row.map_err(query_error)?);
        }

        Ok(records)
    }

    fn list_symbols(&self) -> Result<Vec<String>, AllocsimError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT Symbol FROM stock_price ORDER BY Symbol")
            .map_err(query_error)?;

        let rows = stmt.query_map([], |row| row.get(0)).map_err(query_error)?;

        let mut symbols = Vec::new();
        for row in rows {
            symbols.push(row.map_err(query_error)?);
        }

        Ok(symbols)
    }

    fn get_data_range(
        &self,
        ticker: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, AllocsimError> {
        let conn = self.conn()?;

        let result: (Option<String>, Option<String>, i64) = conn
            .query_row(
                "SELECT MIN(Date), MAX(Date), COUNT(*) FROM stock_price WHERE Symbol = ?1",
                params![ticker],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(query_error)?;

        match result {
            (Some(min_str), Some(max_str), count) if count > 0 => {
                let parse = |s: &str| {
                    parse_stored_date(s).map_err(|e: chrono::ParseError| AllocsimError::Database {
                        reason: e.to_string(),
                    })
                };
                Ok(Some((parse(&min_str)?, parse(&max_str)?, count as usize)))
            }
            _ => Ok(None),
        }
    }
}
