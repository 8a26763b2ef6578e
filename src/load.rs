use crate::transform::{StarSchema, TransformOutput};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Output tables in load order (dimensions before the facts that reference them)
pub const STAR_TABLES: [&str; 4] = ["dim_customers", "dim_products", "dim_date", "fact_orders"];

/// Run audit table, appended to and never replaced
pub const RUNS_TABLE: &str = "etl_runs";

// ============================================================================
// RUN AUDIT
// ============================================================================

/// One completed pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub source: String,
    pub raw_rows: i64,
    pub valid_rows: i64,
    pub fact_rows: i64,
    pub invalid_counts: serde_json::Value,
    pub fingerprint: String,
}

impl RunRecord {
    pub fn new(source: &str, started_at: DateTime<Utc>, output: &TransformOutput) -> Self {
        RunRecord {
            run_id: uuid::Uuid::new_v4().to_string(),
            started_at,
            finished_at: Utc::now(),
            source: source.to_string(),
            raw_rows: output.report.raw_rows as i64,
            valid_rows: output.report.valid_rows as i64,
            fact_rows: output.schema.facts.len() as i64,
            invalid_counts: output.report.invalid.to_json(),
            fingerprint: output.schema.fingerprint(),
        }
    }
}

/// Row counts after a load
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub customers: usize,
    pub products: usize,
    pub dates: usize,
    pub facts: usize,
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL for crash recovery, FKs so the store enforces what the contract checked
    let _mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS etl_runs (
            run_id TEXT PRIMARY KEY,
            started_at TEXT NOT NULL,
            finished_at TEXT NOT NULL,
            source TEXT NOT NULL,
            raw_rows INTEGER NOT NULL,
            valid_rows INTEGER NOT NULL,
            fact_rows INTEGER NOT NULL,
            invalid_counts TEXT NOT NULL,
            fingerprint TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

/// Drop and recreate the four star tables (replace semantics)
fn recreate_star_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "DROP TABLE IF EXISTS fact_orders;
         DROP TABLE IF EXISTS dim_customers;
         DROP TABLE IF EXISTS dim_products;
         DROP TABLE IF EXISTS dim_date;

         CREATE TABLE dim_customers (
            customer_key INTEGER PRIMARY KEY,
            customer_id TEXT UNIQUE NOT NULL,
            country TEXT NOT NULL
         );

         CREATE TABLE dim_products (
            product_key INTEGER PRIMARY KEY,
            stock_code TEXT UNIQUE NOT NULL,
            description TEXT NOT NULL
         );

         CREATE TABLE dim_date (
            date_key INTEGER PRIMARY KEY,
            invoice_date TEXT UNIQUE NOT NULL,
            year INTEGER NOT NULL,
            month INTEGER NOT NULL,
            day INTEGER NOT NULL,
            weekday INTEGER NOT NULL,
            month_name TEXT NOT NULL,
            is_weekend INTEGER NOT NULL
         );

         CREATE TABLE fact_orders (
            invoice_no TEXT NOT NULL,
            line_number INTEGER NOT NULL,
            customer_key INTEGER NOT NULL REFERENCES dim_customers(customer_key),
            product_key INTEGER NOT NULL REFERENCES dim_products(product_key),
            date_key INTEGER NOT NULL REFERENCES dim_date(date_key),
            quantity INTEGER NOT NULL,
            unit_price REAL NOT NULL,
            line_total REAL NOT NULL,
            is_return INTEGER NOT NULL,
            PRIMARY KEY (invoice_no, line_number)
         );

         CREATE INDEX idx_fact_date ON fact_orders(date_key);
         CREATE INDEX idx_fact_product ON fact_orders(product_key);",
    )?;

    Ok(())
}

// ============================================================================
// LOAD
// ============================================================================

/// Replace the star tables with `schema` in one SQL transaction
///
/// A failure anywhere rolls back to the previous tables; readers never see a
/// half-loaded schema.
pub fn load_star_schema(conn: &mut Connection, schema: &StarSchema) -> Result<LoadSummary> {
    let tx = conn.transaction()?;
    recreate_star_tables(&tx)?;

    {
        let mut stmt = tx.prepare(
            "INSERT INTO dim_customers (customer_key, customer_id, country) VALUES (?1, ?2, ?3)",
        )?;
        for c in &schema.customers {
            stmt.execute(params![c.customer_key, c.customer_id, c.country])
                .with_context(|| format!("Failed to insert customer {}", c.customer_id))?;
        }
    }
    info!(table = "dim_customers", rows = schema.customers.len(), "loaded");

    {
        let mut stmt = tx.prepare(
            "INSERT INTO dim_products (product_key, stock_code, description) VALUES (?1, ?2, ?3)",
        )?;
        for p in &schema.products {
            stmt.execute(params![p.product_key, p.stock_code, p.description])
                .with_context(|| format!("Failed to insert product {}", p.stock_code))?;
        }
    }
    info!(table = "dim_products", rows = schema.products.len(), "loaded");

    {
        let mut stmt = tx.prepare(
            "INSERT INTO dim_date (date_key, invoice_date, year, month, day, weekday, month_name, is_weekend)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;
        for d in &schema.dates {
            stmt.execute(params![
                d.date_key,
                d.invoice_date.to_string(),
                d.year,
                d.month,
                d.day,
                d.weekday,
                d.month_name,
                d.is_weekend,
            ])
            .with_context(|| format!("Failed to insert date {}", d.invoice_date))?;
        }
    }
    info!(table = "dim_date", rows = schema.dates.len(), "loaded");

    {
        let mut stmt = tx.prepare(
            "INSERT INTO fact_orders (
                invoice_no, line_number, customer_key, product_key, date_key,
                quantity, unit_price, line_total, is_return
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )?;
        for f in &schema.facts {
            stmt.execute(params![
                f.invoice_no,
                f.line_number,
                f.customer_key,
                f.product_key,
                f.date_key,
                f.quantity,
                to_real(f.unit_price),
                to_real(f.revenue),
                f.is_return,
            ])
            .with_context(|| format!("Failed to insert fact {}#{}", f.invoice_no, f.line_number))?;
        }
    }
    info!(table = "fact_orders", rows = schema.facts.len(), "loaded");

    tx.commit().context("Failed to commit star schema load")?;

    Ok(LoadSummary {
        customers: schema.customers.len(),
        products: schema.products.len(),
        dates: schema.dates.len(),
        facts: schema.facts.len(),
    })
}

fn to_real(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

pub fn insert_run(conn: &Connection, run: &RunRecord) -> Result<()> {
    let invalid_json = serde_json::to_string(&run.invalid_counts)?;

    conn.execute(
        "INSERT INTO etl_runs (
            run_id, started_at, finished_at, source, raw_rows, valid_rows,
            fact_rows, invalid_counts, fingerprint
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            run.run_id,
            run.started_at.to_rfc3339(),
            run.finished_at.to_rfc3339(),
            run.source,
            run.raw_rows,
            run.valid_rows,
            run.fact_rows,
            invalid_json,
            run.fingerprint,
        ],
    )?;

    Ok(())
}

/// Most recent runs first
pub fn recent_runs(conn: &Connection, limit: usize) -> Result<Vec<RunRecord>> {
    let mut stmt = conn.prepare(
        "SELECT run_id, started_at, finished_at, source, raw_rows, valid_rows,
                fact_rows, invalid_counts, fingerprint
         FROM etl_runs
         ORDER BY finished_at DESC
         LIMIT ?1",
    )?;

    let runs = stmt
        .query_map(params![limit as i64], |row| {
            let started_at: String = row.get(1)?;
            let finished_at: String = row.get(2)?;
            let invalid_counts: String = row.get(7)?;

            Ok(RunRecord {
                run_id: row.get(0)?,
                started_at: parse_timestamp(1, &started_at)?,
                finished_at: parse_timestamp(2, &finished_at)?,
                source: row.get(3)?,
                raw_rows: row.get(4)?,
                valid_rows: row.get(5)?,
                fact_rows: row.get(6)?,
                invalid_counts: serde_json::from_str(&invalid_counts).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
                })?,
                fingerprint: row.get(8)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(runs)
}

fn parse_timestamp(column: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e)))
}

/// Row count of each star table, in `STAR_TABLES` order
pub fn verify_counts(conn: &Connection) -> Result<Vec<(String, i64)>> {
    STAR_TABLES
        .iter()
        .map(|table| {
            let count: i64 = conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
                .with_context(|| format!("Failed to count rows in {}", table))?;
            Ok((table.to_string(), count))
        })
        .collect()
}

/// Total invalid rows recorded for a run
pub fn run_invalid_total(run: &RunRecord) -> u64 {
    run.invalid_counts
        .as_object()
        .map(|counts| counts.values().filter_map(serde_json::Value::as_u64).sum())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::RawTransactionRow;
    use crate::transform::transform;

    fn output() -> TransformOutput {
        transform(&[
            RawTransactionRow::new("A1", "P1", Some("Widget"), "2", "5.00", "2024-01-05", Some("C1"), "UK"),
            RawTransactionRow::new("A1", "P1", Some("Widget"), "1", "5.00", "2024-01-05", Some("C1"), "UK"),
            RawTransactionRow::new("A2", "P2", None, "-1", "10.00", "2024-01-06", None, "UK"),
            RawTransactionRow::new("A3", "P3", None, "4", "0", "2024-01-06", None, "UK"),
        ])
        .unwrap()
    }

    fn open() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    #[test]
    fn test_load_star_schema() {
        let mut conn = open();
        let out = output();

        let summary = load_star_schema(&mut conn, &out.schema).unwrap();

        assert_eq!(summary.customers, 2);
        assert_eq!(summary.facts, 3);

        let counts = verify_counts(&conn).unwrap();
        assert_eq!(
            counts,
            vec![
                ("dim_customers".to_string(), 2),
                ("dim_products".to_string(), 2),
                ("dim_date".to_string(), 2),
                ("fact_orders".to_string(), 3),
            ]
        );

        let total: f64 = conn
            .query_row("SELECT SUM(line_total) FROM fact_orders", [], |row| row.get(0))
            .unwrap();
        assert!((total - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_reload_replaces_tables() {
        let mut conn = open();
        let out = output();

        load_star_schema(&mut conn, &out.schema).unwrap();
        load_star_schema(&mut conn, &out.schema).unwrap();

        let facts: i64 = conn
            .query_row("SELECT COUNT(*) FROM fact_orders", [], |row| row.get(0))
            .unwrap();
        assert_eq!(facts, 3, "second load must replace, not append");
    }

    #[test]
    fn test_foreign_keys_enforced_by_store() {
        let mut conn = open();
        let mut schema = output().schema;
        schema.facts[0].product_key = 42;

        assert!(load_star_schema(&mut conn, &schema).is_err());
    }

    #[test]
    fn test_run_audit_roundtrip() {
        let conn = open();
        let out = output();
        let run = RunRecord::new("test.csv", Utc::now(), &out);

        insert_run(&conn, &run).unwrap();
        let runs = recent_runs(&conn, 5).unwrap();

        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].run_id, run.run_id);
        assert_eq!(runs[0].fact_rows, 3);
        assert_eq!(runs[0].fingerprint, out.schema.fingerprint());
        assert_eq!(run_invalid_total(&runs[0]), 1);
    }
}
