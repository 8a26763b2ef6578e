// 📊 Analytics - read-only aggregate queries over the loaded star tables

use crate::load::{RUNS_TABLE, STAR_TABLES};
use anyhow::{bail, Context, Result};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TOP_N: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyRevenue {
    pub year: i32,
    pub month: u32,
    pub revenue: f64,
}

impl MonthlyRevenue {
    /// `YYYY-MM`, the chart label
    pub fn period(&self) -> String {
        format!("{}-{:02}", self.year, self.month)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRevenue {
    pub description: String,
    pub revenue: f64,
}

/// Column names plus stringified rows, for previews
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TablePreview {
    pub table: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

pub fn monthly_revenue(conn: &Connection) -> Result<Vec<MonthlyRevenue>> {
    let mut stmt = conn.prepare(
        "SELECT d.year, d.month, SUM(f.line_total) AS revenue
         FROM fact_orders f
         JOIN dim_date d ON f.date_key = d.date_key
         GROUP BY d.year, d.month
         ORDER BY d.year, d.month",
    )?;

    let rows = stmt
        .query_map([], |row| {
            Ok(MonthlyRevenue {
                year: row.get(0)?,
                month: row.get(1)?,
                revenue: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to query monthly revenue")?;

    Ok(rows)
}

/// Top `limit` products by total revenue (grouped by description)
pub fn top_products(conn: &Connection, limit: usize) -> Result<Vec<ProductRevenue>> {
    let mut stmt = conn.prepare(
        "SELECT p.description, SUM(f.line_total) AS revenue
         FROM fact_orders f
         JOIN dim_products p ON f.product_key = p.product_key
         GROUP BY p.description
         ORDER BY revenue DESC, p.description
         LIMIT ?1",
    )?;

    let rows = stmt
        .query_map(params![limit as i64], |row| {
            Ok(ProductRevenue {
                description: row.get(0)?,
                revenue: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to query top products")?;

    Ok(rows)
}

/// User tables present in the database, sorted by name
pub fn list_tables(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
         ORDER BY name",
    )?;

    let tables = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;

    Ok(tables)
}

/// First `limit` rows of one of the pipeline's tables
///
/// The table name is interpolated into SQL, so only known tables are accepted.
pub fn preview(conn: &Connection, table: &str, limit: usize) -> Result<TablePreview> {
    if !STAR_TABLES.contains(&table) && table != RUNS_TABLE {
        bail!("Unknown table '{}': expected one of {}, {}", table, STAR_TABLES.join(", "), RUNS_TABLE);
    }

    let mut stmt = conn
        .prepare(&format!("SELECT * FROM {} LIMIT ?1", table))
        .with_context(|| format!("Failed to read table {}", table))?;

    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
    let width = columns.len();

    let rows = stmt
        .query_map(params![limit as i64], |row| {
            (0..width)
                .map(|i| row.get_ref(i).map(render_value))
                .collect::<rusqlite::Result<Vec<String>>>()
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TablePreview {
        table: table.to_string(),
        columns,
        rows,
    })
}

fn render_value(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => format!("{:.2}", f),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Blob(b) => format!("<{} bytes>", b.len()),
    }
}
