// 💾 Export - staging dump of the star tables as CSV files
// One file per table, named after the SQL table it feeds.

use crate::transform::StarSchema;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub fn export_star_schema(dir: &Path, schema: &StarSchema) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create export directory {}", dir.display()))?;

    Ok(vec![
        write_table(dir, "dim_customers", &schema.customers)?,
        write_table(dir, "dim_products", &schema.products)?,
        write_table(dir, "dim_date", &schema.dates)?,
        write_table(dir, "fact_orders", &schema.facts)?,
    ])
}

fn write_table<T: Serialize>(dir: &Path, table: &str, rows: &[T]) -> Result<PathBuf> {
    let path = dir.join(format!("{}.csv", table));
    let mut wtr = csv::Writer::from_path(&path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    for row in rows {
        wtr.serialize(row)
            .with_context(|| format!("Failed to write row to {}", path.display()))?;
    }
    wtr.flush()?;

    info!(table, rows = rows.len(), path = %path.display(), "exported");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::RawTransactionRow;
    use crate::transform::transform;

    #[test]
    fn test_export_writes_one_file_per_table() {
        let dir = tempfile::tempdir().unwrap();
        let out = transform(&[
            RawTransactionRow::new("A1", "P1", Some("Widget"), "2", "5.00", "2024-01-05", Some("C1"), "UK"),
            RawTransactionRow::new("A2", "P2", None, "-1", "10.00", "2024-01-06", None, "UK"),
        ])
        .unwrap();

        let paths = export_star_schema(dir.path(), &out.schema).unwrap();
        assert_eq!(paths.len(), 4);

        let facts = fs::read_to_string(dir.path().join("fact_orders.csv")).unwrap();
        let mut lines = facts.lines();
        assert_eq!(
            lines.next(),
            Some("invoice_no,line_number,customer_key,product_key,date_key,quantity,unit_price,revenue,is_return")
        );
        assert_eq!(lines.next(), Some("A1,1,1,1,1,2,5.00,10.00,false"));
        assert_eq!(lines.next(), Some("A2,1,2,2,2,-1,10.00,-10.00,true"));

        let dates = fs::read_to_string(dir.path().join("dim_date.csv")).unwrap();
        assert!(dates.contains("1,2024-01-05,2024,1,5,4,January,false"));
    }
}
