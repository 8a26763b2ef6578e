// 📂 Extract - Online Retail CSV export → raw rows
// Cells stay as text here; typing belongs to the normalizer.

use anyhow::{bail, Context, Result};
use csv::{ByteRecord, StringRecord};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

/// One line of the transaction export, exactly as the file had it
///
/// Every cell is optional text: a missing or malformed value is a row-level
/// defect for the normalizer to classify, never a reason to abort the read.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RawTransactionRow {
    #[serde(rename = "InvoiceNo", default)]
    pub invoice_no: Option<String>,

    #[serde(rename = "StockCode", default)]
    pub stock_code: Option<String>,

    #[serde(rename = "Description", default)]
    pub description: Option<String>,

    #[serde(rename = "Quantity", default)]
    pub quantity: Option<String>,

    #[serde(rename = "InvoiceDate", default)]
    pub invoice_date: Option<String>,

    #[serde(rename = "UnitPrice", default)]
    pub unit_price: Option<String>,

    #[serde(rename = "CustomerID", default)]
    pub customer_id: Option<String>,

    #[serde(rename = "Country", default)]
    pub country: Option<String>,
}

impl RawTransactionRow {
    /// Convenience constructor used by tests and callers that build rows in memory
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        invoice_no: &str,
        stock_code: &str,
        description: Option<&str>,
        quantity: &str,
        unit_price: &str,
        invoice_date: &str,
        customer_id: Option<&str>,
        country: &str,
    ) -> Self {
        RawTransactionRow {
            invoice_no: Some(invoice_no.to_string()),
            stock_code: Some(stock_code.to_string()),
            description: description.map(str::to_string),
            quantity: Some(quantity.to_string()),
            invoice_date: Some(invoice_date.to_string()),
            unit_price: Some(unit_price.to_string()),
            customer_id: customer_id.map(str::to_string),
            country: Some(country.to_string()),
        }
    }
}

/// Read every row of a CSV export from disk
///
/// The workbook itself is not read: save the sheet as CSV first.
pub fn load_csv(csv_path: &Path) -> Result<Vec<RawTransactionRow>> {
    let extension = csv_path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    if matches!(extension.as_deref(), Some("xlsx" | "xls")) {
        bail!(
            "{} is an Excel workbook; export the sheet to CSV and pass that file instead",
            csv_path.display()
        );
    }

    info!(path = %csv_path.display(), "reading raw transactions");

    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("Failed to open CSV file {}", csv_path.display()))?;
    let rows = read_rows(file)?;

    info!(rows = rows.len(), "loaded raw transactions");
    Ok(rows)
}

/// Read rows from any CSV source (header row required)
///
/// Cells that are not valid UTF-8 (Latin-1 exports) are decoded lossily, so a
/// bad byte costs at most that row, not the whole read.
pub fn read_rows<R: Read>(reader: R) -> Result<Vec<RawTransactionRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(reader);

    let (headers, _) = decode_record(rdr.byte_headers().context("Failed to read CSV header")?);

    let mut rows = Vec::new();
    let mut lossy_records = 0usize;
    for result in rdr.byte_records() {
        let record = result.context("Failed to read CSV record")?;
        let line = record.position().map_or(0, |p| p.line());

        let (cells, lossy) = decode_record(&record);
        if lossy {
            lossy_records += 1;
        }

        let row: RawTransactionRow = cells
            .deserialize(Some(&headers))
            .with_context(|| format!("Failed to read CSV record at line {}", line))?;
        rows.push(row);
    }

    if lossy_records > 0 {
        warn!(records = lossy_records, "replaced invalid UTF-8 bytes (source is probably Latin-1)");
    }

    Ok(rows)
}

/// UTF-8 decode every cell; the flag says whether any byte was replaced
fn decode_record(record: &ByteRecord) -> (StringRecord, bool) {
    let mut lossy = false;
    let cells: Vec<String> = record
        .iter()
        .map(|cell| {
            let text = String::from_utf8_lossy(cell);
            lossy |= matches!(text, Cow::Owned(_));
            text.into_owned()
        })
        .collect();

    (StringRecord::from(cells), lossy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "\
InvoiceNo,StockCode,Description,Quantity,InvoiceDate,UnitPrice,CustomerID,Country
536365,85123A,WHITE HANGING HEART T-LIGHT HOLDER,6,12/1/2010 8:26,2.55,17850.0,United Kingdom
C536379,D,Discount,-1,12/1/2010 9:41,27.5,14527.0,United Kingdom
536414,22139,,56,12/1/2010 11:52,0,,United Kingdom
";

    #[test]
    fn test_read_rows_keeps_cells_as_text() {
        let rows = read_rows(SAMPLE.as_bytes()).unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].invoice_no.as_deref(), Some("536365"));
        assert_eq!(rows[0].customer_id.as_deref(), Some("17850.0"));
        assert_eq!(rows[1].quantity.as_deref(), Some("-1"));
        assert_eq!(rows[2].unit_price.as_deref(), Some("0"));
    }

    #[test]
    fn test_empty_cells_are_none() {
        let rows = read_rows(SAMPLE.as_bytes()).unwrap();

        assert_eq!(rows[2].description, None);
        assert_eq!(rows[2].customer_id, None);
    }

    #[test]
    fn test_load_csv_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let rows = load_csv(file.path()).unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn test_invalid_utf8_cell_does_not_abort_the_read() {
        let mut data = SAMPLE.as_bytes().to_vec();
        data.extend_from_slice(b"536520,21123,CAF\xC9 SET,2,12/1/2010 12:43,1.25,14729.0,United Kingdom\n");

        let rows = read_rows(data.as_slice()).unwrap();

        assert_eq!(rows.len(), 4);
        assert_eq!(rows[3].description.as_deref(), Some("CAF\u{FFFD} SET"));
        assert_eq!(rows[3].unit_price.as_deref(), Some("1.25"));
        assert_eq!(rows[3].customer_id.as_deref(), Some("14729.0"));
    }

    #[test]
    fn test_excel_workbook_is_rejected_with_a_hint() {
        let err = load_csv(Path::new("data/raw/Online Retail.xlsx")).unwrap_err();
        assert!(err.to_string().contains("export the sheet to CSV"));
    }

    #[test]
    fn test_load_csv_missing_file() {
        let err = load_csv(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(err.to_string().contains("Failed to open CSV file"));
    }
}
