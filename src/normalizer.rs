// 🧹 Record Normalizer - trim, type and flag raw rows
//
// Pure function over its input. Invalid rows are kept (flagged) so the caller
// can count them; they are filtered out before any dimension or fact work.

use crate::extract::RawTransactionRow;
use crate::fact::line_revenue;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Natural key used for rows that carry no customer id
pub const UNKNOWN_CUSTOMER: &str = "UNKNOWN";

// ============================================================================
// VALIDITY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidReason {
    MissingInvoiceId,
    MissingStockCode,
    TypeCoercionFailure,
    NonPositivePrice,
}

impl InvalidReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvalidReason::MissingInvoiceId => "missing_invoice_id",
            InvalidReason::MissingStockCode => "missing_stock_code",
            InvalidReason::TypeCoercionFailure => "type_coercion_failure",
            InvalidReason::NonPositivePrice => "non_positive_price",
        }
    }
}

impl std::fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Validity {
    Valid,
    Invalid(InvalidReason),
}

/// Invalid row counts keyed by reason (ordered for stable output)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidRowCounts(BTreeMap<InvalidReason, usize>);

impl InvalidRowCounts {
    pub fn record(&mut self, reason: InvalidReason) {
        *self.0.entry(reason).or_insert(0) += 1;
    }

    pub fn get(&self, reason: InvalidReason) -> usize {
        self.0.get(&reason).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (InvalidReason, usize)> + '_ {
        self.0.iter().map(|(reason, count)| (*reason, *count))
    }

    /// JSON object `{"reason": count}` for the run audit table
    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .iter()
            .map(|(reason, count)| (reason.as_str().to_string(), serde_json::json!(count)))
            .collect();
        serde_json::Value::Object(map)
    }
}

// ============================================================================
// NORMALIZED ROW
// ============================================================================

/// A raw row with types enforced
///
/// When `validity` is `Invalid`, the typed fields that failed to coerce hold
/// their zero value and must not be read.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    /// 1-based record number in the raw input (the header is not a record)
    pub record: usize,
    pub invoice_no: String,
    pub stock_code: String,
    pub description: Option<String>,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub invoiced_at: NaiveDateTime,
    pub customer_id: String,
    pub country: String,
    pub is_return: bool,
    pub validity: Validity,
}

impl NormalizedRow {
    pub fn is_valid(&self) -> bool {
        self.validity == Validity::Valid
    }

    pub fn invoice_date(&self) -> NaiveDate {
        self.invoiced_at.date()
    }
}

/// Normalizer output: every row (flagged) plus the per-reason tally
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub rows: Vec<NormalizedRow>,
    pub invalid: InvalidRowCounts,
}

impl Normalized {
    /// Consume the output, keeping only rows that may reach the builders
    pub fn into_valid_rows(self) -> Vec<NormalizedRow> {
        self.rows.into_iter().filter(NormalizedRow::is_valid).collect()
    }
}

// ============================================================================
// NORMALIZE
// ============================================================================

pub fn normalize(raw_rows: &[RawTransactionRow]) -> Normalized {
    let mut invalid = InvalidRowCounts::default();

    let rows = raw_rows
        .iter()
        .enumerate()
        .map(|(i, raw)| {
            let row = normalize_row(i + 1, raw);
            if let Validity::Invalid(reason) = row.validity {
                invalid.record(reason);
            }
            row
        })
        .collect();

    Normalized { rows, invalid }
}

fn normalize_row(record: usize, raw: &RawTransactionRow) -> NormalizedRow {
    let invoice_no = clean(raw.invoice_no.as_deref());
    let stock_code = clean(raw.stock_code.as_deref());
    let description = clean(raw.description.as_deref());
    let customer_id = clean(raw.customer_id.as_deref())
        .map(|id| canonical_customer_id(&id))
        .unwrap_or_else(|| UNKNOWN_CUSTOMER.to_string());
    let country = clean(raw.country.as_deref()).unwrap_or_default();

    let quantity = clean(raw.quantity.as_deref()).and_then(|q| parse_quantity(&q));
    let unit_price = clean(raw.unit_price.as_deref()).and_then(|p| parse_price(&p));
    let invoiced_at = clean(raw.invoice_date.as_deref()).and_then(|t| parse_timestamp(&t));

    let validity = match (&invoice_no, &stock_code, quantity, unit_price, invoiced_at) {
        (None, _, _, _, _) => Validity::Invalid(InvalidReason::MissingInvoiceId),
        (_, None, _, _, _) => Validity::Invalid(InvalidReason::MissingStockCode),
        (_, _, Some(q), Some(p), Some(_)) => {
            if line_revenue(q, p).is_none() {
                // Line total does not fit a Decimal
                Validity::Invalid(InvalidReason::TypeCoercionFailure)
            } else if q >= 0 && p <= Decimal::ZERO {
                // Returns (q < 0) are legitimate whatever the price sign
                Validity::Invalid(InvalidReason::NonPositivePrice)
            } else {
                Validity::Valid
            }
        }
        _ => Validity::Invalid(InvalidReason::TypeCoercionFailure),
    };

    let quantity = quantity.unwrap_or(0);

    NormalizedRow {
        record,
        invoice_no: invoice_no.unwrap_or_default(),
        stock_code: stock_code.unwrap_or_default(),
        description,
        quantity,
        unit_price: unit_price.unwrap_or(Decimal::ZERO),
        invoiced_at: invoiced_at.unwrap_or_default(),
        customer_id,
        country,
        is_return: quantity < 0,
        validity,
    }
}

/// Trim; blank becomes None
fn clean(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Spreadsheet exports write integer ids as floats ("17850.0")
fn canonical_customer_id(id: &str) -> String {
    if id.contains('.') {
        if let Ok(value) = Decimal::from_str(id) {
            if value.fract().is_zero() {
                return value.trunc().normalize().to_string();
            }
        }
    }
    id.to_string()
}

/// Integer quantity; "3.0" is accepted, "2.5" is not
fn parse_quantity(value: &str) -> Option<i64> {
    if let Ok(q) = value.parse::<i64>() {
        return Some(q);
    }
    let decimal = Decimal::from_str(value).ok()?;
    if decimal.fract().is_zero() {
        decimal.trunc().to_i64()
    } else {
        None
    }
}

fn parse_price(value: &str) -> Option<Decimal> {
    Decimal::from_str(value)
        .or_else(|_| Decimal::from_scientific(value))
        .ok()
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    for format in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, format) {
            return Some(ts);
        }
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.naive_local());
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}
