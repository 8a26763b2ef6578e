// 🧾 Fact Assembler - normalized rows + key indexes → fact_orders
//
// Runs after all three dimensions are finished. A lookup miss means the
// builders and the assembler disagree about the input, so the run is
// aborted with every miss listed rather than dropping rows.

use crate::dimensions::{DimCustomer, DimDate, DimProduct, Dimension, SurrogateKey};
use crate::error::{LookupKind, Result, TransformError, UnresolvedKey};
use crate::normalizer::{InvalidReason, NormalizedRow, Validity};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactOrderLine {
    pub invoice_no: String,
    /// 1-based position of the line within its invoice
    pub line_number: u32,
    pub customer_key: SurrogateKey,
    pub product_key: SurrogateKey,
    pub date_key: SurrogateKey,
    pub quantity: i64,
    pub unit_price: Decimal,
    /// quantity × unit_price, negative for returns
    pub revenue: Decimal,
    pub is_return: bool,
}

impl FactOrderLine {
    pub fn new(
        invoice_no: String,
        line_number: u32,
        keys: (SurrogateKey, SurrogateKey, SurrogateKey),
        quantity: i64,
        unit_price: Decimal,
    ) -> Option<Self> {
        let (customer_key, product_key, date_key) = keys;
        Some(FactOrderLine {
            invoice_no,
            line_number,
            customer_key,
            product_key,
            date_key,
            quantity,
            unit_price,
            revenue: line_revenue(quantity, unit_price)?,
            is_return: quantity < 0,
        })
    }
}

/// quantity × unit_price, or `None` when the product leaves the `Decimal` range
pub fn line_revenue(quantity: i64, unit_price: Decimal) -> Option<Decimal> {
    Decimal::from(quantity).checked_mul(unit_price)
}

pub fn assemble(
    valid_rows: &[NormalizedRow],
    customers: &Dimension<DimCustomer, String>,
    products: &Dimension<DimProduct, String>,
    dates: &Dimension<DimDate, NaiveDate>,
) -> Result<Vec<FactOrderLine>> {
    let mut facts = Vec::with_capacity(valid_rows.len());
    let mut unresolved = Vec::new();
    let mut line_numbers: HashMap<&str, u32> = HashMap::new();

    for row in valid_rows {
        if let Validity::Invalid(reason) = row.validity {
            return Err(TransformError::InvalidRowInFacts {
                record: row.record,
                reason,
            });
        }

        let customer = customers.key_for(&row.customer_id);
        let product = products.key_for(&row.stock_code);
        let date = dates.key_for(&row.invoice_date());

        let (customer_key, product_key, date_key) = match (customer, product, date) {
            (Some(c), Some(p), Some(d)) => (c, p, d),
            _ => {
                let misses = [
                    (customer.is_none(), LookupKind::Customer, row.customer_id.clone()),
                    (product.is_none(), LookupKind::Product, row.stock_code.clone()),
                    (date.is_none(), LookupKind::Date, row.invoice_date().to_string()),
                ];
                unresolved.extend(misses.into_iter().filter(|(missing, _, _)| *missing).map(
                    |(_, lookup, natural_key)| UnresolvedKey {
                        record: row.record,
                        invoice_no: row.invoice_no.clone(),
                        lookup,
                        natural_key,
                    },
                ));
                continue;
            }
        };

        let line_number = line_numbers.entry(row.invoice_no.as_str()).or_insert(0);
        *line_number += 1;

        // The normalizer flags overflowing line totals, so a valid row always fits
        let fact = FactOrderLine::new(
            row.invoice_no.clone(),
            *line_number,
            (customer_key, product_key, date_key),
            row.quantity,
            row.unit_price,
        )
        .ok_or(TransformError::InvalidRowInFacts {
            record: row.record,
            reason: InvalidReason::TypeCoercionFailure,
        })?;
        facts.push(fact);
    }

    if !unresolved.is_empty() {
        return Err(TransformError::UnresolvedKeys(unresolved));
    }

    Ok(facts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimensions::{CustomerBuilder, DateBuilder, DimensionBuilder, ProductBuilder};
    use crate::extract::RawTransactionRow;
    use crate::normalizer::normalize;
    use rust_decimal_macros::dec;

    fn valid(raw: &[RawTransactionRow]) -> Vec<NormalizedRow> {
        normalize(raw).into_valid_rows()
    }

    fn assemble_all(rows: &[NormalizedRow]) -> Result<Vec<FactOrderLine>> {
        assemble(
            rows,
            &CustomerBuilder::build(rows),
            &ProductBuilder::build(rows),
            &DateBuilder::build(rows),
        )
    }

    #[test]
    fn test_line_numbers_per_invoice() {
        let rows = valid(&[
            RawTransactionRow::new("A1", "P1", None, "1", "1.00", "2024-01-05", Some("C1"), "UK"),
            RawTransactionRow::new("A2", "P1", None, "1", "1.00", "2024-01-05", Some("C1"), "UK"),
            RawTransactionRow::new("A1", "P1", None, "4", "1.00", "2024-01-05", Some("C1"), "UK"),
            RawTransactionRow::new("A1", "P2", None, "1", "1.00", "2024-01-05", Some("C1"), "UK"),
        ]);

        let facts = assemble_all(&rows).unwrap();
        let numbering: Vec<(&str, u32)> = facts
            .iter()
            .map(|f| (f.invoice_no.as_str(), f.line_number))
            .collect();

        // Same (invoice, product) twice stays two lines
        assert_eq!(numbering, vec![("A1", 1), ("A2", 1), ("A1", 2), ("A1", 3)]);
    }

    #[test]
    fn test_return_revenue_is_negative() {
        let rows = valid(&[RawTransactionRow::new(
            "C7", "P1", Some("Widget"), "-3", "5.00", "2024-01-05", Some("C1"), "UK",
        )]);

        let facts = assemble_all(&rows).unwrap();

        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].revenue, dec!(-15.00));
        assert!(facts[0].is_return);
    }

    #[test]
    fn test_lookup_miss_is_fatal() {
        let rows = valid(&[
            RawTransactionRow::new("A1", "P1", None, "1", "1.00", "2024-01-05", Some("C1"), "UK"),
            RawTransactionRow::new("A2", "P2", None, "1", "1.00", "2024-01-06", Some("C1"), "UK"),
        ]);

        // Products built from the first row only: P2 is unknown
        let err = assemble(
            &rows,
            &CustomerBuilder::build(&rows),
            &ProductBuilder::build(&rows[..1]),
            &DateBuilder::build(&rows[..1]),
        )
        .unwrap_err();

        match err {
            TransformError::UnresolvedKeys(misses) => {
                assert_eq!(misses.len(), 2);
                assert!(misses.iter().all(|m| m.record == 2));
                assert_eq!(misses[0].lookup, LookupKind::Product);
                assert_eq!(misses[0].natural_key, "P2");
                assert_eq!(misses[1].lookup, LookupKind::Date);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_row_is_rejected() {
        let rows = normalize(&[RawTransactionRow::new(
            "A1", "P1", None, "3", "0", "2024-01-05", Some("C1"), "UK",
        )])
        .rows;

        let err = assemble(&rows, &Dimension::default(), &Dimension::default(), &Dimension::default())
            .unwrap_err();

        assert!(matches!(
            err,
            TransformError::InvalidRowInFacts { record: 1, reason: InvalidReason::NonPositivePrice }
        ));
    }

    #[test]
    fn test_line_revenue_overflow() {
        assert_eq!(line_revenue(-3, dec!(5.00)), Some(dec!(-15.00)));
        assert_eq!(line_revenue(1_000_000_000, Decimal::MAX), None);
        assert_eq!(line_revenue(i64::MIN, Decimal::MAX), None);
    }

    #[test]
    fn test_overflowing_row_fails_instead_of_panicking() {
        let mut rows = valid(&[RawTransactionRow::new(
            "A1", "P1", None, "1", "1.00", "2024-01-05", Some("C1"), "UK",
        )]);
        // Bypass the normalizer's overflow check
        rows[0].quantity = 1_000_000_000;
        rows[0].unit_price = Decimal::MAX;

        let err = assemble_all(&rows).unwrap_err();

        assert!(matches!(
            err,
            TransformError::InvalidRowInFacts { record: 1, reason: InvalidReason::TypeCoercionFailure }
        ));
    }

    #[test]
    fn test_empty_input_yields_no_facts() {
        assert!(assemble_all(&[]).unwrap().is_empty());
    }
}
