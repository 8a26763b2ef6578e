// 📐 Schema Contract - invariants every finished star schema must satisfy
//
// Runs once, after all four tables exist. Any violation is fatal for the
// run; the report lists which table broke which rule and on which rows.
// Null measures cannot occur: quantity, price and revenue are non-optional
// in `FactOrderLine`.

use crate::dimensions::{DimensionRow, SurrogateKey};
use crate::fact::{line_revenue, FactOrderLine};
use crate::transform::StarSchema;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Row ids listed per violation before the rest is summarised as a count
const MAX_REPORTED_ROWS: usize = 20;

// ============================================================================
// RULES & VIOLATIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    UniqueNaturalKey,
    UniqueSurrogateKey,
    DenseSurrogateKeys,
    ForeignKeyResolves,
    RevenueIsProduct,
    UniqueFactLine,
}

impl Rule {
    pub fn name(&self) -> &'static str {
        match self {
            Rule::UniqueNaturalKey => "unique_natural_key",
            Rule::UniqueSurrogateKey => "unique_surrogate_key",
            Rule::DenseSurrogateKeys => "dense_surrogate_keys",
            Rule::ForeignKeyResolves => "foreign_key_resolves",
            Rule::RevenueIsProduct => "revenue_is_product",
            Rule::UniqueFactLine => "unique_fact_line",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub table: String,
    pub rule: Rule,
    pub message: String,
    /// Offending row identifiers (natural keys, or `invoice#line` for facts)
    pub row_ids: Vec<String>,
    /// Total offenders, `row_ids` may be truncated
    pub row_count: usize,
}

impl Violation {
    fn new(table: &str, rule: Rule, message: String, mut row_ids: Vec<String>) -> Self {
        let row_count = row_ids.len();
        row_ids.truncate(MAX_REPORTED_ROWS);
        Violation {
            table: table.to_string(),
            rule,
            message,
            row_ids,
            row_count,
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {}: {} ({} row(s): {}",
            self.table,
            self.rule.name(),
            self.message,
            self.row_count,
            self.row_ids.join(", ")
        )?;
        if self.row_count > self.row_ids.len() {
            write!(f, ", …")?;
        }
        write!(f, ")")
    }
}

// ============================================================================
// VALIDATION REPORT
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub violations: Vec<Violation>,
    pub tables_checked: usize,
    pub rows_checked: usize,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn violations_of(&self, rule: Rule) -> impl Iterator<Item = &Violation> + '_ {
        self.violations.iter().filter(move |v| v.rule == rule)
    }

    pub fn summary(&self) -> String {
        format!(
            "{} table(s), {} row(s) checked, {} violation(s)",
            self.tables_checked,
            self.rows_checked,
            self.violations.len()
        )
    }
}

impl std::fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.summary())?;
        for violation in &self.violations {
            write!(f, "; {}", violation)?;
        }
        Ok(())
    }
}

// ============================================================================
// CHECKS
// ============================================================================

pub fn validate(schema: &StarSchema) -> ValidationReport {
    let mut report = ValidationReport::default();

    let customer_keys = check_dimension(&schema.customers, &mut report);
    let product_keys = check_dimension(&schema.products, &mut report);
    let date_keys = check_dimension(&schema.dates, &mut report);

    let foreign_keys: [(&str, KeyOf, &HashSet<SurrogateKey>); 3] = [
        ("customer_key", |f| f.customer_key, &customer_keys),
        ("product_key", |f| f.product_key, &product_keys),
        ("date_key", |f| f.date_key, &date_keys),
    ];
    check_facts(&schema.facts, foreign_keys, &mut report);

    report
}

/// Uniqueness and density of one dimension; returns its surrogate key set
fn check_dimension<R: DimensionRow>(rows: &[R], report: &mut ValidationReport) -> HashSet<SurrogateKey> {
    report.tables_checked += 1;
    report.rows_checked += rows.len();

    let mut natural: HashMap<String, usize> = HashMap::new();
    let mut keys: HashSet<SurrogateKey> = HashSet::with_capacity(rows.len());
    let mut duplicate_keys = Vec::new();

    for row in rows {
        *natural.entry(row.natural_key()).or_insert(0) += 1;
        if !keys.insert(row.surrogate_key()) {
            duplicate_keys.push(row.surrogate_key().to_string());
        }
    }

    let mut duplicate_natural: Vec<String> = natural
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(key, _)| key)
        .collect();
    duplicate_natural.sort();

    if !duplicate_natural.is_empty() {
        report.violations.push(Violation::new(
            R::TABLE,
            Rule::UniqueNaturalKey,
            "natural key appears on more than one row".to_string(),
            duplicate_natural,
        ));
    }

    if !duplicate_keys.is_empty() {
        report.violations.push(Violation::new(
            R::TABLE,
            Rule::UniqueSurrogateKey,
            "surrogate key assigned more than once".to_string(),
            duplicate_keys,
        ));
    }

    // Dense from 1: with unique keys, every key must lie in 1..=n
    let n = rows.len() as SurrogateKey;
    let out_of_range: Vec<String> = rows
        .iter()
        .filter(|row| !(1..=n).contains(&row.surrogate_key()))
        .map(|row| format!("{}={}", row.natural_key(), row.surrogate_key()))
        .collect();

    if !out_of_range.is_empty() {
        report.violations.push(Violation::new(
            R::TABLE,
            Rule::DenseSurrogateKeys,
            format!("surrogate keys must be exactly 1..={}", n),
            out_of_range,
        ));
    }

    keys
}

/// Reads one foreign key column off a fact row
type KeyOf = fn(&FactOrderLine) -> SurrogateKey;

fn check_facts(
    facts: &[FactOrderLine],
    foreign_keys: [(&str, KeyOf, &HashSet<SurrogateKey>); 3],
    report: &mut ValidationReport,
) {
    const TABLE: &str = "fact_orders";
    report.tables_checked += 1;
    report.rows_checked += facts.len();

    let fact_id = |f: &FactOrderLine| format!("{}#{}", f.invoice_no, f.line_number);

    for (column, key_of, keys) in foreign_keys {
        let dangling: Vec<String> = facts
            .iter()
            .filter(|f| !keys.contains(&key_of(f)))
            .map(|f| format!("{} ({}={})", fact_id(f), column, key_of(f)))
            .collect();

        if !dangling.is_empty() {
            report.violations.push(Violation::new(
                TABLE,
                Rule::ForeignKeyResolves,
                format!("{} does not resolve to a dimension row", column),
                dangling,
            ));
        }
    }

    let bad_revenue: Vec<String> = facts
        .iter()
        .filter(|f| line_revenue(f.quantity, f.unit_price) != Some(f.revenue))
        .map(fact_id)
        .collect();

    if !bad_revenue.is_empty() {
        report.violations.push(Violation::new(
            TABLE,
            Rule::RevenueIsProduct,
            "revenue differs from quantity × unit_price".to_string(),
            bad_revenue,
        ));
    }

    let mut seen = HashSet::with_capacity(facts.len());
    let duplicate_lines: Vec<String> = facts
        .iter()
        .filter(|f| !seen.insert((f.invoice_no.as_str(), f.line_number)))
        .map(fact_id)
        .collect();

    if !duplicate_lines.is_empty() {
        report.violations.push(Violation::new(
            TABLE,
            Rule::UniqueFactLine,
            "(invoice_no, line_number) is not unique".to_string(),
            duplicate_lines,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimensions::{DimCustomer, DimDate, DimProduct};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn small_schema() -> StarSchema {
        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        StarSchema {
            customers: vec![DimCustomer {
                customer_key: 1,
                customer_id: "C1".to_string(),
                country: "UK".to_string(),
            }],
            products: vec![DimProduct {
                product_key: 1,
                stock_code: "P1".to_string(),
                description: "Widget".to_string(),
            }],
            dates: vec![DimDate::from_date(1, date)],
            facts: vec![FactOrderLine::new("A1".to_string(), 1, (1, 1, 1), 2, dec!(5.00)).unwrap()],
        }
    }

    #[test]
    fn test_clean_schema_passes() {
        let report = validate(&small_schema());

        assert!(report.is_clean(), "{}", report);
        assert_eq!(report.tables_checked, 4);
        assert_eq!(report.rows_checked, 4);
    }

    #[test]
    fn test_dangling_product_key_fails_loudly() {
        let mut schema = small_schema();
        schema.facts[0].product_key = 99;

        let report = validate(&schema);
        let violation = report.violations_of(Rule::ForeignKeyResolves).next().unwrap();

        assert_eq!(violation.table, "fact_orders");
        assert!(violation.message.contains("product_key"));
        assert_eq!(violation.row_ids, vec!["A1#1 (product_key=99)".to_string()]);
    }

    #[test]
    fn test_duplicate_natural_key() {
        let mut schema = small_schema();
        schema.customers.push(DimCustomer {
            customer_key: 2,
            customer_id: "C1".to_string(),
            country: "France".to_string(),
        });

        let report = validate(&schema);
        let violation = report.violations_of(Rule::UniqueNaturalKey).next().unwrap();

        assert_eq!(violation.table, "dim_customers");
        assert_eq!(violation.row_ids, vec!["C1".to_string()]);
    }

    #[test]
    fn test_sparse_and_duplicate_surrogate_keys() {
        let mut schema = small_schema();
        schema.products.push(DimProduct {
            product_key: 5,
            stock_code: "P2".to_string(),
            description: String::new(),
        });
        schema.products.push(DimProduct {
            product_key: 1,
            stock_code: "P3".to_string(),
            description: String::new(),
        });

        let report = validate(&schema);

        assert_eq!(report.violations_of(Rule::DenseSurrogateKeys).count(), 1);
        assert_eq!(report.violations_of(Rule::UniqueSurrogateKey).count(), 1);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_tampered_revenue() {
        let mut schema = small_schema();
        schema.facts[0].revenue = dec!(11.00);

        let report = validate(&schema);

        assert_eq!(report.violations_of(Rule::RevenueIsProduct).count(), 1);
    }

    #[test]
    fn test_out_of_range_measures_are_a_violation() {
        let mut schema = small_schema();
        schema.facts[0].quantity = 1_000_000_000;
        schema.facts[0].unit_price = rust_decimal::Decimal::MAX;

        let report = validate(&schema);

        assert_eq!(report.violations_of(Rule::RevenueIsProduct).count(), 1);
    }

    #[test]
    fn test_duplicate_fact_line() {
        let mut schema = small_schema();
        let copy = schema.facts[0].clone();
        schema.facts.push(copy);

        let report = validate(&schema);

        assert_eq!(report.violations_of(Rule::UniqueFactLine).count(), 1);
        assert!(report.to_string().contains("unique_fact_line"));
    }

    #[test]
    fn test_empty_schema_is_clean() {
        assert!(validate(&StarSchema::default()).is_clean());
    }
}
