// ⭐ Transform - raw rows → validated star schema
//
// normalize → {customer, product, date builders on scoped threads} → join →
// assemble facts → schema contract. Either every table comes back validated
// or the run fails with a single aggregated error.

use crate::contract::{self, ValidationReport};
use crate::dimensions::{
    CustomerBuilder, DateBuilder, DimCustomer, DimDate, DimProduct, DimensionBuilder, ProductBuilder,
};
use crate::error::{Result, TransformError};
use crate::extract::RawTransactionRow;
use crate::fact::{self, FactOrderLine};
use crate::normalizer::{self, InvalidRowCounts};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::thread;
use tracing::{debug, info, warn};

/// The four output tables, read-only once validated
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StarSchema {
    pub customers: Vec<DimCustomer>,
    pub products: Vec<DimProduct>,
    pub dates: Vec<DimDate>,
    pub facts: Vec<FactOrderLine>,
}

impl StarSchema {
    /// SHA-256 over the canonical JSON of all four tables
    ///
    /// Two runs over the same input must produce the same fingerprint.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        // Serializing plain structs and Vecs to JSON cannot fail
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        hasher.update(&canonical);
        format!("{:x}", hasher.finalize())
    }

    /// Sum of all line totals; `None` if it leaves the `Decimal` range
    pub fn total_revenue(&self) -> Option<rust_decimal::Decimal> {
        self.facts
            .iter()
            .try_fold(rust_decimal::Decimal::ZERO, |total, f| total.checked_add(f.revenue))
    }
}

/// Run-level diagnostics, returned rather than kept in globals
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformReport {
    pub raw_rows: usize,
    pub valid_rows: usize,
    pub return_rows: usize,
    pub invalid: InvalidRowCounts,
}

impl TransformReport {
    pub fn summary(&self) -> String {
        format!(
            "{} raw rows: {} valid ({} returns), {} invalid",
            self.raw_rows,
            self.valid_rows,
            self.return_rows,
            self.invalid.total()
        )
    }
}

#[derive(Debug, Clone)]
pub struct TransformOutput {
    pub schema: StarSchema,
    pub report: TransformReport,
    pub validation: ValidationReport,
}

pub fn transform(raw_rows: &[RawTransactionRow]) -> Result<TransformOutput> {
    info!(rows = raw_rows.len(), "normalizing raw rows");
    let normalized = normalizer::normalize(raw_rows);
    let invalid = normalized.invalid.clone();
    let valid_rows = normalized.into_valid_rows();

    for (reason, count) in invalid.iter() {
        warn!(%reason, count, "excluded invalid rows");
    }

    let report = TransformReport {
        raw_rows: raw_rows.len(),
        valid_rows: valid_rows.len(),
        return_rows: valid_rows.iter().filter(|r| r.is_return).count(),
        invalid,
    };

    // Fork: the builders only read `valid_rows` and own their output
    let (customers, products, dates) = thread::scope(|s| {
        let customers = s.spawn(|| CustomerBuilder::build(&valid_rows));
        let products = s.spawn(|| ProductBuilder::build(&valid_rows));
        let dates = s.spawn(|| DateBuilder::build(&valid_rows));

        // Join barrier: facts start only after all three are done
        (customers.join(), products.join(), dates.join())
    });

    let customers = customers.map_err(|_| TransformError::BuilderPanicked("customer"))?;
    let products = products.map_err(|_| TransformError::BuilderPanicked("product"))?;
    let dates = dates.map_err(|_| TransformError::BuilderPanicked("date"))?;

    debug!(
        customers = customers.len(),
        products = products.len(),
        dates = dates.len(),
        "dimensions built"
    );

    let facts = fact::assemble(&valid_rows, &customers, &products, &dates)?;

    let schema = StarSchema {
        customers: customers.rows,
        products: products.rows,
        dates: dates.rows,
        facts,
    };

    let validation = contract::validate(&schema);
    if !validation.is_clean() {
        return Err(TransformError::ContractViolated(validation));
    }

    info!(
        customers = schema.customers.len(),
        products = schema.products.len(),
        dates = schema.dates.len(),
        facts = schema.facts.len(),
        "transform complete"
    );

    Ok(TransformOutput {
        schema,
        report,
        validation,
    })
}
