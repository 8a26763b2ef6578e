// 🚨 Transform errors - integrity faults that abort a run
// Row-level defects never get here: the normalizer counts them and moves on.

use crate::contract::ValidationReport;
use crate::normalizer::InvalidReason;
use thiserror::Error;

/// Which dimension index a fact row failed to resolve against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    Customer,
    Product,
    Date,
}

impl LookupKind {
    pub fn table(&self) -> &'static str {
        match self {
            LookupKind::Customer => "dim_customers",
            LookupKind::Product => "dim_products",
            LookupKind::Date => "dim_date",
        }
    }
}

/// One fact row that could not be assembled
#[derive(Debug, Clone, PartialEq)]
pub struct UnresolvedKey {
    /// 1-based record number, header excluded
    pub record: usize,
    pub invoice_no: String,
    pub lookup: LookupKind,
    pub natural_key: String,
}

impl std::fmt::Display for UnresolvedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "record {} (invoice {}): '{}' missing from {}",
            self.record,
            self.invoice_no,
            self.natural_key,
            self.lookup.table()
        )
    }
}

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("fact assembly hit {} unresolved key lookup(s), first: {}", .0.len(), first_fault(.0))]
    UnresolvedKeys(Vec<UnresolvedKey>),

    #[error("invalid row at record {record} reached fact assembly ({reason})")]
    InvalidRowInFacts { record: usize, reason: InvalidReason },

    #[error("schema contract violated: {0}")]
    ContractViolated(ValidationReport),

    #[error("{0} dimension builder panicked")]
    BuilderPanicked(&'static str),
}

fn first_fault(faults: &[UnresolvedKey]) -> String {
    faults.first().map(ToString::to_string).unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, TransformError>;
