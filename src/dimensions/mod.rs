// 🧱 Dimension Builders - Customer, Product, Date
//
// Each builder walks the valid rows in input order and hands out surrogate
// keys 1, 2, 3... on the first sighting of a natural key. Builder state is
// private until `finish`, so the three can run on separate threads.

pub mod customer;
pub mod date;
pub mod product;

pub use customer::{CustomerBuilder, DimCustomer};
pub use date::{DateBuilder, DimDate};
pub use product::{DimProduct, ProductBuilder};

use crate::normalizer::NormalizedRow;
use std::collections::HashMap;
use std::hash::Hash;

/// Synthetic integer key, dense from 1 within one dimension
pub type SurrogateKey = i64;

/// Row of a dimension table, as the schema contract sees it
pub trait DimensionRow {
    /// SQL table the row is loaded into
    const TABLE: &'static str;

    fn surrogate_key(&self) -> SurrogateKey;

    /// Business key rendered as text (for diagnostics and uniqueness checks)
    fn natural_key(&self) -> String;
}

/// A finished dimension: its rows and the natural → surrogate key index
#[derive(Debug, Clone, PartialEq)]
pub struct Dimension<R, K: Eq + Hash> {
    pub rows: Vec<R>,
    pub index: HashMap<K, SurrogateKey>,
}

impl<R, K: Eq + Hash> Dimension<R, K> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn key_for(&self, natural_key: &K) -> Option<SurrogateKey> {
        self.index.get(natural_key).copied()
    }
}

impl<R, K: Eq + Hash> Default for Dimension<R, K> {
    fn default() -> Self {
        Dimension {
            rows: Vec::new(),
            index: HashMap::new(),
        }
    }
}

/// Accumulates one dimension from a stream of valid rows
pub trait DimensionBuilder: Default {
    type Row: DimensionRow;
    type Key: Eq + Hash;

    /// Feed one valid row
    fn observe(&mut self, row: &NormalizedRow);

    /// Resolve any deferred attributes and hand over the table
    fn finish(self) -> Dimension<Self::Row, Self::Key>;

    /// Run a fresh builder over all rows
    fn build(rows: &[NormalizedRow]) -> Dimension<Self::Row, Self::Key> {
        let mut builder = Self::default();
        for row in rows {
            builder.observe(row);
        }
        builder.finish()
    }
}

/// Next key in a dense sequence starting at 1
pub(crate) fn next_key(assigned: usize) -> SurrogateKey {
    assigned as SurrogateKey + 1
}
