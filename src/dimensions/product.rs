// 📦 Product dimension
//
// A stock code shows up with several descriptions in real exports (typos,
// re-labelled items). The dimension keeps the most frequent non-null one;
// on a tie the description seen first wins. Counting happens per code while
// rows stream in and is resolved once, in `finish`.

use super::{next_key, Dimension, DimensionBuilder, DimensionRow, SurrogateKey};
use crate::normalizer::NormalizedRow;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimProduct {
    pub product_key: SurrogateKey,
    pub stock_code: String,
    /// Empty when the code never carried a description
    pub description: String,
}

impl DimensionRow for DimProduct {
    const TABLE: &'static str = "dim_products";

    fn surrogate_key(&self) -> SurrogateKey {
        self.product_key
    }

    fn natural_key(&self) -> String {
        self.stock_code.clone()
    }
}

/// Description frequencies for one stock code, in first-seen order
#[derive(Debug, Default)]
struct DescriptionTally {
    counts: Vec<(String, usize)>,
}

impl DescriptionTally {
    fn add(&mut self, description: &str) {
        match self.counts.iter_mut().find(|(d, _)| d == description) {
            Some((_, count)) => *count += 1,
            None => self.counts.push((description.to_string(), 1)),
        }
    }

    /// Highest count; strict `>` keeps the earliest description on ties
    fn winner(self) -> Option<String> {
        let mut best: Option<(String, usize)> = None;
        for (description, count) in self.counts {
            if best.as_ref().map_or(true, |(_, top)| count > *top) {
                best = Some((description, count));
            }
        }
        best.map(|(description, _)| description)
    }
}

#[derive(Debug, Default)]
pub struct ProductBuilder {
    codes: Vec<String>,
    index: HashMap<String, SurrogateKey>,
    tallies: HashMap<String, DescriptionTally>,
}

impl DimensionBuilder for ProductBuilder {
    type Row = DimProduct;
    type Key = String;

    fn observe(&mut self, row: &NormalizedRow) {
        if let Entry::Vacant(slot) = self.index.entry(row.stock_code.clone()) {
            slot.insert(next_key(self.codes.len()));
            self.codes.push(row.stock_code.clone());
        }

        if let Some(description) = &row.description {
            self.tallies
                .entry(row.stock_code.clone())
                .or_default()
                .add(description);
        }
    }

    fn finish(mut self) -> Dimension<DimProduct, String> {
        let rows = self
            .codes
            .into_iter()
            .enumerate()
            .map(|(i, stock_code)| {
                let description = self
                    .tallies
                    .remove(&stock_code)
                    .and_then(DescriptionTally::winner)
                    .unwrap_or_default();
                DimProduct {
                    product_key: next_key(i),
                    stock_code,
                    description,
                }
            })
            .collect();

        Dimension {
            rows,
            index: self.index,
        }
    }
}
