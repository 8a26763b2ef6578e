// 👤 Customer dimension
// Natural key: customer id, or the UNKNOWN sentinel for guest orders.
// Country is whatever the customer's first row said.

use super::{next_key, Dimension, DimensionBuilder, DimensionRow, SurrogateKey};
use crate::normalizer::NormalizedRow;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimCustomer {
    pub customer_key: SurrogateKey,
    pub customer_id: String,
    pub country: String,
}

impl DimensionRow for DimCustomer {
    const TABLE: &'static str = "dim_customers";

    fn surrogate_key(&self) -> SurrogateKey {
        self.customer_key
    }

    fn natural_key(&self) -> String {
        self.customer_id.clone()
    }
}

#[derive(Debug, Default)]
pub struct CustomerBuilder {
    rows: Vec<DimCustomer>,
    index: HashMap<String, SurrogateKey>,
}

impl DimensionBuilder for CustomerBuilder {
    type Row = DimCustomer;
    type Key = String;

    fn observe(&mut self, row: &NormalizedRow) {
        if let Entry::Vacant(slot) = self.index.entry(row.customer_id.clone()) {
            let key = next_key(self.rows.len());
            slot.insert(key);
            self.rows.push(DimCustomer {
                customer_key: key,
                customer_id: row.customer_id.clone(),
                country: row.country.clone(),
            });
        }
    }

    fn finish(self) -> Dimension<DimCustomer, String> {
        Dimension {
            rows: self.rows,
            index: self.index,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::RawTransactionRow;
    use crate::normalizer::{normalize, UNKNOWN_CUSTOMER};

    fn rows(specs: &[(Option<&str>, &str)]) -> Vec<NormalizedRow> {
        let raw: Vec<RawTransactionRow> = specs
            .iter()
            .map(|(customer, country)| {
                RawTransactionRow::new("A1", "P1", None, "1", "1.00", "2024-01-05", *customer, country)
            })
            .collect();
        normalize(&raw).into_valid_rows()
    }

    #[test]
    fn test_first_seen_keys_and_country() {
        let dim = CustomerBuilder::build(&rows(&[
            (Some("C2"), "France"),
            (Some("C1"), "Germany"),
            (Some("C2"), "Spain"),
        ]));

        assert_eq!(dim.len(), 2);
        assert_eq!(dim.rows[0].customer_id, "C2");
        assert_eq!(dim.rows[0].customer_key, 1);
        assert_eq!(dim.rows[0].country, "France");
        assert_eq!(dim.rows[1].customer_key, 2);
        assert_eq!(dim.key_for(&"C1".to_string()), Some(2));
    }

    #[test]
    fn test_guests_share_unknown_row() {
        let dim = CustomerBuilder::build(&rows(&[(None, "France"), (None, "Spain"), (Some("C1"), "France")]));

        assert_eq!(dim.len(), 2);
        assert_eq!(dim.rows[0].customer_id, UNKNOWN_CUSTOMER);
        assert_eq!(dim.key_for(&UNKNOWN_CUSTOMER.to_string()), Some(1));
    }

    #[test]
    fn test_empty_input() {
        let dim = CustomerBuilder::build(&[]);
        assert!(dim.is_empty());
        assert!(dim.index.is_empty());
    }
}
