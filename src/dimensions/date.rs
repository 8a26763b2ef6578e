// 📅 Date dimension
// One row per calendar date present in the data; time of day is dropped.

use super::{next_key, Dimension, DimensionBuilder, DimensionRow, SurrogateKey};
use crate::normalizer::NormalizedRow;
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimDate {
    pub date_key: SurrogateKey,
    pub invoice_date: NaiveDate,
    pub year: i32,
    pub month: u32,
    pub day: u32,
    /// Monday = 0 … Sunday = 6
    pub weekday: u32,
    pub month_name: String,
    pub is_weekend: bool,
}

impl DimDate {
    /// All attributes are pure functions of the date
    pub fn from_date(date_key: SurrogateKey, date: NaiveDate) -> Self {
        let weekday = date.weekday();
        DimDate {
            date_key,
            invoice_date: date,
            year: date.year(),
            month: date.month(),
            day: date.day(),
            weekday: weekday.num_days_from_monday(),
            month_name: date.format("%B").to_string(),
            is_weekend: matches!(weekday, Weekday::Sat | Weekday::Sun),
        }
    }
}

impl DimensionRow for DimDate {
    const TABLE: &'static str = "dim_date";

    fn surrogate_key(&self) -> SurrogateKey {
        self.date_key
    }

    fn natural_key(&self) -> String {
        self.invoice_date.to_string()
    }
}

#[derive(Debug, Default)]
pub struct DateBuilder {
    rows: Vec<DimDate>,
    index: HashMap<NaiveDate, SurrogateKey>,
}

impl DimensionBuilder for DateBuilder {
    type Row = DimDate;
    type Key = NaiveDate;

    fn observe(&mut self, row: &NormalizedRow) {
        let date = row.invoice_date();
        if let Entry::Vacant(slot) = self.index.entry(date) {
            let key = next_key(self.rows.len());
            slot.insert(key);
            self.rows.push(DimDate::from_date(key, date));
        }
    }

    fn finish(self) -> Dimension<DimDate, NaiveDate> {
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
    use crate::normalizer::normalize;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_derived_attributes() {
        // 2024-01-06 was a Saturday
        let saturday = DimDate::from_date(1, ymd(2024, 1, 6));
        assert_eq!(saturday.year, 2024);
        assert_eq!(saturday.month, 1);
        assert_eq!(saturday.day, 6);
        assert_eq!(saturday.weekday, 5);
        assert_eq!(saturday.month_name, "January");
        assert!(saturday.is_weekend);

        let friday = DimDate::from_date(2, ymd(2024, 1, 5));
        assert_eq!(friday.weekday, 4);
        assert!(!friday.is_weekend);
    }

    #[test]
    fn test_time_of_day_is_discarded() {
        let raw = vec![
            RawTransactionRow::new("A1", "P1", None, "1", "1.00", "1/5/2024 8:26", None, "UK"),
            RawTransactionRow::new("A2", "P1", None, "1", "1.00", "1/5/2024 17:03", None, "UK"),
            RawTransactionRow::new("A3", "P1", None, "1", "1.00", "2024-01-04 23:59:59", None, "UK"),
        ];
        let dim = DateBuilder::build(&normalize(&raw).into_valid_rows());

        assert_eq!(dim.len(), 2);
        assert_eq!(dim.rows[0].invoice_date, ymd(2024, 1, 5));
        assert_eq!(dim.key_for(&ymd(2024, 1, 4)), Some(2));
    }
}
