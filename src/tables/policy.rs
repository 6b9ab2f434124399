//! Row-generation policy
//!
//! Stands in for fetching real upstream rows. The synchronizer only relies
//! on the contract: external columns get a value of their type, local
//! columns get an empty string.

use chrono::{Duration, NaiveDate};
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::models::{Column, ColumnOrigin, ColumnType, Row};

/// Placeholder vocabulary for text cells
pub const SAMPLE_TEXTS: [&str; 5] = ["Sample data", "Test value", "Example", "New entry", "Content"];

/// ISO calendar date, the raw form of every date cell
pub const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

pub trait RowGenerationPolicy: Send + Sync {
    /// Whether this synchronization tick observes a new upstream row
    fn should_append(&self) -> bool;

    /// Value of an external column in a newly observed row
    fn external_value(&self, column: &Column, today: NaiveDate) -> String;

    fn generate_row(&self, columns: &[Column], today: NaiveDate) -> Row {
        columns
            .iter()
            .map(|column| {
                let value = match column.origin {
                    ColumnOrigin::Local => String::new(),
                    ColumnOrigin::External => self.external_value(column, today),
                };
                (column.id.clone(), value)
            })
            .collect()
    }
}

/// Demo policy: appends with a fixed probability, random dates within the
/// window and random placeholder text
#[derive(Debug, Clone)]
pub struct RandomRowPolicy {
    probability: f64,
    date_window_days: i64,
}

impl RandomRowPolicy {
    /// A non-finite `probability` never appends
    pub fn new(probability: f64, date_window_days: i64) -> Self {
        let probability = if probability.is_finite() {
            probability.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            probability,
            date_window_days: date_window_days.max(1),
        }
    }
}

impl RowGenerationPolicy for RandomRowPolicy {
    fn should_append(&self) -> bool {
        rand::thread_rng().gen_bool(self.probability)
    }

    fn external_value(&self, column: &Column, today: NaiveDate) -> String {
        let mut rng = rand::thread_rng();
        match column.data_type {
            ColumnType::Date => {
                let days_back = rng.gen_range(0..self.date_window_days);
                (today - Duration::days(days_back))
                    .format(ISO_DATE_FORMAT)
                    .to_string()
            }
            ColumnType::Text => SAMPLE_TEXTS
                .choose(&mut rng)
                .copied()
                .unwrap_or(SAMPLE_TEXTS[0])
                .to_string(),
        }
    }
}

/// Deterministic policy: a fixed append decision, dates a fixed number of
/// days back and text cycling through [`SAMPLE_TEXTS`]
#[derive(Debug)]
pub struct FixedRowPolicy {
    append: bool,
    days_back: i64,
    next_text: AtomicUsize,
}

impl FixedRowPolicy {
    pub fn new(append: bool, days_back: i64) -> Self {
        Self {
            append,
            days_back,
            next_text: AtomicUsize::new(0),
        }
    }

    pub fn always_append() -> Self {
        Self::new(true, 0)
    }

    pub fn never_append() -> Self {
        Self::new(false, 0)
    }
}

impl RowGenerationPolicy for FixedRowPolicy {
    fn should_append(&self) -> bool {
        self.append
    }

    fn external_value(&self, column: &Column, today: NaiveDate) -> String {
        match column.data_type {
            ColumnType::Date => (today - Duration::days(self.days_back))
                .format(ISO_DATE_FORMAT)
                .to_string(),
            ColumnType::Text => {
                let idx = self.next_text.fetch_add(1, Ordering::Relaxed) % SAMPLE_TEXTS.len();
                SAMPLE_TEXTS[idx].to_string()
            }
        }
    }
}
