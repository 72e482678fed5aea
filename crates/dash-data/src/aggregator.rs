//! Derived dashboard views over canonical transaction records.
//!
//! Every view is a pure function of the record slice and, for the daily
//! series, the supplied clock value. Buckets keep first-seen order unless
//! [`BucketOrder::Chronological`] is requested.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use dash_core::models::{TransactionRecord, TransactionType};
use dash_core::time_utils::{day_key, month_key};

/// How period buckets are ordered in the monthly and daily views.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BucketOrder {
    /// Order in which each key first appears in the input.
    #[default]
    FirstSeen,
    /// Ascending by key, i.e. by date.
    Chronological,
}

// ── View types ────────────────────────────────────────────────────────────────

/// Income and expense sums for one calendar month.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyBucket {
    /// `"YYYY-MM"` in UTC.
    pub month: String,
    pub input: f64,
    pub output: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonthlySeries {
    pub buckets: Vec<MonthlyBucket>,
}

impl MonthlySeries {
    /// Month keys, in bucket order.
    pub fn categories(&self) -> Vec<String> {
        self.buckets.iter().map(|b| b.month.clone()).collect()
    }

    pub fn inputs(&self) -> Vec<f64> {
        self.buckets.iter().map(|b| b.input).collect()
    }

    pub fn outputs(&self) -> Vec<f64> {
        self.buckets.iter().map(|b| b.output).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// Total spent in one category.
#[derive(Debug, Clone, PartialEq)]
pub struct CategorySlice {
    pub category: String,
    pub total: f64,
}

/// Spending on one day of the current month.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyPoint {
    /// `"YYYY-MM-DD"` in UTC.
    pub day: String,
    pub spent: f64,
}

/// Header figures for the whole upload.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Totals {
    pub input: f64,
    pub output: f64,
    /// `input - output`.
    pub net: f64,
    pub count: usize,
}

/// Everything the dashboard draws for one upload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardViews {
    pub monthly: MonthlySeries,
    pub categories: Vec<CategorySlice>,
    pub daily: Vec<DailyPoint>,
    pub totals: Totals,
}

// ── OrderedBuckets ────────────────────────────────────────────────────────────

/// String-keyed accumulator that remembers first-insertion order.
struct OrderedBuckets<T> {
    keys: Vec<String>,
    values: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T> OrderedBuckets<T> {
    fn new() -> Self {
        Self {
            keys: Vec::new(),
            values: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn entry(&mut self, key: String, init: impl FnOnce() -> T) -> &mut T {
        let idx = match self.index.get(&key) {
            Some(&i) => i,
            None => {
                let i = self.values.len();
                self.index.insert(key.clone(), i);
                self.keys.push(key);
                self.values.push(init());
                i
            }
        };
        &mut self.values[idx]
    }

    fn into_ordered(self, order: BucketOrder) -> Vec<(String, T)> {
        let mut pairs: Vec<(String, T)> = self.keys.into_iter().zip(self.values).collect();
        if order == BucketOrder::Chronological {
            // Zero-padded keys sort lexically by date.
            pairs.sort_by(|a, b| a.0.cmp(&b.0));
        }
        pairs
    }
}

// ── TransactionAggregator ─────────────────────────────────────────────────────

/// Stateless helper that groups transaction records into chart views.
pub struct TransactionAggregator;

impl TransactionAggregator {
    /// Sum input and output amounts per UTC calendar month.
    pub fn monthly(records: &[TransactionRecord], order: BucketOrder) -> MonthlySeries {
        let mut buckets: OrderedBuckets<(f64, f64)> = OrderedBuckets::new();
        for record in records {
            let sums = buckets.entry(month_key(record.time), || (0.0, 0.0));
            match record.kind {
                TransactionType::Input => sums.0 += record.amount,
                TransactionType::Output => sums.1 += record.amount,
            }
        }

        MonthlySeries {
            buckets: buckets
                .into_ordered(order)
                .into_iter()
                .map(|(month, (input, output))| MonthlyBucket { month, input, output })
                .collect(),
        }
    }

    /// Sum output amounts per distinct category, in first-seen order.
    /// Input records never appear.
    pub fn category_breakdown(records: &[TransactionRecord]) -> Vec<CategorySlice> {
        let mut buckets: OrderedBuckets<f64> = OrderedBuckets::new();
        for record in records.iter().filter(|r| r.is_output()) {
            *buckets.entry(record.category.clone(), || 0.0) += record.amount;
        }

        buckets
            .into_ordered(BucketOrder::FirstSeen)
            .into_iter()
            .map(|(category, total)| CategorySlice { category, total })
            .collect()
    }

    /// Per-day spending for the month containing `now`.
    ///
    /// Input records in that month still open their day bucket but add
    /// nothing to it.
    pub fn daily_current_month(
        records: &[TransactionRecord],
        now: DateTime<Utc>,
        order: BucketOrder,
    ) -> Vec<DailyPoint> {
        let current = month_key(now);
        let mut buckets: OrderedBuckets<f64> = OrderedBuckets::new();
        for record in records.iter().filter(|r| month_key(r.time) == current) {
            let spent = buckets.entry(day_key(record.time), || 0.0);
            if record.is_output() {
                *spent += record.amount;
            }
        }

        buckets
            .into_ordered(order)
            .into_iter()
            .map(|(day, spent)| DailyPoint { day, spent })
            .collect()
    }

    pub fn totals(records: &[TransactionRecord]) -> Totals {
        let mut totals = Totals::default();
        for record in records {
            match record.kind {
                TransactionType::Input => totals.input += record.amount,
                TransactionType::Output => totals.output += record.amount,
            }
            totals.count += 1;
        }
        totals.net = totals.input - totals.output;
        totals
    }

    /// All dashboard views at once.
    pub fn aggregate_all(
        records: &[TransactionRecord],
        now: DateTime<Utc>,
        order: BucketOrder,
    ) -> DashboardViews {
        DashboardViews {
            monthly: Self::monthly(records, order),
            categories: Self::category_breakdown(records),
            daily: Self::daily_current_month(records, now, order),
            totals: Self::totals(records),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
