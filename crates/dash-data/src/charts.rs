//! Declarative chart descriptions handed to a chart renderer.

use serde::Serialize;

use crate::aggregator::{CategorySlice, DailyPoint, DashboardViews, MonthlySeries};

pub const MONTHLY_TITLE: &str = "Monthly Income vs Expenses";
pub const CATEGORY_TITLE: &str = "Expenses by Category";
pub const DAILY_TITLE: &str = "Daily Spending Trend";

/// Income series color.
pub const INPUT_COLOR: &str = "#4CAF50";
/// Expense series color.
pub const OUTPUT_COLOR: &str = "#F44336";

/// The three chart slots of the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Pie,
    Line,
}

impl ChartKind {
    pub const ALL: [ChartKind; 3] = [ChartKind::Bar, ChartKind::Pie, ChartKind::Line];
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    pub data: Vec<f64>,
}

/// One chart: kind, title, x-axis categories (or pie labels) and the named
/// series drawn over them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartOptions {
    pub kind: ChartKind,
    pub title: String,
    pub categories: Vec<String>,
    pub series: Vec<Series>,
    /// Per-series colors; empty means renderer defaults.
    pub colors: Vec<String>,
}

impl ChartOptions {
    /// Grouped bars of income and expenses per month.
    pub fn monthly_bar(monthly: &MonthlySeries) -> Self {
        Self {
            kind: ChartKind::Bar,
            title: MONTHLY_TITLE.to_string(),
            categories: monthly.categories(),
            series: vec![
                Series {
                    name: "Input".to_string(),
                    data: monthly.inputs(),
                },
                Series {
                    name: "Output".to_string(),
                    data: monthly.outputs(),
                },
            ],
            colors: vec![INPUT_COLOR.to_string(), OUTPUT_COLOR.to_string()],
        }
    }

    /// Expense share per category.
    pub fn category_pie(slices: &[CategorySlice]) -> Self {
        Self {
            kind: ChartKind::Pie,
            title: CATEGORY_TITLE.to_string(),
            categories: slices.iter().map(|s| s.category.clone()).collect(),
            series: vec![Series {
                name: "Expenses".to_string(),
                data: slices.iter().map(|s| s.total).collect(),
            }],
            colors: Vec::new(),
        }
    }

    /// Spending per day of the current month.
    pub fn daily_line(daily: &[DailyPoint]) -> Self {
        Self {
            kind: ChartKind::Line,
            title: DAILY_TITLE.to_string(),
            categories: daily.iter().map(|p| p.day.clone()).collect(),
            series: vec![Series {
                name: "Daily Spending".to_string(),
                data: daily.iter().map(|p| p.spent).collect(),
            }],
            colors: Vec::new(),
        }
    }

    /// Bar, pie and line options, in that order.
    pub fn from_views(views: &DashboardViews) -> [ChartOptions; 3] {
        [
            Self::monthly_bar(&views.monthly),
            Self::category_pie(&views.categories),
            Self::daily_line(&views.daily),
        ]
    }

    /// `true` when there is nothing to plot.
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Largest value across all series, or `0.0`.
    pub fn max_value(&self) -> f64 {
        self.series
            .iter()
            .flat_map(|s| s.data.iter().copied())
            .fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::{BucketOrder, TransactionAggregator};
    use chrono::{TimeZone, Utc};
    use dash_core::models::{TransactionRecord, TransactionType};

    fn sample_views() -> DashboardViews {
        let now = Utc.with_ymd_and_hms(2024, 2, 10, 0, 0, 0).unwrap();
        let records = vec![
            TransactionRecord {
                time: Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap(),
                kind: TransactionType::Input,
                category: "Salary".into(),
                amount: 100.0,
            },
            TransactionRecord {
                time: Utc.with_ymd_and_hms(2024, 2, 4, 0, 0, 0).unwrap(),
                kind: TransactionType::Output,
                category: "Food".into(),
                amount: 40.0,
            },
        ];
        TransactionAggregator::aggregate_all(&records, now, BucketOrder::FirstSeen)
    }

    #[test]
    fn test_monthly_bar_options() {
        let [bar, _, _] = ChartOptions::from_views(&sample_views());

        assert_eq!(bar.kind, ChartKind::Bar);
        assert_eq!(bar.title, "Monthly Income vs Expenses");
        assert_eq!(bar.categories, vec!["2024-01", "2024-02"]);
        assert_eq!(bar.series[0].name, "Input");
        assert_eq!(bar.series[0].data, vec![100.0, 0.0]);
        assert_eq!(bar.series[1].name, "Output");
        assert_eq!(bar.series[1].data, vec![0.0, 40.0]);
        assert_eq!(bar.colors, vec!["#4CAF50", "#F44336"]);
        assert_eq!(bar.max_value(), 100.0);
    }

    #[test]
    fn test_pie_and_line_options() {
        let [_, pie, line] = ChartOptions::from_views(&sample_views());

        assert_eq!(pie.kind, ChartKind::Pie);
        assert_eq!(pie.title, "Expenses by Category");
        assert_eq!(pie.categories, vec!["Food"]);
        assert_eq!(pie.series[0].data, vec![40.0]);

        assert_eq!(line.kind, ChartKind::Line);
        assert_eq!(line.title, "Daily Spending Trend");
        assert_eq!(line.series[0].name, "Daily Spending");
        assert_eq!(line.categories, vec!["2024-02-04"]);
    }

    #[test]
    fn test_empty_views_produce_empty_options() {
        let options = ChartOptions::from_views(&DashboardViews::default());
        assert!(options.iter().all(ChartOptions::is_empty));
        assert_eq!(options[0].max_value(), 0.0);
    }
}
