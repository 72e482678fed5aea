//! Terminal chart renderer.
//!
//! [`TerminalRenderer`] plugs into the runtime's chart board: creating a chart
//! publishes its options into a shared [`DashboardState`], destroying it
//! withdraws them. The draw functions below turn whatever is published into
//! ratatui widgets; [`text_lines`] does the same for headless output.

use std::collections::HashMap;
use std::iter::repeat_n;
use std::sync::{Arc, Mutex};

use dash_core::error::{DashError, Result};
use dash_core::formatting::{format_currency, percentage};
use dash_data::charts::{ChartKind, ChartOptions, CATEGORY_TITLE, DAILY_TITLE, MONTHLY_TITLE};
use dash_runtime::chart_board::{ChartInstance, ChartRenderer};
use ratatui::{
    layout::{Alignment, Direction, Rect},
    style::Style,
    symbols,
    text::{Line, Span},
    widgets::{Axis, Bar, BarChart, BarGroup, Block, Borders, Chart, Dataset, GraphType, Paragraph},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use crate::themes::Theme;

/// Width of the bars drawn by [`text_lines`].
pub const TEXT_BAR_WIDTH: usize = 30;

// ── DashboardState ────────────────────────────────────────────────────────────

/// Charts currently on screen, at most one per kind.
#[derive(Debug, Default)]
pub struct DashboardState {
    charts: HashMap<ChartKind, ChartOptions>,
}

impl DashboardState {
    pub fn chart(&self, kind: ChartKind) -> Option<&ChartOptions> {
        self.charts.get(&kind)
    }

    pub fn is_empty(&self) -> bool {
        self.charts.is_empty()
    }

    /// Published charts in slot order.
    pub fn charts(&self) -> Vec<&ChartOptions> {
        ChartKind::ALL
            .iter()
            .filter_map(|k| self.charts.get(k))
            .collect()
    }
}

pub type DashboardHandle = Arc<Mutex<DashboardState>>;

// ── TerminalRenderer ──────────────────────────────────────────────────────────

#[derive(Default)]
pub struct TerminalRenderer {
    state: DashboardHandle,
}

impl TerminalRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared view of the published charts, for the draw loop.
    pub fn state(&self) -> DashboardHandle {
        Arc::clone(&self.state)
    }
}

impl ChartRenderer for TerminalRenderer {
    fn create(&self, options: &ChartOptions) -> Result<Box<dyn ChartInstance>> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| DashError::Render("dashboard state is poisoned".to_string()))?;
        state.charts.insert(options.kind, options.clone());
        Ok(Box::new(TerminalChart {
            kind: options.kind,
            state: Arc::clone(&self.state),
        }))
    }
}

struct TerminalChart {
    kind: ChartKind,
    state: DashboardHandle,
}

impl ChartInstance for TerminalChart {
    fn kind(&self) -> ChartKind {
        self.kind
    }

    fn destroy(self: Box<Self>) {
        if let Ok(mut state) = self.state.lock() {
            state.charts.remove(&self.kind);
        }
    }
}

// ── Drawing ───────────────────────────────────────────────────────────────────

fn default_title(kind: ChartKind) -> &'static str {
    match kind {
        ChartKind::Bar => MONTHLY_TITLE,
        ChartKind::Pie => CATEGORY_TITLE,
        ChartKind::Line => DAILY_TITLE,
    }
}

fn chart_block<'a>(title: &str, theme: &Theme) -> Block<'a> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(theme.chart_border)
        .title(Span::styled(format!(" {} ", title), theme.chart_title))
}

/// Bars are integral; negative amounts draw as empty bars.
fn bar_value(v: f64) -> u64 {
    v.max(0.0).round() as u64
}

/// Draw the chart for `kind` into `area`, or a "No data" placeholder when
/// nothing is published for it.
pub fn render_chart(
    frame: &mut Frame,
    area: Rect,
    kind: ChartKind,
    options: Option<&ChartOptions>,
    theme: &Theme,
) {
    match options {
        Some(options) if !options.is_empty() => match kind {
            ChartKind::Bar => render_grouped_bars(frame, area, options, theme),
            ChartKind::Pie => render_shares(frame, area, options, theme),
            ChartKind::Line => render_line(frame, area, options, theme),
        },
        _ => render_no_data(frame, area, default_title(kind), theme),
    }
}

pub fn render_no_data(frame: &mut Frame, area: Rect, title: &str, theme: &Theme) {
    let paragraph = Paragraph::new(Line::from(Span::styled("No data", theme.dim)))
        .alignment(Alignment::Center)
        .block(chart_block(title, theme));
    frame.render_widget(paragraph, area);
}

/// One group per category, one bar per series.
fn render_grouped_bars(frame: &mut Frame, area: Rect, options: &ChartOptions, theme: &Theme) {
    let mut chart = BarChart::default()
        .block(chart_block(&options.title, theme))
        .bar_width(7)
        .bar_gap(1)
        .group_gap(3)
        .max(bar_value(options.max_value()).max(1));

    for (i, category) in options.categories.iter().enumerate() {
        let bars: Vec<Bar> = options
            .series
            .iter()
            .enumerate()
            .map(|(s, series)| {
                let value = series.data.get(i).copied().unwrap_or(0.0);
                let style = theme.series_style(s, &options.colors);
                Bar::default()
                    .value(bar_value(value))
                    .text_value(compact_amount(value))
                    .style(style)
            })
            .collect();
        chart = chart.data(
            BarGroup::default()
                .label(Line::from(category.clone()))
                .bars(&bars),
        );
    }

    frame.render_widget(chart, area);
}

/// Horizontal bars for a single-series breakdown, labelled with the share of
/// the total each category takes.
fn render_shares(frame: &mut Frame, area: Rect, options: &ChartOptions, theme: &Theme) {
    let data = options.series.first().map(|s| s.data.as_slice()).unwrap_or(&[]);
    let total: f64 = data.iter().sum();

    let bars: Vec<Bar> = options
        .categories
        .iter()
        .zip(data)
        .enumerate()
        .map(|(i, (category, value))| {
            Bar::default()
                .value(bar_value(*value))
                .label(Line::from(category.clone()))
                .text_value(format!(
                    "{} ({}%)",
                    format_currency(*value),
                    percentage(*value, total, 1)
                ))
                .style(Style::default().fg(theme.slice_color(i)))
        })
        .collect();

    let chart = BarChart::default()
        .block(chart_block(&options.title, theme))
        .direction(Direction::Horizontal)
        .bar_width(1)
        .bar_gap(0)
        .max(bar_value(options.max_value()).max(1))
        .data(BarGroup::default().bars(&bars));

    frame.render_widget(chart, area);
}

fn render_line(frame: &mut Frame, area: Rect, options: &ChartOptions, theme: &Theme) {
    let Some(series) = options.series.first() else {
        render_no_data(frame, area, &options.title, theme);
        return;
    };
    let points: Vec<(f64, f64)> = series
        .data
        .iter()
        .enumerate()
        .map(|(i, v)| (i as f64, *v))
        .collect();

    let x_max = (points.len().saturating_sub(1)).max(1) as f64;
    let y_max = options.max_value().max(1.0);

    let x_labels: Vec<Span> = match (options.categories.first(), options.categories.last()) {
        (Some(first), Some(last)) => vec![
            Span::styled(first.clone(), theme.chart_axis),
            Span::styled(last.clone(), theme.chart_axis),
        ],
        _ => Vec::new(),
    };
    let y_labels = vec![
        Span::styled(compact_amount(0.0), theme.chart_axis),
        Span::styled(compact_amount(y_max), theme.chart_axis),
    ];

    let dataset = Dataset::default()
        .name(series.name.clone())
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(theme.chart_line)
        .data(&points);

    let chart = Chart::new(vec![dataset])
        .block(chart_block(&options.title, theme))
        .x_axis(
            Axis::default()
                .style(theme.chart_axis)
                .bounds([0.0, x_max])
                .labels(x_labels),
        )
        .y_axis(
            Axis::default()
                .style(theme.chart_axis)
                .bounds([0.0, y_max])
                .labels(y_labels),
        );

    frame.render_widget(chart, area);
}

/// Short amount for bar captions: `"950"`, `"1.2k"`, `"3.4M"`.
pub fn compact_amount(value: f64) -> String {
    let abs = value.abs();
    let sign = if value < 0.0 { "-" } else { "" };
    if abs >= 1_000_000.0 {
        format!("{}{:.1}M", sign, abs / 1_000_000.0)
    } else if abs >= 1_000.0 {
        format!("{}{:.1}k", sign, abs / 1_000.0)
    } else {
        format!("{}{:.0}", sign, abs)
    }
}

// ── Plain text ────────────────────────────────────────────────────────────────

/// Render a chart as plain text: a title, an underline, then one bar per
/// category and series scaled to [`TEXT_BAR_WIDTH`].
pub fn text_lines(options: &ChartOptions) -> Vec<String> {
    let mut lines = vec![
        options.title.clone(),
        "-".repeat(options.title.width()),
    ];
    if options.is_empty() {
        lines.push("  No data".to_string());
        return lines;
    }

    let max = options.max_value();
    let label_width = options
        .categories
        .iter()
        .map(|c| c.width())
        .max()
        .unwrap_or(0);
    let multi = options.series.len() > 1;
    let name_width = options
        .series
        .iter()
        .map(|s| s.name.width())
        .max()
        .unwrap_or(0);

    for (i, category) in options.categories.iter().enumerate() {
        for (s, series) in options.series.iter().enumerate() {
            let value = series.data.get(i).copied().unwrap_or(0.0);
            let filled = if max > 0.0 {
                ((value.max(0.0) / max) * TEXT_BAR_WIDTH as f64).round() as usize
            } else {
                0
            };
            let label = if s == 0 { category.as_str() } else { "" };
            let mut line = format!("  {}{}", label, pad(label_width - label.width()));
            if multi {
                line.push_str(&format!(
                    "  {}{}",
                    series.name,
                    pad(name_width - series.name.width())
                ));
            }
            line.push_str("  ");
            line.extend(repeat_n('█', filled.min(TEXT_BAR_WIDTH)));
            line.push(' ');
            line.push_str(&format_currency(value));
            lines.push(line);
        }
    }
    lines
}

fn pad(n: usize) -> String {
    " ".repeat(n)
}
