use crate::themes::Theme;
use dash_core::formatting::format_currency;
use dash_data::aggregator::Totals;
use ratatui::text::{Line, Span};

/// Decorative sparkle string placed either side of the application title.
pub const SPARKLES: &str = "✦ ✧ ✦ ✧";

/// Dashboard header:
///
/// 1. Application title with sparkle decorations (ALL CAPS).
/// 2. A 60-column `=` separator.
/// 3. Source and timezone in `[ source | timezone ]` format, plus the
///    account when one is set.
/// 4. Income, expense and net totals, when an import has produced them.
/// 5. An empty line.
pub struct Header<'a> {
    /// What is being shown, e.g. the imported file name or `"forum"`.
    pub source: &'a str,
    pub timezone: &'a str,
    pub totals: Option<&'a Totals>,
    pub account: Option<&'a str>,
    pub theme: &'a Theme,
}

impl<'a> Header<'a> {
    pub fn new(source: &'a str, timezone: &'a str, theme: &'a Theme) -> Self {
        Self {
            source,
            timezone,
            totals: None,
            account: None,
            theme,
        }
    }

    pub fn with_totals(mut self, totals: &'a Totals) -> Self {
        self.totals = Some(totals);
        self
    }

    pub fn with_account(mut self, account: &'a str) -> Self {
        self.account = Some(account);
        self
    }

    /// Number of lines [`Self::to_lines`] produces.
    pub fn height(&self) -> u16 {
        if self.totals.is_some() {
            5
        } else {
            4
        }
    }

    pub fn to_lines(&self) -> Vec<Line<'a>> {
        let separator = "=".repeat(60);

        let mut context = vec![
            Span::styled("[ ", self.theme.label),
            Span::styled(self.source.to_string(), self.theme.value),
            Span::styled(" | ", self.theme.label),
            Span::styled(self.timezone.to_lowercase(), self.theme.value),
        ];
        if let Some(account) = self.account {
            context.push(Span::styled(" | ", self.theme.label));
            context.push(Span::styled(account.to_string(), self.theme.author));
        }
        context.push(Span::styled(" ]", self.theme.label));

        let mut lines = vec![
            Line::from(vec![
                Span::styled(SPARKLES, self.theme.header_sparkle),
                Span::styled(" FINANCE DASHBOARD ", self.theme.header),
                Span::styled(SPARKLES, self.theme.header_sparkle),
            ]),
            Line::from(Span::styled(separator, self.theme.separator)),
            Line::from(context),
        ];

        if let Some(totals) = self.totals {
            lines.push(Line::from(vec![
                Span::styled("Income ", self.theme.label),
                Span::styled(format_currency(totals.input), self.theme.income),
                Span::styled("  Expenses ", self.theme.label),
                Span::styled(format_currency(totals.output), self.theme.expense),
                Span::styled("  Net ", self.theme.label),
                Span::styled(format_currency(totals.net), self.theme.net_style(totals.net)),
                Span::styled(format!("  ({} records)", totals.count), self.theme.dim),
            ]));
        }

        lines.push(Line::from(""));
        lines
    }
}
