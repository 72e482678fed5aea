use ratatui::style::{Color, Modifier, Style};

/// Terminal background type detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackgroundType {
    Dark,
    Light,
    Unknown,
}

/// Detect terminal background type from the `COLORFGBG` environment variable.
///
/// The variable has the format `"foreground;background"`. Background values
/// 0–6 are considered dark; 7–15 are considered light. If the variable is
/// absent or unparseable, `BackgroundType::Dark` is returned.
pub fn detect_background() -> BackgroundType {
    background_from(std::env::var("COLORFGBG").ok().as_deref())
}

fn background_from(colorfgbg: Option<&str>) -> BackgroundType {
    if let Some(bg) = colorfgbg.and_then(|v| v.split(';').next_back()) {
        if let Ok(bg_num) = bg.parse::<u8>() {
            return if bg_num <= 6 {
                BackgroundType::Dark
            } else {
                BackgroundType::Light
            };
        }
    }
    BackgroundType::Dark
}

/// Parse a `#RRGGBB` string into an RGB colour.
pub fn parse_hex(hex: &str) -> Option<Color> {
    let digits = hex.strip_prefix('#')?;
    if digits.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(digits.get(i..i + 2)?, 16).ok();
    Some(Color::Rgb(channel(0)?, channel(2)?, channel(4)?))
}

/// Every style used by the dashboard and forum views.
#[derive(Debug, Clone)]
pub struct Theme {
    // ── Header ───────────────────────────────────────────────────────────────
    pub header: Style,
    pub header_sparkle: Style,
    pub separator: Style,

    // ── Text ─────────────────────────────────────────────────────────────────
    pub text: Style,
    pub dim: Style,
    pub bold: Style,
    pub label: Style,
    pub value: Style,

    // ── Status ───────────────────────────────────────────────────────────────
    pub info: Style,
    pub success: Style,
    pub warning: Style,
    pub error: Style,

    // ── Money ────────────────────────────────────────────────────────────────
    pub income: Style,
    pub expense: Style,
    pub net_positive: Style,
    pub net_negative: Style,

    // ── Charts ───────────────────────────────────────────────────────────────
    pub chart_border: Style,
    pub chart_title: Style,
    pub chart_axis: Style,
    pub chart_line: Style,
    /// Cycled across pie slices.
    pub slice_palette: Vec<Color>,

    // ── Forum ────────────────────────────────────────────────────────────────
    pub card_border: Style,
    pub card_selected: Style,
    pub post_title: Style,
    pub tag: Style,
    pub author: Style,

    /// When `false`, series colours carried by chart options are ignored in
    /// favour of the theme's own `income` / `expense` styles.
    pub true_color: bool,
}

impl Theme {
    /// Dark terminal theme.
    pub fn dark() -> Self {
        Self {
            header: Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
            header_sparkle: Style::default().fg(Color::Yellow),
            separator: Style::default().fg(Color::DarkGray),

            text: Style::default().fg(Color::White),
            dim: Style::default().fg(Color::DarkGray),
            bold: Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
            label: Style::default().fg(Color::Gray),
            value: Style::default().fg(Color::White),

            info: Style::default().fg(Color::Cyan),
            success: Style::default().fg(Color::Green),
            warning: Style::default().fg(Color::Yellow),
            error: Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),

            income: Style::default().fg(Color::Green),
            expense: Style::default().fg(Color::Red),
            net_positive: Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
            net_negative: Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),

            chart_border: Style::default().fg(Color::DarkGray),
            chart_title: Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
            chart_axis: Style::default().fg(Color::Gray),
            chart_line: Style::default().fg(Color::Magenta),
            slice_palette: vec![
                Color::Red,
                Color::Yellow,
                Color::Blue,
                Color::Magenta,
                Color::Cyan,
                Color::LightRed,
                Color::LightBlue,
            ],

            card_border: Style::default().fg(Color::DarkGray),
            card_selected: Style::default().fg(Color::Cyan),
            post_title: Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
            tag: Style::default().fg(Color::Blue),
            author: Style::default().fg(Color::Yellow),

            true_color: true,
        }
    }

    /// Light terminal theme.
    pub fn light() -> Self {
        Self {
            header: Style::default()
                .fg(Color::Blue)
                .add_modifier(Modifier::BOLD),
            header_sparkle: Style::default().fg(Color::Magenta),
            separator: Style::default().fg(Color::Gray),

            text: Style::default().fg(Color::Black),
            dim: Style::default().fg(Color::Gray),
            bold: Style::default()
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
            label: Style::default().fg(Color::DarkGray),
            value: Style::default().fg(Color::Black),

            info: Style::default().fg(Color::Blue),
            success: Style::default().fg(Color::Green),
            warning: Style::default().fg(Color::Yellow),
            error: Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),

            income: Style::default().fg(Color::Green),
            expense: Style::default().fg(Color::Red),
            net_positive: Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
            net_negative: Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),

            chart_border: Style::default().fg(Color::Gray),
            chart_title: Style::default()
                .fg(Color::Blue)
                .add_modifier(Modifier::BOLD),
            chart_axis: Style::default().fg(Color::DarkGray),
            chart_line: Style::default().fg(Color::Blue),
            slice_palette: vec![
                Color::Red,
                Color::Blue,
                Color::Magenta,
                Color::Green,
                Color::Yellow,
                Color::Cyan,
                Color::DarkGray,
            ],

            card_border: Style::default().fg(Color::Gray),
            card_selected: Style::default().fg(Color::Blue),
            post_title: Style::default()
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
            tag: Style::default().fg(Color::Blue),
            author: Style::default().fg(Color::Magenta),

            true_color: true,
        }
    }

    /// Classic terminal theme using only the basic 8-colour ANSI palette.
    ///
    /// No bold modifiers, and hex series colours are never emitted.
    pub fn classic() -> Self {
        Self {
            header: Style::default().fg(Color::Cyan),
            header_sparkle: Style::default().fg(Color::White),
            separator: Style::default().fg(Color::DarkGray),

            text: Style::default().fg(Color::White),
            dim: Style::default().fg(Color::DarkGray),
            bold: Style::default().fg(Color::White),
            label: Style::default().fg(Color::Gray),
            value: Style::default().fg(Color::White),

            info: Style::default().fg(Color::Cyan),
            success: Style::default().fg(Color::Green),
            warning: Style::default().fg(Color::Yellow),
            error: Style::default().fg(Color::Red),

            income: Style::default().fg(Color::Green),
            expense: Style::default().fg(Color::Red),
            net_positive: Style::default().fg(Color::Green),
            net_negative: Style::default().fg(Color::Red),

            chart_border: Style::default().fg(Color::DarkGray),
            chart_title: Style::default().fg(Color::Cyan),
            chart_axis: Style::default().fg(Color::Gray),
            chart_line: Style::default().fg(Color::Magenta),
            slice_palette: vec![
                Color::Red,
                Color::Yellow,
                Color::Blue,
                Color::Magenta,
                Color::Cyan,
            ],

            card_border: Style::default().fg(Color::DarkGray),
            card_selected: Style::default().fg(Color::Cyan),
            post_title: Style::default().fg(Color::White),
            tag: Style::default().fg(Color::Blue),
            author: Style::default().fg(Color::Yellow),

            true_color: false,
        }
    }

    /// Choose a theme automatically based on the detected terminal background.
    pub fn auto_detect() -> Self {
        match detect_background() {
            BackgroundType::Light => Self::light(),
            _ => Self::dark(),
        }
    }

    /// Construct a theme by name. Falls back to `auto_detect` for unknown
    /// names.
    pub fn from_name(name: &str) -> Self {
        match name {
            "light" => Self::light(),
            "dark" => Self::dark(),
            "classic" => Self::classic(),
            _ => Self::auto_detect(),
        }
    }

    // ── Style helpers ────────────────────────────────────────────────────────

    /// Net balance style: positive or zero reads as a gain.
    pub fn net_style(&self, net: f64) -> Style {
        if net < 0.0 {
            self.net_negative
        } else {
            self.net_positive
        }
    }

    /// Style for series `index` of a chart. A parseable hex colour from the
    /// chart options wins on true-colour themes; otherwise series 0 is income
    /// and every other series is expense.
    pub fn series_style(&self, index: usize, colors: &[String]) -> Style {
        if self.true_color {
            if let Some(color) = colors.get(index).and_then(|c| parse_hex(c)) {
                return Style::default().fg(color);
            }
        }
        if index == 0 {
            self.income
        } else {
            self.expense
        }
    }

    /// Colour for pie slice `index`, cycling through the palette.
    pub fn slice_color(&self, index: usize) -> Color {
        if self.slice_palette.is_empty() {
            return Color::Reset;
        }
        self.slice_palette[index % self.slice_palette.len()]
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
