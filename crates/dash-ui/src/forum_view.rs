//! Forum post list and post detail views.
//!
//! The line builders here are shared by the interactive forum screen and by
//! the plain-text output of the `forum` subcommands.

use dash_core::formatting::preview;
use dash_core::models::{Comment, ForumPost};
use dash_core::time_utils::TimezoneHandler;
use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::themes::Theme;

/// Longest title shown on a card, in terminal columns.
pub const CARD_TITLE_WIDTH: usize = 60;

/// Cut `s` to at most `max` display columns, ending in `…` when shortened.
pub fn truncate_to_width(s: &str, max: usize) -> String {
    if s.width() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in s.chars() {
        let w = c.width().unwrap_or(0);
        if used + w + 1 > max {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}

fn tag_spans(tags: &[String], theme: &Theme) -> Vec<Span<'static>> {
    let mut spans = Vec::with_capacity(tags.len() * 2);
    for (i, tag) in tags.iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw(" "));
        }
        spans.push(Span::styled(format!("#{}", tag), theme.tag));
    }
    spans
}

/// Card for the post list: title, date, tags and a content preview.
pub fn post_card_lines(post: &ForumPost, tz: &TimezoneHandler, theme: &Theme) -> Vec<Line<'static>> {
    let mut lines = vec![
        Line::from(vec![
            Span::styled(truncate_to_width(&post.title, CARD_TITLE_WIDTH), theme.post_title),
            Span::styled(format!("  {}", tz.format_date(post.created_at)), theme.dim),
        ]),
    ];
    if !post.tags.is_empty() {
        lines.push(Line::from(tag_spans(&post.tags, theme)));
    }
    lines.push(Line::from(Span::styled(preview(&post.content), theme.text)));
    lines
}

/// Full post followed by its comments.
pub fn post_detail_lines(
    post: &ForumPost,
    comments: &[Comment],
    tz: &TimezoneHandler,
    theme: &Theme,
) -> Vec<Line<'static>> {
    let mut lines = vec![
        Line::from(Span::styled(post.title.clone(), theme.post_title)),
        Line::from(Span::styled(
            format!("Posted {}", tz.format_datetime(post.created_at)),
            theme.dim,
        )),
    ];
    if !post.tags.is_empty() {
        lines.push(Line::from(tag_spans(&post.tags, theme)));
    }
    lines.push(Line::from(""));
    lines.extend(
        post.content
            .lines()
            .map(|l| Line::from(Span::styled(l.to_string(), theme.text))),
    );
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        format!("Comments ({})", comments.len()),
        theme.bold,
    )));

    if comments.is_empty() {
        lines.push(Line::from(Span::styled("No comments yet", theme.dim)));
    }
    for comment in comments {
        lines.push(Line::from(vec![
            Span::styled(comment.author_name(), theme.author),
            Span::styled(format!(" · {}", tz.format_datetime(comment.created_at)), theme.dim),
        ]));
        lines.push(Line::from(Span::styled(
            format!("  {}", comment.content),
            theme.text,
        )));
    }
    lines
}

/// Flatten styled lines back to text for stdout.
pub fn plain_text(lines: &[Line]) -> String {
    lines
        .iter()
        .map(|line| {
            line.spans
                .iter()
                .map(|s| s.content.as_ref())
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_post_list(
    frame: &mut Frame,
    area: Rect,
    posts: &[ForumPost],
    state: &mut ListState,
    tz: &TimezoneHandler,
    theme: &Theme,
) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme.card_border)
        .title(Span::styled(format!(" Posts ({}) ", posts.len()), theme.chart_title));

    if posts.is_empty() {
        let paragraph = Paragraph::new(Line::from(Span::styled(
            "No posts yet. Be the first to start a discussion!",
            theme.dim,
        )))
        .block(block);
        frame.render_widget(paragraph, area);
        return;
    }

    let items: Vec<ListItem> = posts
        .iter()
        .map(|post| {
            let mut lines = post_card_lines(post, tz, theme);
            lines.push(Line::from(""));
            ListItem::new(lines)
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(theme.card_selected)
        .highlight_symbol("▶ ");
    frame.render_stateful_widget(list, area, state);
}

pub fn render_post_detail(
    frame: &mut Frame,
    area: Rect,
    post: &ForumPost,
    comments: &[Comment],
    scroll: u16,
    tz: &TimezoneHandler,
    theme: &Theme,
) {
    let paragraph = Paragraph::new(post_detail_lines(post, comments, tz, theme))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(theme.card_border),
        )
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    frame.render_widget(paragraph, area);
}
