//! Application state and TUI event loops for the dashboard and the forum.

use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use dash_core::models::{Comment, ForumPost, User};
use dash_core::time_utils::TimezoneHandler;
use dash_data::aggregator::Totals;
use dash_data::charts::ChartKind;
use dash_runtime::forum::ForumService;
use dash_runtime::identity::AuthEvent;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    text::{Line, Span},
    widgets::{ListState, Paragraph},
    Frame, Terminal,
};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, warn};

use crate::charts::{render_chart, DashboardHandle, DashboardState};
use crate::components::header::Header;
use crate::forum_view;
use crate::themes::Theme;

const TICK_RATE: Duration = Duration::from_millis(250);

/// `q`, `Q`, `Esc` or `Ctrl+C`.
pub fn is_quit_key(key: &KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => true,
        _ => false,
    }
}

// ── DashboardScreen ───────────────────────────────────────────────────────────

/// What the dashboard shows besides the charts themselves.
#[derive(Debug, Clone, Default)]
pub struct DashboardScreen {
    /// Imported file name.
    pub source: String,
    pub totals: Totals,
    /// Row warnings from the import, already formatted.
    pub warnings: Vec<String>,
    /// Rows the store acknowledged; `None` on a dry run.
    pub saved: Option<usize>,
}

// ── ForumScreen ───────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ForumMode {
    List,
    Detail {
        post: ForumPost,
        comments: Vec<Comment>,
        scroll: u16,
    },
}

/// What a key press asks the forum loop to do.
#[derive(Debug, PartialEq)]
pub enum ForumAction {
    None,
    Quit,
    Refresh,
    /// Load comments for the post at this index.
    Open(usize),
}

#[derive(Debug)]
pub struct ForumScreen {
    pub posts: Vec<ForumPost>,
    pub list_state: ListState,
    pub mode: ForumMode,
    pub status: Option<String>,
    /// Email of the signed-in user.
    pub account: Option<String>,
}

impl ForumScreen {
    pub fn new(posts: Vec<ForumPost>) -> Self {
        let mut list_state = ListState::default();
        if !posts.is_empty() {
            list_state.select(Some(0));
        }
        Self {
            posts,
            list_state,
            mode: ForumMode::List,
            status: None,
            account: None,
        }
    }

    pub fn on_auth(&mut self, event: &AuthEvent) {
        self.account = match event {
            AuthEvent::SignedIn(user) => Some(account_label(user)),
            AuthEvent::SignedOut => None,
        };
    }

    /// Apply every auth change queued on `events` without waiting.
    pub fn apply_auth_events(&mut self, events: &mut broadcast::Receiver<AuthEvent>) {
        loop {
            match events.try_recv() {
                Ok(event) => self.on_auth(&event),
                Err(TryRecvError::Lagged(skipped)) => {
                    debug!(skipped, "Auth events lagged");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
    }

    pub fn set_posts(&mut self, posts: Vec<ForumPost>) {
        let selected = self
            .list_state
            .selected()
            .map(|i| i.min(posts.len().saturating_sub(1)));
        self.posts = posts;
        self.list_state
            .select(if self.posts.is_empty() { None } else { selected.or(Some(0)) });
    }

    pub fn on_key(&mut self, key: &KeyEvent) -> ForumAction {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return ForumAction::Quit;
        }
        match &mut self.mode {
            ForumMode::List => match key.code {
                KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => ForumAction::Quit,
                KeyCode::Char('r') => ForumAction::Refresh,
                KeyCode::Down | KeyCode::Char('j') => {
                    self.step(1);
                    ForumAction::None
                }
                KeyCode::Up | KeyCode::Char('k') => {
                    self.step(-1);
                    ForumAction::None
                }
                KeyCode::Enter => self
                    .list_state
                    .selected()
                    .map(ForumAction::Open)
                    .unwrap_or(ForumAction::None),
                _ => ForumAction::None,
            },
            ForumMode::Detail { scroll, .. } => match key.code {
                KeyCode::Char('q') | KeyCode::Char('Q') => ForumAction::Quit,
                KeyCode::Esc | KeyCode::Backspace => {
                    self.mode = ForumMode::List;
                    ForumAction::None
                }
                KeyCode::Down | KeyCode::Char('j') => {
                    *scroll = scroll.saturating_add(1);
                    ForumAction::None
                }
                KeyCode::Up | KeyCode::Char('k') => {
                    *scroll = scroll.saturating_sub(1);
                    ForumAction::None
                }
                _ => ForumAction::None,
            },
        }
    }

    fn step(&mut self, delta: isize) {
        if self.posts.is_empty() {
            return;
        }
        let last = self.posts.len() - 1;
        let current = self.list_state.selected().unwrap_or(0);
        let next = if delta < 0 {
            current.saturating_sub(delta.unsigned_abs())
        } else {
            (current + delta as usize).min(last)
        };
        self.list_state.select(Some(next));
    }
}

fn account_label(user: &User) -> String {
    user.email.clone().unwrap_or_else(|| user.id.clone())
}

// ── App ───────────────────────────────────────────────────────────────────────

pub struct App {
    pub theme: Theme,
    pub timezone: String,
    tz: TimezoneHandler,
}

impl App {
    pub fn new(theme_name: &str, timezone: String) -> Self {
        Self {
            theme: Theme::from_name(theme_name),
            tz: TimezoneHandler::new(&timezone),
            timezone,
        }
    }

    // ── Public event loops ────────────────────────────────────────────────────

    /// Show the charts published to `state` until `q` / `Esc` / `Ctrl+C`.
    pub async fn run_dashboard(
        self,
        state: DashboardHandle,
        screen: DashboardScreen,
    ) -> io::Result<()> {
        let mut terminal = enter_terminal()?;

        let result = loop {
            let drawn = terminal.draw(|frame| match state.lock() {
                Ok(charts) => self.render_dashboard(frame, &charts, &screen),
                Err(_) => warn!("Dashboard state is poisoned; skipping frame"),
            });
            if let Err(e) = drawn {
                break Err(e);
            }

            match poll_key() {
                Ok(Some(key)) if is_quit_key(&key) => break Ok(()),
                Ok(_) => {}
                Err(e) => break Err(e),
            }
        };

        restore_terminal(&mut terminal)?;
        result
    }

    /// Browse forum posts. `Enter` opens a post with its comments, `r`
    /// reloads the list. The header follows sign-in changes.
    pub async fn run_forum(self, forum: Arc<ForumService>, posts: Vec<ForumPost>) -> io::Result<()> {
        let mut screen = ForumScreen::new(posts);
        let mut auth_events = forum.subscribe();
        match forum.current_user().await {
            Ok(user) => screen.account = user.as_ref().map(account_label),
            Err(e) => warn!("Could not check sign-in: {}", e),
        }

        let mut terminal = enter_terminal()?;
        let result = loop {
            screen.apply_auth_events(&mut auth_events);
            if let Err(e) = terminal.draw(|frame| self.render_forum(frame, &mut screen)) {
                break Err(e);
            }

            let key = match poll_key() {
                Ok(Some(key)) => key,
                Ok(None) => continue,
                Err(e) => break Err(e),
            };

            match screen.on_key(&key) {
                ForumAction::Quit => break Ok(()),
                ForumAction::None => {}
                ForumAction::Refresh => match forum.list_posts().await {
                    Ok(posts) => {
                        screen.set_posts(posts);
                        screen.status = None;
                    }
                    Err(e) => screen.status = Some(e.to_string()),
                },
                ForumAction::Open(index) => {
                    let Some(post) = screen.posts.get(index).cloned() else {
                        continue;
                    };
                    match forum.list_comments(&post.id).await {
                        Ok(comments) => {
                            screen.mode = ForumMode::Detail {
                                post,
                                comments,
                                scroll: 0,
                            };
                            screen.status = None;
                        }
                        Err(e) => screen.status = Some(e.to_string()),
                    }
                }
            }
        };

        restore_terminal(&mut terminal)?;
        result
    }

    // ── Rendering ─────────────────────────────────────────────────────────────

    pub fn render_dashboard(&self, frame: &mut Frame, state: &DashboardState, screen: &DashboardScreen) {
        let header = Header::new(&screen.source, &self.timezone, &self.theme).with_totals(&screen.totals);

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(header.height()),
                Constraint::Percentage(50),
                Constraint::Min(6),
                Constraint::Length(1),
            ])
            .split(frame.area());

        frame.render_widget(Paragraph::new(header.to_lines()), rows[0]);

        render_chart(frame, rows[1], ChartKind::Bar, state.chart(ChartKind::Bar), &self.theme);

        let bottom = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(rows[2]);
        render_chart(frame, bottom[0], ChartKind::Pie, state.chart(ChartKind::Pie), &self.theme);
        render_chart(frame, bottom[1], ChartKind::Line, state.chart(ChartKind::Line), &self.theme);

        frame.render_widget(Paragraph::new(self.dashboard_footer(screen)), rows[3]);
    }

    fn dashboard_footer(&self, screen: &DashboardScreen) -> Line<'static> {
        let mut spans = vec![match screen.saved {
            Some(n) => Span::styled(format!("{} rows saved  ", n), self.theme.success),
            None => Span::styled("Dry run, nothing saved  ", self.theme.info),
        }];
        if !screen.warnings.is_empty() {
            spans.push(Span::styled(
                format!("{} rows repaired  ", screen.warnings.len()),
                self.theme.warning,
            ));
        }
        spans.push(Span::styled("q quit", self.theme.dim));
        Line::from(spans)
    }

    pub fn render_forum(&self, frame: &mut Frame, screen: &mut ForumScreen) {
        let header = Header::new("forum", &self.timezone, &self.theme)
            .with_account(screen.account.as_deref().unwrap_or("not signed in"));
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(header.height()),
                Constraint::Min(3),
                Constraint::Length(1),
            ])
            .split(frame.area());

        frame.render_widget(Paragraph::new(header.to_lines()), rows[0]);

        let help = match &screen.mode {
            ForumMode::List => {
                forum_view::render_post_list(
                    frame,
                    rows[1],
                    &screen.posts,
                    &mut screen.list_state,
                    &self.tz,
                    &self.theme,
                );
                "↑/↓ select  enter open  r refresh  q quit"
            }
            ForumMode::Detail {
                post,
                comments,
                scroll,
            } => {
                forum_view::render_post_detail(
                    frame, rows[1], post, comments, *scroll, &self.tz, &self.theme,
                );
                "↑/↓ scroll  esc back  q quit"
            }
        };

        frame.render_widget(Paragraph::new(self.status_line(screen.status.as_deref(), help)), rows[2]);
    }

    fn status_line(&self, status: Option<&str>, help: &'static str) -> Line<'static> {
        match status {
            Some(msg) => Line::from(Span::styled(msg.to_string(), self.theme.error)),
            None => Line::from(Span::styled(help, self.theme.dim)),
        }
    }
}

// ── Terminal plumbing ─────────────────────────────────────────────────────────

fn enter_terminal() -> io::Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    Terminal::new(CrosstermBackend::new(stdout))
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()
}

/// Wait up to one tick for a key press.
fn poll_key() -> io::Result<Option<KeyEvent>> {
    if event::poll(TICK_RATE)? {
        if let Event::Key(key) = event::read()? {
            return Ok(Some(key));
        }
    }
    Ok(None)
}
