//! Subcommand dispatch. Everything user-facing goes to `out`; logs go
//! through `tracing`.

use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use dash_core::formatting::format_currency;
use dash_core::models::RecordId;
use dash_core::settings::{AuthAction, Command, ForumAction, ImportArgs, Settings};
use dash_core::time_utils::TimezoneHandler;
use dash_data::aggregator::BucketOrder;
use dash_runtime::backend::Backend;
use dash_runtime::chart_board::ChartBoard;
use dash_runtime::coordinator::{IngestOptions, IngestOutcome, IngestReport, IngestionCoordinator};
use dash_runtime::deadline::with_timeout;
use dash_runtime::forum::ForumService;
use dash_runtime::store::test_connection;
use dash_ui::app::{App, DashboardScreen};
use dash_ui::charts::{text_lines, DashboardHandle, TerminalRenderer};
use dash_ui::forum_view::{plain_text, post_card_lines, post_detail_lines};
use dash_ui::themes::Theme;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub async fn run<W: Write>(
    command: Command,
    settings: &Settings,
    backend: Backend,
    cancel: &CancellationToken,
    out: &mut W,
) -> Result<()> {
    match command {
        Command::Import(args) => import(&args, settings, &backend, cancel, out).await,
        Command::Forum { action } => forum(action, settings, &backend, out).await,
        Command::Auth { action } => auth(action, &backend, out).await,
        Command::Ping => ping(&backend, out).await,
    }
}

// ── import ────────────────────────────────────────────────────────────────────

async fn import<W: Write>(
    args: &ImportArgs,
    settings: &Settings,
    backend: &Backend,
    cancel: &CancellationToken,
    out: &mut W,
) -> Result<()> {
    let renderer = Arc::new(TerminalRenderer::new());
    let state = renderer.state();
    let board = Arc::new(ChartBoard::new(renderer));
    let coordinator = IngestionCoordinator::new(
        Arc::clone(&backend.store),
        board,
        settings.transactions_table.clone(),
        backend.timeout,
    );
    let options = IngestOptions {
        save: !args.no_save,
        order: if args.chronological {
            BucketOrder::Chronological
        } else {
            BucketOrder::FirstSeen
        },
    };

    let report = match coordinator.ingest(&args.file, options, cancel).await {
        Ok(IngestOutcome::Completed(report)) => report,
        Ok(IngestOutcome::Ignored) => {
            writeln!(
                out,
                "Skipped {}: only .csv, .xlsx and .xls files are accepted",
                args.file.display()
            )?;
            return Ok(());
        }
        Err(e) => {
            // The charts may already be up when saving fails; show them
            // before reporting the error.
            if args.headless {
                write_charts(&state, out)?;
            }
            return Err(e.into());
        }
    };

    for warning in &report.warnings {
        warn!(row = warning.row, "{}", warning.message);
    }

    if args.headless {
        write_summary(&report, options.save, out)?;
        write_charts(&state, out)?;
        write_warnings(&report, out)?;
        return Ok(());
    }

    let screen = DashboardScreen {
        source: file_label(&report),
        totals: report.views.totals,
        warnings: report.warnings.iter().map(|w| w.message.clone()).collect(),
        saved: options.save.then_some(report.persisted),
    };
    App::new(&settings.theme, settings.timezone.clone())
        .run_dashboard(state, screen)
        .await?;
    Ok(())
}

fn file_label(report: &IngestReport) -> String {
    report
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| report.path.display().to_string())
}

fn write_summary<W: Write>(report: &IngestReport, saved: bool, out: &mut W) -> Result<()> {
    let totals = &report.views.totals;
    writeln!(
        out,
        "Imported {} ({}): {} records",
        file_label(report),
        report.format,
        report.records.len()
    )?;
    writeln!(
        out,
        "Income {}  Expenses {}  Net {}",
        format_currency(totals.input),
        format_currency(totals.output),
        format_currency(totals.net)
    )?;
    if saved {
        writeln!(out, "Saved {} rows", report.persisted)?;
    } else {
        writeln!(out, "Dry run, nothing saved")?;
    }
    Ok(())
}

fn write_charts<W: Write>(state: &DashboardHandle, out: &mut W) -> Result<()> {
    let state = state
        .lock()
        .map_err(|_| anyhow::anyhow!("dashboard state is poisoned"))?;
    for chart in state.charts() {
        writeln!(out)?;
        for line in text_lines(chart) {
            writeln!(out, "{}", line)?;
        }
    }
    Ok(())
}

fn write_warnings<W: Write>(report: &IngestReport, out: &mut W) -> Result<()> {
    if report.warnings.is_empty() {
        return Ok(());
    }
    writeln!(out)?;
    writeln!(out, "Warnings ({}):", report.warnings.len())?;
    for warning in &report.warnings {
        writeln!(out, "  {}", warning.message)?;
    }
    Ok(())
}

// ── forum ─────────────────────────────────────────────────────────────────────

async fn forum<W: Write>(
    action: ForumAction,
    settings: &Settings,
    backend: &Backend,
    out: &mut W,
) -> Result<()> {
    let service = Arc::new(ForumService::new(
        Arc::clone(&backend.store),
        Arc::clone(&backend.identity),
        backend.timeout,
    ));
    // Styles are dropped by `plain_text`.
    let theme = Theme::classic();
    let tz = TimezoneHandler::new(&settings.timezone);

    match action {
        ForumAction::List => {
            let posts = service.list_posts().await?;
            if posts.is_empty() {
                writeln!(out, "No posts yet. Be the first to start a discussion!")?;
            }
            for post in &posts {
                writeln!(out, "[{}] {}", post.id, plain_text(&post_card_lines(post, &tz, &theme)))?;
                writeln!(out)?;
            }
        }
        ForumAction::Browse => {
            let posts = service.list_posts().await?;
            App::new(&settings.theme, settings.timezone.clone())
                .run_forum(service, posts)
                .await?;
        }
        ForumAction::Show { id } => {
            let id = RecordId::from(id.as_str());
            let post = service.get_post(&id).await?;
            let comments = service.list_comments(&id).await?;
            writeln!(out, "{}", plain_text(&post_detail_lines(&post, &comments, &tz, &theme)))?;
        }
        ForumAction::Post {
            title,
            content,
            tags,
        } => {
            let post = service.create_post(&title, &content, &tags).await?;
            writeln!(out, "Created post {}", post.id)?;
        }
        ForumAction::Comment { post_id, content } => {
            let id = RecordId::from(post_id.as_str());
            service.add_comment(&id, &content).await?;
            writeln!(out, "Comment added to post {}", id)?;
        }
    }
    Ok(())
}

// ── auth ──────────────────────────────────────────────────────────────────────

async fn auth<W: Write>(action: AuthAction, backend: &Backend, out: &mut W) -> Result<()> {
    let identity = &backend.identity;
    let timeout = backend.timeout;

    match action {
        AuthAction::Signup { email, password } => {
            let user = with_timeout(timeout, "Signing up", identity.sign_up(&email, &password)).await?;
            let signed_in = with_timeout(timeout, "Checking sign-in", identity.current_user())
                .await?
                .is_some();
            info!(user = %user.id, "Registered account");
            if signed_in {
                writeln!(out, "Signed up and signed in as {}", email)?;
            } else {
                writeln!(out, "Signed up as {}; check your email to confirm the account", email)?;
            }
        }
        AuthAction::Login { email, password } => {
            let session = with_timeout(
                timeout,
                "Signing in",
                identity.sign_in_with_password(&email, &password),
            )
            .await?;
            writeln!(
                out,
                "Signed in as {}",
                session.user.email.as_deref().unwrap_or(&email)
            )?;
        }
        AuthAction::Logout => {
            with_timeout(timeout, "Signing out", identity.sign_out()).await?;
            writeln!(out, "Signed out")?;
        }
        AuthAction::Whoami => {
            match with_timeout(timeout, "Checking sign-in", identity.current_user()).await? {
                Some(user) => writeln!(
                    out,
                    "Signed in as {} ({})",
                    user.email.as_deref().unwrap_or("no email"),
                    user.id
                )?,
                None => writeln!(out, "Not signed in")?,
            }
        }
    }
    Ok(())
}

// ── ping ──────────────────────────────────────────────────────────────────────

async fn ping<W: Write>(backend: &Backend, out: &mut W) -> Result<()> {
    let rows = with_timeout(
        backend.timeout,
        "Connecting to backend",
        test_connection(backend.store.as_ref()),
    )
    .await?;
    if backend.offline {
        writeln!(out, "Offline backend ready ({} posts)", rows.len())?;
    } else {
        writeln!(out, "Backend reachable")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use dash_runtime::forum::POSTS_TABLE;
    use dash_runtime::store::TableStore;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    fn settings(args: &[&str]) -> Settings {
        let mut argv = vec!["finance-dash", "--offline", "--timezone", "UTC"];
        argv.extend_from_slice(args);
        Settings::parse_from(argv)
    }

    async fn run_to_string(backend: &Backend, args: &[&str]) -> Result<String> {
        let s = settings(args);
        let command = s.command.clone().expect("subcommand");
        let mut out = Vec::new();
        run(command, &s, backend.clone(), &CancellationToken::new(), &mut out).await?;
        Ok(String::from_utf8(out).expect("utf-8 output"))
    }

    fn offline() -> Backend {
        Backend::offline(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_headless_import_prints_summary_charts_and_warnings() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("jan.csv");
        std::fs::write(
            &path,
            "time,type,category,amount\n\
             2024-01-03T09:00:00Z,input,Salary,100\n\
             2024-01-09T09:00:00Z,output,Food,$40\n\
             2024-01-10T09:00:00Z,output,Food,abc\n",
        )
        .unwrap();
        let backend = offline();

        let text = run_to_string(&backend, &["import", path.to_str().unwrap(), "--headless"])
            .await
            .unwrap();

        assert!(text.starts_with("Imported jan.csv (CSV): 3 records\n"));
        assert!(text.contains("Income $100.00  Expenses $40.00  Net $60.00"));
        assert!(text.contains("Saved 3 rows"));
        assert!(text.contains("Monthly Income vs Expenses"));
        assert!(text.contains("Expenses by Category"));
        assert!(text.contains("Warnings (1):\n  Invalid amount at row 3, defaulting to 0"));
    }

    #[tokio::test]
    async fn test_headless_dry_run() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("jan.csv");
        std::fs::write(&path, "time,type,category,amount\n2024-01-03T09:00:00Z,input,Salary,100\n").unwrap();

        let text = run_to_string(
            &offline(),
            &["import", path.to_str().unwrap(), "--headless", "--no-save"],
        )
        .await
        .unwrap();
        assert!(text.contains("Dry run, nothing saved"));
    }

    #[tokio::test]
    async fn test_import_ignores_other_extensions() {
        let text = run_to_string(&offline(), &["import", "notes.txt", "--headless"])
            .await
            .unwrap();
        assert_eq!(
            text,
            "Skipped notes.txt: only .csv, .xlsx and .xls files are accepted\n"
        );
    }

    #[tokio::test]
    async fn test_import_missing_column_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "time,type,category\n2024-01-03T09:00:00Z,input,Salary\n").unwrap();

        let err = run_to_string(&offline(), &["import", path.to_str().unwrap(), "--headless"])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Missing required columns: amount");
    }

    #[tokio::test]
    async fn test_forum_flow_offline() {
        let backend = offline();

        let err = run_to_string(&backend, &["forum", "post", "--title", "Hi", "--content", "x"])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Please login to create a post");

        let text = run_to_string(&backend, &["auth", "signup", "ada@example.com", "--password", "pw"])
            .await
            .unwrap();
        assert_eq!(text, "Signed up and signed in as ada@example.com\n");

        let text = run_to_string(
            &backend,
            &["forum", "post", "--title", "Budgeting", "--content", "Track it", "--tags", "a, b"],
        )
        .await
        .unwrap();
        assert_eq!(text, "Created post 1\n");

        run_to_string(&backend, &["forum", "comment", "1", "--content", "Nice"])
            .await
            .unwrap();

        let list = run_to_string(&backend, &["forum", "list"]).await.unwrap();
        assert!(list.starts_with("[1] Budgeting  "));
        assert!(list.contains("#a #b\nTrack it"));

        let show = run_to_string(&backend, &["forum", "show", "1"]).await.unwrap();
        assert!(show.contains("Comments (1)"));
        assert!(show.contains("Anonymous · "));
        assert!(show.contains("  Nice"));
    }

    #[tokio::test]
    async fn test_forum_list_empty() {
        let text = run_to_string(&offline(), &["forum", "list"]).await.unwrap();
        assert_eq!(text, "No posts yet. Be the first to start a discussion!\n");
    }

    #[tokio::test]
    async fn test_auth_whoami_and_logout() {
        let backend = offline();
        assert_eq!(
            run_to_string(&backend, &["auth", "whoami"]).await.unwrap(),
            "Not signed in\n"
        );
        run_to_string(&backend, &["auth", "signup", "ada@example.com", "--password", "pw"])
            .await
            .unwrap();
        let text = run_to_string(&backend, &["auth", "whoami"]).await.unwrap();
        assert!(text.starts_with("Signed in as ada@example.com ("));

        assert_eq!(run_to_string(&backend, &["auth", "logout"]).await.unwrap(), "Signed out\n");
        let err = run_to_string(&backend, &["auth", "login", "ada@example.com", "--password", "nope"])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid login credentials"));
    }

    #[tokio::test]
    async fn test_ping_offline() {
        let backend = offline();
        backend
            .store
            .insert(POSTS_TABLE, vec![json!({"title": "t"})])
            .await
            .unwrap();
        let text = run_to_string(&backend, &["ping"]).await.unwrap();
        assert_eq!(text, "Offline backend ready (1 posts)\n");
    }
}
