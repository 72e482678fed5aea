use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use dash_core::settings::{app_dir, Command, ForumAction, Settings};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ── Directory bootstrap ────────────────────────────────────────────────────────

/// Ensure `~/.finance-dash/` and `~/.finance-dash/logs/` exist.
pub fn ensure_directories() -> anyhow::Result<()> {
    ensure_directories_in(&app_dir())
}

fn ensure_directories_in(base: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(base.join("logs"))?;
    Ok(())
}

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Map a `--log-level` name to a `tracing` filter directive. Unknown names
/// pass through unchanged so `EnvFilter` directives like `dash_runtime=debug`
/// still work.
pub fn level_directive(log_level: &str) -> String {
    match log_level.to_uppercase().as_str() {
        "DEBUG" => "debug".to_string(),
        "INFO" => "info".to_string(),
        "WARNING" => "warn".to_string(),
        "ERROR" | "CRITICAL" => "error".to_string(),
        _ => log_level.to_string(),
    }
}

/// Full-screen commands draw over stderr, so their logs go to a file under
/// `~/.finance-dash/logs/` unless `--log-file` says otherwise.
pub fn log_file_for(settings: &Settings) -> Option<PathBuf> {
    if settings.log_file.is_some() {
        return settings.log_file.clone();
    }
    let full_screen = match &settings.command {
        Some(Command::Import(args)) => !args.headless,
        Some(Command::Forum {
            action: ForumAction::Browse,
        }) => true,
        _ => false,
    };
    full_screen.then(|| app_dir().join("logs").join("finance-dash.log"))
}

/// Install the global `tracing` subscriber, writing to `log_file` when given
/// and to stderr otherwise.
pub fn setup_logging(log_level: &str, log_file: Option<&PathBuf>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(level_directive(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, stderr_layer) = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let layer = fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file));
            (Some(layer), None)
        }
        None => (
            None,
            Some(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            ),
        ),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();

    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    #[test]
    fn test_ensure_directories_creates_logs() {
        let tmp = TempDir::new().expect("tempdir");
        let base = tmp.path().join(".finance-dash");

        ensure_directories_in(&base).expect("ensure_directories should succeed");
        // Second run is a no-op.
        ensure_directories_in(&base).expect("idempotent");

        assert!(base.join("logs").is_dir());
    }

    #[test]
    fn test_level_directive_mapping() {
        assert_eq!(level_directive("DEBUG"), "debug");
        assert_eq!(level_directive("info"), "info");
        assert_eq!(level_directive("WARNING"), "warn");
        assert_eq!(level_directive("ERROR"), "error");
        assert_eq!(level_directive("CRITICAL"), "error");
        assert_eq!(level_directive("dash_runtime=trace"), "dash_runtime=trace");
    }

    #[test]
    fn test_log_file_only_for_full_screen_commands() {
        let headless = Settings::parse_from(["finance-dash", "import", "a.csv", "--headless"]);
        assert_eq!(log_file_for(&headless), None);

        let list = Settings::parse_from(["finance-dash", "forum", "list"]);
        assert_eq!(log_file_for(&list), None);

        let tui = Settings::parse_from(["finance-dash", "import", "a.csv"]);
        let path = log_file_for(&tui).expect("dashboard logs to a file");
        assert!(path.ends_with("logs/finance-dash.log"));

        let browse = Settings::parse_from(["finance-dash", "forum", "browse"]);
        assert!(log_file_for(&browse).is_some());
    }

    #[test]
    fn test_explicit_log_file_wins() {
        let s = Settings::parse_from([
            "finance-dash",
            "--log-file",
            "/tmp/dash.log",
            "forum",
            "list",
        ]);
        assert_eq!(log_file_for(&s), Some(PathBuf::from("/tmp/dash.log")));
    }
}
