use clap::{Args, CommandFactory, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the per-user state directory under `$HOME`.
pub const APP_DIR: &str = ".finance-dash";

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Personal finance dashboard and community forum
#[derive(Parser, Debug, Clone)]
#[command(
    name = "finance-dash",
    about = "Personal finance dashboard and community forum",
    version
)]
pub struct Settings {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Base URL of the hosted backend (table + auth API)
    #[arg(long, env = "DASH_BACKEND_URL", global = true)]
    pub backend_url: Option<String>,

    /// Public (anon) API key for the hosted backend
    #[arg(long, env = "DASH_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Use an in-memory backend instead of the hosted one
    #[arg(long, global = true)]
    pub offline: bool,

    /// Table that imported transactions are written to
    #[arg(long, default_value = "transactions", global = true)]
    pub transactions_table: String,

    /// Display theme
    #[arg(long, default_value = "auto", value_parser = ["light", "dark", "classic", "auto"], global = true)]
    pub theme: String,

    /// Timezone used to display dates (auto-detected if not specified)
    #[arg(long, default_value = "auto", global = true)]
    pub timezone: String,

    /// Time budget for file reads and each remote call, in seconds (1-600)
    #[arg(long, default_value = "30", value_parser = clap::value_parser!(u64).range(1..=600), global = true)]
    pub request_timeout_secs: u64,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"], global = true)]
    pub log_level: String,

    /// Log file path
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Clear saved configuration
    #[arg(long, global = true)]
    pub clear: bool,
}

/// Top-level actions.
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Import a .csv, .xlsx or .xls file of transactions and chart it
    Import(ImportArgs),
    /// Browse and contribute to the community forum
    Forum {
        #[command(subcommand)]
        action: ForumAction,
    },
    /// Manage the signed-in account
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },
    /// Check that the backend is reachable
    Ping,
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct ImportArgs {
    /// File to import
    pub file: PathBuf,

    /// Render the charts without saving the records
    #[arg(long)]
    pub no_save: bool,

    /// Print summaries instead of opening the terminal dashboard
    #[arg(long)]
    pub headless: bool,

    /// Order monthly buckets by date instead of first appearance
    #[arg(long)]
    pub chronological: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum ForumAction {
    /// List all posts, newest first
    List,
    /// Browse posts and comments in the terminal UI
    Browse,
    /// Show one post with its comments
    Show { id: String },
    /// Create a post (requires login)
    Post {
        #[arg(long)]
        title: String,
        #[arg(long)]
        content: String,
        /// Comma-separated tags
        #[arg(long, default_value = "")]
        tags: String,
    },
    /// Comment on a post (requires login)
    Comment {
        post_id: String,
        #[arg(long)]
        content: String,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum AuthAction {
    /// Register a new account
    Signup {
        email: String,
        #[arg(long, env = "DASH_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign in with email and password
    Login {
        email: String,
        #[arg(long, env = "DASH_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign out and forget the saved session
    Logout,
    /// Show the signed-in user
    Whoami,
}

// ── LastUsedParams ─────────────────────────────────────────────────────────────

/// Persisted last-used parameters saved to `~/.finance-dash/last_used.json`.
///
/// The API key is never written here.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct LastUsedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transactions_table: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

/// `~/.finance-dash`, or `./.finance-dash` when no home directory is known.
pub fn app_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

impl LastUsedParams {
    pub fn config_path() -> PathBuf {
        app_dir().join("last_used.json")
    }

    /// Return the config path rooted at `base_dir` (used for testing).
    pub fn config_path_in(base_dir: &Path) -> PathBuf {
        base_dir.join(APP_DIR).join("last_used.json")
    }

    /// Returns `Default` when the file is absent or cannot be parsed.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    /// Atomically write params to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    pub fn clear_at(path: &Path) -> Result<(), std::io::Error> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments, merge with last-used params where no explicit
    /// value was provided, resolve `"auto"` values, and persist the result.
    pub fn load_with_last_used() -> Self {
        Self::load_with_last_used_impl(
            std::env::args_os().collect(),
            &LastUsedParams::config_path(),
        )
    }

    /// Accepts args and an explicit config path so that tests can redirect to
    /// a temporary directory.
    pub fn load_with_last_used_impl(
        args: Vec<std::ffi::OsString>,
        config_path: &Path,
    ) -> Self {
        let matches = Settings::command().get_matches_from(args.clone());
        let mut settings = Settings::parse_from(args);

        if settings.clear {
            let _ = LastUsedParams::clear_at(config_path);
            return Self::resolve_auto_values(settings);
        }

        let last = LastUsedParams::load_from(config_path);

        // CLI and environment always win over persisted values.
        if !is_arg_explicitly_set(&matches, "backend_url") && settings.backend_url.is_none() {
            settings.backend_url = last.backend_url;
        }
        if !is_arg_explicitly_set(&matches, "transactions_table") {
            if let Some(v) = last.transactions_table {
                settings.transactions_table = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "theme") {
            if let Some(v) = last.theme {
                settings.theme = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "timezone") {
            if let Some(v) = last.timezone {
                settings.timezone = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "request_timeout_secs") {
            if let Some(v) = last.request_timeout_secs {
                settings.request_timeout_secs = v;
            }
        }

        settings = Self::resolve_auto_values(settings);

        let params = LastUsedParams::from(&settings);
        let _ = params.save_to(config_path);

        settings
    }

    /// Resolve the `"auto"` timezone and apply the `--debug` flag.
    fn resolve_auto_values(mut settings: Settings) -> Settings {
        if settings.timezone == "auto" {
            settings.timezone = crate::time_utils::get_system_timezone();
        }

        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }

        settings
    }
}

impl From<&Settings> for LastUsedParams {
    fn from(s: &Settings) -> Self {
        LastUsedParams {
            backend_url: s.backend_url.clone(),
            transactions_table: Some(s.transactions_table.clone()),
            theme: Some(s.theme.clone()),
            timezone: Some(s.timezone.clone()),
            request_timeout_secs: Some(s.request_timeout_secs),
        }
    }
}

/// Returns `true` when `name` was supplied on the command line or through its
/// environment variable rather than a default.
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches!(
        matches.value_source(name),
        Some(clap::parser::ValueSource::CommandLine) | Some(clap::parser::ValueSource::EnvVariable)
    )
}

// ── Tests ──────────────────────────────────────────────────────────────────────
