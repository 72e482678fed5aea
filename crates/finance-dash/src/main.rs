mod bootstrap;
mod commands;

use anyhow::Result;
use clap::CommandFactory;
use dash_core::settings::Settings;
use dash_runtime::backend::Backend;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load_with_last_used();

    bootstrap::ensure_directories()?;
    let log_file = bootstrap::log_file_for(&settings);
    bootstrap::setup_logging(&settings.log_level, log_file.as_ref())?;

    tracing::info!("Finance Dashboard v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Theme: {}, Timezone: {}, Offline: {}",
        settings.theme,
        settings.timezone,
        settings.offline
    );

    let Some(command) = settings.command.clone() else {
        Settings::command().print_help()?;
        println!();
        return Ok(());
    };

    let backend = Backend::from_settings(&settings)?;

    // Raw-mode screens see Ctrl+C as a key press; everywhere else it cancels
    // the in-flight file read or remote call.
    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Ctrl+C received; cancelling");
                cancel.cancel();
            }
        })
    };

    let result = commands::run(command, &settings, backend, &cancel, &mut std::io::stdout()).await;
    watcher.abort();
    result
}
