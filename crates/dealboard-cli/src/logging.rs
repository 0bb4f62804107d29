use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter directives.
pub const LOG_ENV: &str = "DEALBOARD_LOG";

fn filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Plain subcommands log to stderr.
pub fn init_stderr() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_writer(std::io::stderr)
        .try_init();
}

/// The interactive board owns the terminal, so it logs to
/// `.dealboard/logs/board.log`. Without a board directory, logs are dropped.
pub fn init_file(repo_root: &Path) {
    let paths = dealboard_store::BoardPaths::discover(repo_root);
    let file = if paths.is_initialized() {
        std::fs::create_dir_all(&paths.logs_dir)
            .and_then(|_| {
                std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(paths.board_log())
            })
            .ok()
    } else {
        None
    };
    match file {
        Some(file) => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_writer(std::io::sink)
                .try_init();
        }
    }
}
