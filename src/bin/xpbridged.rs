use std::io::BufReader;
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use xpbridge::daemon::coordinator::Coordinator;
use xpbridge::daemon::events::HostEvent;
use xpbridge::util::config::AppConfig;
use xpbridge::util::logging::{self, error, info, warn};
use xpbridge::util::paths;

fn ensure_workspace_dir(workspace_dir: &Path) {
    if !workspace_dir.exists() {
        std::fs::create_dir_all(workspace_dir).unwrap_or_else(|e| {
            eprintln!("Failed to create workspace directory: {}", e);
            std::process::exit(1);
        });
    }
}

fn setup_file_logging(log_dir: &Path) {
    std::fs::create_dir_all(log_dir).unwrap_or_else(|e| {
        eprintln!("Failed to create log directory: {}", e);
        std::process::exit(1);
    });

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("xpbridged")
        .filename_suffix("log")
        .max_log_files(7)
        .build(log_dir)
        .unwrap_or_else(|e| {
            eprintln!("Failed to create log appender: {}", e);
            std::process::exit(1);
        });

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_target(true)
                .with_thread_names(true)
                .with_level(true)
                .with_ansi(false)
                .with_timer(fmt::time::ChronoUtc::new(
                    "%Y-%m-%dT%H:%M:%S%.3fZ".to_string(),
                )),
        )
        .with(env_filter)
        .init();
}

fn load_app_config() -> AppConfig {
    match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}

fn main() {
    let config = load_app_config();
    ensure_workspace_dir(&config.workspace_dir);
    setup_file_logging(&paths::log_dir(&config.workspace_dir));
    if !logging::set_run_id(logging::new_run_id()) {
        warn!("Run id was already set; keeping the existing one");
    }

    info!(
        "Starting xpbridge daemon (xpbridged) in {:?} mode",
        config.mode
    );

    let coordinator = Coordinator::from_app_config(&config);
    let shutdown_tx = coordinator.event_sender();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Ctrl+C received, sending shutdown signal");
        if let Err(e) = shutdown_tx.send(HostEvent::Shutdown) {
            error!("Failed to send shutdown: {}", e);
        }
    }) {
        error!("Failed to install Ctrl+C handler: {}", e);
    }

    if let Err(e) = coordinator.run(BufReader::new(std::io::stdin())) {
        error!("xpbridge daemon error: {:#}", e);
        std::process::exit(1);
    }
    info!("xpbridge daemon exited cleanly");
}
