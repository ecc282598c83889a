// Wildcard squad optimizer entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file, stdout carries the report)
// 2. Load config
// 3. Build the candidate provider
// 4. Fetch, optimize, refine
// 5. Print the report (and write it to disk if configured)

use wildcard_app::app;
use wildcard_app::config;
use wildcard_app::report;

use anyhow::Context;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing
    init_tracing()?;
    info!("Wildcard optimizer starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: budget {:.1}, {} players, max {} per club, mini-league {}, refinement {}",
        config.constraints.budget,
        config.constraints.squad_size,
        config.constraints.max_per_club,
        if config.ownership_limits.is_some() { "on" } else { "off" },
        if config.refinement.is_some() { "on" } else { "off" },
    );

    // 3. Build the candidate provider
    let provider = app::build_provider(&config).context("failed to build candidate provider")?;

    // 4. Run
    let result = app::run(&config, provider.as_ref()).await;
    let generated_at = chrono::Local::now();

    // 5. Report
    let (text, failure) = match result {
        Ok(outcome) => (
            report::render_success(&outcome, &config.constraints, generated_at),
            None,
        ),
        Err(e) => {
            error!("No squad produced: {}", e);
            (report::render_failure(&e, generated_at), Some(e))
        }
    };
    print!("{text}");

    if let Some(path) = &config.report_path {
        report::write_report(path, &text)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        info!("Report written to {}", path.display());
    }

    if let Some(e) = failure {
        return Err(anyhow::Error::new(e).context("optimization failed"));
    }

    info!("Wildcard optimizer finished");
    Ok(())
}

/// Initialize tracing to log to a file (stdout is reserved for the report).
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("wildcard.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("wildcard_app=info,wildcard_core=info,wildcard_fpl=info,warn")
        }))
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
