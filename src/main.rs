use std::io::IsTerminal;
use std::process;

use clap::Parser;
use ocsp_purger::Error;
use ocsp_purger::PurgerBuilder;
use ocsp_purger::Result;
use ocsp_purger::SystemError;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

#[derive(Parser, Debug)]
#[command(name = "ocsp-purger", version, about = "Purges stale OCSP responses from CDN caches")]
struct Args {
    /// Configuration file merged over defaults and `CONFIG_PATH`
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let args = Args::parse();

    // Initializing Logs
    let guard = init_observability();

    let code = match run(args).await {
        Ok(code) => code,
        Err(e) => {
            error!("purger failed to start: {}", e);
            1
        }
    };

    // flush the final report line before exiting
    drop(guard);
    process::exit(code);
}

async fn run(args: Args) -> Result<i32> {
    // Initializing Shutdown Signal
    let (graceful_tx, graceful_rx) = watch::channel(());

    let purger = PurgerBuilder::new(args.config.as_deref(), graceful_rx)?.build()?;
    purger.start_metrics_server()?;
    purger.start_http_server()?;

    info!("Application started. Waiting for SIGINT/SIGTERM...");
    tokio::spawn(async {
        if let Err(e) = graceful_shutdown(graceful_tx).await {
            error!("Failed to shutdown: {:?}", e);
        }
    });

    let report = purger.run().await;
    if report.is_success() {
        info!("{}", report.summary());
    } else {
        error!("{}", report.summary());
    }
    Ok(report.exit_code())
}

async fn graceful_shutdown(graceful_tx: watch::Sender<()>) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt()).map_err(SystemError::Io)?;
    let mut sigterm = signal(SignalKind::terminate()).map_err(SystemError::Io)?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
    }

    graceful_tx.send(()).map_err(|e| {
        error!("Failed to send shutdown signal: {}", e);
        Error::System(SystemError::SignalSendFailed(format!(
            "Failed to send shutdown signal: {e}"
        )))
    })?;

    Ok(())
}

fn init_observability() -> WorkerGuard {
    let (non_blocking, guard) = tracing_appender::non_blocking(std::io::stdout());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let base_subscriber = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(std::io::stdout().is_terminal())
        .with_filter(filter);
    tracing_subscriber::registry().with(base_subscriber).init();

    guard
}
