// src/bin/worker.rs

use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span};
use FluBlaster::config::worker::Args;
use FluBlaster::utils::{cancel_on_shutdown_signal, init_tracing, setup_prometheus_metrics};
use FluBlaster::worker_logic::run_worker;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let log_name = format!("worker-{}", args.queue);
    let _log_guard = match init_tracing(&log_name, &args.log_dir) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(e.exit_code());
        }
    };

    if args.validate_config {
        return match args.worker_settings() {
            Ok(settings) => {
                info!(
                    transform = settings.transform.name(),
                    sink = ?settings.sink,
                    "Worker configuration is valid."
                );
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!(error = %e, "Worker configuration is invalid");
                ExitCode::from(e.exit_code())
            }
        };
    }

    if let Some(port) = args.metrics_port {
        setup_prometheus_metrics(port);
    }

    info!(
        "Worker starting. Consuming from queue '{}' @ {}",
        args.queue, args.amqp_addr
    );

    let cancel = CancellationToken::new();
    cancel_on_shutdown_signal(cancel.clone());

    let span = info_span!("worker", queue = %args.queue);
    match run_worker(&args, span, cancel).await {
        Ok(processed_count) => {
            info!("Worker stopped. {} messages processed.", processed_count);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Something went wrong. Worker stopping.");
            ExitCode::from(e.exit_code())
        }
    }
}
