// src/bin/dispatcher.rs

//! # Dispatcher Binary
//!
//! Reads the avian-influenza CSV and publishes selected columns of every row
//! to their durable queues, one persistent message per (row, route), with a
//! fixed pause after each row.
//!
//! Exit status is 0 when every row was sent and 1 on any failure (missing
//! input file, unreachable broker, failed publish).

use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};
use tracing::{error, info, info_span};
use FluBlaster::config::dispatcher::Args;
use FluBlaster::dispatcher_logic::run_dispatcher;
use FluBlaster::utils::{init_tracing, setup_prometheus_metrics};

/// Spinner used while publishing; the number of rows is not known up front.
fn create_progress_bar(message: &str, template: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_message(message.to_string());
    pb.set_style(
        ProgressStyle::default_spinner()
            .template(template)
            .unwrap_or_else(|_| ProgressStyle::default_spinner()), // Fallback style
    );
    pb
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let _log_guard = match init_tracing("dispatcher", &args.log_dir) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(e.exit_code());
        }
    };

    if args.validate_config {
        return match args.routes() {
            Ok(routes) => {
                info!("Routes configuration is valid ({} routes).", routes.routes.len());
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!(error = %e, "Routes configuration is invalid");
                ExitCode::from(e.exit_code())
            }
        };
    }

    if let Some(port) = args.metrics_port {
        setup_prometheus_metrics(port);
    }

    info!(
        "Dispatcher starting: input '{}' -> {} (delay {} ms)",
        args.input_file.display(),
        args.amqp_addr,
        args.delay_ms
    );

    let publishing_pb = create_progress_bar(
        "Publishing",
        "{spinner:.green} [{elapsed_precise}] {msg} {pos} messages ({per_sec})",
    );
    let span = info_span!("dispatcher", input = %args.input_file.display());
    let started = Instant::now();

    match run_dispatcher(&args, &publishing_pb, span).await {
        Ok(published_count) => {
            publishing_pb.finish_with_message(format!(
                "Published {} messages in {}",
                published_count,
                HumanDuration(started.elapsed())
            ));
            info!("Dispatcher finished. {} messages published.", published_count);
            ExitCode::SUCCESS
        }
        Err(e) => {
            publishing_pb.abandon_with_message("Dispatch failed");
            error!(error = %e, "Dispatcher failed");
            ExitCode::from(e.exit_code())
        }
    }
}
