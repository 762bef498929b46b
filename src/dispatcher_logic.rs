// src/dispatcher_logic.rs

//! Fan-out of CSV records to durable queues.

use std::time::Duration;

use indicatif::ProgressBar;
use tokio::time::sleep;
use tracing::{debug, error, info, Instrument, Span};

use crate::broker::BrokerChannel;
use crate::config::dispatcher::{Args, Route, RoutesConfig};
use crate::data_model::{Message, Record};
use crate::error::{PipelineError, Result};
use crate::pipeline::readers::{BaseReader, CsvReader};
use crate::utils::common::{close_connection, connect_rabbitmq, open_channel};
use crate::utils::prometheus_metrics::*;

/// Builds the message a route produces for `record`.
pub fn route_message(record: &Record, route: &Route) -> Result<Message> {
    let value = record
        .field(&route.column)
        .ok_or_else(|| PipelineError::MissingField {
            record_index: record.index(),
            column: route.column.clone(),
        })?;
    Ok(Message {
        queue: route.queue.clone(),
        payload: value.as_bytes().to_vec(),
    })
}

/// Publishes one message per (record, route) pair, pausing after each record.
pub struct Dispatcher<'a, C: BrokerChannel + ?Sized> {
    channel: &'a C,
    routes: RoutesConfig,
    delay: Duration,
    span: Span,
}

impl<'a, C: BrokerChannel + ?Sized> Dispatcher<'a, C> {
    /// `span` is the logging handle every event of this dispatcher is recorded under.
    pub fn new(channel: &'a C, routes: RoutesConfig, delay: Duration, span: Span) -> Self {
        Dispatcher {
            channel,
            routes,
            delay,
            span,
        }
    }

    /// Declares every routed queue as durable. Safe to repeat.
    pub async fn declare_queues(&self) -> Result<()> {
        for queue in self.routes.queues() {
            self.channel.declare_durable_queue(queue).await?;
            info!("Declared durable queue '{}'", queue);
        }
        Ok(())
    }

    /// Sends every record of `source` and returns the number of messages published.
    ///
    /// Stops at the first error: a failed publish is not retried and the
    /// remaining records are left unsent.
    pub async fn dispatch<I>(&self, source: I, progress: &ProgressBar) -> Result<u64>
    where
        I: IntoIterator<Item = Result<Record>>,
    {
        self.dispatch_records(source, progress)
            .instrument(self.span.clone())
            .await
    }

    async fn dispatch_records<I>(&self, source: I, progress: &ProgressBar) -> Result<u64>
    where
        I: IntoIterator<Item = Result<Record>>,
    {
        self.declare_queues().await?;

        let mut published_count = 0u64;
        for record in source {
            let record = record?;
            DISPATCHER_RECORDS_READ_TOTAL.inc();

            // Resolve every route first so a bad record publishes nothing.
            let messages = self
                .routes
                .routes
                .iter()
                .map(|route| route_message(&record, route))
                .collect::<Result<Vec<_>>>()?;

            for message in messages {
                self.publish(&message).await?;
                published_count += 1;
                progress.inc(1);
            }
            debug!(record = record.index(), "Record dispatched");

            if !self.delay.is_zero() {
                sleep(self.delay).await;
            }
        }

        info!("Finished dispatching {} messages", published_count);
        Ok(published_count)
    }

    async fn publish(&self, message: &Message) -> Result<()> {
        let publish_timer = DISPATCHER_PUBLISH_DURATION_SECONDS.start_timer();
        let result = self
            .channel
            .publish_persistent(&message.queue, &message.payload)
            .await;
        publish_timer.observe_duration();

        match result {
            Ok(()) => {
                DISPATCHER_MESSAGES_PUBLISHED_TOTAL.inc();
                info!(
                    "Sent {} to {}",
                    String::from_utf8_lossy(&message.payload),
                    message.queue
                );
                Ok(())
            }
            Err(e) => {
                DISPATCHER_PUBLISH_ERRORS_TOTAL.inc();
                error!(queue = %message.queue, error = %e, "FATAL: publish failed. Stopping.");
                Err(e)
            }
        }
    }
}

/// Full dispatcher run: open the input, connect, publish, close.
///
/// The input file is opened before the broker is contacted, so a missing file
/// fails with `SourceUnavailable` without any connection or publish. The
/// connection is closed on every path once it has been opened.
pub async fn run_dispatcher(args: &Args, progress: &ProgressBar, span: Span) -> Result<u64> {
    let routes = args.routes()?;
    let records = CsvReader::new(&args.input_file).read_records()?;

    let conn = connect_rabbitmq(&args.amqp_addr).await?;
    let result = async {
        let channel = open_channel(&conn, "dispatcher").await?;
        Dispatcher::new(&channel, routes, args.delay(), span)
            .dispatch(records, progress)
            .await
    }
    .await;
    close_connection(&conn, "dispatcher").await;

    result
}
