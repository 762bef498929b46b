// src/worker_logic.rs

use futures::StreamExt; // For processing the consumer stream
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, Instrument, Span};

use crate::broker::{BrokerChannel, InboundMessage};
use crate::config::worker::{Args, WORKER_PREFETCH_COUNT};
use crate::data_model::ProcessedRow;
use crate::error::{PipelineError, Result};
use crate::pipeline::sinks::{build_sink, ResultSink};
use crate::pipeline::transforms::{build_transform, Transform};
use crate::utils::common::{close_connection, connect_rabbitmq, open_channel};
use crate::utils::prometheus_metrics::*;

/// Decodes a payload and applies `transform` to it.
pub async fn process_payload(data: &[u8], transform: &dyn Transform) -> Result<ProcessedRow> {
    let original = String::from_utf8(data.to_vec())?;
    let transformed = transform.apply(&original).await?;
    Ok(ProcessedRow {
        original,
        transformed,
    })
}

/// Consumes one durable queue, one message at a time.
pub struct Worker<'a, C: BrokerChannel + ?Sized> {
    channel: &'a C,
    queue: String,
    transform: Box<dyn Transform>,
    sink: Box<dyn ResultSink>,
    span: Span,
}

impl<'a, C: BrokerChannel + ?Sized> Worker<'a, C> {
    /// `span` is the logging handle every event of this worker is recorded under.
    pub fn new(
        channel: &'a C,
        queue: impl Into<String>,
        transform: Box<dyn Transform>,
        sink: Box<dyn ResultSink>,
        span: Span,
    ) -> Self {
        Worker {
            channel,
            queue: queue.into(),
            transform,
            sink,
            span,
        }
    }

    /// Receives until `cancel` fires, returning how many messages were
    /// processed and acknowledged.
    ///
    /// Cancellation is checked between messages; a message already being
    /// handled is finished and acknowledged first. A closed consumer stream
    /// or any processing error ends the loop with an error and leaves the
    /// current message unacknowledged for the broker to redeliver.
    ///
    /// The sink is closed on every exit path; a close failure is reported
    /// only when the loop itself succeeded.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<u64> {
        let span = self.span.clone();
        let result = self.consume(cancel).instrument(span.clone()).await;
        let closed = self.sink.close().instrument(span).await;
        if let Err(e) = &closed {
            error!(sink = self.sink.name(), error = %e, "Failed to close result sink");
        }
        let processed_count = result?;
        closed?;
        Ok(processed_count)
    }

    async fn consume(&mut self, cancel: CancellationToken) -> Result<u64> {
        // Same declaration as the dispatcher, so either side may start first.
        self.channel.declare_durable_queue(&self.queue).await?;
        self.channel.set_prefetch(WORKER_PREFETCH_COUNT).await?;

        let consumer_tag = format!(
            "worker-{}-{}",
            std::process::id(),
            chrono::Utc::now().timestamp()
        );
        let mut deliveries = self.channel.subscribe(&self.queue, &consumer_tag).await?;
        info!(
            consumer_tag = %consumer_tag,
            queue = %self.queue,
            transform = self.transform.name(),
            sink = self.sink.name(),
            "Ready for work. To exit press CTRL+C"
        );

        let mut processed_count = 0u64;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("User interrupted continuous listening process.");
                    break;
                }
                next = deliveries.next() => match next {
                    Some(Ok(message)) => {
                        self.handle(message).await?;
                        processed_count += 1;
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "Error receiving message from consumer stream. Worker will stop.");
                        return Err(e);
                    }
                    None => {
                        error!("Consumer stream ended unexpectedly. Worker will stop.");
                        return Err(PipelineError::DeliveryError(format!(
                            "Consumer stream for '{}' closed",
                            self.queue
                        )));
                    }
                }
            }
        }

        Ok(processed_count)
    }

    async fn handle(&mut self, message: InboundMessage) -> Result<()> {
        WORKER_UNACKED_MESSAGES.inc();
        let processing_timer = WORKER_PROCESSING_DURATION_SECONDS.start_timer();

        let task_span = info_span!(
            "process_message",
            delivery_tag = message.delivery_tag,
            redelivered = message.redelivered
        );
        let result = async {
            info!("Received {}", String::from_utf8_lossy(&message.payload));
            let row = process_payload(&message.payload, self.transform.as_ref()).await?;
            self.sink.record(&row).await?;
            debug!("Result recorded, acknowledging");
            Ok::<_, PipelineError>(())
        }
        .instrument(task_span)
        .await;

        if let Err(e) = result {
            // Only acknowledged messages count towards processing time.
            processing_timer.stop_and_discard();
            WORKER_MESSAGE_FAILURES_TOTAL.inc();
            WORKER_UNACKED_MESSAGES.dec();
            error!(delivery_tag = message.delivery_tag, error = %e, "Failed to process message");
            return Err(e);
        }

        let ack_result = message.ack().await;
        processing_timer.observe_duration();
        WORKER_UNACKED_MESSAGES.dec();
        if let Err(e) = ack_result {
            WORKER_ACK_ERRORS_TOTAL.inc();
            error!(error = %e, "Failed to ack message");
            return Err(e);
        }

        WORKER_MESSAGES_PROCESSED_TOTAL.inc();
        info!("Done");
        Ok(())
    }
}

/// Full worker run: build transform and sink, connect, consume until
/// cancelled, close.
pub async fn run_worker(args: &Args, span: Span, cancel: CancellationToken) -> Result<u64> {
    let settings = args.worker_settings()?;
    let transform = build_transform(&settings.transform);
    let sink = build_sink(&settings.sink)?;

    let conn = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            info!("Interrupted while connecting. Nothing was consumed.");
            return Ok(0);
        }
        conn = connect_rabbitmq(&args.amqp_addr) => conn?,
    };
    let result = async {
        let channel = open_channel(&conn, "worker").await?;
        Worker::new(&channel, args.queue.clone(), transform, sink, span)
            .run(cancel)
            .await
    }
    .await;
    close_connection(&conn, "worker").await;

    result
}
