// src/utils/prometheus_metrics.rs

use once_cell::sync::Lazy;
use prometheus::{register_counter, register_gauge, register_histogram, Counter, Gauge, Histogram};

// Metrics from Dispatcher
pub static DISPATCHER_RECORDS_READ_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "dispatcher_records_read_total",
        "Total number of CSV records read by the dispatcher."
    )
    .expect("Failed to register DISPATCHER_RECORDS_READ_TOTAL counter")
});

pub static DISPATCHER_MESSAGES_PUBLISHED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "dispatcher_messages_published_total",
        "Total number of messages published and confirmed by the broker."
    )
    .expect("Failed to register DISPATCHER_MESSAGES_PUBLISHED_TOTAL counter")
});

pub static DISPATCHER_PUBLISH_ERRORS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "dispatcher_publish_errors_total",
        "Total number of failed publishes (send or broker confirmation)."
    )
    .expect("Failed to register DISPATCHER_PUBLISH_ERRORS_TOTAL counter")
});

pub static DISPATCHER_PUBLISH_DURATION_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "dispatcher_publish_duration_seconds",
        "Histogram of publish latencies (from send to broker ack)."
    )
    .expect("Failed to register DISPATCHER_PUBLISH_DURATION_SECONDS histogram")
});

// Metrics from Worker
pub static WORKER_MESSAGES_PROCESSED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "worker_messages_processed_total",
        "Total number of messages transformed, recorded and acknowledged."
    )
    .expect("Failed to register worker_messages_processed_total counter")
});

pub static WORKER_MESSAGE_FAILURES_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "worker_message_failures_total",
        "Total number of messages whose decode, transform or sink step failed."
    )
    .expect("Failed to register worker_message_failures_total counter")
});

pub static WORKER_ACK_ERRORS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "worker_ack_errors_total",
        "Total number of failed acknowledgments."
    )
    .expect("Failed to register worker_ack_errors_total counter")
});

pub static WORKER_PROCESSING_DURATION_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "worker_processing_duration_seconds",
        "Histogram of per-message processing durations (receipt to ack)."
    )
    .expect("Failed to register worker_processing_duration_seconds histogram")
});

pub static WORKER_UNACKED_MESSAGES: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "worker_unacked_messages",
        "Number of received messages not yet acknowledged (0 or 1)."
    )
    .expect("Failed to register worker_unacked_messages gauge")
});
