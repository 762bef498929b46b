// Utils

pub mod common;
pub mod prometheus_metrics;

pub use common::{
    cancel_on_shutdown_signal, close_connection, connect_rabbitmq, init_tracing, open_channel,
    setup_prometheus_metrics,
};
