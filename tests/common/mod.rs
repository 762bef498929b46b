// tests/common/mod.rs
//
// Shared helpers for the integration tests: an in-memory broker that behaves
// like a RabbitMQ channel for the operations the crate uses, plus CSV fixtures.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tempfile::NamedTempFile;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use FluBlaster::broker::{
    Acknowledge, BrokerChannel, DeliveryStream, InboundMessage, PERSISTENT_DELIVERY_MODE,
};
use FluBlaster::data_model::ProcessedRow;
use FluBlaster::error::{PipelineError, Result};
use FluBlaster::pipeline::sinks::ResultSink;

pub const AVIAN_CSV: &str = "\
Scientific_Name,Common_Name,target_H5_HPAI
Anas platyrhynchos,Mallard,Negative
Cygnus olor,Mute Swan,Positive
Branta canadensis,Canada Goose,Negative
";

pub fn create_temp_csv(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
    write!(temp_file, "{}", content).expect("Failed to write to temp file");
    temp_file
}

#[derive(Default)]
struct State {
    declare_calls: Vec<String>,
    durable_queues: Vec<String>,
    queues: HashMap<String, VecDeque<Vec<u8>>>,
    published: Vec<(String, Vec<u8>)>,
    prefetch: Option<u16>,
    fail_publish_at: Option<usize>,
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
    notify: Notify,
    closed: AtomicBool,
    next_tag: AtomicU64,
    outstanding: AtomicUsize,
    max_outstanding: AtomicUsize,
    acked: AtomicUsize,
    requeued: AtomicUsize,
}

impl Inner {
    fn pop(&self, queue: &str) -> Option<Vec<u8>> {
        let mut state = self.state.lock().unwrap();
        state.queues.get_mut(queue).and_then(|q| q.pop_front())
    }

    fn requeue_front(&self, queue: &str, payload: Vec<u8>) {
        let mut state = self.state.lock().unwrap();
        state
            .queues
            .entry(queue.to_string())
            .or_default()
            .push_front(payload);
        drop(state);
        self.requeued.fetch_add(1, Ordering::SeqCst);
        self.notify.notify_one();
    }
}

/// In-memory stand-in for a RabbitMQ channel.
///
/// Publishing to an undeclared queue fails, declarations are idempotent,
/// prefetch is honoured per consumer and unacknowledged deliveries go back to
/// the head of their queue when dropped.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    inner: Arc<Inner>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the n-th publish (0-based) fail.
    pub fn fail_publish_at(&self, n: usize) {
        self.inner.state.lock().unwrap().fail_publish_at = Some(n);
    }

    /// Ends every consumer stream, as a broker-side channel close would.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
        self.inner.notify.notify_one();
    }

    pub fn published(&self) -> Vec<(String, String)> {
        self.inner
            .state
            .lock()
            .unwrap()
            .published
            .iter()
            .map(|(q, p)| (q.clone(), String::from_utf8_lossy(p).into_owned()))
            .collect()
    }

    pub fn declare_calls(&self) -> Vec<String> {
        self.inner.state.lock().unwrap().declare_calls.clone()
    }

    pub fn durable_queues(&self) -> Vec<String> {
        self.inner.state.lock().unwrap().durable_queues.clone()
    }

    pub fn depth(&self, queue: &str) -> usize {
        self.inner
            .state
            .lock()
            .unwrap()
            .queues
            .get(queue)
            .map_or(0, VecDeque::len)
    }

    pub fn prefetch(&self) -> Option<u16> {
        self.inner.state.lock().unwrap().prefetch
    }

    pub fn acked(&self) -> usize {
        self.inner.acked.load(Ordering::SeqCst)
    }

    pub fn requeued(&self) -> usize {
        self.inner.requeued.load(Ordering::SeqCst)
    }

    pub fn max_outstanding(&self) -> usize {
        self.inner.max_outstanding.load(Ordering::SeqCst)
    }

    /// Enqueues directly, bypassing the declare check.
    pub fn seed(&self, queue: &str, payloads: &[&[u8]]) {
        let mut state = self.inner.state.lock().unwrap();
        let q = state.queues.entry(queue.to_string()).or_default();
        for payload in payloads {
            q.push_back(payload.to_vec());
        }
        drop(state);
        self.inner.notify.notify_one();
    }
}

struct MemoryAcker {
    inner: Arc<Inner>,
    queue: String,
    payload: Vec<u8>,
    acked: AtomicBool,
    permit: Mutex<Option<OwnedSemaphorePermit>>,
}

#[async_trait]
impl Acknowledge for MemoryAcker {
    async fn acknowledge(&self) -> Result<()> {
        if self.acked.swap(true, Ordering::SeqCst) {
            return Err(PipelineError::DeliveryError("double ack".to_string()));
        }
        self.inner.outstanding.fetch_sub(1, Ordering::SeqCst);
        self.inner.acked.fetch_add(1, Ordering::SeqCst);
        self.permit.lock().unwrap().take();
        Ok(())
    }
}

impl Drop for MemoryAcker {
    fn drop(&mut self) {
        if !self.acked.load(Ordering::SeqCst) {
            self.inner.outstanding.fetch_sub(1, Ordering::SeqCst);
            self.inner
                .requeue_front(&self.queue, std::mem::take(&mut self.payload));
        }
    }
}

#[async_trait]
impl BrokerChannel for MemoryBroker {
    async fn declare_durable_queue(&self, queue: &str) -> Result<()> {
        let mut state = self.inner.state.lock().unwrap();
        state.declare_calls.push(queue.to_string());
        if !state.durable_queues.iter().any(|q| q == queue) {
            state.durable_queues.push(queue.to_string());
        }
        state.queues.entry(queue.to_string()).or_default();
        Ok(())
    }

    async fn publish_persistent(&self, queue: &str, payload: &[u8]) -> Result<()> {
        let mut state = self.inner.state.lock().unwrap();
        if !state.durable_queues.iter().any(|q| q == queue) {
            return Err(PipelineError::DeliveryError(format!(
                "queue '{}' was not declared",
                queue
            )));
        }
        if state.fail_publish_at == Some(state.published.len()) {
            return Err(PipelineError::DeliveryError("broker nack".to_string()));
        }
        state.published.push((queue.to_string(), payload.to_vec()));
        state
            .queues
            .entry(queue.to_string())
            .or_default()
            .push_back(payload.to_vec());
        drop(state);
        self.inner.notify.notify_one();
        Ok(())
    }

    async fn set_prefetch(&self, prefetch_count: u16) -> Result<()> {
        self.inner.state.lock().unwrap().prefetch = Some(prefetch_count);
        Ok(())
    }

    async fn subscribe(&self, queue: &str, _consumer_tag: &str) -> Result<DeliveryStream> {
        let permits = match self.prefetch() {
            Some(n) if n > 0 => usize::from(n),
            _ => Semaphore::MAX_PERMITS,
        };
        let semaphore = Arc::new(Semaphore::new(permits));
        let seed = (self.inner.clone(), queue.to_string(), semaphore);

        let deliveries = stream::unfold(seed, |(inner, queue, semaphore)| async move {
            let permit = semaphore.clone().acquire_owned().await.ok()?;
            let payload = loop {
                if inner.closed.load(Ordering::SeqCst) {
                    return None;
                }
                if let Some(payload) = inner.pop(&queue) {
                    break payload;
                }
                inner.notify.notified().await;
            };

            let tag = inner.next_tag.fetch_add(1, Ordering::SeqCst) + 1;
            let now = inner.outstanding.fetch_add(1, Ordering::SeqCst) + 1;
            inner.max_outstanding.fetch_max(now, Ordering::SeqCst);

            let acker = MemoryAcker {
                inner: inner.clone(),
                queue: queue.clone(),
                payload: payload.clone(),
                acked: AtomicBool::new(false),
                permit: Mutex::new(Some(permit)),
            };
            // Everything here arrives through `publish_persistent` or `seed`.
            let message = InboundMessage::new(tag, false, payload, acker)
                .with_delivery_mode(Some(PERSISTENT_DELIVERY_MODE));
            Some((Ok(message), (inner, queue, semaphore)))
        });

        Ok(deliveries.boxed())
    }
}

/// Sink that keeps rows in memory, notes how many acks the broker had seen
/// when each row was recorded, and cancels the worker after `stop_after` rows.
pub struct RecordingSink {
    pub rows: Arc<Mutex<Vec<ProcessedRow>>>,
    pub acked_when_recorded: Arc<Mutex<Vec<usize>>>,
    pub closed: Arc<AtomicBool>,
    broker: MemoryBroker,
    stop_after: usize,
    cancel: CancellationToken,
}

impl RecordingSink {
    pub fn new(broker: &MemoryBroker, stop_after: usize, cancel: CancellationToken) -> Self {
        RecordingSink {
            rows: Arc::new(Mutex::new(Vec::new())),
            acked_when_recorded: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicBool::new(false)),
            broker: broker.clone(),
            stop_after,
            cancel,
        }
    }
}

#[async_trait]
impl ResultSink for RecordingSink {
    fn name(&self) -> &'static str {
        "RecordingSink"
    }

    async fn record(&mut self, row: &ProcessedRow) -> Result<()> {
        self.acked_when_recorded
            .lock()
            .unwrap()
            .push(self.broker.acked());
        let mut rows = self.rows.lock().unwrap();
        rows.push(row.clone());
        if rows.len() >= self.stop_after {
            self.cancel.cancel();
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Sink that always fails, for exercising the no-ack path.
pub struct FailingSink;

#[async_trait]
impl ResultSink for FailingSink {
    fn name(&self) -> &'static str {
        "FailingSink"
    }

    async fn record(&mut self, _row: &ProcessedRow) -> Result<()> {
        Err(PipelineError::IoError {
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        })
    }
}
