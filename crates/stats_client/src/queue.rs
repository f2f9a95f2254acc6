//! Bounded request queue pro stats provider.
//!
//! Jeden worker task obsluhuje dávky v pořadí, v jakém přišly. Každá dávka
//! se rozseká na okna po `window_size` requestech; okno běží paralelně,
//! každý request má vlastní timeout a při chybě/timeoutu dostane fallback.
//! Mezi okny krátká pauza. Volající vždy dostane přesně tolik výsledků,
//! kolik poslal requestů, ve stejném pořadí. Queue nikdy nevrací chybu.

use futures_util::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use logger::LogThrottle;

use crate::endpoints::{StatsRequest, StatsTransport};

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub window_size: usize,
    pub request_timeout: Duration,
    pub window_pause: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            window_size: 3,
            request_timeout: Duration::from_millis(3000),
            window_pause: Duration::from_millis(100),
        }
    }
}

struct BatchJob {
    requests: Vec<StatsRequest>,
    reply: oneshot::Sender<Vec<Value>>,
}

/// Cloneable handle; worker končí, když zmizí poslední handle.
#[derive(Clone)]
pub struct RequestQueue {
    tx: mpsc::UnboundedSender<BatchJob>,
}

impl RequestQueue {
    pub fn spawn(transport: Arc<dyn StatsTransport>, config: QueueConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(worker(transport, config, rx));
        Self { tx }
    }

    /// Submit a batch; resolves once every request has a value.
    pub async fn enqueue(&self, requests: Vec<StatsRequest>) -> Vec<Value> {
        if requests.is_empty() {
            return Vec::new();
        }
        let fallbacks: Vec<Value> = requests.iter().map(|r| r.fallback.clone()).collect();
        let (reply, rx) = oneshot::channel();

        if self.tx.send(BatchJob { requests, reply }).is_err() {
            warn!("stats queue worker gone, returning fallbacks");
            return fallbacks;
        }
        rx.await.unwrap_or(fallbacks)
    }
}

async fn worker(
    transport: Arc<dyn StatsTransport>,
    config: QueueConfig,
    mut rx: mpsc::UnboundedReceiver<BatchJob>,
) {
    let throttle = LogThrottle::default();
    while let Some(job) = rx.recv().await {
        let results = run_batch(transport.as_ref(), &config, &throttle, &job.requests).await;
        // volající mohl mezitím odejít
        let _ = job.reply.send(results);
    }
    debug!("stats queue worker stopped");
}

async fn run_batch(
    transport: &dyn StatsTransport,
    config: &QueueConfig,
    throttle: &LogThrottle,
    requests: &[StatsRequest],
) -> Vec<Value> {
    let mut out = Vec::with_capacity(requests.len());
    for (i, window) in requests.chunks(config.window_size.max(1)).enumerate() {
        if i > 0 {
            sleep(config.window_pause).await;
        }
        let results = join_all(
            window
                .iter()
                .map(|req| fetch_or_fallback(transport, req, config.request_timeout, throttle)),
        )
        .await;
        out.extend(results);
    }
    out
}

async fn fetch_or_fallback(
    transport: &dyn StatsTransport,
    req: &StatsRequest,
    limit: Duration,
    throttle: &LogThrottle,
) -> Value {
    let reason = match timeout(limit, transport.fetch(req)).await {
        Ok(Ok(value)) => return value,
        Ok(Err(e)) => e.to_string(),
        Err(_) => format!("timed out after {}ms", limit.as_millis()),
    };

    if throttle.allow(req.endpoint.path()) {
        warn!("{} failed ({}), using fallback", req.label(), reason);
    } else {
        debug!("{} failed ({}), using fallback", req.label(), reason);
    }
    req.fallback.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoints::Endpoint;
    use crate::error::FetchError;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use tokio::time::Instant;

    struct Recorder {
        starts: Mutex<Vec<(String, Instant)>>,
        work: Duration,
    }

    impl Recorder {
        fn new(work_ms: u64) -> Arc<Self> {
            Arc::new(Self {
                starts: Mutex::new(Vec::new()),
                work: Duration::from_millis(work_ms),
            })
        }
    }

    #[async_trait]
    impl StatsTransport for Recorder {
        async fn fetch(&self, req: &StatsRequest) -> Result<Value, FetchError> {
            self.starts.lock().push((req.id.clone(), Instant::now()));
            let work = if req.id == "slow" {
                Duration::from_secs(10)
            } else {
                self.work
            };
            sleep(work).await;
            if req.id == "bad" {
                return Err(FetchError::Status(500));
            }
            Ok(json!({ "id": req.id }))
        }
    }

    fn req(id: &str) -> StatsRequest {
        StatsRequest::new(Endpoint::MatchInfo, id).with_fallback(json!({ "fallback": id }))
    }

    #[tokio::test(start_paused = true)]
    async fn windows_of_three_with_pause_between() {
        let transport = Recorder::new(50);
        let queue = RequestQueue::spawn(transport.clone(), QueueConfig::default());

        let ids: Vec<String> = (0..7).map(|i| i.to_string()).collect();
        let results = queue.enqueue(ids.iter().map(|id| req(id)).collect()).await;

        assert_eq!(results.len(), 7);
        for (i, r) in results.iter().enumerate() {
            assert_eq!(r["id"], json!(i.to_string()));
        }

        let starts = transport.starts.lock().clone();
        let t0 = starts[0].1;
        let offsets: Vec<u128> = starts.iter().map(|(_, t)| (*t - t0).as_millis()).collect();
        // okno 50 ms + pauza 100 ms
        assert_eq!(offsets, vec![0, 0, 0, 150, 150, 150, 300]);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_request_falls_back_without_delaying_siblings() {
        let transport = Recorder::new(10);
        let queue = RequestQueue::spawn(transport, QueueConfig::default());

        let t0 = Instant::now();
        let results = queue.enqueue(vec![req("a"), req("slow"), req("b")]).await;
        let elapsed = t0.elapsed();

        assert_eq!(results[0], json!({ "id": "a" }));
        assert_eq!(results[1], json!({ "fallback": "slow" }));
        assert_eq!(results[2], json!({ "id": "b" }));
        assert!(elapsed >= Duration::from_millis(3000));
        assert!(elapsed < Duration::from_millis(3100));
    }

    #[tokio::test(start_paused = true)]
    async fn errors_become_fallbacks_in_place() {
        let transport = Recorder::new(5);
        let queue = RequestQueue::spawn(transport, QueueConfig::default());

        let results = queue.enqueue(vec![req("x"), req("bad"), req("y"), req("bad")]).await;
        assert_eq!(
            results,
            vec![
                json!({ "id": "x" }),
                json!({ "fallback": "bad" }),
                json!({ "id": "y" }),
                json!({ "fallback": "bad" }),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn batches_are_served_in_submission_order() {
        let transport = Recorder::new(50);
        let queue = RequestQueue::spawn(transport.clone(), QueueConfig::default());

        let (first, second) = tokio::join!(
            queue.enqueue(vec![req("a1"), req("a2")]),
            queue.enqueue(vec![req("b1")]),
        );
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 1);

        let starts = transport.starts.lock().clone();
        let order: Vec<&str> = starts.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(order, vec!["a1", "a2", "b1"]);
        assert!(starts[2].1 - starts[0].1 >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn empty_batch_resolves_immediately() {
        let queue = RequestQueue::spawn(Recorder::new(0), QueueConfig::default());
        assert!(queue.enqueue(Vec::new()).await.is_empty());
    }
}
