//! Virtual user request loop.

use crate::counter::UsageCounter;
use crate::error::Cancelled;
use crate::generator::RequestGenerator;
use crate::metrics::MetricsCollector;
use crate::transport::Transport;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// One simulated client: request, count, pause, repeat until cancelled.
pub struct VirtualUser {
    id: usize,
    generator: Arc<RequestGenerator>,
    transport: Arc<dyn Transport>,
    counter: Arc<UsageCounter>,
    delay: Duration,
    rng: StdRng,
    metrics: MetricsCollector,
}

impl VirtualUser {
    /// Create a user. With a seed, user `id` draws from `seed + id`.
    pub fn new(
        id: usize,
        generator: Arc<RequestGenerator>,
        transport: Arc<dyn Transport>,
        counter: Arc<UsageCounter>,
        delay: Duration,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(id as u64)),
            None => StdRng::from_entropy(),
        };

        Self {
            id,
            generator,
            transport,
            counter,
            delay,
            rng,
            metrics: MetricsCollector::new(),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Loop until `token` is cancelled, then hand back this user's metrics.
    pub async fn run(mut self, token: CancellationToken) -> MetricsCollector {
        debug!(user = self.id, "Virtual user started");

        let mut iterations = 0u64;
        while !token.is_cancelled() {
            if self.iterate(&token).await.is_err() {
                break;
            }
            iterations += 1;
        }

        debug!(
            user = self.id,
            iterations,
            requests = self.metrics.requests_total(),
            "Virtual user stopped"
        );
        self.metrics
    }

    /// Run a single iteration.
    ///
    /// Both the request and the pause race the token; an iteration interrupted
    /// mid-request leaves the usage counter untouched.
    pub async fn iterate(&mut self, token: &CancellationToken) -> Result<(), Cancelled> {
        let request = self.generator.generate(&mut self.rng);
        let start = Instant::now();

        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            outcome = self.transport.get(&request.url) => Some(outcome),
        };
        let Some(outcome) = outcome else {
            self.metrics.record_abandoned();
            return Err(Cancelled);
        };

        self.counter.increment(&request.term);
        match outcome {
            Ok(response) => {
                let latency_us = start.elapsed().as_micros() as u64;
                debug!(
                    user = self.id,
                    term = %request.term,
                    status = response.status,
                    latency_us,
                    "Request completed"
                );
                self.metrics
                    .record_success(latency_us, response.status, response.bytes);
            }
            Err(failure) => {
                warn!(user = self.id, url = %request.url, error = %failure, "Request failed");
                self.metrics.record_failure(&failure);
            }
        }

        tokio::select! {
            biased;
            _ = token.cancelled() => Err(Cancelled),
            _ = sleep(self.delay) => Ok(()),
        }
    }
}
