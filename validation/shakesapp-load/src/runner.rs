//! Load test orchestration: a fixed pool of virtual users run until a deadline.

use crate::config::TestConfig;
use crate::counter::UsageCounter;
use crate::error::ConfigError;
use crate::generator::RequestGenerator;
use crate::metrics::{AggregateReport, MetricsCollector};
use crate::transport::{HttpTransportFactory, TransportFactory};
use crate::user::VirtualUser;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::{interval, sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Executes load tests with a fixed number of concurrent virtual users.
pub struct LoadRunner {
    config: TestConfig,
    generator: Arc<RequestGenerator>,
    factory: Box<dyn TransportFactory>,
    show_progress: bool,
}

impl LoadRunner {
    /// Create a runner issuing real HTTP requests.
    pub fn new(config: TestConfig) -> Result<Self, ConfigError> {
        let factory = HttpTransportFactory::new(config.clone());
        Self::with_transport(config, factory)
    }

    /// Create a runner whose users get their transport from `factory`.
    pub fn with_transport(
        config: TestConfig,
        factory: impl TransportFactory + 'static,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let generator = RequestGenerator::new(&config.vocabulary, &config.target_endpoint)?;

        Ok(Self {
            config,
            generator: Arc::new(generator),
            factory: Box::new(factory),
            show_progress: false,
        })
    }

    /// Draw a live progress bar on stderr while the test runs.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn config(&self) -> &TestConfig {
        &self.config
    }

    /// Run the load test.
    pub async fn run(&self) -> anyhow::Result<AggregateReport> {
        let concurrency = self.config.concurrency as usize;
        let counter = Arc::new(UsageCounter::new(self.generator.vocabulary()));

        // Initialize every user before the clock starts so they launch together.
        let mut ready = Vec::with_capacity(concurrency);
        for id in 0..concurrency {
            match self.factory.create(id) {
                Ok(transport) => ready.push(VirtualUser::new(
                    id,
                    self.generator.clone(),
                    transport,
                    counter.clone(),
                    self.config.delay(),
                    self.config.seed,
                )),
                Err(e) => warn!(user = id, error = %e, "Virtual user failed to start"),
            }
        }

        let active_users = ready.len() as u32;
        if active_users == 0 {
            anyhow::bail!("none of the {} virtual users could be started", concurrency);
        }
        if ready.len() < concurrency {
            warn!(
                configured = concurrency,
                active = active_users,
                "Running with degraded concurrency"
            );
        }

        info!(
            scenario = %self.config.name,
            endpoint = %self.generator.endpoint(),
            users = active_users,
            duration_secs = self.config.duration_secs,
            delay_ms = self.config.delay_ms,
            reuse_connections = self.config.reuse_connections,
            "Starting load test"
        );

        let token = CancellationToken::new();
        let start = Instant::now();
        let mut users = JoinSet::new();
        for user in ready {
            users.spawn(user.run(token.clone()));
        }
        let progress = self.spawn_progress(counter.clone(), token.clone(), start);

        let mut metrics = MetricsCollector::new();
        let mut lost_users = 0u32;

        // Users only return once cancelled, so anything joining early panicked.
        let deadline = sleep_until(start + self.config.duration());
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                _ = &mut deadline => break,
                joined = users.join_next() => match joined {
                    Some(joined) => lost_users += collect(joined, &mut metrics),
                    None => break,
                },
            }
        }

        token.cancel();
        info!(
            requests = counter.total(),
            "Deadline reached, stopping virtual users"
        );
        lost_users += self.drain(&mut users, &mut metrics).await;

        if let Some(progress) = progress {
            progress.await.ok();
        }

        let elapsed = start.elapsed();
        let mut report =
            metrics.results(&self.config, active_users, counter.snapshot(), elapsed);
        report.lost_users = lost_users;

        let counted = counter.total();
        if counted != report.total_requests {
            warn!(
                counted,
                reported = report.total_requests,
                lost_users,
                "Term counts exceed request totals; metrics of lost users are missing"
            );
        }

        info!(
            total = report.total_requests,
            failed = report.failed_requests,
            abandoned = report.abandoned_requests,
            elapsed_secs = elapsed.as_secs_f64(),
            "Load test complete"
        );
        Ok(report)
    }

    /// Wait up to the shutdown grace for cancelled users, then abort the rest.
    ///
    /// Returns how many users ended without handing back their metrics.
    async fn drain(
        &self,
        users: &mut JoinSet<MetricsCollector>,
        metrics: &mut MetricsCollector,
    ) -> u32 {
        let grace = sleep(self.config.shutdown_grace());
        tokio::pin!(grace);

        let mut lost = 0;
        loop {
            tokio::select! {
                joined = users.join_next() => match joined {
                    Some(joined) => lost += collect(joined, metrics),
                    None => return lost,
                },
                _ = &mut grace => {
                    let remaining = users.len() as u32;
                    warn!(
                        remaining,
                        grace_ms = self.config.shutdown_grace_ms,
                        "Aborting virtual users that outlived the shutdown grace"
                    );
                    users.shutdown().await;
                    return lost + remaining;
                }
            }
        }
    }

    fn spawn_progress(
        &self,
        counter: Arc<UsageCounter>,
        token: CancellationToken,
        start: Instant,
    ) -> Option<JoinHandle<()>> {
        if !self.show_progress {
            return None;
        }

        let len = self.config.duration_secs;
        let pb = ProgressBar::new(len);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len}s {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
        );

        Some(tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(1));
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        pb.set_position(start.elapsed().as_secs().min(len));
                        pb.set_message(format!("{} requests", counter.total()));
                    }
                }
            }
            pb.finish_with_message(format!("{} requests", counter.total()));
        }))
    }
}

/// Merge a joined user's metrics; returns 1 when the user's metrics are lost.
fn collect(joined: Result<MetricsCollector, JoinError>, metrics: &mut MetricsCollector) -> u32 {
    match joined {
        Ok(user_metrics) => {
            metrics.merge(&user_metrics);
            0
        }
        Err(e) => {
            warn!(error = %e, "Virtual user task ended abnormally");
            1
        }
    }
}
