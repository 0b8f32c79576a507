//! Scheduler module for running periodic site checks.
//!
//! One background task runs a check cycle on a fixed interval. Each cycle
//! re-reads the full target list, probes every target through a fixed-size
//! worker pool, and writes the outcomes into the metrics sink.

use crate::config::ServerConfig;
use crate::db::{SiteRegistry, Target};
use crate::metrics::{MetricsSink, SeriesKey};
use crate::probe::{probe_url, url_label, Probe, ProbeOutcome, ProbeResult};

use chrono::Utc;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;

/// Tuning knobs for the check loop.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Time between cycle starts.
    pub interval: Duration,
    /// Maximum probes in flight at once.
    pub concurrency: usize,
    /// Upper bound of the random delay before each worker starts.
    pub jitter: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            concurrency: 16,
            jitter: Duration::from_millis(100),
        }
    }
}

impl From<&ServerConfig> for SchedulerConfig {
    fn from(cfg: &ServerConfig) -> Self {
        Self {
            interval: cfg.check_interval,
            concurrency: cfg.probe_concurrency.max(1),
            ..Self::default()
        }
    }
}

/// Summary of a completed cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub probed: usize,
    pub up: usize,
    pub down: usize,
    /// Series dropped because their target left the registry.
    pub pruned: usize,
}

impl CycleReport {
    fn count(&mut self, result: &ProbeResult) {
        self.probed += 1;
        if result.is_up {
            self.up += 1;
        } else {
            self.down += 1;
        }
    }

    fn merge(&mut self, other: CycleReport) {
        self.probed += other.probed;
        self.up += other.up;
        self.down += other.down;
    }
}

/// Periodic checker for every registered target.
pub struct Scheduler<P: Probe> {
    registry: Arc<dyn SiteRegistry>,
    prober: Arc<P>,
    sink: Arc<MetricsSink>,
    config: SchedulerConfig,
}

impl<P: Probe> Scheduler<P> {
    pub fn new(
        registry: Arc<dyn SiteRegistry>,
        prober: P,
        sink: Arc<MetricsSink>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            registry,
            prober: Arc::new(prober),
            sink,
            config,
        }
    }

    /// Start the check loop. The first cycle runs immediately.
    ///
    /// A cycle that overruns the interval is followed straight away by the
    /// next one; cycles never overlap.
    pub fn start(self: Arc<Self>) -> SchedulerHandle {
        let (stop_tx, mut stop_rx) = broadcast::channel(1);

        tracing::info!(
            "Starting scheduler (interval {:?}, {} workers)",
            self.config.interval,
            self.config.concurrency
        );

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = stop_rx.recv() => break,
                    _ = interval.tick() => {
                        self.run_cycle().await;
                    }
                }
            }

            tracing::info!("Scheduler stopped");
        });

        SchedulerHandle { stop_tx, task }
    }

    /// Run one check cycle over every registered target.
    ///
    /// Targets are drained from a shared queue by at most `concurrency`
    /// workers. Returns `None` when the registry could not be read; the cycle
    /// is then skipped and the sink left untouched.
    pub async fn run_cycle(&self) -> Option<CycleReport> {
        let targets = match self.registry.list_all_targets() {
            Ok(t) => t,
            Err(e) => {
                tracing::error!("Scheduler: Failed to list targets, skipping cycle: {}", e);
                return None;
            }
        };

        let seen: HashSet<SeriesKey> = targets
            .iter()
            .map(|t| SeriesKey::new(url_label(&t.url), t.owner_id.as_str()))
            .collect();

        let workers = self.config.concurrency.max(1).min(targets.len());
        let queue = Arc::new(Mutex::new(VecDeque::from(targets)));
        let mut pool = JoinSet::new();

        for _ in 0..workers {
            let queue = queue.clone();
            let prober = self.prober.clone();
            let sink = self.sink.clone();
            let jitter = self.config.jitter;

            pool.spawn(async move {
                // Stagger worker start so probes do not leave in one burst
                if !jitter.is_zero() {
                    let ms = rand::random::<u64>() % (jitter.as_millis() as u64 + 1);
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                }

                let mut report = CycleReport::default();
                loop {
                    let next = queue.lock().unwrap().pop_front();
                    let Some(target) = next else { break };

                    let result = check(prober.as_ref(), target).await;
                    tracing::trace!(
                        "Scheduler: target {} observed at {}",
                        result.target_id,
                        result.observed_at
                    );
                    sink.record(&result);
                    report.count(&result);
                }
                report
            });
        }

        let mut report = CycleReport::default();
        while let Some(joined) = pool.join_next().await {
            match joined {
                Ok(part) => report.merge(part),
                Err(e) => tracing::error!("Scheduler: Probe worker failed: {}", e),
            }
        }

        report.pruned = self.sink.retain(&seen);

        tracing::info!(
            "Scheduler: Checked {} sites ({} up, {} down, {} pruned, {} series exposed)",
            report.probed,
            report.up,
            report.down,
            report.pruned,
            self.sink.series_count()
        );

        Some(report)
    }
}

async fn check<P: Probe>(prober: &P, target: Target) -> ProbeResult {
    let label = url_label(&target.url).to_string();
    let url = probe_url(&target.url);
    let observed_at = Utc::now();
    let result = prober.probe(&url).await;

    match &result {
        Ok(latency) => tracing::debug!("[UP] {} - {:?}", label, latency),
        Err(e) => tracing::info!("[DOWN] {} - {}", label, e),
    }

    let outcome = ProbeOutcome::from(&result);
    ProbeResult {
        target_id: target.id,
        url_label: label,
        owner_id: target.owner_id,
        is_up: outcome.is_up,
        latency_seconds: outcome.latency_seconds(),
        observed_at,
    }
}

/// Handle to a running scheduler loop.
pub struct SchedulerHandle {
    stop_tx: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signal the loop to stop and wait for it to exit.
    ///
    /// A cycle already in progress is allowed to finish.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(());
        if let Err(e) = self.task.await {
            tracing::error!("Scheduler task ended abnormally: {}", e);
        }
    }
}
