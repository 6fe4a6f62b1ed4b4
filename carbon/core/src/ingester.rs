// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use arc_swap::ArcSwap;
use bytes::Bytes;
use carbon_config::{Parameters, RuleConfig};
use parking_lot::Mutex;
use prometheus::Registry;
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::context::Context;
use crate::error::{IngestError, IngestResult};
use crate::graphite;
use crate::metrics::initialise_metrics;
use crate::resource_pool::{LineResourcePool, LineResources};
use crate::rule_set::{compile_rules, CompiledRule};
use crate::scanner::LineScanner;
use crate::tags::generate_tags;
use crate::topology::{validate_rules, ClusterNamespace};
use crate::worker_pool::WorkerPool;
use crate::writer::{Datapoint, MetricsWriter, TimeUnit};

/// Accepts carbon plaintext connections, matches every scanned metric
/// against the active rule set and forwards matches to the downstream
/// writer.
///
/// The accept loop owns the connections; [`handle`] is invoked with the byte
/// stream of one accepted connection and returns once the stream ends and
/// all dispatched writes have completed. Topology changes arrive through
/// [`on_namespaces_update`] and swap the compiled rule set atomically
/// without stalling in-flight matches.
///
/// [`handle`]: Ingester::handle
/// [`on_namespaces_update`]: Ingester::on_namespaces_update
impl std::fmt::Debug for Ingester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ingester").finish_non_exhaustive()
    }
}

pub struct Ingester {
    dispatcher: Arc<Dispatcher>,
    workers: WorkerPool,
    /// Rules as configured; every topology update re-validates and
    /// recompiles from these.
    configured_rules: Vec<RuleConfig>,
    /// Serializes topology updates: {validate, compile, swap}.
    update_lock: Mutex<()>,
}

impl Ingester {
    /// Creates an ingester. Fails when the parameters do not name exactly
    /// one worker pool flavor.
    pub fn new(
        parameters: Parameters,
        rules: Vec<RuleConfig>,
        writer: Arc<dyn MetricsWriter>,
        shutdown: CancellationToken,
        registry: Registry,
    ) -> IngestResult<Self> {
        let workers = match (
            &parameters.static_worker_pool,
            &parameters.dynamic_worker_pool,
        ) {
            (Some(static_pool), None) => WorkerPool::new_static(static_pool.workers),
            (None, Some(_)) => WorkerPool::new_dynamic(),
            (Some(_), Some(_)) => return Err(IngestError::MultipleWorkerPools),
            (None, None) => return Err(IngestError::NoWorkerPool),
        };

        let metrics = initialise_metrics(registry, &parameters);
        let pool = LineResourcePool::new(parameters.max_pooled_resources);
        let context = Arc::new(Context::new(parameters, metrics));

        Ok(Self {
            dispatcher: Arc::new(Dispatcher {
                context,
                writer,
                pool,
                rules: ArcSwap::from_pointee(Vec::new()),
                shutdown,
            }),
            workers,
            configured_rules: rules,
            update_lock: Mutex::new(()),
        })
    }

    /// Callback for the namespace watcher. Re-validates and recompiles the
    /// configured rules against the new topology and atomically publishes
    /// the result. Any failure leaves the previously installed rule set
    /// active.
    pub fn on_namespaces_update(&self, namespaces: &[ClusterNamespace]) {
        let _guard = self.update_lock.lock();
        let metrics = &self.dispatcher.context.metrics;

        let compiled = validate_rules(&self.configured_rules, namespaces)
            .and_then(|rules| compile_rules(&rules));
        match compiled {
            Ok(rules) => {
                metrics.active_rules.set(rules.len() as i64);
                metrics.ruleset_updates.inc();
                info!("installed {} carbon ingestion rules", rules.len());
                self.dispatcher.rules.store(Arc::new(rules));
            }
            Err(err @ IngestError::NoRules) => {
                metrics.ruleset_update_errors.inc();
                warn!("keeping previous carbon ingestion rules: {err}");
            }
            Err(err) => {
                metrics.ruleset_update_errors.inc();
                error!("keeping previous carbon ingestion rules: {err}");
            }
        }
    }

    /// Drives one accepted connection until EOF or transport error, then
    /// waits for every dispatched write to finish. The stream stays owned by
    /// the caller's accept loop; writes of different lines may complete out
    /// of order.
    pub async fn handle<S: AsyncRead + Unpin>(&self, stream: S) {
        let metrics = &self.dispatcher.context.metrics;
        metrics.open_connections.inc();

        let mut scanner = LineScanner::new(stream);
        let in_flight = TaskTracker::new();

        while scanner.advance().await {
            let received = Instant::now();
            let mut resources = self.dispatcher.pool.rent();
            graphite::copy_and_rewrite(
                &mut resources.name,
                scanner.name(),
                &self.dispatcher.context.parameters.rewrite,
            );
            resources.datapoints[0] = Datapoint {
                timestamp: scanner.timestamp(),
                value: scanner.value(),
            };

            let dispatcher = self.dispatcher.clone();
            self.workers
                .spawn(in_flight.track_future(async move {
                    dispatcher.process(resources, received).await;
                }))
                .await;

            let malformed = scanner.take_malformed();
            if malformed > 0 {
                metrics.malformed.inc_by(malformed);
            }
        }

        if let Some(err) = scanner.err() {
            error!("carbon connection read failed: {err}");
        }
        // The terminating advance() may still have skipped lines.
        let malformed = scanner.take_malformed();
        if malformed > 0 {
            metrics.malformed.inc_by(malformed);
        }

        in_flight.close();
        in_flight.wait().await;
        metrics.open_connections.dec();
    }

    /// The currently installed compiled rule set.
    #[cfg(test)]
    pub(crate) fn active_rules(&self) -> Arc<Vec<CompiledRule>> {
        self.dispatcher.rules.load_full()
    }
}

/// The write path shared by every worker job: rule snapshot, downstream
/// writer, resource pool.
struct Dispatcher {
    context: Arc<Context>,
    writer: Arc<dyn MetricsWriter>,
    pool: LineResourcePool,
    /// Active compiled rules; swapped wholesale on topology change.
    rules: ArcSwap<Vec<CompiledRule>>,
    /// Process-wide bound on all downstream writes.
    shutdown: CancellationToken,
}

impl Dispatcher {
    /// Matches one metric against the current rule snapshot and performs the
    /// resulting writes, then updates counters, records latencies and
    /// returns the resources to the pool. Latencies are recorded for every
    /// scanned line, successful or not.
    async fn process(&self, mut resources: Box<LineResources>, received: Instant) {
        let metrics = &self.context.metrics;
        let name = resources.freeze_name();

        match self.match_and_write(&name, &mut resources).await {
            Ok(true) => metrics.success.inc(),
            Ok(false) => {}
            Err(IngestError::EmptyName | IngestError::DuplicateSeparator(_)) => {
                metrics.malformed.inc();
            }
            Err(_) => metrics.errors.inc(),
        }

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64();
        let metric_age = (now - resources.datapoints[0].timestamp as f64).max(0.0);
        metrics.ingest_latency.observe(metric_age);
        metrics.write_latency.observe(received.elapsed().as_secs_f64());

        resources.tags.clear();
        resources.reclaim_name(name);
        self.pool.put(resources);
    }

    /// Walks the rule snapshot in order. The first match generates tags and
    /// writes; a `continue` rule keeps the walk going, with one independent
    /// write per additional match. A failed write aborts the remaining
    /// cascade. Returns whether any rule matched.
    async fn match_and_write(
        &self,
        name: &Bytes,
        resources: &mut LineResources,
    ) -> IngestResult<bool> {
        let rules = self.rules.load_full();
        let mut matched = false;
        for (index, rule) in rules.iter().enumerate() {
            if !rule.matcher.matches(name) {
                continue;
            }
            if !matched {
                generate_tags(name, &mut resources.tags)?;
                matched = true;
            }

            if let Err(err) = self
                .writer
                .write(
                    &self.shutdown,
                    &resources.tags,
                    &resources.datapoints,
                    TimeUnit::Seconds,
                    None,
                    &rule.options,
                )
                .await
            {
                error!(
                    "failed to write carbon metric {}: {err}",
                    String::from_utf8_lossy(name)
                );
                return Err(err);
            }
            if self.context.parameters.debug {
                debug!(
                    rule = index,
                    "wrote carbon metric {}",
                    String::from_utf8_lossy(name)
                );
            }

            if !rule.rule.r#continue {
                break;
            }
        }
        Ok(matched)
    }
}
