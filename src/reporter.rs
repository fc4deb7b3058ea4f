use std::thread::JoinHandle;
use std::time::{Duration, UNIX_EPOCH};

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::broker::{Broker, KeyedMessage};
use crate::encoder::encode;
use crate::metric::MetricKey;
use crate::registry::{Registry, RegistrySnapshot};
use crate::{InstallError, MetricFilter};

/// Periodically publishes every metric in a [`Registry`] to a [`Broker`].
#[derive(Debug)]
pub struct Reporter<B> {
    registry: Registry,
    broker: B,
    topic: String,
    filter: MetricFilter,
    rate_unit: Duration,
    duration_unit: Duration,
    consecutive_failures: u64,
}

impl<B> Reporter<B>
where
    B: Broker,
{
    #[must_use]
    pub const fn new(
        registry: Registry,
        broker: B,
        topic: String,
        filter: MetricFilter,
        rate_unit: Duration,
        duration_unit: Duration,
    ) -> Self {
        Reporter {
            registry,
            broker,
            topic,
            filter,
            rate_unit,
            duration_unit,
            consecutive_failures: 0,
        }
    }

    /// Runs one publish cycle.
    ///
    /// Send failures are logged and dropped; the next cycle starts from a clean slate.
    pub async fn report(&mut self) {
        let now = UNIX_EPOCH.elapsed().map_or(0, |elapsed| elapsed.as_millis());
        let snapshot = self
            .registry
            .snapshot(&self.filter, self.rate_unit, self.duration_unit);
        let batch = build_batch(&self.topic, &snapshot, now);

        if batch.is_empty() {
            debug!("No metrics registered, skipping publish");

            return;
        }

        let len = batch.len();
        match self.broker.send(batch).await {
            Ok(()) => {
                self.consecutive_failures = 0;
                debug!(len, "Published metrics batch");
            }
            Err(err) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                warn!(
                    %err,
                    len,
                    self.consecutive_failures,
                    "Failed to publish metrics batch, dropping"
                );
            }
        }
    }

    /// Calls [`Reporter::report`] every `interval` on a dedicated thread until `cxl` fires.
    ///
    /// # Errors
    ///
    /// Errors if the runtime or the thread cannot be created.
    pub fn spawn(
        self,
        cxl: CancellationToken,
        interval: Duration,
        name: &str,
    ) -> Result<JoinHandle<()>, InstallError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        std::thread::Builder::new()
            .name(format!("MetricsReporter-{name}"))
            .spawn(move || runtime.block_on(self.run(cxl, interval)))
            .map_err(Into::into)
    }

    async fn run(mut self, cxl: CancellationToken, interval: Duration) {
        let mut interval = tokio::time::interval(interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                () = cxl.cancelled() => break,
                _ = interval.tick() => self.report().await,
            }
        }
    }
}

/// Encodes every entry of `snapshot` into one batch sharing `timestamp_ms`.
pub(crate) fn build_batch(
    topic: &str,
    snapshot: &RegistrySnapshot,
    timestamp_ms: u128,
) -> Vec<KeyedMessage> {
    snapshot
        .entries()
        .map(|(name, metric)| KeyedMessage {
            topic: topic.to_string(),
            key: MetricKey { name: name.to_string(), kind: metric.kind(), timestamp_ms },
            value: encode(&metric),
        })
        .collect()
}
