//! Periodically publishes an in-process metrics registry to NATS as keyed JSON
//! messages.
//!
//! Every publish cycle captures one timestamp, snapshots all gauges, counters,
//! histograms, meters and timers (in that order, each sorted by name), encodes
//! each metric as a [`KeyedMessage`] and sends the whole cycle as a single batch.
//! Failed sends are logged and dropped.

mod atomic_storage;
mod broker;
mod encoder;
mod meter;
mod metric;
mod recorder;
mod registry;
mod reporter;
mod timer;

use std::fmt;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

pub use async_nats::ServerAddr;
pub use broker::{Broker, KeyedMessage, NatsBroker, NatsBrokerError, KEY_HEADER};
pub use encoder::{encode, field_names};
pub use meter::Meter;
pub use metric::{
    Distribution, FieldValue, Fields, HistogramSnapshot, MeterSnapshot, MetricKey, MetricKind,
    MetricSnapshot, TimerSnapshot,
};
use metrics::SetRecorderError;
pub use recorder::StreamRecorder;
pub use registry::{Registry, RegistrySnapshot};
pub use reporter::Reporter;
use thiserror::Error;
pub use timer::{Timer, TimerGuard};
pub use tokio_util::sync::CancellationToken;

/// Installs the global metrics recorder and starts publishing.
///
/// # Returns
///
/// Returns the [`Registry`] backing the recorder (used to create meters and
/// timers) and a [`JoinHandle`] to the publisher thread.
///
/// # Errors
///
/// Errors on invalid units or failure to install the recorder.
pub fn install(
    cxl: CancellationToken,
    config: Config,
) -> Result<(Registry, JoinHandle<()>), InstallError> {
    if config.rate_unit.is_zero() {
        return Err(InstallError::ZeroUnit("rate_unit"));
    }
    if config.duration_unit.is_zero() {
        return Err(InstallError::ZeroUnit("duration_unit"));
    }

    let registry = Registry::new();
    let recorder = StreamRecorder::new(registry.clone());
    metrics::set_global_recorder(recorder)?;

    let reporter = Reporter::new(
        registry.clone(),
        NatsBroker::new(config.nats_servers),
        config.topic,
        config.filter,
        config.rate_unit,
        config.duration_unit,
    );
    let handle = reporter.spawn(cxl, config.interval, &config.name)?;

    Ok((registry, handle))
}

/// Configuration for the NATS metrics reporter.
#[derive(Debug, Clone)]
pub struct Config {
    /// Reporter name, used to name the publisher thread.
    pub name: String,
    pub nats_servers: Vec<ServerAddr>,
    /// Subject every metric message is published on.
    pub topic: String,
    /// Time between publish cycles.
    pub interval: Duration,
    /// Meter rates are reported as events per this unit.
    pub rate_unit: Duration,
    /// Timer durations are reported in this unit.
    pub duration_unit: Duration,
    pub filter: MetricFilter,
}

impl Config {
    /// Publishes every metric on `metrics` each 10s, rates per second and
    /// durations in milliseconds.
    #[must_use]
    pub fn new(nats_servers: Vec<ServerAddr>) -> Config {
        Config {
            name: "metrics".to_string(),
            nats_servers,
            topic: "metrics".to_string(),
            interval: Duration::from_secs(10),
            rate_unit: Duration::from_secs(1),
            duration_unit: Duration::from_millis(1),
            filter: MetricFilter::All,
        }
    }
}

/// Selects which metrics are published.
#[derive(Clone, Default)]
pub enum MetricFilter {
    #[default]
    All,
    /// Only metrics whose name starts with the prefix.
    Prefix(String),
    Custom(Arc<dyn Fn(&str, MetricKind) -> bool + Send + Sync>),
}

impl MetricFilter {
    #[must_use]
    pub fn matches(&self, name: &str, kind: MetricKind) -> bool {
        match self {
            MetricFilter::All => true,
            MetricFilter::Prefix(prefix) => name.starts_with(prefix.as_str()),
            MetricFilter::Custom(filter) => filter(name, kind),
        }
    }
}

impl fmt::Debug for MetricFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricFilter::All => f.write_str("All"),
            MetricFilter::Prefix(prefix) => f.debug_tuple("Prefix").field(prefix).finish(),
            MetricFilter::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Possible failure while installing the reporter.
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("Zero time unit; field={0}")]
    ZeroUnit(&'static str),
    #[error("Set recorder; err={0}")]
    SetRecorder(#[from] SetRecorderError<StreamRecorder>),
    #[error("Spawn thread; err={0}")]
    SpawnThread(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_matches() {
        assert!(MetricFilter::All.matches("anything", MetricKind::Gauge));
        assert!(MetricFilter::Prefix("app.".to_string()).matches("app.requests", MetricKind::Counter));
        assert!(!MetricFilter::Prefix("app.".to_string()).matches("jvm.heap", MetricKind::Gauge));

        let timers_only = MetricFilter::Custom(Arc::new(|_, kind| kind == MetricKind::Timer));
        assert!(timers_only.matches("latency", MetricKind::Timer));
        assert!(!timers_only.matches("latency", MetricKind::Histogram));
    }

    #[test]
    fn install_rejects_zero_units() {
        let mut config = Config::new(Vec::new());
        config.duration_unit = Duration::ZERO;

        let err = install(CancellationToken::new(), config).unwrap_err();

        assert!(matches!(err, InstallError::ZeroUnit("duration_unit")));
    }
}
