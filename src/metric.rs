use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Field map carried in the body of every published metric.
pub type Fields = BTreeMap<&'static str, FieldValue>;

/// The five metric kinds understood by the reporter.
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Gauge,
    Counter,
    Histogram,
    Meter,
    Timer,
}

impl MetricKind {
    /// Delivery order of kinds within a single publish cycle.
    pub const ORDER: [MetricKind; 5] = [
        MetricKind::Gauge,
        MetricKind::Counter,
        MetricKind::Histogram,
        MetricKind::Meter,
        MetricKind::Timer,
    ];
}

/// Message key identifying a metric within a publish cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricKey {
    pub name: String,
    pub kind: MetricKind,
    pub timestamp_ms: u128,
}

/// A single field value.
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Count(u64),
    Float(f64),
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        FieldValue::Count(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

/// Point-in-time view of one metric, already converted to the reporter's units.
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricSnapshot {
    Gauge(f64),
    Counter(u64),
    Histogram(HistogramSnapshot),
    Meter(MeterSnapshot),
    Timer(TimerSnapshot),
}

impl MetricSnapshot {
    #[must_use]
    pub const fn kind(&self) -> MetricKind {
        match self {
            MetricSnapshot::Gauge(_) => MetricKind::Gauge,
            MetricSnapshot::Counter(_) => MetricKind::Counter,
            MetricSnapshot::Histogram(_) => MetricKind::Histogram,
            MetricSnapshot::Meter(_) => MetricKind::Meter,
            MetricSnapshot::Timer(_) => MetricKind::Timer,
        }
    }
}

/// Distribution summary shared by histograms and timers.
///
/// A distribution with no samples reports `0.0` for every statistic.
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Distribution {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub stddev: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
    pub p98: f64,
    pub p99: f64,
    pub p999: f64,
}

impl Distribution {
    /// Returns a copy with every statistic multiplied by `factor`.
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Distribution {
        Distribution {
            min: self.min * factor,
            max: self.max * factor,
            mean: self.mean * factor,
            stddev: self.stddev * factor,
            p50: self.p50 * factor,
            p75: self.p75 * factor,
            p95: self.p95 * factor,
            p98: self.p98 * factor,
            p99: self.p99 * factor,
            p999: self.p999 * factor,
        }
    }
}

#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HistogramSnapshot {
    pub count: u64,
    pub distribution: Distribution,
}

#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeterSnapshot {
    pub count: u64,
    pub rate_1m: f64,
    pub rate_5m: f64,
    pub rate_15m: f64,
    pub rate_mean: f64,
}

/// Timer durations are expressed in the reporter's duration unit.
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimerSnapshot {
    pub distribution: Distribution,
    pub meter: MeterSnapshot,
}
