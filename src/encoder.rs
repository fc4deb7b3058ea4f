//! Maps metric snapshots onto the flat field maps published to the broker.

use crate::metric::{
    Distribution, Fields, HistogramSnapshot, MeterSnapshot, MetricKind, MetricSnapshot,
    TimerSnapshot,
};

pub const VALUE: &str = "value";
pub const COUNT: &str = "count";
pub const MAX: &str = "max";
pub const MEAN: &str = "mean";
pub const MIN: &str = "min";
pub const STDDEV: &str = "stddev";
pub const P50: &str = "p50";
pub const P75: &str = "p75";
pub const P95: &str = "p95";
pub const P98: &str = "p98";
pub const P99: &str = "p99";
pub const P999: &str = "p999";
pub const RATE_1M: &str = "rate_1m";
pub const RATE_5M: &str = "rate_5m";
pub const RATE_15M: &str = "rate_15m";
pub const RATE_MEAN: &str = "rate_mean";

/// Returns the exact set of field names emitted for `kind`.
#[must_use]
pub const fn field_names(kind: MetricKind) -> &'static [&'static str] {
    match kind {
        MetricKind::Gauge => &[VALUE],
        MetricKind::Counter => &[COUNT],
        MetricKind::Histogram => {
            &[COUNT, MAX, MEAN, MIN, STDDEV, P50, P75, P95, P98, P99, P999]
        }
        MetricKind::Meter => &[COUNT, RATE_1M, RATE_5M, RATE_15M, RATE_MEAN],
        MetricKind::Timer => &[MAX, MIN, MEAN, STDDEV, P50, P75, P95, P98, P99, P999],
    }
}

/// Encodes a snapshot into its field map.
///
/// Values are copied verbatim; NaN and infinities are not filtered.
#[must_use]
pub fn encode(snapshot: &MetricSnapshot) -> Fields {
    let mut fields = Fields::new();

    match snapshot {
        MetricSnapshot::Gauge(value) => {
            fields.insert(VALUE, (*value).into());
        }
        MetricSnapshot::Counter(count) => {
            fields.insert(COUNT, (*count).into());
        }
        MetricSnapshot::Histogram(histogram) => encode_histogram(&mut fields, histogram),
        MetricSnapshot::Meter(meter) => encode_meter(&mut fields, meter),
        MetricSnapshot::Timer(timer) => encode_timer(&mut fields, timer),
    }

    fields
}

fn encode_histogram(fields: &mut Fields, histogram: &HistogramSnapshot) {
    let HistogramSnapshot { count, distribution } = histogram;

    fields.insert(COUNT, (*count).into());
    encode_distribution(fields, distribution);
}

fn encode_meter(fields: &mut Fields, meter: &MeterSnapshot) {
    let MeterSnapshot { count, rate_1m, rate_5m, rate_15m, rate_mean } = *meter;

    fields.insert(COUNT, count.into());
    fields.insert(RATE_1M, rate_1m.into());
    fields.insert(RATE_5M, rate_5m.into());
    fields.insert(RATE_15M, rate_15m.into());
    fields.insert(RATE_MEAN, rate_mean.into());
}

// Timers publish their duration distribution only; the meter half is not part of the record.
fn encode_timer(fields: &mut Fields, TimerSnapshot { distribution, .. }: &TimerSnapshot) {
    encode_distribution(fields, distribution);
}

fn encode_distribution(fields: &mut Fields, distribution: &Distribution) {
    let Distribution { min, max, mean, stddev, p50, p75, p95, p98, p99, p999 } = *distribution;

    fields.insert(MAX, max.into());
    fields.insert(MEAN, mean.into());
    fields.insert(MIN, min.into());
    fields.insert(STDDEV, stddev.into());
    fields.insert(P50, p50.into());
    fields.insert(P75, p75.into());
    fields.insert(P95, p95.into());
    fields.insert(P98, p98.into());
    fields.insert(P99, p99.into());
    fields.insert(P999, p999.into());
}
