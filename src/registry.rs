use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use hashbrown::HashMap;
use itertools::Itertools;
use metrics::{Counter, Gauge, Histogram, Key};
use parking_lot::RwLock;
use quanta::Clock;

use crate::atomic_storage::AtomicStorage;
use crate::meter::Meter;
use crate::metric::{HistogramSnapshot, MeterSnapshot, MetricKind, MetricSnapshot, TimerSnapshot};
use crate::timer::Timer;
use crate::MetricFilter;

/// Shared store of every metric the reporter publishes.
///
/// Counters, gauges and histograms are also reachable through the `metrics`
/// macros once the recorder is installed; meters and timers are only
/// reachable through this handle.
#[derive(Debug, Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

#[derive(Debug)]
struct RegistryInner {
    clock: Clock,
    metrics: metrics_util::registry::Registry<Key, AtomicStorage>,
    meters: RwLock<HashMap<Key, Arc<Meter>>>,
    timers: RwLock<HashMap<Key, Arc<Timer>>>,
}

impl Default for Registry {
    fn default() -> Self {
        Registry::new()
    }
}

impl Registry {
    #[must_use]
    pub fn new() -> Registry {
        Registry::with_clock(Clock::new())
    }

    /// Creates a registry whose meters and timers read time from `clock`.
    #[must_use]
    pub fn with_clock(clock: Clock) -> Registry {
        Registry {
            inner: Arc::new(RegistryInner {
                clock,
                metrics: metrics_util::registry::Registry::new(AtomicStorage),
                meters: RwLock::default(),
                timers: RwLock::default(),
            }),
        }
    }

    #[must_use]
    pub fn counter(&self, key: &Key) -> Counter {
        self.inner
            .metrics
            .get_or_create_counter(key, |counter| counter.clone().into())
    }

    #[must_use]
    pub fn gauge(&self, key: &Key) -> Gauge {
        self.inner
            .metrics
            .get_or_create_gauge(key, |gauge| gauge.clone().into())
    }

    #[must_use]
    pub fn histogram(&self, key: &Key) -> Histogram {
        self.inner
            .metrics
            .get_or_create_histogram(key, |histogram| histogram.clone().into())
    }

    #[must_use]
    pub fn meter(&self, key: &Key) -> Arc<Meter> {
        if let Some(meter) = self.inner.meters.read().get(key) {
            return Arc::clone(meter);
        }

        let mut meters = self.inner.meters.write();
        Arc::clone(
            meters
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Meter::new(self.inner.clock.clone()))),
        )
    }

    #[must_use]
    pub fn timer(&self, key: &Key) -> Arc<Timer> {
        if let Some(timer) = self.inner.timers.read().get(key) {
            return Arc::clone(timer);
        }

        let mut timers = self.inner.timers.write();
        Arc::clone(
            timers
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Timer::new(self.inner.clock.clone()))),
        )
    }

    /// Reads every registered metric that passes `filter`.
    ///
    /// Every histogram and timer drains its pending samples as part of the read,
    /// including those `filter` leaves out.
    #[must_use]
    pub fn snapshot(
        &self,
        filter: &MetricFilter,
        rate_unit: Duration,
        duration_unit: Duration,
    ) -> RegistrySnapshot {
        let mut snapshot = RegistrySnapshot::default();

        self.inner.metrics.visit_gauges(|key, gauge| {
            let name = metric_name(key);
            if filter.matches(&name, MetricKind::Gauge) {
                snapshot
                    .gauges
                    .insert(name, f64::from_bits(gauge.load(Ordering::Relaxed)));
            }
        });

        self.inner.metrics.visit_counters(|key, counter| {
            let name = metric_name(key);
            if filter.matches(&name, MetricKind::Counter) {
                snapshot.counters.insert(name, counter.load(Ordering::Relaxed));
            }
        });

        // Histograms and timers drain whether or not they match.
        self.inner.metrics.visit_histograms(|key, histogram| {
            let (count, distribution) = histogram.snapshot();
            let name = metric_name(key);
            if filter.matches(&name, MetricKind::Histogram) {
                snapshot
                    .histograms
                    .insert(name, HistogramSnapshot { count, distribution });
            }
        });

        for (key, meter) in self.inner.meters.read().iter() {
            let name = metric_name(key);
            if filter.matches(&name, MetricKind::Meter) {
                snapshot.meters.insert(name, meter.snapshot(rate_unit));
            }
        }

        for (key, timer) in self.inner.timers.read().iter() {
            let timer = timer.snapshot(rate_unit, duration_unit);
            let name = metric_name(key);
            if filter.matches(&name, MetricKind::Timer) {
                snapshot.timers.insert(name, timer);
            }
        }

        snapshot
    }
}

/// Name-ordered view of a registry at one point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistrySnapshot {
    pub gauges: BTreeMap<String, f64>,
    pub counters: BTreeMap<String, u64>,
    pub histograms: BTreeMap<String, HistogramSnapshot>,
    pub meters: BTreeMap<String, MeterSnapshot>,
    pub timers: BTreeMap<String, TimerSnapshot>,
}

impl RegistrySnapshot {
    /// Iterates gauges, counters, histograms, meters then timers, each in name order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, MetricSnapshot)> {
        let gauges = self
            .gauges
            .iter()
            .map(|(name, value)| (name.as_str(), MetricSnapshot::Gauge(*value)));
        let counters = self
            .counters
            .iter()
            .map(|(name, count)| (name.as_str(), MetricSnapshot::Counter(*count)));
        let histograms = self
            .histograms
            .iter()
            .map(|(name, histogram)| (name.as_str(), MetricSnapshot::Histogram(*histogram)));
        let meters = self
            .meters
            .iter()
            .map(|(name, meter)| (name.as_str(), MetricSnapshot::Meter(*meter)));
        let timers = self
            .timers
            .iter()
            .map(|(name, timer)| (name.as_str(), MetricSnapshot::Timer(*timer)));

        gauges.chain(counters).chain(histograms).chain(meters).chain(timers)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.gauges
            .len()
            .saturating_add(self.counters.len())
            .saturating_add(self.histograms.len())
            .saturating_add(self.meters.len())
            .saturating_add(self.timers.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Renders a key as the published metric name; labels are appended as `.key=value`.
///
/// The rendering is not injective: `a{b=c}` and a plain `a.b=c` both become
/// `a.b=c`, and within one kind the later-visited of the two replaces the other
/// in a [`RegistrySnapshot`]. Keep label-free names free of `=` to avoid it.
pub(crate) fn metric_name(key: &Key) -> String {
    let mut labels = key.labels().peekable();
    match labels.peek() {
        None => key.name().to_string(),
        Some(_) => format!(
            "{}.{}",
            key.name(),
            labels
                .map(|label| format!("{}={}", label.key(), label.value()))
                .join(".")
        ),
    }
}
