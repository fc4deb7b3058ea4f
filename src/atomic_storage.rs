use std::sync::Arc;

use metrics::atomics::AtomicU64;
use metrics::HistogramFn;
use metrics_util::storage::{AtomicBucket, Summary};
use parking_lot::Mutex;

use crate::metric::Distribution;

const QUANTILES: [f64; 6] = [0.50, 0.75, 0.95, 0.98, 0.99, 0.999];

/// Samples kept verbatim before quantiles fall back to the sketch.
const EXACT_SAMPLES: usize = 1028;

#[derive(Debug)]
pub(crate) struct AtomicStorage;

impl<K> metrics_util::registry::Storage<K> for AtomicStorage {
    type Counter = Arc<AtomicU64>;
    type Gauge = Arc<AtomicU64>;
    type Histogram = Arc<HistogramCell>;

    fn counter(&self, _: &K) -> Self::Counter {
        Arc::new(AtomicU64::new(0))
    }

    fn gauge(&self, _: &K) -> Self::Gauge {
        Arc::new(AtomicU64::new(0))
    }

    fn histogram(&self, _: &K) -> Self::Histogram {
        Arc::new(HistogramCell::new())
    }
}

/// Lock-free sample buffer drained into a cumulative reservoir on snapshot.
#[derive(Debug)]
pub(crate) struct HistogramCell {
    pending: AtomicBucket<f64>,
    reservoir: Mutex<Reservoir>,
}

impl HistogramCell {
    pub(crate) fn new() -> HistogramCell {
        HistogramCell { pending: AtomicBucket::new(), reservoir: Mutex::new(Reservoir::new()) }
    }

    /// Drains pending samples and summarizes every sample seen so far.
    pub(crate) fn snapshot(&self) -> (u64, Distribution) {
        let mut reservoir = self.reservoir.lock();
        self.pending.clear_with(|samples| {
            for sample in samples {
                reservoir.add(*sample);
            }
        });

        (reservoir.count, reservoir.distribution())
    }

    #[cfg(test)]
    pub(crate) fn pending_len(&self) -> usize {
        self.pending.data().len()
    }
}

impl HistogramFn for HistogramCell {
    fn record(&self, value: f64) {
        self.pending.push(value);
    }
}

struct Reservoir {
    exact: Vec<f64>,
    sketch: Summary,
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl std::fmt::Debug for Reservoir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reservoir")
            .field("count", &self.count)
            .field("mean", &self.mean)
            .field("min", &self.min)
            .field("max", &self.max)
            .finish_non_exhaustive()
    }
}

impl Reservoir {
    fn new() -> Reservoir {
        Reservoir {
            exact: Vec::new(),
            sketch: Summary::with_defaults(),
            count: 0,
            mean: 0.0,
            m2: 0.0,
            min: 0.0,
            max: 0.0,
        }
    }

    // Welford's online update for mean and variance.
    #[allow(clippy::arithmetic_side_effects, clippy::cast_precision_loss)]
    fn add(&mut self, value: f64) {
        self.sketch.add(value);
        match self.exact.len() < EXACT_SAMPLES && self.exact.len() as u64 == self.count {
            true => self.exact.push(value),
            false if !self.exact.is_empty() => self.exact = Vec::new(),
            false => {}
        }

        match self.count {
            0 => {
                self.min = value;
                self.max = value;
            }
            _ => {
                self.min = self.min.min(value);
                self.max = self.max.max(value);
            }
        }

        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    #[allow(clippy::arithmetic_side_effects, clippy::cast_precision_loss)]
    fn distribution(&mut self) -> Distribution {
        if self.count == 0 {
            return Distribution::default();
        }

        let stddev = match self.count {
            1 => 0.0,
            n => (self.m2 / (n - 1) as f64).sqrt(),
        };
        let [p50, p75, p95, p98, p99, p999] = match self.exact.is_empty() {
            false => {
                self.exact.sort_unstable_by(f64::total_cmp);
                QUANTILES.map(|q| interpolated_quantile(&self.exact, q))
            }
            // The sketch drops magnitudes below its floor; keep it inside the observed range.
            true => QUANTILES.map(|q| {
                self.sketch
                    .quantile(q)
                    .unwrap_or(0.0)
                    .max(self.min)
                    .min(self.max)
            }),
        };

        Distribution {
            min: self.min,
            max: self.max,
            mean: self.mean,
            stddev,
            p50,
            p75,
            p95,
            p98,
            p99,
            p999,
        }
    }
}

/// Interpolates at rank `q * (n + 1)`, pinned to the smallest and largest sample.
#[allow(
    clippy::arithmetic_side_effects,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
fn interpolated_quantile(sorted: &[f64], q: f64) -> f64 {
    let (Some(&first), Some(&last)) = (sorted.first(), sorted.last()) else {
        return 0.0;
    };

    let pos = q * (sorted.len() + 1) as f64;
    if pos < 1.0 {
        return first;
    }
    if pos >= sorted.len() as f64 {
        return last;
    }

    let rank = pos.floor();
    let lower = sorted[rank as usize - 1];
    let upper = sorted[rank as usize];

    lower + (pos - rank) * (upper - lower)
}
