use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use quanta::{Clock, Instant};

use crate::metric::MeterSnapshot;

const TICK_INTERVAL: Duration = Duration::from_secs(5);

/// Marks events and tracks exponentially weighted 1, 5 and 15 minute rates.
#[derive(Debug)]
pub struct Meter {
    clock: Clock,
    start: Instant,
    count: AtomicU64,
    rates: Mutex<Rates>,
}

#[derive(Debug)]
struct Rates {
    last_tick: Instant,
    m1: Ewma,
    m5: Ewma,
    m15: Ewma,
}

impl Meter {
    pub(crate) fn new(clock: Clock) -> Meter {
        let start = clock.now();

        Meter {
            clock,
            start,
            count: AtomicU64::new(0),
            rates: Mutex::new(Rates {
                last_tick: start,
                m1: Ewma::with_window(1),
                m5: Ewma::with_window(5),
                m15: Ewma::with_window(15),
            }),
        }
    }

    pub fn mark(&self, n: u64) {
        let mut rates = self.rates.lock();
        self.tick_if_necessary(&mut rates);

        self.count.fetch_add(n, Ordering::Relaxed);
        rates.m1.update(n);
        rates.m5.update(n);
        rates.m15.update(n);
    }

    #[must_use]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Rates are expressed as events per `rate_unit`.
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn snapshot(&self, rate_unit: Duration) -> MeterSnapshot {
        let mut rates = self.rates.lock();
        self.tick_if_necessary(&mut rates);

        let count = self.count();
        let unit_ns = rate_unit.as_nanos() as f64;
        let rate_mean = match count {
            0 => 0.0,
            _ => {
                let elapsed_ns = self.clock.now().duration_since(self.start).as_nanos() as f64;
                match elapsed_ns > 0.0 {
                    true => count as f64 / elapsed_ns * unit_ns,
                    false => 0.0,
                }
            }
        };

        MeterSnapshot {
            count,
            rate_1m: rates.m1.rate_per_ns() * unit_ns,
            rate_5m: rates.m5.rate_per_ns() * unit_ns,
            rate_15m: rates.m15.rate_per_ns() * unit_ns,
            rate_mean,
        }
    }

    #[allow(clippy::arithmetic_side_effects)]
    fn tick_if_necessary(&self, rates: &mut Rates) {
        let now = self.clock.now();
        let mut age = now.duration_since(rates.last_tick);

        while age >= TICK_INTERVAL {
            rates.m1.tick();
            rates.m5.tick();
            rates.m15.tick();

            rates.last_tick += TICK_INTERVAL;
            age -= TICK_INTERVAL;
        }
    }
}

/// Exponentially weighted moving average ticked every [`TICK_INTERVAL`].
#[derive(Debug)]
struct Ewma {
    alpha: f64,
    uncounted: u64,
    rate: Option<f64>,
}

impl Ewma {
    fn with_window(minutes: u32) -> Ewma {
        let interval = TICK_INTERVAL.as_secs_f64();
        let window = f64::from(minutes) * 60.0;

        Ewma { alpha: 1.0 - (-interval / window).exp(), uncounted: 0, rate: None }
    }

    fn update(&mut self, n: u64) {
        self.uncounted = self.uncounted.saturating_add(n);
    }

    #[allow(clippy::cast_precision_loss)]
    fn tick(&mut self) {
        let count = std::mem::take(&mut self.uncounted);
        let instant = count as f64 / TICK_INTERVAL.as_nanos() as f64;

        self.rate = Some(match self.rate {
            Some(rate) => rate + self.alpha * (instant - rate),
            None => instant,
        });
    }

    fn rate_per_ns(&self) -> f64 {
        self.rate.unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(left: f64, right: f64) -> bool {
        (left - right).abs() < 1e-6
    }

    #[test]
    fn fresh_meter_is_zeroed() {
        let (clock, _mock) = Clock::mock();
        let meter = Meter::new(clock);

        assert_eq!(meter.snapshot(Duration::from_secs(1)), MeterSnapshot::default());
    }

    #[test]
    fn rates_before_first_tick_are_zero() {
        let (clock, mock) = Clock::mock();
        let meter = Meter::new(clock);
        meter.mark(10);
        mock.increment(Duration::from_secs(1));

        let snapshot = meter.snapshot(Duration::from_secs(1));

        assert_eq!(snapshot.count, 10);
        assert_eq!(snapshot.rate_1m, 0.0);
        assert!(approx(snapshot.rate_mean, 10.0));
    }

    #[test]
    fn first_tick_seeds_instant_rate() {
        let (clock, mock) = Clock::mock();
        let meter = Meter::new(clock);
        meter.mark(50);
        mock.increment(TICK_INTERVAL);

        let snapshot = meter.snapshot(Duration::from_secs(1));

        // 50 events over a 5s tick.
        assert!(approx(snapshot.rate_1m, 10.0));
        assert!(approx(snapshot.rate_5m, 10.0));
        assert!(approx(snapshot.rate_15m, 10.0));
        assert!(approx(snapshot.rate_mean, 10.0));
    }

    #[test]
    fn rates_decay_without_events() {
        let (clock, mock) = Clock::mock();
        let meter = Meter::new(clock);
        meter.mark(50);
        mock.increment(TICK_INTERVAL);
        let seeded = meter.snapshot(Duration::from_secs(1));

        mock.increment(Duration::from_secs(60));
        let decayed = meter.snapshot(Duration::from_secs(1));

        assert!(decayed.rate_1m < seeded.rate_1m);
        assert!(decayed.rate_1m < decayed.rate_5m);
        assert!(decayed.rate_5m < decayed.rate_15m);
        // One minute at alpha(1m) leaves exp(-1) of the original rate.
        assert!(approx(decayed.rate_1m, 10.0 * (-1.0_f64).exp()));
    }

    #[test]
    fn rate_unit_scales_rates() {
        let (clock, mock) = Clock::mock();
        let meter = Meter::new(clock);
        meter.mark(50);
        mock.increment(TICK_INTERVAL);

        let snapshot = meter.snapshot(Duration::from_secs(60));

        assert!(approx(snapshot.rate_1m, 600.0));
        assert!(approx(snapshot.rate_mean, 600.0));
    }
}
