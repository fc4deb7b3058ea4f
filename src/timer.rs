use std::time::Duration;

use metrics::HistogramFn;
use quanta::{Clock, Instant};

use crate::atomic_storage::HistogramCell;
use crate::meter::Meter;
use crate::metric::TimerSnapshot;

/// Distribution of durations combined with a meter of how often they occur.
#[derive(Debug)]
pub struct Timer {
    clock: Clock,
    durations: HistogramCell,
    meter: Meter,
}

impl Timer {
    pub(crate) fn new(clock: Clock) -> Timer {
        Timer { meter: Meter::new(clock.clone()), clock, durations: HistogramCell::new() }
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn record(&self, duration: Duration) {
        self.durations.record(duration.as_nanos() as f64);
        self.meter.mark(1);
    }

    /// Starts timing; the elapsed time is recorded when the guard drops.
    #[must_use = "dropping the guard immediately records a zero-length duration"]
    pub fn time(&self) -> TimerGuard<'_> {
        TimerGuard { timer: self, start: self.clock.now() }
    }

    #[must_use]
    pub fn count(&self) -> u64 {
        self.meter.count()
    }

    /// Durations are expressed in `duration_unit`, rates per `rate_unit`.
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn snapshot(&self, rate_unit: Duration, duration_unit: Duration) -> TimerSnapshot {
        let (_, distribution) = self.durations.snapshot();

        TimerSnapshot {
            distribution: distribution.scaled(1.0 / duration_unit.as_nanos() as f64),
            meter: self.meter.snapshot(rate_unit),
        }
    }

    #[cfg(test)]
    pub(crate) fn pending_len(&self) -> usize {
        self.durations.pending_len()
    }
}

#[derive(Debug)]
pub struct TimerGuard<'a> {
    timer: &'a Timer,
    start: Instant,
}

impl TimerGuard<'_> {
    /// Records now and returns the elapsed duration.
    pub fn stop(self) -> Duration {
        let elapsed = self.timer.clock.now().duration_since(self.start);
        self.timer.record(elapsed);
        std::mem::forget(self);

        elapsed
    }
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        self.timer.record(self.timer.clock.now().duration_since(self.start));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECONDS: Duration = Duration::from_secs(1);
    const MILLIS: Duration = Duration::from_millis(1);

    #[test]
    fn fresh_timer_is_zeroed() {
        let (clock, _mock) = Clock::mock();
        let timer = Timer::new(clock);

        assert_eq!(timer.snapshot(SECONDS, MILLIS), TimerSnapshot::default());
    }

    #[test]
    fn durations_use_duration_unit() {
        let (clock, _mock) = Clock::mock();
        let timer = Timer::new(clock);
        timer.record(Duration::from_millis(10));
        timer.record(Duration::from_millis(30));

        let snapshot = timer.snapshot(SECONDS, MILLIS);

        assert_eq!(snapshot.meter.count, 2);
        assert!((snapshot.distribution.min - 10.0).abs() < 1e-9);
        assert!((snapshot.distribution.max - 30.0).abs() < 1e-9);
        assert!((snapshot.distribution.mean - 20.0).abs() < 1e-9);
        assert!((snapshot.distribution.p50 - 20.0).abs() < 1e-9);
        assert!((snapshot.distribution.p999 - 30.0).abs() < 1e-9);

        let in_seconds = timer.snapshot(SECONDS, SECONDS);
        assert!((in_seconds.distribution.max - 0.03).abs() < 1e-12);
    }

    #[test]
    fn guard_records_elapsed_on_drop() {
        let (clock, mock) = Clock::mock();
        let timer = Timer::new(clock);

        {
            let _guard = timer.time();
            mock.increment(Duration::from_millis(250));
        }

        let snapshot = timer.snapshot(SECONDS, MILLIS);
        assert_eq!(timer.count(), 1);
        assert!((snapshot.distribution.max - 250.0).abs() < 1e-9);
    }

    #[test]
    fn guard_stop_returns_elapsed() {
        let (clock, mock) = Clock::mock();
        let timer = Timer::new(clock);

        let guard = timer.time();
        mock.increment(Duration::from_millis(5));

        assert_eq!(guard.stop(), Duration::from_millis(5));
        assert_eq!(timer.count(), 1);
    }
}
