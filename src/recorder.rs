use metrics::{Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit};

use crate::registry::Registry;

/// `metrics` recorder writing into a [`Registry`].
#[derive(Debug, Clone)]
pub struct StreamRecorder {
    registry: Registry,
}

impl StreamRecorder {
    #[must_use]
    pub const fn new(registry: Registry) -> StreamRecorder {
        StreamRecorder { registry }
    }

    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Recorder for StreamRecorder {
    fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

    fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

    fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

    fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
        self.registry.counter(key)
    }

    fn register_gauge(&self, key: &Key, _: &Metadata<'_>) -> Gauge {
        self.registry.gauge(key)
    }

    fn register_histogram(&self, key: &Key, _: &Metadata<'_>) -> Histogram {
        self.registry.histogram(key)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::MetricFilter;

    #[test]
    fn macros_write_into_registry() {
        let recorder = StreamRecorder::new(Registry::new());

        metrics::with_local_recorder(&recorder, || {
            metrics::counter!("requests.count").increment(42);
            metrics::gauge!("temperature").set(20.0);
            metrics::histogram!("latency.ms").record(3.0);
        });

        let snapshot = recorder.registry().snapshot(
            &MetricFilter::All,
            Duration::from_secs(1),
            Duration::from_millis(1),
        );
        assert_eq!(snapshot.counters["requests.count"], 42);
        assert_eq!(snapshot.gauges["temperature"], 20.0);
        assert_eq!(snapshot.histograms["latency.ms"].count, 1);
    }
}
