use reqwest::blocking::Client;
use tracing::{debug, warn};
use url::Url;

use crate::config::InfluxConfig;
use crate::line_protocol::write_point;
use crate::system::{OutgoingEnvelope, SystemProducer};
use crate::SystemError;

/// Points buffered before a write is issued.
pub const BATCH_SIZE: usize = 10;

/// Forwards points to the `InfluxDB` v1 `/write` endpoint in line protocol.
#[derive(Debug)]
pub struct InfluxSystemProducer {
    write_url: Url,
    batch_size: usize,
    http_client: Option<Client>,
    buffer: String,
    buffered: usize,
}

impl InfluxSystemProducer {
    /// Builds the producer; no connection is made until the first write.
    #[must_use]
    pub fn new(config: &InfluxConfig, batch_size: usize) -> InfluxSystemProducer {
        InfluxSystemProducer {
            write_url: config.write_url(),
            batch_size: batch_size.max(1),
            http_client: None,
            buffer: String::new(),
            buffered: 0,
        }
    }

    /// Number of points waiting for the next write.
    #[must_use]
    pub const fn buffered(&self) -> usize {
        self.buffered
    }

    fn write(&mut self) -> Result<(), SystemError> {
        // Take the buffer; it is dropped whether or not the write succeeds.
        let body = std::mem::take(&mut self.buffer);
        let points = std::mem::take(&mut self.buffered);

        let client = match &mut self.http_client {
            Some(client) => client,
            slot @ None => slot.insert(Client::builder().build()?),
        };

        let response = client
            .post(self.write_url.clone())
            .body(body)
            .send()
            .inspect_err(|err| warn!(%err, points, "InfluxDB write request failed"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            warn!(%status, %body, points, "InfluxDB write failed");

            return Err(SystemError::WriteRejected { status: status.as_u16(), body });
        }

        debug!(points, "InfluxDB write succeeded");

        Ok(())
    }
}

impl SystemProducer for InfluxSystemProducer {
    fn start(&mut self) {}

    fn stop(&mut self) -> Result<(), SystemError> {
        let result = match self.buffer.is_empty() {
            true => Ok(()),
            false => self.write(),
        };
        self.http_client = None;

        result
    }

    fn register(&mut self, source: &str) {
        debug!(source, "Registered InfluxDB source");
    }

    #[allow(clippy::arithmetic_side_effects)]
    fn send(&mut self, _: &str, envelope: OutgoingEnvelope) -> Result<(), SystemError> {
        if !write_point(&mut self.buffer, &envelope.point) {
            debug!(measurement = %envelope.point.measurement, "Skipping point without finite fields");

            return Ok(());
        }
        self.buffered += 1;

        match self.buffered >= self.batch_size {
            true => self.write(),
            false => Ok(()),
        }
    }

    fn flush(&mut self, _: &str) -> Result<(), SystemError> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        self.write()
    }
}

#[cfg(test)]
mod tests {
    use expect_test::expect;

    use super::*;
    use crate::line_protocol::Point;
    use crate::MapConfig;

    fn producer(uri: &str) -> InfluxSystemProducer {
        let config = InfluxConfig::from_config(
            "influx",
            &MapConfig::from_iter([
                ("systems.influx.uri", uri),
                ("systems.influx.username", "admin"),
                ("systems.influx.password", "secret"),
                ("systems.influx.database", "metrics"),
            ]),
        )
        .unwrap();

        InfluxSystemProducer::new(&config, BATCH_SIZE)
    }

    fn envelope(i: u64) -> OutgoingEnvelope {
        OutgoingEnvelope {
            stream: "metrics".to_string(),
            point: Point::new("requests").field("count", i).timestamp_ns(u128::from(i)),
        }
    }

    #[test]
    fn send_buffers_below_batch_size() {
        let mut producer = producer("http://127.0.0.1:1");
        producer.start();
        producer.register("task");

        for i in 0..3 {
            producer.send("task", envelope(i)).unwrap();
        }

        assert_eq!(producer.buffered(), 3);
        assert!(producer.http_client.is_none());
        expect![[r#"
            requests count=0u 0
            requests count=1u 1
            requests count=2u 2
        "#]]
        .assert_eq(&producer.buffer);
    }

    #[test]
    fn send_skips_points_without_fields() {
        let mut producer = producer("http://127.0.0.1:1");

        producer
            .send(
                "task",
                OutgoingEnvelope {
                    stream: "metrics".to_string(),
                    point: Point::new("latency").field("mean", f64::NAN),
                },
            )
            .unwrap();

        assert_eq!(producer.buffered(), 0);
    }

    #[test]
    fn full_batch_triggers_write() {
        let mut producer = producer("http://127.0.0.1:1");

        for i in 0..9 {
            producer.send("task", envelope(i)).unwrap();
        }
        let err = producer.send("task", envelope(9)).unwrap_err();

        assert!(matches!(err, SystemError::Http(_)), "{err}");
        assert_eq!(producer.buffered(), 0);
        assert!(producer.buffer.is_empty());
    }

    #[test]
    fn flush_empty_is_noop() {
        let mut producer = producer("http://127.0.0.1:1");

        producer.flush("task").unwrap();
        producer.stop().unwrap();

        assert!(producer.http_client.is_none());
    }

    #[test]
    fn stop_flushes_buffer() {
        let mut producer = producer("http://127.0.0.1:1");
        producer.send("task", envelope(1)).unwrap();

        assert!(producer.stop().is_err());
        assert_eq!(producer.buffered(), 0);
    }
}
