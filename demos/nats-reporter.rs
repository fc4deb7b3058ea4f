use std::time::Duration;

use metrics::{counter, gauge, histogram, Key};
use metrics_stream_reporter::{CancellationToken, Config};
use tracing::info;

fn main() {
    tracing_subscriber::fmt::init();

    let servers = std::env::var("NATS_SERVERS").unwrap_or("nats://localhost:4222".to_string());
    let mut config = Config::new(
        servers
            .split(',')
            .map(|server| server.parse().expect("invalid NATS server address"))
            .collect(),
    );
    config.name = "smoke-test".to_string();
    config.interval = Duration::from_secs(1);

    let cxl = CancellationToken::new();
    let (registry, handle) =
        metrics_stream_reporter::install(cxl.clone(), config).expect("failed to install recorder");
    let events = registry.meter(&Key::from_name("events"));
    let requests = registry.timer(&Key::from_name("request_duration"));

    info!("Reporter running. Emitting metrics for 10s...");

    for i in 0..10_u32 {
        counter!("requests_total", "method" => "GET").increment(1);
        gauge!("temperature", "sensor" => "cpu").set(60.0 + f64::from(i) * 0.5);
        histogram!("payload_bytes").record(512.0 * f64::from(i));
        events.mark(3);
        requests.record(Duration::from_millis(20 + u64::from(i)));

        std::thread::sleep(Duration::from_secs(1));
    }

    cxl.cancel();
    handle.join().expect("reporter thread panicked");
}
