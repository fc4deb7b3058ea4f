use metrics_influx_system::{
    InfluxSystemFactory, MapConfig, OutgoingEnvelope, Point, SystemFactory,
};
use tracing::info;

fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = MapConfig::from_iter([
        (
            "systems.influx.uri",
            std::env::var("INFLUXDB_ENDPOINT").unwrap_or("http://localhost:8086".to_string()),
        ),
        (
            "systems.influx.database",
            std::env::var("INFLUXDB_DATABASE").unwrap_or("test".to_string()),
        ),
        (
            "systems.influx.username",
            std::env::var("INFLUXDB_USERNAME").unwrap_or_default(),
        ),
        (
            "systems.influx.password",
            std::env::var("INFLUXDB_PASSWORD").unwrap_or_default(),
        ),
    ]);

    let factory = InfluxSystemFactory;
    let mut producer = factory
        .get_producer("influx", &config)
        .expect("failed to create producer");
    producer.register("demo");
    producer.start();

    info!("Sending 25 points...");
    for i in 0..25_u32 {
        let point = Point::new("temperature")
            .tag("sensor", "cpu")
            .field("value", 60.0 + f64::from(i) * 0.5);
        if let Err(err) =
            producer.send("demo", OutgoingEnvelope { stream: "metrics".to_string(), point })
        {
            info!(%err, "Write failed");
        }
    }

    producer.stop().expect("final flush failed");
}
