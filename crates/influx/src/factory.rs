use tracing::info;

use crate::config::{InfluxConfig, MapConfig};
use crate::producer::{InfluxSystemProducer, BATCH_SIZE};
use crate::system::{
    SinglePartitionWithoutOffsetsAdmin, SystemAdmin, SystemConsumer, SystemFactory,
    SystemProducer,
};
use crate::SystemError;

/// Sink-only `InfluxDB` system.
#[derive(Debug, Clone, Copy, Default)]
pub struct InfluxSystemFactory;

impl SystemFactory for InfluxSystemFactory {
    fn get_consumer(
        &self,
        system_name: &str,
        _: &MapConfig,
    ) -> Result<Box<dyn SystemConsumer>, SystemError> {
        Err(SystemError::ConsumerUnsupported { system: system_name.to_string() })
    }

    fn get_producer(
        &self,
        system_name: &str,
        config: &MapConfig,
    ) -> Result<Box<dyn SystemProducer>, SystemError> {
        let config = InfluxConfig::from_config(system_name, config)?;
        info!(system_name, ?config, "Creating InfluxDB producer");

        Ok(Box::new(InfluxSystemProducer::new(&config, BATCH_SIZE)))
    }

    fn get_admin(&self, _: &str, _: &MapConfig) -> Box<dyn SystemAdmin> {
        Box::new(SinglePartitionWithoutOffsetsAdmin)
    }
}
