//! Sink-only `InfluxDB` system for the stream-processing framework's plugin
//! interface.
//!
//! [`InfluxSystemFactory`] hands out a producer writing points in line protocol
//! to the `InfluxDB` v1 HTTP API, refuses to hand out consumers, and reports a
//! single partition without offsets.

mod config;
mod factory;
mod line_protocol;
mod producer;
mod system;

pub use config::{InfluxConfig, MapConfig};
pub use factory::InfluxSystemFactory;
pub use line_protocol::{FieldValue, Point};
pub use producer::{InfluxSystemProducer, BATCH_SIZE};
pub use system::{
    IncomingEnvelope, OutgoingEnvelope, Partition, PartitionMetadata,
    SinglePartitionWithoutOffsetsAdmin, StreamMetadata, SystemAdmin, SystemConsumer,
    SystemFactory, SystemProducer,
};
use thiserror::Error;

/// Possible failure while creating or using the `InfluxDB` system.
#[derive(Debug, Error)]
pub enum SystemError {
    /// A required configuration key is absent.
    #[error("Missing config; key={key}")]
    MissingConfig { key: String },
    /// The configured `uri` is not an absolute URL.
    #[error("Invalid uri; uri={uri}; err={err}")]
    InvalidUri { uri: String, err: url::ParseError },
    /// The system is sink-only; no consumer exists.
    #[error("Consumer unsupported; system={system} is sink-only")]
    ConsumerUnsupported { system: String },
    /// The HTTP client could not be built or the request failed.
    #[error("HTTP; err={0}")]
    Http(#[from] reqwest::Error),
    /// `InfluxDB` answered with a non-success status.
    #[error("Write rejected; status={status}; body={body}")]
    WriteRejected { status: u16, body: String },
}
