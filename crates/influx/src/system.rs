//! Plugin contract of the host stream-processing framework.
//!
//! The framework asks a [`SystemFactory`] once per configured system name for
//! a consumer, a producer and an admin.

use std::collections::BTreeMap;

use crate::line_protocol::Point;
use crate::{MapConfig, SystemError};

pub trait SystemFactory {
    /// # Errors
    ///
    /// Errors when the system cannot be consumed from or is misconfigured.
    fn get_consumer(
        &self,
        system_name: &str,
        config: &MapConfig,
    ) -> Result<Box<dyn SystemConsumer>, SystemError>;

    /// # Errors
    ///
    /// Errors when the system is misconfigured.
    fn get_producer(
        &self,
        system_name: &str,
        config: &MapConfig,
    ) -> Result<Box<dyn SystemProducer>, SystemError>;

    fn get_admin(&self, system_name: &str, config: &MapConfig) -> Box<dyn SystemAdmin>;
}

/// A message headed to a stream of the system.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEnvelope {
    pub stream: String,
    pub point: Point,
}

pub trait SystemProducer: Send {
    fn start(&mut self);

    /// Flushes anything still buffered and releases resources.
    ///
    /// # Errors
    ///
    /// Errors if the final flush fails.
    fn stop(&mut self) -> Result<(), SystemError>;

    fn register(&mut self, source: &str);

    /// # Errors
    ///
    /// Errors if sending triggers a flush and the flush fails.
    fn send(&mut self, source: &str, envelope: OutgoingEnvelope) -> Result<(), SystemError>;

    /// # Errors
    ///
    /// Errors if the buffered messages cannot be written.
    fn flush(&mut self, source: &str) -> Result<(), SystemError>;
}

/// A message read from a partition of the system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingEnvelope {
    pub partition: Partition,
    pub offset: Option<String>,
    pub payload: Vec<u8>,
}

pub trait SystemConsumer: Send {
    fn start(&mut self);

    fn stop(&mut self);

    /// # Errors
    ///
    /// Errors if the system cannot be read.
    fn poll(&mut self) -> Result<Vec<IncomingEnvelope>, SystemError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Partition(pub u32);

/// Offsets of one partition; `None` when the system does not track offsets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionMetadata {
    pub oldest: Option<String>,
    pub newest: Option<String>,
    pub upcoming: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMetadata {
    pub stream: String,
    pub partitions: BTreeMap<Partition, PartitionMetadata>,
}

pub trait SystemAdmin: Send {
    fn stream_metadata(&self, stream: &str) -> StreamMetadata;

    /// Returns the offset following `offset` in `partition`.
    fn offset_after(&self, partition: Partition, offset: &str) -> Option<String>;
}

/// Admin for systems exposing one partition and no offsets.
#[derive(Debug, Clone, Copy, Default)]
pub struct SinglePartitionWithoutOffsetsAdmin;

impl SystemAdmin for SinglePartitionWithoutOffsetsAdmin {
    fn stream_metadata(&self, stream: &str) -> StreamMetadata {
        StreamMetadata {
            stream: stream.to_string(),
            partitions: BTreeMap::from_iter([(Partition(0), PartitionMetadata::default())]),
        }
    }

    fn offset_after(&self, _: Partition, _: &str) -> Option<String> {
        None
    }
}
