//! # Sink Implementations
//!
//! A sink accepts ordered container packets and moves them to their
//! destination. The pipeline resolves a sink from a [`MediaDescriptor`] at
//! `open` time: files are written through [`FileSink`], network
//! destinations (RTMP ingest, reliable-datagram receivers) through
//! [`TcpSink`]. The protocol layer above the byte pipe (RTMP handshake,
//! SRT negotiation) belongs to the transport collaborator, not to this
//! crate.

use crate::av::Packet;
use crate::config::{MediaDescriptor, SinkType};
use crate::error::{CastError, Result};
use async_trait::async_trait;

/// File destination sink
pub mod file;
/// TCP network destination sink
pub mod tcp;

pub use file::FileSink;
pub use tcp::TcpSink;

/// A destination for container packets.
#[async_trait]
pub trait Sink: Send {
    /// Opens the destination described by `descriptor`.
    async fn open(&mut self, descriptor: &MediaDescriptor) -> Result<()>;

    /// Writes one packet; packets arrive in emission order.
    async fn write(&mut self, packet: &Packet) -> Result<()>;

    /// Flushes and closes the destination.
    async fn close(&mut self) -> Result<()>;
}

/// Resolves the sink implementation for a descriptor.
pub fn create_sink(descriptor: &MediaDescriptor) -> Result<Box<dyn Sink>> {
    match descriptor.sink {
        SinkType::File => Ok(Box::new(FileSink::new())),
        SinkType::Network => Ok(Box::new(TcpSink::new())),
        SinkType::Content => Err(CastError::Unsupported(
            "content provider sinks are provided by the host platform".into(),
        )),
    }
}
