use super::Sink;
use crate::av::Packet;
use crate::config::MediaDescriptor;
use crate::error::{CastError, Result};
use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

/// Writes container bytes to a local file, truncating any existing content.
pub struct FileSink {
    writer: Option<BufWriter<File>>,
}

impl FileSink {
    /// Creates a closed file sink.
    pub fn new() -> Self {
        Self { writer: None }
    }
}

impl Default for FileSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Sink for FileSink {
    async fn open(&mut self, descriptor: &MediaDescriptor) -> Result<()> {
        let path = descriptor
            .uri
            .to_file_path()
            .map_err(|_| CastError::SinkOpen(format!("{} is not a file path", descriptor.uri)))?;
        let file = File::create(&path)
            .await
            .map_err(|e| CastError::SinkOpen(format!("{}: {}", path.display(), e)))?;
        self.writer = Some(BufWriter::new(file));
        Ok(())
    }

    async fn write(&mut self, packet: &Packet) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| CastError::SinkWrite("file sink is not open".into()))?;
        writer
            .write_all(&packet.buffer)
            .await
            .map_err(|e| CastError::SinkWrite(e.to_string()))
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer
                .flush()
                .await
                .map_err(|e| CastError::SinkWrite(e.to_string()))?;
        }
        Ok(())
    }
}
