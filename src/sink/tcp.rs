use super::Sink;
use crate::av::Packet;
use crate::config::MediaDescriptor;
use crate::error::{CastError, Result};
use crate::utils::Observable;
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

/// Writes container bytes to a TCP peer.
///
/// Covers the byte-pipe part of the network sinks: an RTMP ingest or a
/// reliable-datagram receiver identified by `host:port`. Optional
/// `streamid` and `passphrase` query parameters are parsed off the
/// descriptor for the transport layer above. Connection loss is published
/// through the [`TcpSink::connected`] observable and surfaced as a write
/// error.
pub struct TcpSink {
    stream: Option<TcpStream>,
    connected: Observable<bool>,
    stream_id: Option<String>,
    passphrase: Option<String>,
}

impl TcpSink {
    /// Creates a disconnected sink.
    pub fn new() -> Self {
        Self {
            stream: None,
            connected: Observable::new(false),
            stream_id: None,
            passphrase: None,
        }
    }

    /// Observable connection state; flips to false on a lost connection.
    pub fn connected(&self) -> &Observable<bool> {
        &self.connected
    }

    /// Stream id from the descriptor, if any.
    pub fn stream_id(&self) -> Option<&str> {
        self.stream_id.as_deref()
    }

    /// Passphrase from the descriptor, if any.
    pub fn passphrase(&self) -> Option<&str> {
        self.passphrase.as_deref()
    }
}

impl Default for TcpSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Sink for TcpSink {
    async fn open(&mut self, descriptor: &MediaDescriptor) -> Result<()> {
        let host = descriptor
            .uri
            .host_str()
            .ok_or_else(|| CastError::SinkOpen(format!("{} has no host", descriptor.uri)))?;
        let port = descriptor
            .uri
            .port()
            .ok_or_else(|| CastError::SinkOpen(format!("{} has no port", descriptor.uri)))?;

        for (key, value) in descriptor.uri.query_pairs() {
            match key.as_ref() {
                "streamid" => self.stream_id = Some(value.to_string()),
                "passphrase" => self.passphrase = Some(value.to_string()),
                _ => {}
            }
        }

        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|e| CastError::SinkOpen(format!("{}:{}: {}", host, port, e)))?;
        self.stream = Some(stream);
        self.connected.set(true);
        Ok(())
    }

    async fn write(&mut self, packet: &Packet) -> Result<()> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| CastError::SinkWrite("network sink is not open".into()))?;
        if let Err(e) = stream.write_all(&packet.buffer).await {
            self.connected.set(false);
            self.stream = None;
            return Err(CastError::SinkWrite(e.to_string()));
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
        }
        self.connected.set(false);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_connect_write_and_query_params() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let accept = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            socket.read_to_end(&mut buf).await.unwrap();
            buf
        });

        let descriptor = MediaDescriptor::parse(&format!(
            "srt://{}?streamid=live42&passphrase=secret",
            addr
        ))
        .unwrap();
        let mut sink = TcpSink::new();
        sink.open(&descriptor).await.unwrap();
        assert!(sink.connected().get());
        assert_eq!(sink.stream_id(), Some("live42"));
        assert_eq!(sink.passphrase(), Some("secret"));

        sink.write(&Packet::new(vec![0x47u8; 188])).await.unwrap();
        sink.close().await.unwrap();
        assert!(!sink.connected().get());

        let received = accept.await.unwrap();
        assert_eq!(received.len(), 188);
        assert_eq!(received[0], 0x47);
    }

    #[tokio::test]
    async fn test_connect_refused_is_sink_open_error() {
        // A port with nothing listening
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let descriptor = MediaDescriptor::parse(&format!("srt://{}", addr)).unwrap();
        let mut sink = TcpSink::new();
        let err = sink.open(&descriptor).await.unwrap_err();
        assert!(matches!(err, CastError::SinkOpen(_)));
        assert!(!sink.connected().get());
    }
}
