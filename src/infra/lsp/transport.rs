//! LSP Transport Layer
//!
//! Handles LSP message framing with Content-Length headers over any async
//! byte stream (child stdio in production, in-memory pipes in tests).

use std::io;

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use super::protocol::Message;

pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// LSP Transport for reading framed messages
pub struct Transport {
    reader: BufReader<BoxedReader>,
}

impl Transport {
    pub fn new(reader: BoxedReader) -> Self {
        Self {
            reader: BufReader::new(reader),
        }
    }

    /// Read the next message from the peer
    ///
    /// LSP messages are framed with headers:
    /// ```text
    /// Content-Length: 123\r\n
    /// \r\n
    /// {"jsonrpc":"2.0",...}
    /// ```
    pub async fn read_message(&mut self) -> io::Result<Message> {
        let content_length = self.read_headers().await?;

        let mut body = vec![0u8; content_length];
        self.reader.read_exact(&mut body).await?;

        let json =
            String::from_utf8(body).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        tracing::trace!("LSP <- {}", json);

        Message::parse(&json).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Read headers and return Content-Length
    async fn read_headers(&mut self) -> io::Result<usize> {
        let mut content_length: Option<usize> = None;
        let mut line = String::new();

        loop {
            line.clear();
            let bytes_read = self.reader.read_line(&mut line).await?;

            if bytes_read == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "Server closed connection",
                ));
            }

            let line = line.trim();

            // Empty line marks end of headers
            if line.is_empty() {
                break;
            }

            if let Some(value) = line.strip_prefix("Content-Length:") {
                content_length = Some(
                    value
                        .trim()
                        .parse()
                        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?,
                );
            }
            // Content-Type and unknown headers are ignored
        }

        content_length
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "Missing Content-Length"))
    }
}

/// Serialize and write one framed message (request, response or notification)
pub async fn write_message<W, T>(writer: &mut W, message: &T) -> io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
    T: Serialize,
{
    let json = serde_json::to_string(message)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    tracing::trace!("LSP -> {}", json);

    writer.write_all(frame(&json).as_bytes()).await?;
    writer.flush().await
}

fn frame(json: &str) -> String {
    format!("Content-Length: {}\r\n\r\n{}", json.len(), json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::lsp::protocol::{Notification, Request};

    #[test]
    fn test_message_framing() {
        let json = r#"{"jsonrpc":"2.0","id":1,"method":"test"}"#;
        let framed = frame(json);
        assert!(framed.starts_with("Content-Length: 40"));
        assert!(framed.contains("\r\n\r\n"));
    }

    #[tokio::test]
    async fn test_write_then_read_over_pipe() {
        let (client, server) = tokio::io::duplex(4096);
        let (_client_read, mut client_write) = tokio::io::split(client);
        let (server_read, _server_write) = tokio::io::split(server);

        write_message(&mut client_write, &Request::new(3, "initialize", None))
            .await
            .unwrap();
        write_message(&mut client_write, &Notification::new("initialized", None))
            .await
            .unwrap();

        let mut transport = Transport::new(Box::new(server_read));
        match transport.read_message().await.unwrap() {
            Message::Request(req) => assert_eq!(req.method, "initialize"),
            other => panic!("unexpected message: {:?}", other),
        }
        assert!(matches!(
            transport.read_message().await.unwrap(),
            Message::Notification(_)
        ));
    }

    #[tokio::test]
    async fn test_missing_content_length() {
        let (client, server) = tokio::io::duplex(256);
        let (_r, mut w) = tokio::io::split(client);
        let (r, _w) = tokio::io::split(server);
        w.write_all(b"Content-Type: x\r\n\r\n{}").await.unwrap();

        let mut transport = Transport::new(Box::new(r));
        let err = transport.read_message().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn test_eof_is_reported() {
        let (client, server) = tokio::io::duplex(64);
        drop(client);
        let (r, _w) = tokio::io::split(server);
        let mut transport = Transport::new(Box::new(r));
        let err = transport.read_message().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
