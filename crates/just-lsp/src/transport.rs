//
// transport.rs
//
// Content-Length framing of JSON-RPC messages over a byte stream
//

use std::fmt;
use std::io;

use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const CONTENT_LENGTH: &str = "content-length";

/// Largest payload accepted. Larger declared lengths are treated as broken
/// framing.
pub const MAX_CONTENT_LENGTH: usize = 64 * 1024 * 1024;

/// Failure while reading or writing a frame
#[derive(Debug)]
pub enum TransportError {
    /// The underlying stream failed
    Io(io::Error),
    /// A complete frame arrived but its payload is not valid JSON
    Decode(serde_json::Error),
    /// An outgoing value could not be serialized
    Encode(serde_json::Error),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Io(e) => write!(f, "transport I/O error: {e}"),
            TransportError::Decode(e) => write!(f, "failed to decode message payload: {e}"),
            TransportError::Encode(e) => write!(f, "failed to encode message payload: {e}"),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Io(e) => Some(e),
            TransportError::Decode(e) | TransportError::Encode(e) => Some(e),
        }
    }
}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        TransportError::Io(e)
    }
}

/// Reads and writes length-prefixed frames.
///
/// The header line, payload and output buffers are reused across messages.
pub struct Transport<R, W> {
    reader: R,
    writer: W,
    header_line: String,
    payload: Vec<u8>,
    outgoing: Vec<u8>,
}

impl<R, W> Transport<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            header_line: String::new(),
            payload: Vec::new(),
            outgoing: Vec::new(),
        }
    }

    /// Wait for the next frame and decode its payload.
    ///
    /// Returns `Ok(None)` at end of stream, and also when a header block
    /// carries no usable `Content-Length`: without it the next frame boundary
    /// is unknown, so callers stop reading.
    pub async fn receive(&mut self) -> Result<Option<Value>, TransportError> {
        let Some(length) = self.read_content_length().await? else {
            return Ok(None);
        };

        // The buffer grows with the bytes that actually arrive.
        self.payload.clear();
        let read = (&mut self.reader)
            .take(length as u64)
            .read_to_end(&mut self.payload)
            .await?;
        if read < length {
            log::warn!(
                "Stream ended after {} bytes of a {} byte payload",
                read,
                length
            );
            return Ok(None);
        }

        serde_json::from_slice(&self.payload)
            .map(Some)
            .map_err(TransportError::Decode)
    }

    /// Read one header block and return the declared payload length.
    async fn read_content_length(&mut self) -> Result<Option<usize>, TransportError> {
        let mut length: Option<i64> = None;
        let mut saw_header = false;

        loop {
            self.header_line.clear();
            let read = match self.reader.read_line(&mut self.header_line).await {
                Ok(read) => read,
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    log::warn!("Header line is not valid UTF-8: {}", e);
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            };
            if read == 0 {
                if saw_header {
                    log::warn!("Stream ended inside a header block");
                }
                return Ok(None);
            }

            let line = self
                .header_line
                .strip_suffix('\n')
                .unwrap_or(self.header_line.as_str());
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.is_empty() {
                break;
            }
            saw_header = true;

            if let Some((name, value)) = line.split_once(':') {
                if name.trim().eq_ignore_ascii_case(CONTENT_LENGTH) {
                    length = value.trim().parse::<i64>().ok();
                }
            }
        }

        match length {
            Some(n) if n > 0 && n as u64 <= MAX_CONTENT_LENGTH as u64 => Ok(Some(n as usize)),
            Some(n) if n > 0 => {
                log::warn!(
                    "Content-Length {} exceeds the {} byte limit",
                    n,
                    MAX_CONTENT_LENGTH
                );
                Ok(None)
            }
            other => {
                log::warn!("Header block without a usable Content-Length ({:?})", other);
                Ok(None)
            }
        }
    }

    /// Serialize `value`, write it as one frame and flush.
    pub async fn send<T: Serialize>(&mut self, value: &T) -> Result<(), TransportError> {
        self.outgoing.clear();
        serde_json::to_writer(&mut self.outgoing, value).map_err(TransportError::Encode)?;

        let header = format!("Content-Length: {}\r\n\r\n", self.outgoing.len());
        self.writer.write_all(header.as_bytes()).await?;
        self.writer.write_all(&self.outgoing).await?;
        self.writer.flush().await?;
        Ok(())
    }

    pub fn into_inner(self) -> (R, W) {
        (self.reader, self.writer)
    }
}
