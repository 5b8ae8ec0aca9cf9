use std::convert::TryInto;
use std::io::{self, Cursor};

use bytes::{Buf, BytesMut};
use thiserror::Error as ThisError;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::codec::{Decoder, Encoder};

use crate::frame::{self, Frame};

/// Errors surfaced while reading frames from a stream. Protocol errors are
/// recoverable (the codec resets its buffered state and the connection may
/// survive a single bad frame); I/O errors are terminal.
#[derive(Debug, ThisError)]
pub enum Error {
    #[error("ERR Protocol error: '{0}'")]
    Protocol(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Whether the stream is beyond saving: the peer went away or the
    /// socket was closed under us.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Error::Io(_))
    }
}

pub struct FrameCodec;

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let mut cursor = Cursor::new(&src[..]);
        let frame = match Frame::parse(&mut cursor) {
            Ok(frame) => frame,
            // Not enough data to parse a frame.
            Err(frame::Error::Incomplete) => return Ok(None),
            Err(frame::Error::Protocol(detail)) => {
                // Reset to a clean state; the buffered bytes belong to the
                // bad frame and cannot be trusted.
                src.clear();
                return Err(Error::Protocol(detail));
            }
        };

        let position: usize = cursor
            .position()
            .try_into()
            .map_err(|_| Error::Protocol("frame too large".to_string()))?;

        // Remove the parsed frame from the buffer.
        src.advance(position);

        Ok(Some(frame))
    }
}

impl<'a> Encoder<&'a Frame> for FrameCodec {
    type Error = Error;

    fn encode(&mut self, frame: &'a Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(&frame.serialize());
        Ok(())
    }
}

/// Buffered frame reader over any byte stream: client sockets, peer
/// sockets and the append-only file all parse through here.
pub struct FrameReader<R> {
    io: R,
    buffer: BytesMut,
    codec: FrameCodec,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(io: R) -> FrameReader<R> {
        FrameReader {
            io,
            // Allocate the buffer with 4kb of capacity.
            buffer: BytesMut::with_capacity(4096),
            codec: FrameCodec,
        }
    }

    /// Reads the next frame, pulling more bytes from the stream as needed.
    /// `Ok(None)` means the stream ended cleanly between frames.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>, Error> {
        loop {
            if let Some(frame) = self.codec.decode(&mut self.buffer)? {
                return Ok(Some(frame));
            }

            if 0 == self.io.read_buf(&mut self.buffer).await? {
                return if self.buffer.is_empty() {
                    Ok(None)
                } else {
                    Err(Error::Io(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "connection reset by peer",
                    )))
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn decode_waits_for_complete_frame() {
        let mut codec = FrameCodec;
        let mut buf = BytesMut::from(&b"*2\r\n$3\r\nfoo"[..]);

        assert!(matches!(codec.decode(&mut buf), Ok(None)));

        buf.extend_from_slice(b"\r\n$3\r\nbar\r\n");
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(
            frame,
            Frame::Array(vec![
                Frame::Bulk(Bytes::from("foo")),
                Frame::Bulk(Bytes::from("bar")),
            ])
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_leaves_pipelined_frames_in_buffer() {
        let mut codec = FrameCodec;
        let mut buf = BytesMut::from(&b"+OK\r\n:7\r\n"[..]);

        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(Frame::Simple("OK".to_string()))
        );
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Frame::Integer(7)));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn decode_protocol_error_resets_buffer() {
        let mut codec = FrameCodec;
        let mut buf = BytesMut::from(&b"@bogus\r\n"[..]);

        assert!(matches!(codec.decode(&mut buf), Err(Error::Protocol(_))));
        assert!(buf.is_empty());

        // The codec is usable again afterwards.
        buf.extend_from_slice(b"+OK\r\n");
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(Frame::Simple("OK".to_string()))
        );
    }

    #[test]
    fn encode_writes_serialized_form() {
        let mut codec = FrameCodec;
        let mut buf = BytesMut::new();
        codec
            .encode(&Frame::Bulk(Bytes::from("hello")), &mut buf)
            .unwrap();
        assert_eq!(&buf[..], b"$5\r\nhello\r\n");
    }
}
