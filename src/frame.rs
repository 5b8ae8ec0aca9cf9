// https://redis.io/docs/reference/protocol-spec

use std::fmt;
use std::io::Cursor;

use bytes::{Buf, Bytes};
use thiserror::Error as ThisError;

static CRLF: &[u8; 2] = b"\r\n";

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("not enough data is available to parse an entire frame")]
    Incomplete,
    #[error("{0}")]
    Protocol(String),
}

/// A single RESP value. The same type carries client requests, server
/// replies and append-only-file records.
#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Bytes),
    Null,
    Array(Vec<Frame>),
}

impl Frame {
    pub fn parse(src: &mut Cursor<&[u8]>) -> Result<Self, Error> {
        // The first byte in a RESP-serialized payload always identifies its
        // type. Subsequent bytes constitute the type's contents.
        let first_byte = get_byte(src)?;

        match first_byte {
            b'+' => {
                let line = get_line(src)?;
                let string = string_from_utf8(line)?;
                Ok(Frame::Simple(string))
            }
            b'-' => {
                let line = get_line(src)?;
                let string = string_from_utf8(line)?;
                Ok(Frame::Error(string))
            }
            b':' => {
                let line = get_line(src)?;
                let integer = parse_decimal(line)?;
                Ok(Frame::Integer(integer))
            }
            // $<length>\r\n<data>\r\n
            b'$' => {
                let line = get_line(src)?;
                let length = parse_decimal(line)?;

                if length == -1 {
                    return Ok(Frame::Null);
                }
                if length < 0 {
                    return Err(Error::Protocol(format!("invalid bulk length {}", length)));
                }

                let data = get_exact(src, length as usize)?;
                Ok(Frame::Bulk(data))
            }
            // *<number-of-elements>\r\n<element-1>...<element-n>
            b'*' => {
                let line = get_line(src)?;
                let count = parse_decimal(line)?;

                // A `*-1` header may appear in inputs; it carries no
                // elements and is treated as an empty array.
                if count <= 0 {
                    return Ok(Frame::Array(vec![]));
                }

                let mut frames = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    frames.push(Self::parse(src)?);
                }

                Ok(Frame::Array(frames))
            }
            byte => Err(Error::Protocol(format!(
                "invalid frame type byte {:?}",
                byte as char
            ))),
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        match self {
            Frame::Simple(s) => {
                let mut bytes = Vec::with_capacity(1 + s.len() + CRLF.len());
                bytes.push(b'+');
                bytes.extend_from_slice(s.as_bytes());
                bytes.extend_from_slice(CRLF);
                bytes
            }
            Frame::Error(s) => {
                let mut bytes = Vec::with_capacity(1 + s.len() + CRLF.len());
                bytes.push(b'-');
                bytes.extend_from_slice(s.as_bytes());
                bytes.extend_from_slice(CRLF);
                bytes
            }
            Frame::Integer(i) => {
                let repr = i.to_string();
                let mut bytes = Vec::with_capacity(1 + repr.len() + CRLF.len());
                bytes.push(b':');
                bytes.extend_from_slice(repr.as_bytes());
                bytes.extend_from_slice(CRLF);
                bytes
            }
            Frame::Bulk(data) => {
                let length = data.len().to_string();
                let mut bytes =
                    Vec::with_capacity(1 + length.len() + CRLF.len() + data.len() + CRLF.len());
                bytes.push(b'$');
                bytes.extend_from_slice(length.as_bytes());
                bytes.extend_from_slice(CRLF);
                bytes.extend_from_slice(data);
                bytes.extend_from_slice(CRLF);
                bytes
            }
            Frame::Null => b"$-1\r\n".to_vec(),
            // An array serializes into one contiguous buffer so the whole
            // frame goes out in a single write.
            Frame::Array(frames) => {
                let length = frames.len().to_string();
                let mut bytes = Vec::with_capacity(1 + length.len() + CRLF.len());
                bytes.push(b'*');
                bytes.extend_from_slice(length.as_bytes());
                bytes.extend_from_slice(CRLF);
                for frame in frames {
                    bytes.extend(frame.serialize());
                }
                bytes
            }
        }
    }

    pub fn ok() -> Frame {
        Frame::Simple("OK".to_string())
    }

    pub fn pong() -> Frame {
        Frame::Simple("PONG".to_string())
    }

    pub fn err(msg: impl Into<String>) -> Frame {
        Frame::Error(msg.into())
    }

    /// The canonical `ERR wrong number of arguments` reply for `cmd`.
    pub fn arg_num_err(cmd: &str) -> Frame {
        Frame::Error(format!(
            "ERR wrong number of arguments for '{}' command",
            cmd
        ))
    }

    /// Builds the multi-bulk form of a command line, e.g. `SELECT 3`.
    pub fn from_cmdline(args: &[Bytes]) -> Frame {
        Frame::Array(args.iter().map(|arg| Frame::Bulk(arg.clone())).collect())
    }

    /// Extracts a command line from a request frame. Requests must be
    /// multi-bulk arrays of (bulk or simple) strings; anything else yields
    /// `None`.
    pub fn into_cmdline(self) -> Option<Vec<Bytes>> {
        let frames = match self {
            Frame::Array(frames) => frames,
            _ => return None,
        };

        let mut args = Vec::with_capacity(frames.len());
        for frame in frames {
            match frame {
                Frame::Bulk(data) => args.push(data),
                Frame::Simple(s) => args.push(Bytes::from(s)),
                _ => return None,
            }
        }
        Some(args)
    }
}

impl From<Frame> for Vec<u8> {
    fn from(frame: Frame) -> Self {
        frame.serialize()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Simple(s) => write!(f, "+{}", s),
            Frame::Error(s) => write!(f, "-{}", s),
            Frame::Integer(i) => write!(f, ":{}", i),
            Frame::Bulk(bytes) => write!(f, "${}", String::from_utf8_lossy(bytes)),
            Frame::Null => write!(f, "$-1"),
            Frame::Array(frames) => {
                write!(f, "*{}", frames.len())?;
                for frame in frames {
                    write!(f, " {}", frame)?;
                }
                Ok(())
            }
        }
    }
}

/// Reads one `\r\n`-terminated line, excluding the terminator. A line with
/// a bare `\n` is a protocol error; `\r\n` termination is mandatory.
fn get_line<'a>(src: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], Error> {
    let start = src.position() as usize;
    let buf: &'a [u8] = *src.get_ref();

    let lf = buf[start..]
        .iter()
        .position(|&b| b == b'\n')
        .ok_or(Error::Incomplete)?;

    let end = start + lf;
    if lf == 0 || buf[end - 1] != b'\r' {
        return Err(Error::Protocol(format!(
            "{:?}",
            String::from_utf8_lossy(&buf[start..=end])
        )));
    }

    src.set_position((end + 1) as u64);
    Ok(&buf[start..end - 1])
}

/// Reads exactly `len` payload bytes followed by a mandatory `\r\n`.
fn get_exact(src: &mut Cursor<&[u8]>, len: usize) -> Result<Bytes, Error> {
    if src.remaining() < len + CRLF.len() {
        return Err(Error::Incomplete);
    }

    let start = src.position() as usize;
    let buf = src.get_ref();
    if &buf[start + len..start + len + 2] != CRLF {
        return Err(Error::Protocol(format!(
            "bulk of length {} not terminated by CRLF",
            len
        )));
    }

    let data = Bytes::copy_from_slice(&buf[start..start + len]);
    src.set_position((start + len + 2) as u64);
    Ok(data)
}

fn get_byte(src: &mut Cursor<&[u8]>) -> Result<u8, Error> {
    if !src.has_remaining() {
        return Err(Error::Incomplete);
    }
    Ok(src.get_u8())
}

fn parse_decimal(line: &[u8]) -> Result<i64, Error> {
    let string =
        std::str::from_utf8(line).map_err(|_| Error::Protocol("invalid UTF-8 line".into()))?;
    string
        .parse::<i64>()
        .map_err(|_| Error::Protocol(format!("invalid integer {:?}", string)))
}

fn string_from_utf8(line: &[u8]) -> Result<String, Error> {
    String::from_utf8(line.to_vec()).map_err(|_| Error::Protocol("invalid UTF-8 line".into()))
}
