// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{
    fmt::Write as _,
    io::{Error, ErrorKind, Result},
};

use bytes::{Buf as _, BufMut as _, BytesMut};
use log::debug;
use tokio_util::codec::{Decoder, Encoder};

use super::frame::{RequestHead, Response};

/// Upper bound for the request line plus all header lines.
pub(crate) const MAX_HEAD_LEN: usize = 8 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    AwaitingRequestLine,
    ReadingHeaders { path: Option<String> },
    /// The head was oversized, everything else is discarded.
    Discarding,
}

/// Decodes request heads and encodes responses.
#[derive(Debug)]
pub(crate) struct ServerCodec {
    state: State,
    head_len: usize,
}

impl Default for ServerCodec {
    fn default() -> Self {
        Self {
            state: State::AwaitingRequestLine,
            head_len: 0,
        }
    }
}

/// The path is the second whitespace delimited token.
fn parse_request_line(line: &[u8]) -> Option<String> {
    std::str::from_utf8(line)
        .ok()?
        .split_whitespace()
        .nth(1)
        .map(ToOwned::to_owned)
}

fn trim_line_ending(mut line: &[u8]) -> &[u8] {
    if let [rest @ .., b'\n'] = line {
        line = rest;
    }
    if let [rest @ .., b'\r'] = line {
        line = rest;
    }
    line
}

impl ServerCodec {
    fn finish(&mut self, path: Option<String>) -> RequestHead {
        self.state = State::AwaitingRequestLine;
        self.head_len = 0;
        RequestHead { path }
    }
}

impl Decoder for ServerCodec {
    type Item = RequestHead;
    type Error = Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<RequestHead>> {
        loop {
            if self.state == State::Discarding {
                buf.clear();
                return Ok(None);
            }
            let Some(pos) = buf.iter().position(|b| *b == b'\n') else {
                if self.head_len + buf.len() > MAX_HEAD_LEN {
                    debug!("Request head exceeds {MAX_HEAD_LEN} bytes");
                    buf.clear();
                    self.state = State::Discarding;
                    return Ok(Some(RequestHead { path: None }));
                }
                // incomplete line
                return Ok(None);
            };
            self.head_len += pos + 1;
            if self.head_len > MAX_HEAD_LEN {
                debug!("Request head exceeds {MAX_HEAD_LEN} bytes");
                buf.clear();
                self.state = State::Discarding;
                return Ok(Some(RequestHead { path: None }));
            }
            let line = buf.split_to(pos + 1);
            let line = trim_line_ending(&line);
            match std::mem::replace(&mut self.state, State::AwaitingRequestLine) {
                State::AwaitingRequestLine => {
                    let path = parse_request_line(line);
                    self.state = State::ReadingHeaders { path };
                }
                State::ReadingHeaders { path } => {
                    if line.is_empty() {
                        return Ok(Some(self.finish(path)));
                    }
                    // header lines are ignored
                    self.state = State::ReadingHeaders { path };
                }
                State::Discarding => unreachable!(),
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<RequestHead>> {
        if let Some(head) = self.decode(buf)? {
            return Ok(Some(head));
        }
        match std::mem::replace(&mut self.state, State::AwaitingRequestLine) {
            // Peer closed without terminating the header block
            State::ReadingHeaders { path } => {
                buf.clear();
                Ok(Some(self.finish(path)))
            }
            State::AwaitingRequestLine if buf.has_remaining() => {
                let path = parse_request_line(trim_line_ending(&buf[..]));
                buf.clear();
                Ok(Some(self.finish(path)))
            }
            State::AwaitingRequestLine | State::Discarding => {
                buf.clear();
                Ok(None)
            }
        }
    }
}

impl Encoder<Response> for ServerCodec {
    type Error = Error;

    fn encode(&mut self, res: Response, buf: &mut BytesMut) -> Result<()> {
        let Response { status, body } = res;
        buf.reserve(128 + body.len());
        write!(
            buf,
            "HTTP/1.0 {status}\r\n\
             Content-Type: application/json\r\n\
             Content-Length: {}\r\n\
             \r\n",
            body.len()
        )
        .map_err(|err| Error::new(ErrorKind::Other, err))?;
        buf.put_slice(&body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::http::frame::StatusCode;

    fn head(path: &str) -> Option<RequestHead> {
        Some(RequestHead {
            path: Some(path.to_owned()),
        })
    }

    #[test]
    fn decode_complete_head() {
        let mut codec = ServerCodec::default();
        let mut buf =
            BytesMut::from(&b"GET /frequency HTTP/1.1\r\nHost: meter\r\nAccept: */*\r\n\r\n"[..]);
        let res = codec.decode(&mut buf).unwrap();
        assert_eq!(res, head("/frequency"));
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_fragmented_head() {
        let mut codec = ServerCodec::default();
        let mut buf = BytesMut::from(&b"GET /exp"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(b"ort HTTP/1.0\r\nHost: x\r");
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(b"\n\r");
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(b"\n");
        assert_eq!(codec.decode(&mut buf).unwrap(), head("/export"));
    }

    #[test]
    fn decode_bare_line_feeds() {
        let mut codec = ServerCodec::default();
        let mut buf = BytesMut::from(&b"GET / HTTP/1.0\n\n"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), head("/"));
    }

    #[test]
    fn decode_malformed_request_line() {
        let mut codec = ServerCodec::default();
        let mut buf = BytesMut::from(&b"GARBAGE\r\n\r\n"[..]);
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(RequestHead { path: None })
        );

        let mut buf = BytesMut::from(&b"\r\n\r\n"[..]);
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(RequestHead { path: None })
        );

        let mut buf = BytesMut::from(&b"GET /\xFF HTTP/1.0\r\n\r\n"[..]);
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(RequestHead { path: None })
        );
    }

    #[test]
    fn decode_oversized_head() {
        let mut codec = ServerCodec::default();
        let mut buf = BytesMut::from(&b"GET / HTTP/1.0\r\n"[..]);
        buf.extend_from_slice(&vec![b'x'; MAX_HEAD_LEN]);
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(RequestHead { path: None })
        );
        buf.extend_from_slice(b"\r\n\r\n");
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_eof_without_request() {
        let mut codec = ServerCodec::default();
        let mut buf = BytesMut::new();
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
    }

    #[test]
    fn decode_eof_within_headers() {
        let mut codec = ServerCodec::default();
        let mut buf = BytesMut::from(&b"GET /import HTTP/1.0\r\nHost: x\r\n"[..]);
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), head("/import"));
    }

    #[test]
    fn decode_eof_with_partial_request_line() {
        let mut codec = ServerCodec::default();
        let mut buf = BytesMut::from(&b"GET /power HTTP/1.0"[..]);
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), head("/power"));
    }

    #[test]
    fn encode_response() {
        let mut codec = ServerCodec::default();
        let mut buf = BytesMut::new();
        let body = Bytes::from_static(br#"{"status":"error","error":"Invalid endpoint"}"#);
        codec
            .encode(
                Response {
                    status: StatusCode::NotFound,
                    body: body.clone(),
                },
                &mut buf,
            )
            .unwrap();
        let expected = format!(
            "HTTP/1.0 404 Not Found\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            std::str::from_utf8(&body).unwrap()
        );
        assert_eq!(&buf[..], expected.as_bytes());
    }
}
