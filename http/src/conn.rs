//! An HTTP/1.1 connection over asynckit TCP ops.

use crate::codec::{parse_request, parse_response, serialize_request, serialize_response, ParseOutcome};
use crate::{Request, Response};
use asynckit_core::{wait, Error, OpResult};
use asynckit_io::TcpStream;

const READ_CHUNK: usize = 8 * 1024;

pub struct HttpConn {
    stream: TcpStream,
    buf: Vec<u8>,
}

impl HttpConn {
    pub fn new(stream: TcpStream) -> Self {
        HttpConn { stream, buf: Vec::new() }
    }

    /// Reads one request. `Ok(None)` when the peer closed the connection
    /// cleanly between messages.
    pub async fn read_request(&mut self) -> OpResult<Option<Request>> {
        loop {
            match parse_request(&self.buf)? {
                ParseOutcome::Complete { mut msg, consumed, body_missing } => {
                    self.buf.drain(..consumed);
                    self.read_rest_of_body(msg.body_mut(), body_missing).await?;
                    return Ok(Some(msg));
                }
                ParseOutcome::Incomplete => {
                    if !self.fill().await? {
                        if self.buf.is_empty() {
                            return Ok(None);
                        }
                        return Err(Error::Http(ERR_CLOSED_MID_MESSAGE));
                    }
                }
            }
        }
    }

    /// Reads one response. A close before any byte of the head is reported
    /// as [`ERR_CLOSED_BEFORE_RESPONSE`]; [`crate::HttpClient`] uses that to
    /// retire the connection and retry.
    pub async fn read_response(&mut self) -> OpResult<Response> {
        loop {
            match parse_response(&self.buf)? {
                ParseOutcome::Complete { mut msg, consumed, body_missing } => {
                    self.buf.drain(..consumed);
                    self.read_rest_of_body(msg.body_mut(), body_missing).await?;
                    return Ok(msg);
                }
                ParseOutcome::Incomplete => {
                    if !self.fill().await? {
                        if self.buf.is_empty() {
                            return Err(Error::Http(ERR_CLOSED_BEFORE_RESPONSE));
                        }
                        return Err(Error::Http(ERR_CLOSED_MID_MESSAGE));
                    }
                }
            }
        }
    }

    pub async fn write_request(&mut self, req: &Request) -> OpResult<()> {
        wait(self.stream.write_all(serialize_request(req))).await
    }

    pub async fn write_response(&mut self, resp: &Response) -> OpResult<()> {
        wait(self.stream.write_all(serialize_response(resp))).await
    }

    /// Writes `req` and reads the matching response.
    pub async fn round_trip(&mut self, req: &Request) -> OpResult<Response> {
        self.write_request(req).await?;
        self.read_response().await
    }

    async fn read_rest_of_body(&mut self, body: &mut Vec<u8>, mut missing: usize) -> OpResult<()> {
        while missing > 0 {
            if !self.fill().await? {
                return Err(Error::Http(ERR_CLOSED_MID_MESSAGE));
            }
            let take = missing.min(self.buf.len());
            body.extend_from_slice(&self.buf[..take]);
            self.buf.drain(..take);
            missing -= take;
        }
        Ok(())
    }

    /// Appends one read's worth of bytes; false on EOF.
    async fn fill(&mut self) -> OpResult<bool> {
        let chunk = wait(self.stream.read_some(READ_CHUNK)).await?;
        if chunk.is_empty() {
            return Ok(false);
        }
        self.buf.extend_from_slice(&chunk);
        Ok(true)
    }
}

/// The server closed the connection between exchanges; the request never got
/// an answer and is safe to replay on a fresh connection.
pub const ERR_CLOSED_BEFORE_RESPONSE: &str = "connection closed before response";

pub const ERR_CLOSED_MID_MESSAGE: &str = "connection closed mid-message";
