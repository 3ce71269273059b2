//! A single-connection HTTP client that transparently replaces a connection
//! the server closed between exchanges.

use crate::conn::{HttpConn, ERR_CLOSED_BEFORE_RESPONSE};
use crate::{Request, Response};
use asynckit_core::{wait, Error, OpResult};
use asynckit_io::TcpStream;
use std::net::SocketAddr;

pub struct HttpClient {
    addr: SocketAddr,
    conn: Option<HttpConn>,
}

impl HttpClient {
    pub fn new(addr: SocketAddr) -> Self {
        HttpClient { addr, conn: None }
    }

    /// Sends `req` and awaits the response. If a previously used connection
    /// turns out to be dead (the server closed it after an earlier
    /// exchange), acquires a fresh one and retries the request once.
    pub async fn send(&mut self, req: &Request) -> OpResult<Response> {
        let reused = self.conn.is_some();
        match self.try_send(req).await {
            Ok(resp) => Ok(resp),
            Err(e) if reused && retriable(&e) => {
                tracing::debug!(target: "asynckit", "retrying request on a fresh connection: {e}");
                self.conn = None;
                self.try_send(req).await
            }
            Err(e) => {
                self.conn = None;
                Err(e)
            }
        }
    }

    async fn try_send(&mut self, req: &Request) -> OpResult<Response> {
        if self.conn.is_none() {
            let stream = wait(TcpStream::connect(self.addr)).await?;
            self.conn = Some(HttpConn::new(stream));
        }
        let conn = self.conn.as_mut().unwrap();
        match conn.round_trip(req).await {
            Ok(resp) => Ok(resp),
            Err(e) => {
                // Never reuse a connection after a failed exchange.
                self.conn = None;
                Err(e)
            }
        }
    }
}

/// Failures that smell like "the server closed the connection under us"
/// rather than a protocol or application error. The write side surfaces the
/// close as an I/O error, the read side as the closed-before-response
/// protocol error.
fn retriable(e: &Error) -> bool {
    match e {
        Error::Http(msg) => *msg == ERR_CLOSED_BEFORE_RESPONSE,
        Error::Io(io) => matches!(
            io.kind(),
            std::io::ErrorKind::UnexpectedEof
                | std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::BrokenPipe
        ),
        _ => false,
    }
}
