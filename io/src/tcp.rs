//! TCP ops over `std::net`, offloaded to the I/O pool.
//!
//! Reads and writes run as blocking calls on pool threads; cancellation is
//! hooked through stop callbacks that shut the socket down (reads/writes) or
//! flag the polling accept loop. Completions are posted wherever the op's
//! continuation routing says, like every other op.

use crate::pool::io_resumer;
use asynckit_core::op::{AsyncOp, Initiated, OpSlot};
use asynckit_core::stop::StopToken;
use asynckit_core::{Continuation, Error, OpCtx, OpResult};
use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, ToSocketAddrs};
use std::time::Duration;

/// Shared initiation path of the blocking ops below: stop pre-check, arm,
/// optional cancel hook, then the blocking closure on the I/O pool.
fn initiate_blocking<T: Send + 'static>(
    ctx: &OpCtx,
    cont: Continuation,
    slot: &OpSlot<T>,
    cancel: Option<Box<dyn FnOnce() + Send>>,
    work: impl FnOnce(&StopToken) -> OpResult<T> + Send + 'static,
) -> Initiated {
    if ctx.stop_requested() {
        slot.complete(Err(Error::Canceled));
        return Initiated::Done;
    }
    let armed = slot.arm(cont);
    assert!(armed, "op initiated twice");
    if let Some(cancel) = cancel {
        let cb = ctx.stop_token().register(cancel);
        slot.set_stop_cb(cb);
    }
    let token = ctx.stop_token();
    let slot = slot.clone();
    io_resumer().post(Continuation::from_fn(move || {
        let r = work(&token);
        slot.complete(r);
    }));
    Initiated::Pending
}

/// Maps a blocking-call error, preferring `Canceled` when the failure was
/// provoked by our own stop hook shutting the socket down.
fn map_io(token: &StopToken, e: std::io::Error) -> Error {
    if token.stop_requested() {
        Error::Canceled
    } else {
        Error::Io(e)
    }
}

pub struct TcpListener {
    inner: std::net::TcpListener,
}

impl TcpListener {
    pub fn bind(addr: impl ToSocketAddrs) -> OpResult<TcpListener> {
        let inner = std::net::TcpListener::bind(addr)?;
        // Accept runs as a polling loop so a stop request can interrupt it.
        inner.set_nonblocking(true)?;
        Ok(TcpListener { inner })
    }

    pub fn local_addr(&self) -> OpResult<SocketAddr> {
        Ok(self.inner.local_addr()?)
    }

    pub fn accept(&self) -> Accept {
        Accept { listener: self.inner.try_clone(), slot: OpSlot::new() }
    }
}

pub struct Accept {
    listener: std::io::Result<std::net::TcpListener>,
    slot: OpSlot<TcpStream>,
}

impl AsyncOp for Accept {
    type Output = TcpStream;

    fn initiate(&mut self, ctx: &OpCtx, cont: Continuation) -> Initiated {
        let listener = match self.listener.take_ok() {
            Ok(l) => l,
            Err(e) => {
                self.slot.complete(Err(Error::Io(e)));
                return Initiated::Done;
            }
        };
        initiate_blocking(ctx, cont, &self.slot, None, move |token| loop {
            match listener.accept() {
                Ok((stream, _peer)) => {
                    stream.set_nonblocking(false)?;
                    return Ok(TcpStream { inner: stream });
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    if token.stop_requested() {
                        return Err(Error::Canceled);
                    }
                    std::thread::sleep(Duration::from_millis(2));
                }
                Err(e) => return Err(Error::Io(e)),
            }
        })
    }

    fn is_failed(&self) -> bool {
        self.slot.is_failed()
    }

    fn take_result(&mut self) -> OpResult<TcpStream> {
        self.slot.take()
    }
}

#[derive(Debug)]
pub struct TcpStream {
    inner: std::net::TcpStream,
}

impl TcpStream {
    /// Blocking-connect offloaded to the pool. Cancellation is checked before
    /// the connect call only.
    pub fn connect(addr: SocketAddr) -> Connect {
        Connect { addr, slot: OpSlot::new() }
    }

    pub fn peer_addr(&self) -> OpResult<SocketAddr> {
        Ok(self.inner.peer_addr()?)
    }

    pub fn shutdown(&self) -> OpResult<()> {
        Ok(self.inner.shutdown(Shutdown::Both)?)
    }

    /// Reads up to `max` bytes; an empty result means the peer closed.
    pub fn read_some(&self, max: usize) -> ReadSome {
        ReadSome { stream: self.inner.try_clone(), max, slot: OpSlot::new() }
    }

    pub fn write_all(&self, data: Vec<u8>) -> WriteAll {
        WriteAll { stream: self.inner.try_clone(), data, slot: OpSlot::new() }
    }
}

pub struct Connect {
    addr: SocketAddr,
    slot: OpSlot<TcpStream>,
}

impl AsyncOp for Connect {
    type Output = TcpStream;

    fn initiate(&mut self, ctx: &OpCtx, cont: Continuation) -> Initiated {
        let addr = self.addr;
        initiate_blocking(ctx, cont, &self.slot, None, move |token| {
            let stream = std::net::TcpStream::connect(addr).map_err(|e| map_io(token, e))?;
            Ok(TcpStream { inner: stream })
        })
    }

    fn is_failed(&self) -> bool {
        self.slot.is_failed()
    }

    fn take_result(&mut self) -> OpResult<TcpStream> {
        self.slot.take()
    }
}

pub struct ReadSome {
    stream: std::io::Result<std::net::TcpStream>,
    max: usize,
    slot: OpSlot<Vec<u8>>,
}

impl AsyncOp for ReadSome {
    type Output = Vec<u8>;

    fn initiate(&mut self, ctx: &OpCtx, cont: Continuation) -> Initiated {
        let stream = match self.stream.take_ok() {
            Ok(s) => s,
            Err(e) => {
                self.slot.complete(Err(Error::Io(e)));
                return Initiated::Done;
            }
        };
        let cancel = stream.try_clone().ok().map(|s| {
            Box::new(move || {
                let _ = s.shutdown(Shutdown::Both);
            }) as Box<dyn FnOnce() + Send>
        });
        let max = self.max;
        initiate_blocking(ctx, cont, &self.slot, cancel, move |token| {
            let mut buf = vec![0; max];
            let mut stream = stream;
            match stream.read(&mut buf) {
                Ok(n) => {
                    if n == 0 && token.stop_requested() {
                        return Err(Error::Canceled);
                    }
                    buf.truncate(n);
                    Ok(buf)
                }
                Err(e) => Err(map_io(token, e)),
            }
        })
    }

    fn is_failed(&self) -> bool {
        self.slot.is_failed()
    }

    fn take_result(&mut self) -> OpResult<Vec<u8>> {
        self.slot.take()
    }
}

pub struct WriteAll {
    stream: std::io::Result<std::net::TcpStream>,
    data: Vec<u8>,
    slot: OpSlot<()>,
}

impl AsyncOp for WriteAll {
    type Output = ();

    fn initiate(&mut self, ctx: &OpCtx, cont: Continuation) -> Initiated {
        let stream = match self.stream.take_ok() {
            Ok(s) => s,
            Err(e) => {
                self.slot.complete(Err(Error::Io(e)));
                return Initiated::Done;
            }
        };
        let cancel = stream.try_clone().ok().map(|s| {
            Box::new(move || {
                let _ = s.shutdown(Shutdown::Both);
            }) as Box<dyn FnOnce() + Send>
        });
        let data = std::mem::take(&mut self.data);
        initiate_blocking(ctx, cont, &self.slot, cancel, move |token| {
            let mut stream = stream;
            stream.write_all(&data).map_err(|e| map_io(token, e))?;
            Ok(())
        })
    }

    fn is_failed(&self) -> bool {
        self.slot.is_failed()
    }

    fn take_result(&mut self) -> OpResult<()> {
        self.slot.take()
    }
}

/// Moves the `Ok` handle out, leaving a "taken" error behind.
trait TakeOk {
    type Val;
    fn take_ok(&mut self) -> std::io::Result<Self::Val>;
}

impl<T> TakeOk for std::io::Result<T> {
    type Val = T;

    fn take_ok(&mut self) -> std::io::Result<T> {
        std::mem::replace(
            self,
            Err(std::io::Error::new(std::io::ErrorKind::Other, "op initiated twice")),
        )
    }
}
