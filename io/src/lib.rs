//! Blocking-offload I/O for asynckit: a default I/O scheduler, timer ops and
//! TCP ops over `std::net`, all conforming to the async-op contract.
//!
//! Every entry point that uses the default pool also exists in an `_on`
//! variant taking an explicit resumer, so the process-wide singleton is a
//! convenience, not a requirement.

pub mod offload;
pub mod pool;
pub mod tcp;
pub mod timer;

pub use offload::{offload, offload_on, Offload};
pub use pool::{io_pool, io_resumer};
pub use tcp::{TcpListener, TcpStream};
pub use timer::{sleep, sleep_until, Sleep};
