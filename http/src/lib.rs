//! Minimal HTTP/1.1 plumbing over asynckit's TCP ops: message codec,
//! connection, reconnecting client and Range-header utilities.
//!
//! Scope: Content-Length framing only; requests and responses carry owned
//! byte bodies. Everything network-facing goes through the async-op
//! contract, so cancellation and resumer routing behave like any other op.

mod client;
mod codec;
mod conn;
mod range;

pub use client::HttpClient;
pub use codec::{parse_request, parse_response, serialize_request, serialize_response, ParseOutcome};
pub use conn::{HttpConn, ERR_CLOSED_BEFORE_RESPONSE, ERR_CLOSED_MID_MESSAGE};
pub use range::{parse_single_range_header, HttpRange, ResolvedRange};

pub type Request = http::Request<Vec<u8>>;
pub type Response = http::Response<Vec<u8>>;
