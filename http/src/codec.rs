//! HTTP/1.1 head parsing and serialization over `http` crate types.

use crate::{Request, Response};
use asynckit_core::{Error, OpResult};
use http::header::{HeaderName, HeaderValue, CONTENT_LENGTH};
use http::{Method, StatusCode, Uri, Version};

/// Result of trying to parse a message out of a growing buffer.
#[derive(Debug)]
pub enum ParseOutcome<T> {
    /// Head not complete yet; read more.
    Incomplete,
    /// Parsed a full message, consuming `consumed` buffer bytes; the body may
    /// still need `body_missing` more bytes appended by the caller.
    Complete { msg: T, consumed: usize, body_missing: usize },
}

const MAX_HEAD: usize = 64 * 1024;

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
}

fn split_head_lines(head: &[u8]) -> OpResult<Vec<&str>> {
    let head = std::str::from_utf8(head).map_err(|_| Error::Http("malformed header section"))?;
    Ok(head.split("\r\n").filter(|l| !l.is_empty()).collect())
}

fn parse_headers<'a>(
    lines: impl Iterator<Item = &'a str>,
    headers: &mut http::HeaderMap,
) -> OpResult<usize> {
    let mut content_length = 0;
    for line in lines {
        let (name, value) = line.split_once(':').ok_or(Error::Http("malformed header line"))?;
        let name = HeaderName::from_bytes(name.trim().as_bytes())
            .map_err(|_| Error::Http("malformed header line"))?;
        let value = HeaderValue::from_str(value.trim())
            .map_err(|_| Error::Http("malformed header line"))?;
        if name == CONTENT_LENGTH {
            content_length =
                value.to_str().ok().and_then(|v| v.parse().ok()).ok_or(Error::Http("bad content-length"))?;
        }
        headers.append(name, value);
    }
    Ok(content_length)
}

fn parse_version(s: &str) -> OpResult<Version> {
    match s {
        "HTTP/1.1" => Ok(Version::HTTP_11),
        "HTTP/1.0" => Ok(Version::HTTP_10),
        _ => Err(Error::Http("unsupported http version")),
    }
}

/// Parses a request head (plus however much body the buffer already holds)
/// from `buf`.
pub fn parse_request(buf: &[u8]) -> OpResult<ParseOutcome<Request>> {
    let Some(head_end) = find_head_end(buf) else {
        if buf.len() > MAX_HEAD {
            return Err(Error::Http("header section too large"));
        }
        return Ok(ParseOutcome::Incomplete);
    };
    let lines = split_head_lines(&buf[..head_end])?;
    let mut lines = lines.into_iter();
    let bad_start = || Error::Http("malformed request line");
    let start = lines.next().ok_or_else(bad_start)?;
    let mut parts = start.split(' ').filter(|p| !p.is_empty());
    let method = Method::from_bytes(parts.next().ok_or_else(bad_start)?.as_bytes())
        .map_err(|_| bad_start())?;
    let uri: Uri = parts.next().ok_or_else(bad_start)?.parse().map_err(|_| bad_start())?;
    let version = parse_version(parts.next().ok_or_else(bad_start)?)?;

    let mut builder = http::Request::builder().method(method).uri(uri).version(version);
    let content_length =
        parse_headers(lines, builder.headers_mut().expect("fresh request builder"))?;

    let have = (buf.len() - head_end).min(content_length);
    let body = buf[head_end..head_end + have].to_vec();
    let msg = builder.body(body).map_err(|_| Error::Http("malformed message head"))?;
    Ok(ParseOutcome::Complete {
        msg,
        consumed: head_end + have,
        body_missing: content_length - have,
    })
}

/// Parses a response head (plus available body) from `buf`.
pub fn parse_response(buf: &[u8]) -> OpResult<ParseOutcome<Response>> {
    let Some(head_end) = find_head_end(buf) else {
        if buf.len() > MAX_HEAD {
            return Err(Error::Http("header section too large"));
        }
        return Ok(ParseOutcome::Incomplete);
    };
    let lines = split_head_lines(&buf[..head_end])?;
    let mut lines = lines.into_iter();
    let bad_start = || Error::Http("malformed status line");
    let start = lines.next().ok_or_else(bad_start)?;
    let mut parts = start.splitn(3, ' ');
    let version = parse_version(parts.next().ok_or_else(bad_start)?)?;
    let status = StatusCode::from_bytes(parts.next().ok_or_else(bad_start)?.as_bytes())
        .map_err(|_| bad_start())?;

    let mut builder = http::Response::builder().status(status).version(version);
    let content_length =
        parse_headers(lines, builder.headers_mut().expect("fresh response builder"))?;

    let have = (buf.len() - head_end).min(content_length);
    let body = buf[head_end..head_end + have].to_vec();
    let msg = builder.body(body).map_err(|_| Error::Http("malformed message head"))?;
    Ok(ParseOutcome::Complete {
        msg,
        consumed: head_end + have,
        body_missing: content_length - have,
    })
}

/// Serializes a request with Content-Length framing. A user-set
/// Content-Length header is overridden by the actual body length.
pub fn serialize_request(req: &Request) -> Vec<u8> {
    let mut out = Vec::with_capacity(256 + req.body().len());
    out.extend_from_slice(req.method().as_str().as_bytes());
    out.push(b' ');
    out.extend_from_slice(req.uri().path_and_query().map(|p| p.as_str()).unwrap_or("/").as_bytes());
    out.extend_from_slice(b" HTTP/1.1\r\n");
    serialize_headers(req.headers(), req.body().len(), &mut out);
    out.extend_from_slice(req.body());
    out
}

pub fn serialize_response(resp: &Response) -> Vec<u8> {
    let mut out = Vec::with_capacity(256 + resp.body().len());
    out.extend_from_slice(b"HTTP/1.1 ");
    out.extend_from_slice(resp.status().as_str().as_bytes());
    out.push(b' ');
    out.extend_from_slice(resp.status().canonical_reason().unwrap_or("Unknown").as_bytes());
    out.extend_from_slice(b"\r\n");
    serialize_headers(resp.headers(), resp.body().len(), &mut out);
    out.extend_from_slice(resp.body());
    out
}

fn serialize_headers(headers: &http::HeaderMap, body_len: usize, out: &mut Vec<u8>) {
    for (name, value) in headers {
        if name == CONTENT_LENGTH {
            continue;
        }
        out.extend_from_slice(name.as_str().as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(format!("content-length: {body_len}\r\n\r\n").as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    #[test]
    fn request_round_trip() {
        let req = http::Request::builder()
            .method(Method::POST)
            .uri("/echo")
            .header("test_hdr", "7")
            .body(b"payload".to_vec())
            .unwrap();
        let wire = serialize_request(&req);
        let ParseOutcome::Complete { msg, consumed, body_missing } =
            parse_request(&wire).unwrap()
        else {
            panic!("expected a complete request");
        };
        assert_eq!(consumed, wire.len());
        assert_eq!(body_missing, 0);
        assert_eq!(msg.method(), Method::POST);
        assert_eq!(msg.uri().path(), "/echo");
        assert_eq!(msg.headers()["test_hdr"], "7");
        assert_eq!(msg.body(), b"payload");
    }

    #[test]
    fn response_round_trip() {
        let resp = http::Response::builder()
            .status(StatusCode::OK)
            .header("test_hdr", "9")
            .body(b"hello".to_vec())
            .unwrap();
        let wire = serialize_response(&resp);
        let ParseOutcome::Complete { msg, .. } = parse_response(&wire).unwrap() else {
            panic!("expected a complete response");
        };
        assert_eq!(msg.status(), StatusCode::OK);
        assert_eq!(msg.headers()["test_hdr"], "9");
        assert_eq!(msg.body(), b"hello");
    }

    #[test]
    fn partial_head_is_incomplete() {
        assert_matches!(
            parse_request(b"POST /echo HTTP/1.1\r\ncontent-le").unwrap(),
            ParseOutcome::Incomplete
        );
    }

    #[test]
    fn partial_body_reports_missing_bytes() {
        let wire = b"POST / HTTP/1.1\r\ncontent-length: 10\r\n\r\n12345";
        let ParseOutcome::Complete { msg, consumed, body_missing } =
            parse_request(wire).unwrap()
        else {
            panic!("expected a complete head");
        };
        assert_eq!(msg.body(), b"12345");
        assert_eq!(consumed, wire.len());
        assert_eq!(body_missing, 5);
    }

    #[test]
    fn garbage_head_is_a_protocol_error() {
        assert_matches!(parse_request(b"nonsense\r\n\r\n"), Err(Error::Http(_)));
    }
}
