//! zlib and gzip codecs over flate2's low-level streams.
//!
//! The gzip wrapper (header, CRC32 + size trailer) is framed here around a
//! raw deflate stream, so chunked input keeps byte-exact `n_in` accounting
//! and decompression can auto-detect zlib vs. gzip from the magic bytes.

use crate::{for_chunks, ComprStatus};
use asynckit_core::{Error, OpResult};
use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

const OUT_CHUNK: usize = 16 * 1024;
const GZIP_HEADER: [u8; 10] = [0x1f, 0x8b, 8, 0, 0, 0, 0, 0, 0, 0xff];

#[derive(Clone, Copy, Debug)]
pub struct ZlibOpts {
    pub gzip: bool,
    /// 0..=9.
    pub level: u32,
}

impl Default for ZlibOpts {
    fn default() -> Self {
        ZlibOpts { gzip: false, level: 6 }
    }
}

fn zlib_err(e: impl std::fmt::Display) -> Error {
    Error::Compr { codec: "zlib", detail: e.to_string() }
}

fn gzip_err(detail: &str) -> Error {
    Error::Compr { codec: "gzip", detail: detail.to_string() }
}

/// Compresses the whole of `input`, feeding it in `chunk`-byte pieces
/// (`chunk == 0` feeds everything at once).
pub fn zlib_compress(
    out: &mut Vec<u8>,
    input: &[u8],
    opts: ZlibOpts,
    chunk: usize,
) -> OpResult<ComprStatus> {
    let mut compr = ZlibCompressor::new(opts);
    let mut total = for_chunks(input, chunk, |piece| compr.append(out, piece))?;
    total.merge(compr.finish(out)?);
    Ok(total)
}

/// Decompresses the whole of `input`; header kind is auto-detected unless
/// `opts.gzip` forces the gzip framing.
pub fn zlib_decompress(
    out: &mut Vec<u8>,
    input: &[u8],
    opts: ZlibOpts,
    chunk: usize,
) -> OpResult<ComprStatus> {
    let mut decompr = ZlibDecompressor::new(opts);
    for_chunks(input, chunk, |piece| decompr.append(out, piece))
}

pub struct ZlibCompressor {
    inner: Compress,
    gzip: bool,
    header_written: bool,
    crc: flate2::Crc,
    finished: bool,
}

impl ZlibCompressor {
    pub fn new(opts: ZlibOpts) -> Self {
        ZlibCompressor {
            // Raw deflate inside the gzip framing, zlib wrapper otherwise.
            inner: Compress::new(Compression::new(opts.level), !opts.gzip),
            gzip: opts.gzip,
            header_written: false,
            crc: flate2::Crc::new(),
            finished: false,
        }
    }

    pub fn append(&mut self, out: &mut Vec<u8>, input: &[u8]) -> OpResult<ComprStatus> {
        assert!(!self.finished, "compressor used after finish");
        let start = out.len();
        if self.gzip {
            if !self.header_written {
                out.extend_from_slice(&GZIP_HEADER);
                self.header_written = true;
            }
            self.crc.update(input);
        }
        let mut consumed = 0;
        while consumed < input.len() {
            out.reserve(OUT_CHUNK);
            let before = self.inner.total_in();
            self.inner
                .compress_vec(&input[consumed..], out, FlushCompress::None)
                .map_err(zlib_err)?;
            consumed += (self.inner.total_in() - before) as usize;
        }
        Ok(ComprStatus { n_in: input.len(), n_out: out.len() - start, is_end: false })
    }

    pub fn finish(&mut self, out: &mut Vec<u8>) -> OpResult<ComprStatus> {
        assert!(!self.finished, "compressor finished twice");
        self.finished = true;
        let start = out.len();
        if self.gzip && !self.header_written {
            out.extend_from_slice(&GZIP_HEADER);
            self.header_written = true;
        }
        loop {
            out.reserve(OUT_CHUNK);
            let status =
                self.inner.compress_vec(&[], out, FlushCompress::Finish).map_err(zlib_err)?;
            if let Status::StreamEnd = status {
                break;
            }
        }
        if self.gzip {
            out.extend_from_slice(&self.crc.sum().to_le_bytes());
            out.extend_from_slice(&self.crc.amount().to_le_bytes());
        }
        Ok(ComprStatus { n_in: 0, n_out: out.len() - start, is_end: true })
    }
}

enum DecoderKind {
    /// Not decided yet; header bytes may still be buffering up.
    Probing,
    Zlib(Decompress),
    /// Gzip framing around a raw inflate stream.
    GzipHeader,
    GzipBody(Decompress),
    GzipTrailer,
}

pub struct ZlibDecompressor {
    kind: DecoderKind,
    /// Unconsumed header/trailer bytes carried across appends.
    carry: Vec<u8>,
    crc: flate2::Crc,
    finished: bool,
}

impl ZlibDecompressor {
    pub fn new(opts: ZlibOpts) -> Self {
        ZlibDecompressor {
            kind: if opts.gzip { DecoderKind::GzipHeader } else { DecoderKind::Probing },
            carry: Vec::new(),
            crc: flate2::Crc::new(),
            finished: false,
        }
    }

    /// Feeds one chunk. `is_end` turns true on the append that completes the
    /// stream (including the gzip trailer check).
    pub fn append(&mut self, out: &mut Vec<u8>, input: &[u8]) -> OpResult<ComprStatus> {
        let start_out = out.len();
        let mut n_in = 0;

        if self.finished {
            return Ok(ComprStatus { n_in: 0, n_out: 0, is_end: true });
        }

        if let DecoderKind::Probing = self.kind {
            // Buffer until the two magic bytes are visible. Buffered bytes
            // count as consumed and are re-fed to the decoder later.
            if self.carry.len() + input.len() < 2 {
                self.carry.extend_from_slice(input);
                return Ok(ComprStatus { n_in: input.len(), n_out: 0, is_end: false });
            }
            let (m0, m1) = if self.carry.is_empty() {
                (input[0], input[1])
            } else {
                (self.carry[0], *self.carry.get(1).unwrap_or(&input[0]))
            };
            self.kind = match (m0, m1) {
                (0x1f, 0x8b) => DecoderKind::GzipHeader,
                (0x78, 0x01) | (0x78, 0x9c) | (0x78, 0xda) => {
                    DecoderKind::Zlib(Decompress::new(true))
                }
                _ => return Err(zlib_err("unrecognized stream header")),
            };
        }

        let mut rest = input;
        loop {
            match &mut self.kind {
                DecoderKind::Probing => unreachable!("probing resolved above"),
                DecoderKind::Zlib(inner) => {
                    if !self.carry.is_empty() {
                        // Magic bytes buffered during probing; already
                        // counted toward n_in.
                        let carry = std::mem::take(&mut self.carry);
                        let (used, ended) = run_inflate(inner, out, &carry)?;
                        debug_assert_eq!(used, carry.len(), "inflate stalled on carried bytes");
                        if ended {
                            self.finished = true;
                            break;
                        }
                    }
                    let (used, ended) = run_inflate(inner, out, rest)?;
                    n_in += used;
                    if ended {
                        self.finished = true;
                    }
                    break;
                }
                DecoderKind::GzipHeader => {
                    self.carry.extend_from_slice(rest);
                    n_in += rest.len();
                    rest = &[];
                    match parse_gzip_header(&self.carry)? {
                        Some(consumed) => {
                            self.carry.drain(..consumed);
                            self.kind = DecoderKind::GzipBody(Decompress::new(false));
                        }
                        None => break,
                    }
                }
                DecoderKind::GzipBody(inner) => {
                    // Drain carried-over bytes first, then the live input;
                    // CRC the plaintext as it is produced.
                    let ended = if !self.carry.is_empty() {
                        let carry = std::mem::take(&mut self.carry);
                        let produced = out.len();
                        let (used, ended) = run_inflate(inner, out, &carry)?;
                        self.crc.update(&out[produced..]);
                        if used < carry.len() {
                            // Post-stream bytes: the start of the trailer.
                            self.carry = carry[used..].to_vec();
                        }
                        ended
                    } else {
                        let produced = out.len();
                        let (used, ended) = run_inflate(inner, out, rest)?;
                        self.crc.update(&out[produced..]);
                        n_in += used;
                        rest = &rest[used..];
                        ended
                    };
                    if !ended {
                        break;
                    }
                    self.kind = DecoderKind::GzipTrailer;
                }
                DecoderKind::GzipTrailer => {
                    let want = 8usize.saturating_sub(self.carry.len());
                    let take = want.min(rest.len());
                    self.carry.extend_from_slice(&rest[..take]);
                    n_in += take;
                    if self.carry.len() < 8 {
                        break;
                    }
                    let sum = u32::from_le_bytes(self.carry[0..4].try_into().unwrap());
                    if sum != self.crc.sum() {
                        return Err(gzip_err("trailer crc mismatch"));
                    }
                    self.carry.clear();
                    self.finished = true;
                    break;
                }
            }
        }

        Ok(ComprStatus { n_in, n_out: out.len() - start_out, is_end: self.finished })
    }
}

/// Runs inflate until `input` is consumed or the stream ends; returns
/// (input consumed, stream ended).
fn run_inflate(inner: &mut Decompress, out: &mut Vec<u8>, input: &[u8]) -> OpResult<(usize, bool)> {
    let mut consumed = 0;
    loop {
        out.reserve(OUT_CHUNK);
        let before_in = inner.total_in();
        let before_out = out.len();
        let status = inner
            .decompress_vec(&input[consumed..], out, FlushDecompress::None)
            .map_err(zlib_err)?;
        consumed += (inner.total_in() - before_in) as usize;
        match status {
            Status::StreamEnd => return Ok((consumed, true)),
            Status::Ok | Status::BufError => {
                // Keep going while there is input left or buffered output
                // still draining into the freshly reserved space.
                if consumed >= input.len() && out.len() == before_out {
                    return Ok((consumed, false));
                }
            }
        }
    }
}

/// Returns the header length once the buffer holds a complete gzip header.
fn parse_gzip_header(buf: &[u8]) -> OpResult<Option<usize>> {
    if buf.len() < 10 {
        return Ok(None);
    }
    if buf[0] != 0x1f || buf[1] != 0x8b {
        return Err(gzip_err("bad magic"));
    }
    if buf[2] != 8 {
        return Err(gzip_err("unsupported compression method"));
    }
    let flags = buf[3];
    let mut at = 10;
    if flags & 0x04 != 0 {
        // FEXTRA
        if buf.len() < at + 2 {
            return Ok(None);
        }
        let xlen = u16::from_le_bytes([buf[at], buf[at + 1]]) as usize;
        at += 2 + xlen;
        if buf.len() < at {
            return Ok(None);
        }
    }
    for flag in [0x08, 0x10] {
        // FNAME, FCOMMENT: zero-terminated
        if flags & flag != 0 {
            match buf[at..].iter().position(|b| *b == 0) {
                Some(p) => at += p + 1,
                None => return Ok(None),
            }
        }
    }
    if flags & 0x02 != 0 {
        // FHCRC
        at += 2;
        if buf.len() < at {
            return Ok(None);
        }
    }
    Ok(Some(at))
}
