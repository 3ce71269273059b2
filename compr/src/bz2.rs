//! bzip2 codec over the low-level stream API.

use crate::{for_chunks, ComprStatus};
use asynckit_core::{Error, OpResult};
use bzip2::{Action, Compress, Compression, Decompress, Status};

const OUT_CHUNK: usize = 16 * 1024;

#[derive(Clone, Copy, Debug)]
pub struct Bz2Opts {
    /// Block size, 1..=9.
    pub level: u32,
    pub work_factor: u32,
}

impl Default for Bz2Opts {
    fn default() -> Self {
        Bz2Opts { level: 9, work_factor: 30 }
    }
}

fn bz2_err(e: impl std::fmt::Display) -> Error {
    Error::Compr { codec: "bz2", detail: e.to_string() }
}

pub fn bz2_compress(
    out: &mut Vec<u8>,
    input: &[u8],
    opts: Bz2Opts,
    chunk: usize,
) -> OpResult<ComprStatus> {
    let mut compr = Bz2Compressor::new(opts);
    let mut total = for_chunks(input, chunk, |piece| compr.append(out, piece))?;
    total.merge(compr.finish(out)?);
    Ok(total)
}

pub fn bz2_decompress(
    out: &mut Vec<u8>,
    input: &[u8],
    _opts: Bz2Opts,
    chunk: usize,
) -> OpResult<ComprStatus> {
    let mut decompr = Bz2Decompressor::new();
    for_chunks(input, chunk, |piece| decompr.append(out, piece))
}

pub struct Bz2Compressor {
    inner: Compress,
    finished: bool,
}

impl Bz2Compressor {
    pub fn new(opts: Bz2Opts) -> Self {
        Bz2Compressor {
            inner: Compress::new(Compression::new(opts.level), opts.work_factor),
            finished: false,
        }
    }

    pub fn append(&mut self, out: &mut Vec<u8>, input: &[u8]) -> OpResult<ComprStatus> {
        assert!(!self.finished, "compressor used after finish");
        let start = out.len();
        let mut consumed = 0;
        while consumed < input.len() {
            out.reserve(OUT_CHUNK);
            let before = self.inner.total_in();
            self.inner
                .compress_vec(&input[consumed..], out, Action::Run)
                .map_err(bz2_err)?;
            consumed += (self.inner.total_in() - before) as usize;
        }
        Ok(ComprStatus { n_in: input.len(), n_out: out.len() - start, is_end: false })
    }

    pub fn finish(&mut self, out: &mut Vec<u8>) -> OpResult<ComprStatus> {
        assert!(!self.finished, "compressor finished twice");
        self.finished = true;
        let start = out.len();
        loop {
            out.reserve(OUT_CHUNK);
            let status = self.inner.compress_vec(&[], out, Action::Finish).map_err(bz2_err)?;
            if let Status::StreamEnd = status {
                break;
            }
        }
        Ok(ComprStatus { n_in: 0, n_out: out.len() - start, is_end: true })
    }
}

pub struct Bz2Decompressor {
    inner: Decompress,
    finished: bool,
}

impl Default for Bz2Decompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Bz2Decompressor {
    pub fn new() -> Self {
        Bz2Decompressor { inner: Decompress::new(false), finished: false }
    }

    pub fn append(&mut self, out: &mut Vec<u8>, input: &[u8]) -> OpResult<ComprStatus> {
        let start = out.len();
        if self.finished {
            return Ok(ComprStatus { n_in: 0, n_out: 0, is_end: true });
        }
        let mut consumed = 0;
        loop {
            out.reserve(OUT_CHUNK);
            let before_in = self.inner.total_in();
            let before_out = out.len();
            let status =
                self.inner.decompress_vec(&input[consumed..], out).map_err(bz2_err)?;
            consumed += (self.inner.total_in() - before_in) as usize;
            match status {
                Status::StreamEnd => {
                    self.finished = true;
                    break;
                }
                _ => {
                    // Stop only once the input is gone and no buffered
                    // output drained this round.
                    if consumed >= input.len() && out.len() == before_out {
                        break;
                    }
                }
            }
        }
        Ok(ComprStatus { n_in: consumed, n_out: out.len() - start, is_end: self.finished })
    }
}
