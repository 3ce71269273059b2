//! zstd codec. Frames are processed whole: the one-shot helpers cover the
//! common path, and the streaming decompressor buffers until it holds a
//! complete frame set.

use crate::ComprStatus;
use asynckit_core::{Error, OpResult};

fn zstd_err(e: impl std::fmt::Display) -> Error {
    Error::Compr { codec: "zstd", detail: e.to_string() }
}

pub fn zstd_compress(out: &mut Vec<u8>, input: &[u8], level: i32) -> OpResult<ComprStatus> {
    let packed = zstd::stream::encode_all(input, level).map_err(zstd_err)?;
    let n_out = packed.len();
    out.extend_from_slice(&packed);
    Ok(ComprStatus { n_in: input.len(), n_out, is_end: true })
}

pub fn zstd_decompress(out: &mut Vec<u8>, input: &[u8]) -> OpResult<ComprStatus> {
    let plain = zstd::stream::decode_all(input).map_err(zstd_err)?;
    let n_out = plain.len();
    out.extend_from_slice(&plain);
    Ok(ComprStatus { n_in: input.len(), n_out, is_end: true })
}

/// Decompressor whose `append` accepts the stream in pieces but only decodes
/// once the accumulated bytes form whole frames (zstd reports truncation as
/// an error rather than a resumable state through the `decode_all` path, so
/// partial frames are held back).
pub struct ZstdDecompressor {
    pending: Vec<u8>,
    finished: bool,
}

impl Default for ZstdDecompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl ZstdDecompressor {
    pub fn new() -> Self {
        ZstdDecompressor { pending: Vec::new(), finished: false }
    }

    pub fn append(&mut self, out: &mut Vec<u8>, input: &[u8]) -> OpResult<ComprStatus> {
        if self.finished {
            return Ok(ComprStatus { n_in: 0, n_out: 0, is_end: true });
        }
        self.pending.extend_from_slice(input);
        match zstd::stream::decode_all(self.pending.as_slice()) {
            Ok(plain) => {
                let n_out = plain.len();
                out.extend_from_slice(&plain);
                self.pending.clear();
                self.finished = true;
                Ok(ComprStatus { n_in: input.len(), n_out, is_end: true })
            }
            // Assume truncation: wait for the rest of the frame.
            Err(_) => Ok(ComprStatus { n_in: input.len(), n_out: 0, is_end: false }),
        }
    }
}
