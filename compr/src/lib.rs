//! Compression codecs behind one result shape: every (de)compression call
//! reports how much input it used, how much output it appended, and whether
//! the end of the stream was reached.

mod auto;
mod bz2;
mod zlib;
mod zstd_codec;

pub use auto::AutoDecompressor;
pub use bz2::{bz2_compress, bz2_decompress, Bz2Compressor, Bz2Decompressor, Bz2Opts};
pub use zlib::{zlib_compress, zlib_decompress, ZlibCompressor, ZlibDecompressor, ZlibOpts};
pub use zstd_codec::{zstd_compress, zstd_decompress, ZstdDecompressor};

/// Accounting for one (de)compression call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ComprStatus {
    /// Input bytes consumed.
    pub n_in: usize,
    /// Output bytes appended.
    pub n_out: usize,
    /// End of stream reached at `n_in`.
    pub is_end: bool,
}

impl ComprStatus {
    fn merge(&mut self, other: ComprStatus) {
        self.n_in += other.n_in;
        self.n_out += other.n_out;
        self.is_end = other.is_end;
    }
}

/// Splits `input` into `chunk`-sized pieces (everything at once when
/// `chunk == 0`) and folds `f` over them.
fn for_chunks(
    input: &[u8],
    chunk: usize,
    mut f: impl FnMut(&[u8]) -> asynckit_core::OpResult<ComprStatus>,
) -> asynckit_core::OpResult<ComprStatus> {
    let mut total = ComprStatus::default();
    if chunk == 0 || chunk >= input.len() {
        total.merge(f(input)?);
        return Ok(total);
    }
    for piece in input.chunks(chunk) {
        total.merge(f(piece)?);
    }
    Ok(total)
}
