//! Format-detecting decompression: picks the codec from the stream's magic
//! bytes on first append and keeps that codec instance for the rest of the
//! stream; a fresh one is constructed only after `reset`.

use crate::bz2::Bz2Decompressor;
use crate::zlib::{ZlibDecompressor, ZlibOpts};
use crate::zstd_codec::ZstdDecompressor;
use crate::ComprStatus;
use asynckit_core::{Error, OpResult};

enum Codec {
    Unknown,
    Bz2(Bz2Decompressor),
    /// Covers both zlib and gzip headers.
    Zlib(ZlibDecompressor),
    Zstd(ZstdDecompressor),
}

pub struct AutoDecompressor {
    codec: Codec,
    zlib_opts: ZlibOpts,
}

impl Default for AutoDecompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl AutoDecompressor {
    pub fn new() -> Self {
        AutoDecompressor { codec: Codec::Unknown, zlib_opts: ZlibOpts::default() }
    }

    pub fn set_zlib_opts(&mut self, opts: ZlibOpts) {
        self.zlib_opts = opts;
    }

    /// Drops the current codec; the next append re-detects the format.
    pub fn reset(&mut self) {
        self.codec = Codec::Unknown;
    }

    pub fn append(&mut self, out: &mut Vec<u8>, input: &[u8]) -> OpResult<ComprStatus> {
        if let Codec::Unknown = self.codec {
            self.codec = match detect(input) {
                Some(Detected::Bz2) => Codec::Bz2(Bz2Decompressor::new()),
                Some(Detected::Zlib) => Codec::Zlib(ZlibDecompressor::new(self.zlib_opts)),
                Some(Detected::Zstd) => Codec::Zstd(ZstdDecompressor::new()),
                None => return Err(Error::InvalidInput),
            };
        }
        match &mut self.codec {
            Codec::Unknown => unreachable!("codec detected above"),
            Codec::Bz2(d) => d.append(out, input),
            Codec::Zlib(d) => d.append(out, input),
            Codec::Zstd(d) => d.append(out, input),
        }
    }
}

enum Detected {
    Bz2,
    Zlib,
    Zstd,
}

fn detect(input: &[u8]) -> Option<Detected> {
    if input.starts_with(b"\x42\x5a\x68") {
        return Some(Detected::Bz2);
    }
    if input.starts_with(b"\x1f\x8b")
        || input.starts_with(b"\x78\x01")
        || input.starts_with(b"\x78\x9c")
        || input.starts_with(b"\x78\xda")
    {
        return Some(Detected::Zlib);
    }
    if input.starts_with(b"\x28\xb5\x2f\xfd") {
        return Some(Detected::Zstd);
    }
    None
}
