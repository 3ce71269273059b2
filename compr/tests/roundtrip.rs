//! Round-trip coverage for every codec, whole-buffer and chunked, plus
//! format auto-detection.

use asynckit_compr::{
    bz2_compress, bz2_decompress, zlib_compress, zlib_decompress, zstd_compress,
    zstd_decompress, AutoDecompressor, Bz2Opts, ComprStatus, ZlibOpts,
};
use asynckit_core::{Error, ErrorKind, OpResult};
use pretty_assertions::assert_eq;

// A ~1.2 KB English passage; long enough that every codec actually shrinks
// it and block-oriented paths see a few internal flushes.
const PASSAGE: &str = "\
The keeper's log from the island station survives almost complete, and it is \
a patient, unglamorous record. Oil delivered by the spring boat, wicks \
trimmed at dusk, the clockwork of the rotating lens wound every four hours \
through the night. Storms are noted in a single line each, with the wind's \
quarter and whether the relief landing was possible; the entry for the great \
January gale says only that the tower trembled and the lamp stayed lit. \
Between the weather there are smaller observations. Terns nesting in the \
rubble of the old fog-signal house. A merchant brig standing too close in \
thick weather, warned off with the hand bell. The slow accounting of stores: \
flour, lamp glasses, spare mantles, coal. Twice a year an inspector crossed \
from the mainland and the log grows briefly formal, listing brasswork \
polished and records produced for examination. What the log never mentions \
is solitude, though every page implies it; the keeper measures his days in \
services performed for ships that never know his name. When the light was \
finally automated the last entry notes the time the lamp was extinguished, \
the state of the sea, and nothing else at all, as if the habit of restraint \
had itself become the monument.";

fn input() -> &'static [u8] {
    PASSAGE.as_bytes()
}

fn check_round_trip(
    compress: impl Fn(&mut Vec<u8>, &[u8]) -> OpResult<ComprStatus>,
    decompress: impl Fn(&mut Vec<u8>, &[u8]) -> OpResult<ComprStatus>,
) {
    let mut packed = Vec::new();
    compress(&mut packed, input()).unwrap();
    assert!(!packed.is_empty());

    let mut unpacked = Vec::new();
    let st = decompress(&mut unpacked, &packed).unwrap();
    assert_eq!(st.n_in, packed.len());
    assert_eq!(st.n_out, unpacked.len());
    assert!(st.is_end);
    assert_eq!(unpacked, input());
}

fn third(len: usize) -> usize {
    len / 3 + 1
}

#[test]
fn bz2() {
    check_round_trip(
        |out, i| bz2_compress(out, i, Bz2Opts::default(), 0),
        |out, i| bz2_decompress(out, i, Bz2Opts::default(), 0),
    );
    check_round_trip(
        |out, i| bz2_compress(out, i, Bz2Opts::default(), third(i.len())),
        |out, i| bz2_decompress(out, i, Bz2Opts::default(), third(i.len())),
    );
}

#[test]
fn zlib() {
    check_round_trip(
        |out, i| zlib_compress(out, i, ZlibOpts::default(), 0),
        |out, i| zlib_decompress(out, i, ZlibOpts::default(), 0),
    );
    check_round_trip(
        |out, i| zlib_compress(out, i, ZlibOpts::default(), third(i.len())),
        |out, i| zlib_decompress(out, i, ZlibOpts::default(), third(i.len())),
    );
}

#[test]
fn gzip_forced() {
    let gzip = ZlibOpts { gzip: true, ..ZlibOpts::default() };
    check_round_trip(
        |out, i| zlib_compress(out, i, gzip, 0),
        |out, i| zlib_decompress(out, i, gzip, 0),
    );
    check_round_trip(
        |out, i| zlib_compress(out, i, gzip, third(i.len())),
        |out, i| zlib_decompress(out, i, gzip, third(i.len())),
    );
}

#[test]
fn gzip_auto_detect() {
    let gzip = ZlibOpts { gzip: true, ..ZlibOpts::default() };
    check_round_trip(
        |out, i| zlib_compress(out, i, gzip, 0),
        |out, i| zlib_decompress(out, i, ZlibOpts::default(), 0),
    );
    check_round_trip(
        |out, i| zlib_compress(out, i, gzip, third(i.len())),
        |out, i| zlib_decompress(out, i, ZlibOpts::default(), third(i.len())),
    );
}

#[test]
fn zstd() {
    check_round_trip(|out, i| zstd_compress(out, i, 3), |out, i| zstd_decompress(out, i));
}

#[test]
fn auto_detects_every_codec() {
    let cases: Vec<(&str, Vec<u8>)> = vec![
        ("bz2", {
            let mut v = Vec::new();
            bz2_compress(&mut v, input(), Bz2Opts::default(), 0).unwrap();
            v
        }),
        ("zlib", {
            let mut v = Vec::new();
            zlib_compress(&mut v, input(), ZlibOpts::default(), 0).unwrap();
            v
        }),
        ("gzip", {
            let mut v = Vec::new();
            zlib_compress(&mut v, input(), ZlibOpts { gzip: true, ..ZlibOpts::default() }, 0)
                .unwrap();
            v
        }),
        ("zstd", {
            let mut v = Vec::new();
            zstd_compress(&mut v, input(), 3).unwrap();
            v
        }),
    ];
    for (name, packed) in cases {
        let mut auto = AutoDecompressor::new();
        let mut unpacked = Vec::new();
        let st = auto.append(&mut unpacked, &packed).unwrap();
        assert!(st.is_end, "{name}: stream should end");
        assert_eq!(st.n_in, packed.len(), "{name}");
        assert_eq!(unpacked, input(), "{name}");
    }
}

#[test]
fn auto_rejects_unknown_magic() {
    let mut auto = AutoDecompressor::new();
    let mut out = Vec::new();
    let err = auto.append(&mut out, b"plain text, no magic").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert!(matches!(err, Error::InvalidInput));
}

#[test]
fn chunked_and_whole_compressions_agree() {
    let mut whole = Vec::new();
    zlib_compress(&mut whole, input(), ZlibOpts::default(), 0).unwrap();
    let mut chunked = Vec::new();
    zlib_compress(&mut chunked, input(), ZlibOpts::default(), third(input().len())).unwrap();
    // Deflate output depends on flush points, so only the round trip is
    // compared, not the bytes.
    let mut a = Vec::new();
    let mut b = Vec::new();
    zlib_decompress(&mut a, &whole, ZlibOpts::default(), 0).unwrap();
    zlib_decompress(&mut b, &chunked, ZlibOpts::default(), 0).unwrap();
    assert_eq!(a, b);
}
