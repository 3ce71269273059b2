//! Range request header parsing (single-range form).
//!
//! Accepts `bytes=first-last`, `bytes=first-` and `bytes=-suffix`, with
//! optional whitespace to the left of each field and a case-insensitive
//! unit. Syntactic problems are `ParseFailed`; syntactically valid but
//! unsatisfiable combinations are `OutOfBound`.

use asynckit_core::{Error, OpResult};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HttpRange {
    pub first: Option<i64>,
    /// Inclusive.
    pub last: Option<i64>,
    pub suffix_length: Option<i64>,
}

/// A range resolved against a concrete representation length.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedRange {
    pub first: i64,
    /// Inclusive.
    pub last: i64,
}

impl HttpRange {
    pub fn valid(&self) -> bool {
        self.suffix_length.map(|n| n > 0).unwrap_or(false)
            || (self.first.map(|f| f >= 0).unwrap_or(false)
                && match (self.first, self.last) {
                    (Some(f), Some(l)) => l >= f,
                    _ => true,
                })
    }

    /// Resolves against a representation of `len` bytes; `OutOfBound` when
    /// the range starts past the end.
    pub fn resolve(&self, len: i64) -> OpResult<ResolvedRange> {
        debug_assert!(self.valid());
        if let Some(suffix) = self.suffix_length {
            return Ok(ResolvedRange { first: len - len.min(suffix), last: len - 1 });
        }
        let first = self.first.unwrap_or(0);
        if first < len {
            return Ok(ResolvedRange {
                first,
                last: self.last.map(|l| l.min(len - 1)).unwrap_or(len - 1),
            });
        }
        Err(Error::OutOfBound)
    }
}

/// Parses a single-range `Range` header value, e.g. `bytes=100-199`.
pub fn parse_single_range_header(val: &str) -> OpResult<HttpRange> {
    let Some((unit, spec)) = val.split_once('=') else {
        return Err(Error::ParseFailed);
    };
    if !unit.trim_start().eq_ignore_ascii_case("bytes") {
        return Err(Error::ParseFailed);
    }
    let Some((first_s, last_s)) = spec.split_once('-') else {
        return Err(Error::ParseFailed);
    };

    let mut r = HttpRange::default();

    let first_s = first_s.trim_start();
    if !first_s.is_empty() {
        r.first = Some(first_s.parse().map_err(|_| Error::ParseFailed)?);
    }

    let last_s = last_s.trim_start();
    if !last_s.is_empty() {
        let n: i64 = last_s.parse().map_err(|_| Error::ParseFailed)?;
        if r.first.is_some() {
            r.last = Some(n);
        } else {
            r.suffix_length = Some(n);
        }
    } else if r.first.is_none() {
        return Err(Error::OutOfBound);
    }

    if !r.valid() {
        return Err(Error::OutOfBound);
    }
    Ok(r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn explicit_range() {
        let r = parse_single_range_header("bytes=100-199").unwrap();
        assert_eq!(r, HttpRange { first: Some(100), last: Some(199), suffix_length: None });
    }

    #[test]
    fn suffix_range() {
        let r = parse_single_range_header("bytes=-50").unwrap();
        assert_eq!(r, HttpRange { first: None, last: None, suffix_length: Some(50) });
        assert_eq!(r.resolve(1000).unwrap(), ResolvedRange { first: 950, last: 999 });
        // A suffix longer than the representation clamps to the whole of it.
        assert_eq!(r.resolve(30).unwrap(), ResolvedRange { first: 0, last: 29 });
    }

    #[test]
    fn open_ended_range_resolves_to_representation_end() {
        let r = parse_single_range_header("bytes=500-").unwrap();
        assert_eq!(r.first, Some(500));
        assert_eq!(r.resolve(1000).unwrap(), ResolvedRange { first: 500, last: 999 });
    }

    #[test]
    fn last_clamps_to_length() {
        let r = parse_single_range_header("bytes=10-5000").unwrap();
        assert_eq!(r.resolve(100).unwrap(), ResolvedRange { first: 10, last: 99 });
    }

    #[test]
    fn malformed_inputs_fail_to_parse() {
        assert_matches!(parse_single_range_header("bytes=abc"), Err(Error::ParseFailed));
        assert_matches!(parse_single_range_header("bytes=1x-2"), Err(Error::ParseFailed));
        assert_matches!(parse_single_range_header("100-199"), Err(Error::ParseFailed));
        assert_matches!(parse_single_range_header("items=1-2"), Err(Error::ParseFailed));
    }

    #[test]
    fn unit_is_case_insensitive_and_fields_left_trimmed() {
        let r = parse_single_range_header(" Bytes= 100- 199").unwrap();
        assert_eq!(r, HttpRange { first: Some(100), last: Some(199), suffix_length: None });
    }

    #[test]
    fn unsatisfiable_combinations_are_out_of_bound() {
        // Bare "bytes=-" names no byte at all.
        assert_matches!(parse_single_range_header("bytes=-"), Err(Error::OutOfBound));
        // Inverted ranges are syntactically fine but unsatisfiable.
        assert_matches!(parse_single_range_header("bytes=200-100"), Err(Error::OutOfBound));
        // A zero-length suffix selects nothing.
        assert_matches!(parse_single_range_header("bytes=-0"), Err(Error::OutOfBound));
        // Start past the end fails at resolution time.
        let r = parse_single_range_header("bytes=500-").unwrap();
        assert_matches!(r.resolve(400), Err(Error::OutOfBound));
    }
}
