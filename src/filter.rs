//! Filter chains (spec §3 "Filter", §4.D). A filter chain decodes a raw
//! stream byte range through zero or more named filters in sequence, each
//! with its own decode parameters dictionary. This module implements the
//! individual codecs and the abbreviation table; `src/stream.rs` strings
//! them together into the chain a `Value::Stream` points at.

use std::io::Read;

use crate::error::{core_err, CoreErrorKind, Result};

/// The filters spec §4.D names. `CCITTFaxDecode`/`DCTDecode`/`JPXDecode` are
/// image codecs the core recognizes and chains but does not itself decode
/// further than "this is opaque image data" -- same posture the source
/// takes, leaving raster decoding to the device/output layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKind {
    AsciiHexDecode,
    Ascii85Decode,
    LzwDecode,
    FlateDecode,
    RunLengthDecode,
    CcittFaxDecode,
    DctDecode,
    JpxDecode,
}

impl FilterKind {
    /// Resolve a filter name, expanding the standard single/double-letter
    /// abbreviations PDF allows inline (spec §4.D: "abbreviation
    /// expansion").
    pub fn from_name(name: &[u8]) -> Result<Self> {
        use FilterKind::*;
        Ok(match name {
            b"AHx" | b"ASCIIHexDecode" => AsciiHexDecode,
            b"A85" | b"ASCII85Decode" => Ascii85Decode,
            b"LZW" | b"LZWDecode" => LzwDecode,
            b"Fl" | b"FlateDecode" => FlateDecode,
            b"RL" | b"RunLengthDecode" => RunLengthDecode,
            b"CCF" | b"CCITTFaxDecode" => CcittFaxDecode,
            b"DCT" | b"DCTDecode" => DctDecode,
            b"JPX" | b"JPXDecode" => JpxDecode,
            _ => return core_err(CoreErrorKind::Undefined, "from_name: unrecognized filter name"),
        })
    }

    /// True for filters this core can actually decode to bytes; the three
    /// image codecs pass their data through unchanged (spec §4.D: "image
    /// filters terminate the chain without further decoding").
    pub fn is_terminal_opaque(self) -> bool {
        matches!(self, FilterKind::CcittFaxDecode | FilterKind::DctDecode | FilterKind::JpxDecode)
    }
}

/// Decode `input` through a single filter. Parameters (`Predictor`,
/// `Columns`, `EarlyChange`, etc.) are deliberately not modeled here: the
/// spec's Non-goals exclude predictor/TIFF-predictor postprocessing, so
/// decode params are accepted but ignored beyond filter selection.
pub fn decode_one(kind: FilterKind, input: &[u8]) -> Result<Vec<u8>> {
    match kind {
        FilterKind::AsciiHexDecode => decode_ascii_hex(input),
        FilterKind::Ascii85Decode => decode_ascii85(input),
        FilterKind::LzwDecode => decode_lzw(input),
        FilterKind::FlateDecode => decode_flate(input),
        FilterKind::RunLengthDecode => decode_run_length(input),
        FilterKind::CcittFaxDecode | FilterKind::DctDecode | FilterKind::JpxDecode => Ok(input.to_vec()),
    }
}

fn decode_ascii_hex(input: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(input.len() / 2);
    let mut hi: Option<u8> = None;
    for &b in input {
        if b == b'>' {
            break;
        }
        let digit = match b {
            b'0'..=b'9' => b - b'0',
            b'a'..=b'f' => b - b'a' + 10,
            b'A'..=b'F' => b - b'A' + 10,
            _ if b.is_ascii_whitespace() => continue,
            _ => return core_err(CoreErrorKind::RangeCheck, "decode_ascii_hex: non-hex byte"),
        };
        match hi.take() {
            Some(h) => out.push((h << 4) | digit),
            None => hi = Some(digit),
        }
    }
    if let Some(h) = hi {
        out.push(h << 4);
    }
    Ok(out)
}

fn decode_ascii85(input: &[u8]) -> Result<Vec<u8>> {
    let trimmed = input
        .strip_suffix(b"~>")
        .unwrap_or(input)
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect::<Vec<u8>>();
    decode_ascii85_native(&trimmed)
}

fn decode_ascii85_native(trimmed: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(trimmed.len() * 4 / 5 + 4);
    let mut group = [0u8; 5];
    let mut group_len = 0usize;
    for &b in trimmed {
        if b == b'z' && group_len == 0 {
            out.extend_from_slice(&[0, 0, 0, 0]);
            continue;
        }
        if !(b'!'..=b'u').contains(&b) {
            continue;
        }
        group[group_len] = b - b'!';
        group_len += 1;
        if group_len == 5 {
            out.extend_from_slice(&ascii85_group_to_bytes(&group, 5));
            group_len = 0;
        }
    }
    if group_len > 0 {
        for slot in group.iter_mut().skip(group_len) {
            *slot = 84;
        }
        let full = ascii85_group_to_bytes(&group, 5);
        out.extend_from_slice(&full[..group_len - 1]);
    }
    Ok(out)
}

fn ascii85_group_to_bytes(group: &[u8; 5], len: usize) -> [u8; 4] {
    let mut acc: u32 = 0;
    for &digit in group.iter().take(len) {
        acc = acc.wrapping_mul(85).wrapping_add(digit as u32);
    }
    acc.to_be_bytes()
}

fn decode_lzw(input: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = weezl::decode::Decoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8);
    decoder
        .decode(input)
        .map_err(|_| crate::error::Error::Core(crate::error::CoreError::new(CoreErrorKind::RangeCheck, "decode_lzw: malformed LZW stream")))
}

fn decode_flate(input: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = flate2::read::ZlibDecoder::new(input);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|_| crate::error::Error::Core(crate::error::CoreError::new(CoreErrorKind::RangeCheck, "decode_flate: malformed zlib stream")))?;
    Ok(out)
}

fn decode_run_length(input: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < input.len() {
        let length = input[i];
        i += 1;
        if length == 128 {
            break;
        } else if length < 128 {
            let n = length as usize + 1;
            if i + n > input.len() {
                return core_err(CoreErrorKind::RangeCheck, "decode_run_length: truncated literal run");
            }
            out.extend_from_slice(&input[i..i + n]);
            i += n;
        } else {
            if i >= input.len() {
                return core_err(CoreErrorKind::RangeCheck, "decode_run_length: truncated repeat run");
            }
            let n = 257 - length as usize;
            out.extend(std::iter::repeat(input[i]).take(n));
            i += 1;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abbreviations_expand_to_the_same_kind() {
        assert_eq!(FilterKind::from_name(b"Fl").unwrap(), FilterKind::from_name(b"FlateDecode").unwrap());
        assert_eq!(FilterKind::from_name(b"A85").unwrap(), FilterKind::from_name(b"ASCII85Decode").unwrap());
    }

    #[test]
    fn unknown_filter_name_is_undefined() {
        assert!(FilterKind::from_name(b"Nope").is_err());
    }

    #[test]
    fn ascii_hex_round_trip() {
        let encoded = b"48656C6C6F>";
        let decoded = decode_ascii_hex(encoded).unwrap();
        assert_eq!(decoded, b"Hello");
    }

    #[test]
    fn run_length_literal_and_repeat() {
        // literal run "AB", then repeat 'C' x4
        let input = [1u8, b'A', b'B', 253, b'C'];
        let decoded = decode_run_length(&input).unwrap();
        assert_eq!(decoded, b"ABCCCC");
    }

    #[test]
    fn flate_round_trip_via_encoder() {
        use flate2::write::ZlibEncoder;
        use flate2::Compression;
        use std::io::Write;
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(b"hello stream world").unwrap();
        let compressed = enc.finish().unwrap();
        let decoded = decode_flate(&compressed).unwrap();
        assert_eq!(decoded, b"hello stream world");
    }

    #[test]
    fn image_filters_pass_through_opaque() {
        let data = vec![1, 2, 3, 4];
        let out = decode_one(FilterKind::DctDecode, &data).unwrap();
        assert_eq!(out, data);
    }
}
