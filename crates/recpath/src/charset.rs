//! Charset registry for `toString` and `toBytes`.
//!
//! Decoding never fails: malformed input substitutes the replacement
//! character. Encoding into a charset narrower than the text substitutes
//! `?`, matching the lenient transcoding the surrounding ecosystem uses.
//! UTF-16 without an endian suffix writes a big-endian byte-order mark and
//! sniffs one when decoding.

use strum::EnumString;

/// A supported charset. Name resolution is case-insensitive and accepts the
/// common aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(ascii_case_insensitive)]
pub(crate) enum Charset {
    #[strum(serialize = "UTF-8", serialize = "UTF8")]
    Utf8,
    #[strum(serialize = "US-ASCII", serialize = "ASCII")]
    UsAscii,
    #[strum(serialize = "ISO-8859-1", serialize = "LATIN1", serialize = "LATIN-1")]
    Iso8859_1,
    #[strum(serialize = "UTF-16", serialize = "UTF16")]
    Utf16,
    #[strum(serialize = "UTF-16LE", serialize = "UTF16LE")]
    Utf16Le,
    #[strum(serialize = "UTF-16BE", serialize = "UTF16BE")]
    Utf16Be,
}

impl Charset {
    /// Decodes bytes into text, substituting the replacement character for
    /// malformed sequences.
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Self::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Self::UsAscii => bytes
                .iter()
                .map(|&b| if b.is_ascii() { b as char } else { '\u{fffd}' })
                .collect(),
            Self::Iso8859_1 => bytes.iter().map(|&b| b as char).collect(),
            Self::Utf16 => match bytes {
                [0xfe, 0xff, rest @ ..] => decode_utf16_units(rest, true),
                [0xff, 0xfe, rest @ ..] => decode_utf16_units(rest, false),
                rest => decode_utf16_units(rest, true),
            },
            Self::Utf16Le => decode_utf16_units(bytes, false),
            Self::Utf16Be => decode_utf16_units(bytes, true),
        }
    }

    /// Encodes text into bytes, substituting `?` for characters the charset
    /// cannot represent.
    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            Self::Utf8 => text.as_bytes().to_vec(),
            Self::UsAscii => text.chars().map(|c| if c.is_ascii() { c as u8 } else { b'?' }).collect(),
            Self::Iso8859_1 => text
                .chars()
                .map(|c| if (c as u32) < 256 { c as u8 } else { b'?' })
                .collect(),
            Self::Utf16 => {
                let mut out = vec![0xfe, 0xff];
                out.extend(encode_utf16_units(text, true));
                out
            }
            Self::Utf16Le => encode_utf16_units(text, false),
            Self::Utf16Be => encode_utf16_units(text, true),
        }
    }
}

fn decode_utf16_units(bytes: &[u8], big_endian: bool) -> String {
    let units: Vec<u16> = bytes
        .chunks(2)
        .map(|pair| {
            let lo = pair.first().copied().unwrap_or(0);
            let hi = pair.get(1).copied().unwrap_or(0);
            if big_endian {
                u16::from_be_bytes([lo, hi])
            } else {
                u16::from_le_bytes([lo, hi])
            }
        })
        .collect();
    String::from_utf16_lossy(&units)
}

fn encode_utf16_units(text: &str, big_endian: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() * 2);
    for unit in text.encode_utf16() {
        let bytes = if big_endian {
            unit.to_be_bytes()
        } else {
            unit.to_le_bytes()
        };
        out.extend_from_slice(&bytes);
    }
    out
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn names_resolve_case_insensitively_with_aliases() {
        assert_eq!(Charset::from_str("utf-8"), Ok(Charset::Utf8));
        assert_eq!(Charset::from_str("US-ASCII"), Ok(Charset::UsAscii));
        assert_eq!(Charset::from_str("latin1"), Ok(Charset::Iso8859_1));
        assert_eq!(Charset::from_str("utf-16le"), Ok(Charset::Utf16Le));
        assert!(Charset::from_str("EBCDIC").is_err());
    }

    #[test]
    fn latin1_round_trips_all_bytes() {
        let bytes: Vec<u8> = (0..=255).collect();
        let text = Charset::Iso8859_1.decode(&bytes);
        assert_eq!(Charset::Iso8859_1.encode(&text), bytes);
    }

    #[test]
    fn ascii_encoding_substitutes_question_marks() {
        assert_eq!(Charset::UsAscii.encode("naïve"), b"na?ve");
    }

    #[test]
    fn utf16_writes_and_sniffs_a_byte_order_mark() {
        let encoded = Charset::Utf16.encode("hi");
        assert_eq!(encoded, vec![0xfe, 0xff, 0x00, b'h', 0x00, b'i']);
        assert_eq!(Charset::Utf16.decode(&encoded), "hi");

        let little = Charset::Utf16Le.encode("hi");
        assert_eq!(little, vec![b'h', 0x00, b'i', 0x00]);
        let with_bom: Vec<u8> = [0xff, 0xfe].iter().copied().chain(little).collect();
        assert_eq!(Charset::Utf16.decode(&with_bom), "hi");
    }

    #[test]
    fn utf8_decoding_is_lossy_not_failing() {
        assert_eq!(Charset::Utf8.decode(&[0xff, b'a']), "\u{fffd}a");
    }
}
