//! Digest and encoding functions: `hash`, `uuid5`, `base64Encode`,
//! `base64Decode`.
//!
//! `hash` supports the MD5, SHA-1, and SHA-2 digest families, dispatched by
//! the algorithm-name string; unknown names are `algorithm` errors. Base64
//! uses the standard alphabet with padding; strings stay strings and byte
//! arrays stay byte arrays.

use std::{fmt::Write, rc::Rc, str::FromStr};

use md5::{Digest, Md5};
use sha1::Sha1;
use sha2::{Sha224, Sha256, Sha384, Sha512};
use uuid::Uuid;

use crate::{
    error::{PathError, PathErrorKind, PathResult},
    eval::{EvalContext, ValueStream, once_err},
    field_value::FieldValue,
    functions::{Function, coerce_string, fan, required_string, scalar_string},
    record::Value,
    tree::Expr,
};

/// The digest algorithms `hash` accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString)]
enum HashAlgorithm {
    #[strum(serialize = "MD5")]
    Md5,
    #[strum(serialize = "SHA-1", serialize = "SHA1")]
    Sha1,
    #[strum(serialize = "SHA-224", serialize = "SHA224")]
    Sha224,
    #[strum(serialize = "SHA-256", serialize = "SHA256")]
    Sha256,
    #[strum(serialize = "SHA-384", serialize = "SHA384")]
    Sha384,
    #[strum(serialize = "SHA-512", serialize = "SHA512")]
    Sha512,
}

impl HashAlgorithm {
    fn hex_digest(self, data: &[u8]) -> String {
        match self {
            Self::Md5 => to_hex(&Md5::digest(data)),
            Self::Sha1 => to_hex(&Sha1::digest(data)),
            Self::Sha224 => to_hex(&Sha224::digest(data)),
            Self::Sha256 => to_hex(&Sha256::digest(data)),
            Self::Sha384 => to_hex(&Sha384::digest(data)),
            Self::Sha512 => to_hex(&Sha512::digest(data)),
        }
    }
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

/// `hash(s, algo)`: the hex-encoded digest of the string-coerced subject.
pub(super) fn hash<'a>(args: &'a [Expr], ctx: EvalContext<'a>, current: Rc<FieldValue>) -> ValueStream<'a> {
    let algorithm_name = match required_string(&args[1], ctx.clone(), &current, Function::Hash, "digest name") {
        Ok(v) => v,
        Err(e) => return once_err(e),
    };
    let algorithm = match HashAlgorithm::from_str(&algorithm_name) {
        Ok(v) => v,
        Err(_) => {
            return once_err(PathError::eval(
                PathErrorKind::Algorithm,
                format!("unknown digest '{algorithm_name}'"),
            ));
        }
    };
    fan(&args[0], ctx, current, move |fv| {
        if fv.value().is_null() {
            return Ok(Value::Null);
        }
        let s = coerce_string(fv.value(), Function::Hash)?;
        Ok(Value::String(algorithm.hex_digest(s.as_bytes())))
    })
}

/// `uuid5(name [, namespace])`: the RFC 4122 version-5 UUID of the
/// string-coerced subject. The default namespace is the nil UUID.
pub(super) fn uuid5<'a>(args: &'a [Expr], ctx: EvalContext<'a>, current: Rc<FieldValue>) -> ValueStream<'a> {
    let namespace = match args.get(1) {
        Some(arg) => match scalar_string(arg, ctx.clone(), &current, Function::Uuid5) {
            Ok(Some(text)) => match Uuid::parse_str(&text) {
                Ok(v) => v,
                Err(_) => {
                    return once_err(PathError::eval(
                        PathErrorKind::Type,
                        format!("uuid5() namespace '{text}' is not a valid UUID"),
                    ));
                }
            },
            Ok(None) => Uuid::nil(),
            Err(e) => return once_err(e),
        },
        None => Uuid::nil(),
    };
    fan(&args[0], ctx, current, move |fv| {
        if fv.value().is_null() {
            return Ok(Value::Null);
        }
        let name = coerce_string(fv.value(), Function::Uuid5)?;
        Ok(Value::String(Uuid::new_v5(&namespace, name.as_bytes()).to_string()))
    })
}

/// `base64Encode(x)`: strings encode to strings, byte arrays to byte arrays.
pub(super) fn base64_encode<'a>(args: &'a [Expr], ctx: EvalContext<'a>, current: Rc<FieldValue>) -> ValueStream<'a> {
    fan(&args[0], ctx, current, |fv| match fv.value() {
        Value::Null => Ok(Value::Null),
        Value::Bytes(bytes) => Ok(Value::Bytes(encode(bytes).into_bytes())),
        other => {
            let s = coerce_string(other, Function::Base64Encode)?;
            Ok(Value::String(encode(s.as_bytes())))
        }
    })
}

/// `base64Decode(x)`: the inverse; invalid base64 is a `parse-failed` error.
pub(super) fn base64_decode<'a>(args: &'a [Expr], ctx: EvalContext<'a>, current: Rc<FieldValue>) -> ValueStream<'a> {
    fan(&args[0], ctx, current, |fv| match fv.value() {
        Value::Null => Ok(Value::Null),
        Value::Bytes(bytes) => decode(bytes).map(Value::Bytes),
        other => {
            let s = coerce_string(other, Function::Base64Decode)?;
            let decoded = decode(s.as_bytes())?;
            Ok(Value::String(String::from_utf8_lossy(&decoded).into_owned()))
        }
    })
}

/// The standard base64 alphabet used for encoding.
const BASE64_ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Padding character used in base64 encoding.
const PAD: u8 = b'=';

fn encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len().div_ceil(3) * 4);
    for chunk in data.chunks(3) {
        let b0 = chunk[0];
        let b1 = chunk.get(1).copied().unwrap_or(0);
        let b2 = chunk.get(2).copied().unwrap_or(0);
        out.push(BASE64_ALPHABET[(b0 >> 2) as usize] as char);
        out.push(BASE64_ALPHABET[(((b0 & 0x03) << 4) | (b1 >> 4)) as usize] as char);
        if chunk.len() > 1 {
            out.push(BASE64_ALPHABET[(((b1 & 0x0f) << 2) | (b2 >> 6)) as usize] as char);
        } else {
            out.push(PAD as char);
        }
        if chunk.len() > 2 {
            out.push(BASE64_ALPHABET[(b2 & 0x3f) as usize] as char);
        } else {
            out.push(PAD as char);
        }
    }
    out
}

fn decode_digit(digit: u8) -> Option<u8> {
    match digit {
        b'A'..=b'Z' => Some(digit - b'A'),
        b'a'..=b'z' => Some(digit - b'a' + 26),
        b'0'..=b'9' => Some(digit - b'0' + 52),
        b'+' => Some(62),
        b'/' => Some(63),
        _ => None,
    }
}

fn decode(text: &[u8]) -> PathResult<Vec<u8>> {
    let invalid = || PathError::eval(PathErrorKind::ParseFailed, "invalid base64 input");
    let text: Vec<u8> = text.iter().copied().filter(|b| !b.is_ascii_whitespace()).collect();
    if text.len() % 4 != 0 {
        return Err(invalid());
    }
    let mut out = Vec::with_capacity(text.len() / 4 * 3);
    for group in text.chunks(4) {
        let pad = group.iter().rev().take_while(|&&b| b == PAD).count();
        if pad > 2 {
            return Err(invalid());
        }
        let mut accum: u32 = 0;
        for (i, &digit) in group.iter().enumerate() {
            let value = if digit == PAD {
                // Padding is only legal at the end of the group.
                if i < 4 - pad {
                    return Err(invalid());
                }
                0
            } else {
                u32::from(decode_digit(digit).ok_or_else(invalid)?)
            };
            accum = (accum << 6) | value;
        }
        out.push((accum >> 16) as u8);
        if pad < 2 {
            out.push((accum >> 8) as u8);
        }
        if pad < 1 {
            out.push(accum as u8);
        }
    }
    Ok(out)
}
