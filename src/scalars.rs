//! Scalar resolution: YAML 1.1 style literal parsing and inference, plus the
//! inverse formatting used by the write path.

use std::fmt::Write;

use base64::Engine;
use num_traits::float::FloatCore;
use zmij::Float;

use crate::error::ScalarError;

/// What an untagged plain scalar resolves to.
#[derive(Clone, Debug, PartialEq)]
pub enum Inferred {
    Null,
    Bool(bool),
    Int(i128),
    Float(f64),
    Str,
}

/// Plain null spellings: empty, `~` and `null` in any case.
pub fn is_null(s: &str) -> bool {
    s.is_empty() || s == "~" || s.eq_ignore_ascii_case("null")
}

/// Parse a YAML 1.1 boolean (handles the "Norway problem").
///
/// Accepted TRUE literals (case-insensitive): "y", "yes", "true", "on".
/// Accepted FALSE literals (case-insensitive): "n", "no", "false", "off".
/// With `strict` only "true" and "false" are accepted.
pub fn parse_bool(s: &str, strict: bool) -> Result<bool, ScalarError> {
    let t = s.trim();
    if t.eq_ignore_ascii_case("true") {
        return Ok(true);
    }
    if t.eq_ignore_ascii_case("false") {
        return Ok(false);
    }
    if !strict {
        if ["yes", "y", "on"].iter().any(|lit| t.eq_ignore_ascii_case(lit)) {
            return Ok(true);
        }
        if ["no", "n", "off"].iter().any(|lit| t.eq_ignore_ascii_case(lit)) {
            return Ok(false);
        }
    }
    Err(ScalarError::InvalidBool)
}

fn parse_digits_u128(digits: &str, radix: u32) -> Option<u128> {
    let mut val: u128 = 0;
    let mut saw = false;
    for c in digits.chars() {
        if c == '_' {
            continue;
        }
        let d = c.to_digit(radix)?;
        val = val.checked_mul(radix as u128)?.checked_add(d as u128)?;
        saw = true;
    }
    saw.then_some(val)
}

fn split_sign(t: &str) -> (bool, &str) {
    match t.strip_prefix('+') {
        Some(r) => (false, r),
        None => match t.strip_prefix('-') {
            Some(r) => (true, r),
            None => (false, t),
        },
    }
}

/// Sexagesimal groups: `190:20:30` is `190*3600 + 20*60 + 30`. Every group is
/// plain decimal digits with optional underscores.
fn parse_base60(rest: &str) -> Option<u128> {
    let mut acc: u128 = 0;
    for group in rest.split(':') {
        let g = parse_digits_u128(group, 10)?;
        acc = acc.checked_mul(60)?.checked_add(g)?;
    }
    Some(acc)
}

/// Parse an integer in any of the supported radices.
///
/// `0x` hex, `0o` or leading `0` octal, `0b` binary, `:` separated base 60,
/// otherwise decimal. `_` separators are allowed anywhere in the digit run.
pub fn parse_int(s: &str) -> Result<i128, ScalarError> {
    let t = s.trim();
    let (neg, rest) = split_sign(t);
    let magnitude = if rest.contains(':') {
        parse_base60(rest)
    } else if let Some(r) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        parse_digits_u128(r, 16)
    } else if let Some(r) = rest.strip_prefix("0o").or_else(|| rest.strip_prefix("0O")) {
        parse_digits_u128(r, 8)
    } else if let Some(r) = rest.strip_prefix("0b").or_else(|| rest.strip_prefix("0B")) {
        parse_digits_u128(r, 2)
    } else if rest.len() > 1 && rest.starts_with('0') && rest[1..].bytes().any(|b| b != b'_') {
        parse_digits_u128(&rest[1..], 8)
    } else {
        parse_digits_u128(rest, 10)
    }
    .ok_or(ScalarError::InvalidInt)?;

    let signed = i128::try_from(magnitude).map_err(|_| ScalarError::IntOverflow { target: "i128" })?;
    Ok(if neg { -signed } else { signed })
}

/// Narrow a parsed integer to the target width.
pub fn narrow<T: TryFrom<i128>>(value: i128, target: &'static str) -> Result<T, ScalarError> {
    T::try_from(value).map_err(|_| ScalarError::IntOverflow { target })
}

fn special_float(t: &str) -> Option<f64> {
    let lower = t.to_ascii_lowercase();
    match lower.as_str() {
        ".nan" | "+.nan" | "-.nan" => Some(f64::NAN),
        ".inf" | "+.inf" => Some(f64::INFINITY),
        "-.inf" => Some(f64::NEG_INFINITY),
        _ => None,
    }
}

/// Decimal or exponent form: digits, at most one `.`, optional exponent.
/// Rejects words like `inf` that the std parser would otherwise take.
fn has_float_shape(body: &str) -> bool {
    let mut digits = 0;
    let mut dots = 0;
    let mut exp = false;
    let mut prev = ' ';
    for c in body.chars() {
        match c {
            '0'..='9' => digits += 1,
            '_' if !exp => {}
            '.' if !exp => dots += 1,
            'e' | 'E' if !exp && digits > 0 => exp = true,
            '+' | '-' if matches!(prev, 'e' | 'E') => {}
            _ => return false,
        }
        prev = c;
    }
    digits > 0 && dots <= 1 && !matches!(prev, 'e' | 'E' | '+' | '-')
}

/// Parse a float: `.nan`/`.inf`/`-.inf`, decimal/exponential forms with `_`
/// separators, and base 60 with a fractional last group (`190:20:30.15`).
pub fn parse_f64(s: &str) -> Result<f64, ScalarError> {
    let t = s.trim();
    if let Some(v) = special_float(t) {
        return Ok(v);
    }
    let (neg, rest) = split_sign(t);
    if rest.contains(':') {
        let value = parse_base60_float(rest).ok_or(ScalarError::NotAFloat)?;
        return Ok(if neg { -value } else { value });
    }
    if !has_float_shape(rest) {
        return Err(ScalarError::NotAFloat);
    }
    let cleaned: String = t.chars().filter(|&c| c != '_').collect();
    cleaned.parse::<f64>().map_err(ScalarError::InvalidFloat)
}

/// Single-width floats are parsed directly so no double rounding occurs.
pub fn parse_f32(s: &str) -> Result<f32, ScalarError> {
    let t = s.trim();
    if let Some(v) = special_float(t) {
        return Ok(v as f32);
    }
    let (_, rest) = split_sign(t);
    if rest.contains(':') {
        return parse_f64(t).map(|v| v as f32);
    }
    if !has_float_shape(rest) {
        return Err(ScalarError::NotAFloat);
    }
    let cleaned: String = t.chars().filter(|&c| c != '_').collect();
    cleaned.parse::<f32>().map_err(ScalarError::InvalidFloat)
}

fn parse_base60_float(rest: &str) -> Option<f64> {
    let (whole, frac) = match rest.rsplit_once('.') {
        Some((w, f)) => (w, Some(f)),
        None => (rest, None),
    };
    let mut acc = parse_base60(whole)? as f64;
    if let Some(frac) = frac {
        let digits: String = frac.chars().filter(|&c| c != '_').collect();
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let fraction: f64 = format!("0.{digits}").parse().ok()?;
        acc += fraction;
    }
    Some(acc)
}

fn looks_like_int(s: &str) -> bool {
    let (_, rest) = split_sign(s);
    match rest.as_bytes() {
        [] => false,
        [b'0', b'x' | b'X' | b'o' | b'O' | b'b' | b'B', ..] => true,
        [first, ..] => first.is_ascii_digit() && rest.bytes().all(|b| b.is_ascii_digit() || b == b'_' || b == b':'),
    }
}

fn looks_like_float(s: &str) -> bool {
    if special_float(s).is_some() {
        return true;
    }
    let (_, rest) = split_sign(s);
    if rest.contains(':') {
        return rest.contains('.') && rest.starts_with(|c: char| c.is_ascii_digit());
    }
    has_float_shape(rest) && (rest.contains('.') || rest.contains(['e', 'E']))
}

/// Resolve an untagged plain scalar: null, bool, int, float, else string.
pub fn infer(s: &str, strict_booleans: bool) -> Inferred {
    if is_null(s) {
        return Inferred::Null;
    }
    if let Ok(b) = parse_bool(s, strict_booleans) {
        return Inferred::Bool(b);
    }
    if looks_like_int(s) {
        if let Ok(i) = parse_int(s) {
            return Inferred::Int(i);
        }
    }
    if looks_like_float(s) {
        if let Ok(f) = parse_f64(s) {
            return Inferred::Float(f);
        }
    }
    Inferred::Str
}

/// True when writing `s` as a plain scalar would read back as something
/// other than this string.
pub fn needs_quotes(s: &str) -> bool {
    !matches!(infer(s, false), Inferred::Str) || s.trim() != s
}

pub fn parse_char(s: &str) -> Result<char, ScalarError> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(ScalarError::InvalidChar),
    }
}

pub fn parse_guid(s: &str) -> Result<uuid::Uuid, ScalarError> {
    uuid::Uuid::parse_str(s.trim()).map_err(ScalarError::InvalidGuid)
}

/// Decode `!!binary` content; line breaks and spaces inside are ignored.
pub fn decode_binary(s: &str) -> Result<Vec<u8>, ScalarError> {
    let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(ScalarError::InvalidBase64)
}

pub fn encode_binary(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Shortest text that parses back to the same bits, always recognizable as
/// a float (zmij may render `4e-6`, which becomes `4.0e-6`).
pub fn format_float<F: Float + FloatCore>(f: F) -> String {
    let mut target = String::new();
    if f.is_nan() {
        target.push_str(".nan");
    } else if f.is_infinite() {
        target.push_str(if f.is_sign_positive() { ".inf" } else { "-.inf" });
    } else {
        let mut buf = zmij::Buffer::new();
        let s = buf.format_finite(f);
        if s.contains('.') {
            target.push_str(s);
        } else if let Some(exp_pos) = s.find(['e', 'E']) {
            let _ = write!(target, "{}.0{}", &s[..exp_pos], &s[exp_pos..]);
        } else {
            target.push_str(s);
            target.push_str(".0");
        }
    }
    target
}
