//! Syntactic quoting rules used by the emitter.
//!
//! These only answer "can this text be written in that style and read back
//! as the same characters". Whether a plain scalar would change type on the
//! way back is decided by the mapper (see [`crate::scalars::needs_quotes`]).

use std::fmt::Write;

/// Returns true if `s` can be written as a plain scalar in block context.
pub(crate) fn is_plain_safe(s: &str, is_key: bool) -> bool {
    let Some(first) = s.chars().next() else {
        return false;
    };
    if s.trim() != s {
        return false;
    }
    if s.chars().any(|c| c.is_control() || matches!(c, '\u{FEFF}' | '\u{2028}' | '\u{2029}' | '\u{85}')) {
        return false;
    }
    if s.starts_with("---") || s.starts_with("...") {
        return false;
    }
    match first {
        '[' | ']' | '{' | '}' | ',' | '#' | '&' | '*' | '!' | '|' | '>' | '\'' | '"' | '%' | '@' | '`' => {
            return false;
        }
        // `-1`, `-.inf`, `?x`, `:x` are fine; a lone indicator or one followed by a space is not.
        '-' | '?' | ':' => match s[1..].chars().next() {
            None | Some(' ') => return false,
            Some(_) => {}
        },
        _ => {}
    }
    if s.contains(": ") || s.contains(" #") || s.ends_with(':') {
        return false;
    }
    // Implicit keys are limited in length.
    !(is_key && s.len() > 1024)
}

/// Returns true if `s` can be written as a `|` literal block.
pub(crate) fn is_literal_safe(s: &str) -> bool {
    let content = s.trim_end_matches('\n');
    if content.is_empty() {
        return false;
    }
    if s.chars().any(|c| (c.is_control() && c != '\n' && c != '\t') || c == '\u{FEFF}') {
        return false;
    }
    // Indentation is detected from the first non-empty line.
    match content.lines().find(|line| !line.is_empty()) {
        Some(line) => !line.starts_with([' ', '\t']),
        None => false,
    }
}

/// Returns true if `s` can be written single-quoted on one line.
pub(crate) fn is_single_quote_safe(s: &str) -> bool {
    !s.chars().any(|c| c.is_control() || matches!(c, '\u{FEFF}' | '\u{2028}' | '\u{2029}' | '\u{85}'))
}

pub(crate) fn write_single_quoted<W: Write>(out: &mut W, s: &str) -> std::fmt::Result {
    out.write_char('\'')?;
    for ch in s.chars() {
        if ch == '\'' {
            out.write_str("''")?; // escape single quote by doubling
        } else {
            out.write_char(ch)?;
        }
    }
    out.write_char('\'')
}

pub(crate) fn write_double_quoted<W: Write>(out: &mut W, s: &str) -> std::fmt::Result {
    out.write_char('"')?;
    for ch in s.chars() {
        match ch {
            '\\' => out.write_str("\\\\")?,
            '"' => out.write_str("\\\"")?,
            // YAML named escapes for common control characters
            '\0' => out.write_str("\\0")?,
            '\u{7}' => out.write_str("\\a")?,
            '\u{8}' => out.write_str("\\b")?,
            '\t' => out.write_str("\\t")?,
            '\n' => out.write_str("\\n")?,
            '\u{b}' => out.write_str("\\v")?,
            '\u{c}' => out.write_str("\\f")?,
            '\r' => out.write_str("\\r")?,
            '\u{1b}' => out.write_str("\\e")?,
            '\u{FEFF}' => out.write_str("\\uFEFF")?,
            '\u{0085}' => out.write_str("\\N")?,
            '\u{2028}' => out.write_str("\\L")?,
            '\u{2029}' => out.write_str("\\P")?,
            c if (c as u32) <= 0xFF && c.is_control() => write!(out, "\\x{:02X}", c as u32)?,
            c if c.is_control() => write!(out, "\\u{:04X}", c as u32)?,
            c => out.write_char(c)?,
        }
    }
    out.write_char('"')
}

/// JSON string literal: only the escapes JSON knows, which YAML reads the same way.
pub(crate) fn write_json_string<W: Write>(out: &mut W, s: &str) -> std::fmt::Result {
    out.write_char('"')?;
    for ch in s.chars() {
        match ch {
            '\\' => out.write_str("\\\\")?,
            '"' => out.write_str("\\\"")?,
            '\u{8}' => out.write_str("\\b")?,
            '\t' => out.write_str("\\t")?,
            '\n' => out.write_str("\\n")?,
            '\u{c}' => out.write_str("\\f")?,
            '\r' => out.write_str("\\r")?,
            c if c.is_control() || matches!(c, '\u{FEFF}' | '\u{2028}' | '\u{2029}') => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    write!(out, "\\u{:04X}", unit)?;
                }
            }
            c => out.write_char(c)?,
        }
    }
    out.write_char('"')
}

/// Returns true if `s` is a JSON number as written (`-0.5e3`, not `+1` or `0x1F`).
pub(crate) fn is_json_number(s: &str) -> bool {
    let digits = |s: &str| s.len() - s.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    let rest = s.strip_prefix('-').unwrap_or(s);
    let int = digits(rest);
    if int == 0 || (int > 1 && rest.starts_with('0')) {
        return false;
    }
    let mut rest = &rest[int..];
    if let Some(fraction) = rest.strip_prefix('.') {
        let n = digits(fraction);
        if n == 0 {
            return false;
        }
        rest = &fraction[n..];
    }
    if let Some(exponent) = rest.strip_prefix(['e', 'E']) {
        let exponent = exponent.strip_prefix(['+', '-']).unwrap_or(exponent);
        let n = digits(exponent);
        if n == 0 {
            return false;
        }
        rest = &exponent[n..];
    }
    rest.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_rules() {
        for ok in ["hello world", "-1", "-.inf", "a:b", "http://x", "1, 2", "key?"] {
            assert!(is_plain_safe(ok, false), "{ok}");
        }
        for bad in ["", " lead", "trail ", "- item", "a: b", "a #c", "x:", "*ref", "&a", "!t", "---", "line\nbreak", "'q'", "[x]"] {
            assert!(!is_plain_safe(bad, false), "{bad:?}");
        }
        assert!(!is_plain_safe(&"k".repeat(1025), true));
    }

    #[test]
    fn literal_rules() {
        assert!(is_literal_safe("a\nb"));
        assert!(is_literal_safe("\n\nstart"));
        assert!(!is_literal_safe(" indented\nx"));
        assert!(!is_literal_safe("\n\n"));
        assert!(!is_literal_safe("a\rb"));
    }

    #[test]
    fn quoting_escapes() {
        let mut out = String::new();
        write_double_quoted(&mut out, "a\"b\\c\n\u{1}").unwrap();
        assert_eq!(out, r#""a\"b\\c\n\x01""#);
        out.clear();
        write_single_quoted(&mut out, "it's").unwrap();
        assert_eq!(out, "'it''s'");
    }

    #[test]
    fn json_strings_use_json_escapes_only() {
        let mut out = String::new();
        write_json_string(&mut out, "a\"b\\c\n\u{1}\u{1b}\u{85}é").unwrap();
        assert_eq!(out, r#""a\"b\\c\n\u0001\u001B\u0085é""#);
    }

    #[test]
    fn json_number_forms() {
        for ok in ["0", "-0", "12", "1.5", "-2.25e-3", "1E+20", "6.02e23"] {
            assert!(is_json_number(ok), "{ok}");
        }
        for bad in ["", "-", "+1", "01", "1.", ".5", "1e", "0x1F", ".inf", "1_000", "12:30"] {
            assert!(!is_json_number(bad), "{bad:?}");
        }
    }
}
