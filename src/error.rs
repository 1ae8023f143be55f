//! Defines error and its location
use std::fmt;
use std::num::ParseFloatError;

use saphyr_parser::{ScanError, Span};

/// Row/column location within the source YAML document (1-indexed).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Location {
    /// 1-indexed row number in the input stream.
    pub(crate) row: u32,
    /// 1-indexed column number in the input stream.
    pub(crate) column: u32,
}

impl Location {
    /// Sentinel value meaning "location unknown".
    ///
    /// Used for events that were built by hand or when a precise position is not
    /// available at error creation time.
    pub const UNKNOWN: Self = Self { row: 0, column: 0 };

    /// Create a new location record from 1-indexed coordinates.
    pub const fn new(row: usize, column: usize) -> Self {
        // Error reporting only, 4G lines is more than any document we will see.
        Self { row: row as u32, column: column as u32 }
    }

    /// 1-indexed line.
    pub fn line(&self) -> u64 {
        self.row as u64
    }

    /// 1-indexed column.
    pub fn column(&self) -> u64 {
        self.column as u64
    }

    pub fn is_known(&self) -> bool {
        *self != Self::UNKNOWN
    }
}

impl Default for Location {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

/// Convert a `saphyr_parser::Span` to a 1-indexed `Location`.
pub(crate) fn location_from_span(span: &Span) -> Location {
    let start = &span.start;
    Location::new(start.line(), start.col() + 1)
}

/// The innermost reason a scalar could not be converted.
///
/// Carried as the `source()` of [`Error::ScalarFormat`] so callers see both
/// "scalar conversion failed" and what exactly was wrong with the text.
#[derive(Debug)]
#[non_exhaustive]
pub enum ScalarError {
    /// Not one of the accepted boolean literals.
    InvalidBool,
    /// Digits do not form an integer in the detected radix.
    InvalidInt,
    /// The integer does not fit into the target width.
    IntOverflow { target: &'static str },
    /// Text does not have the shape of a floating point number.
    NotAFloat,
    /// Shape looked right but the float parser rejected it.
    InvalidFloat(ParseFloatError),
    /// A null scalar was given for a value type.
    NullNotAllowed,
    /// `char` targets need exactly one character.
    InvalidChar,
    /// Text is not a GUID.
    InvalidGuid(uuid::Error),
    /// `!!binary` content is not valid base64.
    InvalidBase64(base64::DecodeError),
    /// Not a known variant (or flag combination) of an enumeration.
    UnknownVariant { name: String },
}

impl fmt::Display for ScalarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarError::InvalidBool => f.write_str("invalid boolean literal"),
            ScalarError::InvalidInt => f.write_str("invalid integer"),
            ScalarError::IntOverflow { target } => write!(f, "integer out of range for {target}"),
            ScalarError::NotAFloat => f.write_str("invalid floating point value"),
            ScalarError::InvalidFloat(err) => write!(f, "invalid floating point value: {err}"),
            ScalarError::NullNotAllowed => f.write_str("null is not allowed here"),
            ScalarError::InvalidChar => f.write_str("expected exactly one character"),
            ScalarError::InvalidGuid(err) => write!(f, "invalid GUID: {err}"),
            ScalarError::InvalidBase64(err) => write!(f, "invalid !!binary base64: {err}"),
            ScalarError::UnknownVariant { name } => write!(f, "unknown variant `{name}`"),
        }
    }
}

impl std::error::Error for ScalarError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScalarError::InvalidFloat(err) => Some(err),
            ScalarError::InvalidGuid(err) => Some(err),
            ScalarError::InvalidBase64(err) => Some(err),
            _ => None,
        }
    }
}

/// Errors raised while mapping between YAML events and object graphs.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// Scalar text does not match the grammar of the expected type.
    ScalarFormat {
        expected: String,
        text: String,
        cause: ScalarError,
        location: Location,
    },
    /// An alias was never resolved by the end of its document.
    AnchorNotFound { name: String, location: Location },
    /// A mapping key has no matching member on the target record.
    UnknownMember {
        key: String,
        type_name: String,
        location: Location,
    },
    /// Depth limit exceeded, or a cycle was found while aliases are disabled.
    MaximumRecursionExceeded { limit: usize, location: Location },
    /// No converter or structural path applies to this node and type.
    TypeConversion { msg: String, location: Location },
    /// The object factory could not produce an instance.
    Construction {
        type_name: String,
        msg: String,
        location: Location,
    },
    /// A tag was built from an empty string.
    InvalidTag,
    /// The text of the non-specific tag was asked for. It has none.
    NonSpecificTag,
    /// The upstream scanner rejected the text.
    Parse { msg: String, location: Location },
    /// Unexpected end of the event stream.
    Eof { location: Location },
    /// Structural mismatch in the event stream.
    Unexpected {
        expected: &'static str,
        location: Location,
    },
    /// A single document was requested but the stream has more.
    MultipleDocuments { location: Location },
    /// The mapper configuration is inconsistent.
    Config { msg: String },
    /// Writing text output failed.
    Emit { error: fmt::Error },
}

impl Error {
    pub(crate) fn scalar(expected: impl Into<String>, text: &str, cause: ScalarError) -> Self {
        Error::ScalarFormat {
            expected: expected.into(),
            text: text.to_owned(),
            cause,
            location: Location::UNKNOWN,
        }
    }

    /// A value that cannot be read or written as the requested type. The
    /// mapper fills in the location of the node being converted.
    pub fn conversion<S: Into<String>>(msg: S) -> Self {
        Error::TypeConversion {
            msg: msg.into(),
            location: Location::UNKNOWN,
        }
    }

    pub(crate) fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config { msg: msg.into() }
    }

    pub(crate) fn unexpected(what: &'static str) -> Self {
        Error::Unexpected {
            expected: what,
            location: Location::UNKNOWN,
        }
    }

    pub(crate) fn eof() -> Self {
        Error::Eof {
            location: Location::UNKNOWN,
        }
    }

    pub(crate) fn recursion(limit: usize) -> Self {
        Error::MaximumRecursionExceeded {
            limit,
            location: Location::UNKNOWN,
        }
    }

    fn location_mut(&mut self) -> Option<&mut Location> {
        match self {
            Error::ScalarFormat { location, .. }
            | Error::AnchorNotFound { location, .. }
            | Error::UnknownMember { location, .. }
            | Error::MaximumRecursionExceeded { location, .. }
            | Error::TypeConversion { location, .. }
            | Error::Construction { location, .. }
            | Error::Parse { location, .. }
            | Error::Eof { location }
            | Error::Unexpected { location, .. }
            | Error::MultipleDocuments { location } => Some(location),
            Error::InvalidTag | Error::NonSpecificTag | Error::Config { .. } | Error::Emit { .. } => None,
        }
    }

    /// Attach/override a concrete location to this error and return it.
    pub(crate) fn with_location(mut self, set_location: Location) -> Self {
        if let Some(location) = self.location_mut() {
            *location = set_location;
        }
        self
    }

    /// Attach a location only if the error does not carry one yet, so the
    /// innermost (most precise) position wins.
    pub(crate) fn or_location(mut self, set_location: Location) -> Self {
        if let Some(location) = self.location_mut() {
            if !location.is_known() {
                *location = set_location;
            }
        }
        self
    }

    /// If the error has a known location, return it.
    pub fn location(&self) -> Option<Location> {
        match self {
            Error::ScalarFormat { location, .. }
            | Error::AnchorNotFound { location, .. }
            | Error::UnknownMember { location, .. }
            | Error::MaximumRecursionExceeded { location, .. }
            | Error::TypeConversion { location, .. }
            | Error::Construction { location, .. }
            | Error::Parse { location, .. }
            | Error::Eof { location }
            | Error::Unexpected { location, .. }
            | Error::MultipleDocuments { location } => location.is_known().then_some(*location),
            Error::InvalidTag | Error::NonSpecificTag | Error::Config { .. } | Error::Emit { .. } => None,
        }
    }

    /// Map a `saphyr_parser::ScanError` into our error type with location.
    pub(crate) fn from_scan_error(err: ScanError) -> Self {
        let mark = err.marker();
        Error::Parse {
            msg: err.info().to_owned(),
            location: Location::new(mark.line(), mark.col() + 1),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ScalarFormat {
                expected,
                text,
                cause,
                location,
            } => fmt_with_location(
                f,
                &format!("scalar conversion failed: cannot read `{text}` as {expected} ({cause})"),
                location,
            ),
            Error::AnchorNotFound { name, location } => {
                fmt_with_location(f, &format!("alias *{name} references an anchor that is never defined"), location)
            }
            Error::UnknownMember {
                key,
                type_name,
                location,
            } => fmt_with_location(
                f,
                &format!("property `{key}` not found on type {type_name}"),
                location,
            ),
            Error::MaximumRecursionExceeded { limit, location } => fmt_with_location(
                f,
                &format!("maximum recursion exceeded (limit {limit}); the graph may contain a cycle"),
                location,
            ),
            Error::TypeConversion { msg, location } => fmt_with_location(f, msg, location),
            Error::Construction {
                type_name,
                msg,
                location,
            } => fmt_with_location(
                f,
                &format!("cannot construct {type_name}: {msg}"),
                location,
            ),
            Error::InvalidTag => f.write_str(
                "a tag cannot be empty; use Tag::NON_SPECIFIC for a non-specific tag",
            ),
            Error::NonSpecificTag => f.write_str("the non-specific tag has no value"),
            Error::Parse { msg, location } => fmt_with_location(f, msg, location),
            Error::Eof { location } => fmt_with_location(f, "unexpected end of input", location),
            Error::Unexpected { expected, location } => {
                fmt_with_location(f, &format!("unexpected event: expected {expected}"), location)
            }
            Error::MultipleDocuments { location } => fmt_with_location(
                f,
                "multiple YAML documents found; use the multi-document API",
                location,
            ),
            Error::Config { msg } => write!(f, "invalid mapper configuration: {msg}"),
            Error::Emit { error } => write!(f, "failed to write YAML: {error}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::ScalarFormat { cause, .. } => Some(cause),
            Error::Emit { error } => Some(error),
            _ => None,
        }
    }
}

impl From<fmt::Error> for Error {
    fn from(error: fmt::Error) -> Self {
        Error::Emit { error }
    }
}

/// Print a message optionally suffixed with "at line X, column Y".
fn fmt_with_location(f: &mut fmt::Formatter<'_>, msg: &str, location: &Location) -> fmt::Result {
    if location.is_known() {
        write!(f, "{msg} at line {}, column {}", location.row, location.column)
    } else {
        write!(f, "{msg}")
    }
}

/// Result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;
