//! YAML tags attached to nodes, and recognition of the YAML core schema tags.

use std::fmt;

use crate::error::{Error, Result};

/// Prefix of every tag in the YAML core schema.
pub const YAML_TAG_PREFIX: &str = "tag:yaml.org,2002:";

/// A node tag. The empty string is reserved for the non-specific tag, which is
/// what untagged nodes carry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(String);

impl Tag {
    /// The "no tag" value every untagged node carries.
    pub const NON_SPECIFIC: Tag = Tag(String::new());

    /// Build a specific tag. An empty string is rejected; use [`Tag::NON_SPECIFIC`].
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(Error::InvalidTag);
        }
        Ok(Tag(value))
    }

    pub fn is_non_specific(&self) -> bool {
        self.0.is_empty()
    }

    /// The tag text. Asking a non-specific tag for its value is a misuse
    /// and fails with [`Error::NonSpecificTag`].
    pub fn value(&self) -> Result<&str> {
        if self.is_non_specific() {
            Err(Error::NonSpecificTag)
        } else {
            Ok(&self.0)
        }
    }

    /// Like [`Tag::value`], but `None` for the non-specific tag.
    pub fn as_str(&self) -> Option<&str> {
        (!self.is_non_specific()).then_some(self.0.as_str())
    }

    /// Classify the tag against the core schema, accepting the shorthand
    /// (`!!int`, `!int`) and canonical (`tag:yaml.org,2002:int`) spellings.
    pub fn core(&self) -> Option<CoreTag> {
        let text = self.as_str()?;
        if text == "!" {
            // The lone `!` tag forces a plain scalar to stay a string.
            return Some(CoreTag::Str);
        }
        let name = text
            .strip_prefix(YAML_TAG_PREFIX)
            .map(|rest| rest.strip_prefix('!').unwrap_or(rest))
            .or_else(|| text.strip_prefix("!!"))
            .or_else(|| text.strip_prefix('!'))?;
        CoreTag::from_name(name)
    }

    /// The yaml.org tag for a core schema kind.
    pub fn core_tag(kind: CoreTag) -> Tag {
        Tag(format!("{YAML_TAG_PREFIX}{}", kind.name()))
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_non_specific() {
            f.write_str("?")
        } else {
            f.write_str(&self.0)
        }
    }
}

impl TryFrom<&str> for Tag {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Tag::new(value)
    }
}

impl TryFrom<String> for Tag {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Tag::new(value)
    }
}

/// Core schema tags that change how a node is read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CoreTag {
    Null,
    Bool,
    Int,
    Float,
    Str,
    Binary,
    Timestamp,
    Seq,
    Map,
    Merge,
}

impl CoreTag {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "null" => CoreTag::Null,
            "bool" => CoreTag::Bool,
            "int" => CoreTag::Int,
            "float" => CoreTag::Float,
            "str" => CoreTag::Str,
            "binary" => CoreTag::Binary,
            "timestamp" => CoreTag::Timestamp,
            "seq" => CoreTag::Seq,
            "map" => CoreTag::Map,
            "merge" => CoreTag::Merge,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            CoreTag::Null => "null",
            CoreTag::Bool => "bool",
            CoreTag::Int => "int",
            CoreTag::Float => "float",
            CoreTag::Str => "str",
            CoreTag::Binary => "binary",
            CoreTag::Timestamp => "timestamp",
            CoreTag::Seq => "seq",
            CoreTag::Map => "map",
            CoreTag::Merge => "merge",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tag_is_rejected() {
        assert!(matches!(Tag::new(""), Err(Error::InvalidTag)));
    }

    #[test]
    fn non_specific_has_no_value() {
        let tag = Tag::NON_SPECIFIC;
        assert!(matches!(tag.value(), Err(Error::NonSpecificTag)));
        assert_eq!(tag.as_str(), None);
        assert_eq!(tag.to_string(), "?");
        assert_eq!(Tag::default(), Tag::NON_SPECIFIC);
    }

    #[test]
    fn core_tags_in_all_spellings() {
        for text in ["!!int", "!int", "tag:yaml.org,2002:int", "tag:yaml.org,2002:!int"] {
            assert_eq!(Tag::new(text).unwrap().core(), Some(CoreTag::Int), "{text}");
        }
        assert_eq!(Tag::new("!point").unwrap().core(), None);
        assert_eq!(Tag::new("!").unwrap().core(), Some(CoreTag::Str));
        assert_eq!(Tag::core_tag(CoreTag::Binary).value().unwrap(), "tag:yaml.org,2002:binary");
    }
}
