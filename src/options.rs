use serde::{Deserialize, Serialize};

/// Which record members the write path leaves out.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefaultValuesHandling {
    /// Emit every member, including nulls and defaults.
    #[default]
    Preserve,
    /// Omit members whose value is null.
    OmitNull,
    /// Omit members equal to their declared default or their type's zero value.
    OmitDefaults,
    /// Omit members holding an empty sequence or mapping.
    OmitEmptyCollections,
}

/// Duplicate key handling policy for mappings.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DuplicateKeyPolicy {
    /// Error out on encountering a duplicate key.
    Error,
    /// First key wins: later duplicate pairs are skipped.
    FirstWins,
    /// Last key wins: a later pair overwrites the earlier value in place.
    #[default]
    LastWins,
}

/// Mapper configuration.
///
/// ```rust
/// use saphyr_graph::options::DefaultValuesHandling;
///
/// let options = saphyr_graph::options! {
///     ignore_unmatched_properties: true,
///     default_values: DefaultValuesHandling::OmitDefaults,
/// };
/// assert!(options.emit_aliases);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Skip mapping keys with no matching record member instead of failing
    /// with `UnknownMember`. Default: false.
    pub ignore_unmatched_properties: bool,
    /// Member elision on write. Default: emit everything.
    pub default_values: DefaultValuesHandling,
    /// Bind non-public members too. Default: false.
    pub include_non_public: bool,
    /// Write repeated objects as anchor + aliases. When false, repeats are
    /// written out in full and a cycle is an error. Default: true.
    pub emit_aliases: bool,
    /// Maximum nesting depth on both paths. Default: 256.
    pub max_depth: usize,
    /// If true, interpret only the exact literals `true` and `false` as booleans.
    /// YAML 1.1 forms like `yes`/`no`/`on`/`off` will be rejected.
    /// Default: false (accept YAML 1.1 boolean forms).
    pub strict_booleans: bool,
    /// Tag objects whose runtime type differs from the static type of their
    /// slot, so they read back as the same type. Default: true.
    pub emit_tags_for_polymorphic_values: bool,
    /// Prefix of generated anchor names (`a1`, `a2`, ...).
    pub anchor_prefix: String,
    /// Policy for duplicate keys in dictionaries and records.
    pub duplicate_keys: DuplicateKeyPolicy,
    /// Spaces per nesting level in emitted YAML. Default: 2.
    pub indent_step: usize,
    /// Write output a JSON parser accepts: flow collections, quoted strings
    /// and keys, no tags, no anchors (shared objects are repeated, a cycle is
    /// an error). Null members are always written. Default: false.
    pub json_compatible: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            ignore_unmatched_properties: false,
            default_values: DefaultValuesHandling::Preserve,
            include_non_public: false,
            emit_aliases: true,
            max_depth: 256,
            strict_booleans: false,
            emit_tags_for_polymorphic_values: true,
            anchor_prefix: "a".to_owned(),
            duplicate_keys: DuplicateKeyPolicy::LastWins,
            indent_step: 2,
            json_compatible: false,
        }
    }
}
