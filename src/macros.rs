//! Public macros for constructing option structs without relying on struct literal syntax.
//!
//! Call sites name only the fields they change, so new options can be added
//! without breaking them.

/// Construct [`crate::Options`] from `Default` and a list of field assignments.
///
/// Example:
///
/// ```rust
/// let options = saphyr_graph::options! {
///     emit_aliases: false,
///     max_depth: 64,
/// };
/// assert_eq!(options.max_depth, 64);
/// ```
#[macro_export]
macro_rules! options {
    ( $( $field:ident : $value:expr ),* $(,)? ) => {{
        let mut opt = $crate::Options::default();
        $(
            opt.$field = $value;
        )*
        opt
    }};
}

/// Construct a [`crate::MemberOverride`] from `Default` and field assignments.
///
/// ```rust
/// use saphyr_graph::ScalarStyle;
///
/// let over = saphyr_graph::member_override! {
///     alias: Some("id".to_owned()),
///     scalar_style: Some(ScalarStyle::DoubleQuoted),
/// };
/// assert_eq!(over.alias.as_deref(), Some("id"));
/// ```
#[macro_export]
macro_rules! member_override {
    ( $( $field:ident : $value:expr ),* $(,)? ) => {{
        let mut over = $crate::MemberOverride::default();
        $(
            over.$field = $value;
        )*
        over
    }};
}
