//! Precomputed binding tables.
//!
//! Everything the read and write paths need to know about a type is worked
//! out once, when the mapper is built: which strategy applies to it
//! ([`Capability`]) and, for records, under which names and in which order
//! its members are bound ([`MemberTable`]).

use ahash::AHashMap;

use crate::error::{Error, Result};
use crate::events::ScalarStyle;
use crate::graph::Value;
use crate::naming::NamingConvention;
use crate::options::Options;
use crate::types::{Member, PrimitiveKind, TypeKey, TypeKind, TypeRegistry};

/// Per-member settings applied on top of a record declaration, without
/// touching the declaration itself. Unset fields leave the declared value.
///
/// Built with [`crate::member_override!`] or struct update syntax.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MemberOverride {
    pub alias: Option<String>,
    pub ignore: Option<bool>,
    pub scalar_style: Option<ScalarStyle>,
    pub apply_naming_convention: Option<bool>,
    pub order: Option<i32>,
    pub default_value: Option<Value>,
}

/// A member as it is bound: final name, slot and write settings.
#[derive(Clone, Debug)]
pub(crate) struct BoundMember {
    pub declared: String,
    pub serialized: String,
    /// Index into the record's fields.
    pub field: usize,
    pub ty: TypeKey,
    pub write_as: Option<TypeKey>,
    /// Declared default, or the zero value of the member type.
    pub default: Value,
    pub scalar_style: Option<ScalarStyle>,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct MemberTable {
    /// Field values of a fresh instance.
    pub initial: Vec<Value>,
    /// Declared name of every field, base fields first.
    pub field_names: Vec<String>,
    /// Bound members in serialization order.
    pub bound: Vec<BoundMember>,
    by_serialized: AHashMap<String, usize>,
}

impl MemberTable {
    /// Find a bound member by its serialized name (exact, case-sensitive).
    pub fn find(&self, serialized: &str) -> Option<&BoundMember> {
        self.by_serialized.get(serialized).map(|&i| &self.bound[i])
    }

    /// Field index of a declared member; a redeclared name resolves to the
    /// most derived declaration.
    pub fn field_index(&self, declared: &str) -> Option<usize> {
        self.field_names.iter().rposition(|n| n == declared)
    }
}

/// How values of one type are read and written.
#[derive(Debug)]
pub(crate) enum Capability {
    /// Index of the first registered converter accepting the type.
    Converter(usize),
    Dynamic,
    Scalar(PrimitiveKind),
    Enum,
    Optional(TypeKey),
    Sequence { item: TypeKey },
    Mapping { key: TypeKey, value: TypeKey },
    Structural(MemberTable),
    Unsupported,
}

/// Decides which concrete record type to instantiate for a requested one.
pub trait ObjectFactory: Send + Sync {
    /// Return the type to build for `ty`, which must be `ty` itself or a
    /// record deriving from it. The error text ends up in [`Error::Construction`].
    fn create(&self, ty: TypeKey, registry: &TypeRegistry) -> std::result::Result<TypeKey, String>;
}

impl<F> ObjectFactory for F
where
    F: Fn(TypeKey, &TypeRegistry) -> std::result::Result<TypeKey, String> + Send + Sync,
{
    fn create(&self, ty: TypeKey, registry: &TypeRegistry) -> std::result::Result<TypeKey, String> {
        self(ty, registry)
    }
}

/// Builds exactly the requested type, refusing abstract records and records
/// without a default constructor.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultObjectFactory;

impl ObjectFactory for DefaultObjectFactory {
    fn create(&self, ty: TypeKey, registry: &TypeRegistry) -> std::result::Result<TypeKey, String> {
        let record = registry
            .get(ty)
            .and_then(|d| d.as_record())
            .ok_or_else(|| format!("`{}` is not a record type", registry.name_of(ty)))?;
        if record.is_abstract() {
            Err(format!(
                "`{}` is abstract; map a concrete type with a tag or supply an object factory",
                registry.name_of(ty)
            ))
        } else if !record.is_constructible() {
            Err(format!("`{}` has no default constructor", registry.name_of(ty)))
        } else {
            Ok(ty)
        }
    }
}

/// Effective settings of one member after overrides.
struct Resolved<'a> {
    member: &'a Member,
    field: usize,
    alias: Option<&'a str>,
    ignore: bool,
    scalar_style: Option<ScalarStyle>,
    apply_naming: bool,
    order: i32,
    default: Option<&'a Value>,
}

/// Build the member table of record `ty`.
///
/// Overrides are keyed by `(type, declared member name)`; for each member the
/// override of the most derived type in the chain is taken.
pub(crate) fn build_member_table(
    registry: &TypeRegistry,
    ty: TypeKey,
    options: &Options,
    naming: &dyn NamingConvention,
    overrides: &AHashMap<(TypeKey, String), MemberOverride>,
) -> Result<MemberTable> {
    let chain = registry.record_chain(ty)?;

    let mut resolved = Vec::new();
    let mut field = 0;
    for &owner in chain.iter().rev() {
        let Some(record) = registry.get(owner).and_then(|d| d.as_record()) else {
            continue;
        };
        for member in record.members() {
            let over = chain
                .iter()
                .find_map(|&t| overrides.get(&(t, member.name.clone())));
            resolved.push(Resolved {
                member,
                field,
                alias: over
                    .and_then(|o| o.alias.as_deref())
                    .or(member.alias.as_deref()),
                ignore: over.and_then(|o| o.ignore).unwrap_or(member.ignore),
                scalar_style: over.and_then(|o| o.scalar_style).or(member.scalar_style),
                apply_naming: over
                    .and_then(|o| o.apply_naming_convention)
                    .unwrap_or(member.apply_naming),
                order: over.and_then(|o| o.order).or(member.order).unwrap_or(0),
                default: over
                    .and_then(|o| o.default_value.as_ref())
                    .or(member.default.as_ref()),
            });
            field += 1;
        }
    }

    let mut table = MemberTable {
        initial: resolved
            .iter()
            .map(|r| r.default.cloned().unwrap_or_else(|| registry.zero_value(r.member.ty)))
            .collect(),
        field_names: resolved.iter().map(|r| r.member.name.clone()).collect(),
        ..MemberTable::default()
    };

    let mut bound: Vec<(i32, BoundMember)> = Vec::new();
    for r in &resolved {
        if r.ignore || (!r.member.public && !options.include_non_public) {
            continue;
        }
        let serialized = match r.alias {
            Some(alias) => alias.to_owned(),
            None if r.apply_naming => naming.apply(&r.member.name),
            None => r.member.name.clone(),
        };
        let member = BoundMember {
            declared: r.member.name.clone(),
            serialized,
            field: r.field,
            ty: r.member.ty,
            write_as: r.member.serialize_as,
            default: table.initial[r.field].clone(),
            scalar_style: r.scalar_style,
        };
        // A derived member hides a base member bound under the same name.
        match bound.iter().position(|(_, b)| b.serialized == member.serialized) {
            Some(i) => bound[i] = (r.order, member),
            None => bound.push((r.order, member)),
        }
    }
    bound.sort_by_key(|(order, _)| *order);

    for (_, member) in bound {
        table
            .by_serialized
            .insert(member.serialized.clone(), table.bound.len());
        table.bound.push(member);
    }
    Ok(table)
}

/// Work out the capability of every registered type. Converters are asked
/// first, in registration order.
pub(crate) fn capability_of(
    registry: &TypeRegistry,
    ty: TypeKey,
    converter: Option<usize>,
    table: impl FnOnce() -> Result<MemberTable>,
) -> Result<Capability> {
    if let Some(index) = converter {
        return Ok(Capability::Converter(index));
    }
    let Some(descriptor) = registry.get(ty) else {
        return Err(Error::config(format!("type {ty} is not registered")));
    };
    Ok(match descriptor.kind() {
        TypeKind::Any => Capability::Dynamic,
        TypeKind::Primitive(kind) => Capability::Scalar(*kind),
        TypeKind::Enum(_) => Capability::Enum,
        TypeKind::Optional(inner) => Capability::Optional(*inner),
        TypeKind::Sequence { item } => Capability::Sequence { item: *item },
        TypeKind::Mapping { key, value } => Capability::Mapping {
            key: *key,
            value: *value,
        },
        TypeKind::Record(_) => Capability::Structural(table()?),
        TypeKind::Opaque => Capability::Unsupported,
    })
}
