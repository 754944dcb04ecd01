//! Descriptors for the source type system.
//!
//! A [`Type`] is a shared handle; cloning it is cheap and two handles compare
//! equal when they describe the same logical type. Named struct types can be
//! declared first and given fields later, which is how self-referential
//! records are expressed.
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use once_cell::unsync::OnceCell;
use serde::Deserialize;

use crate::tags::StructTag;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// Bit width of an integer kind. `Word` is the platform-sized `int`/`uint`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Bits {
    Word,
    B8,
    B16,
    B32,
    B64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Kind {
    Bool,
    Int(Bits),
    Uint(Bits),
    Uintptr,
    Float32,
    Float64,
    Complex64,
    Complex128,
    String,
    Array(usize),
    Slice,
    Map,
    Pointer,
    Interface,
    Struct,
    Chan,
    Func,
}

/// Something a type can do beyond its structural shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Encodes itself as a JSON string through a text form.
    TextMarshaler,
    /// Encodes itself as arbitrary JSON.
    JsonMarshaler,
    #[serde(untagged)]
    Other(String),
}

/// Key used by configuration lookups: either a type's exact identity or its
/// generic projection (see [`Type::without_type_arguments`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey {
    repr: String,
    module: String,
    kind: Kind,
}

#[derive(Clone)]
pub struct Type(Rc<TypeData>);

#[derive(Clone)]
struct TypeData {
    name: String,
    module: String,
    repr: String,
    kind: Kind,
    args: Vec<Type>,
    elem: Option<Type>,
    key: Option<Type>,
    fields: OnceCell<Vec<Field>>,
    capabilities: BTreeSet<Capability>,
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub ty: Type,
    pub exported: bool,
    pub anonymous: bool,
    pub tag: StructTag,
}

/// The unit of resolution: a type plus the omit-if-empty flag of the place
/// that refers to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ref {
    pub ty: Type,
    pub omit_empty: bool,
}

const PREDECLARED: [Kind; 17] = [
    Kind::Bool,
    Kind::Int(Bits::Word),
    Kind::Int(Bits::B8),
    Kind::Int(Bits::B16),
    Kind::Int(Bits::B32),
    Kind::Int(Bits::B64),
    Kind::Uint(Bits::Word),
    Kind::Uint(Bits::B8),
    Kind::Uint(Bits::B16),
    Kind::Uint(Bits::B32),
    Kind::Uint(Bits::B64),
    Kind::Uintptr,
    Kind::Float32,
    Kind::Float64,
    Kind::Complex64,
    Kind::Complex128,
    Kind::String,
];

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl Kind {
    /// Name of the predeclared type of this kind, if there is one.
    pub fn predeclared_name(&self) -> Option<&'static str> {
        let name = match self {
            Kind::Bool => "bool",
            Kind::Int(Bits::Word) => "int",
            Kind::Int(Bits::B8) => "int8",
            Kind::Int(Bits::B16) => "int16",
            Kind::Int(Bits::B32) => "int32",
            Kind::Int(Bits::B64) => "int64",
            Kind::Uint(Bits::Word) => "uint",
            Kind::Uint(Bits::B8) => "uint8",
            Kind::Uint(Bits::B16) => "uint16",
            Kind::Uint(Bits::B32) => "uint32",
            Kind::Uint(Bits::B64) => "uint64",
            Kind::Uintptr => "uintptr",
            Kind::Float32 => "float32",
            Kind::Float64 => "float64",
            Kind::Complex64 => "complex64",
            Kind::Complex128 => "complex128",
            Kind::String => "string",
            _ => return None,
        };
        Some(name)
    }

    pub fn is_scalar(&self) -> bool {
        self.predeclared_name().is_some()
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = self.predeclared_name() {
            return f.write_str(name);
        }
        match self {
            Kind::Array(len) => write!(f, "array[{len}]"),
            Kind::Slice => f.write_str("slice"),
            Kind::Map => f.write_str("map"),
            Kind::Pointer => f.write_str("ptr"),
            Kind::Interface => f.write_str("interface"),
            Kind::Struct => f.write_str("struct"),
            Kind::Chan => f.write_str("chan"),
            Kind::Func => f.write_str("func"),
            _ => unreachable!("scalar kinds are named above"),
        }
    }
}

impl TypeKey {
    pub fn module(&self) -> &str {
        &self.module
    }
}

impl TypeData {
    fn unnamed(kind: Kind, repr: String) -> Self {
        TypeData {
            name: String::new(),
            module: String::new(),
            repr,
            kind,
            args: Vec::new(),
            elem: None,
            key: None,
            fields: OnceCell::new(),
            capabilities: BTreeSet::new(),
        }
    }
}

impl Type {
    // ---- predeclared ----

    /// The predeclared type of a scalar kind (`bool`, `int64`, `string`, ...).
    pub fn predeclared(kind: Kind) -> Type {
        let name = kind.predeclared_name().unwrap_or_default();
        let mut data = TypeData::unnamed(kind, name.to_string());
        data.name = name.to_string();
        Type(Rc::new(data))
    }
    pub fn bool() -> Type {
        Type::predeclared(Kind::Bool)
    }
    pub fn int() -> Type {
        Type::predeclared(Kind::Int(Bits::Word))
    }
    pub fn int64() -> Type {
        Type::predeclared(Kind::Int(Bits::B64))
    }
    pub fn uint() -> Type {
        Type::predeclared(Kind::Uint(Bits::Word))
    }
    pub fn uint8() -> Type {
        Type::predeclared(Kind::Uint(Bits::B8))
    }
    pub fn float64() -> Type {
        Type::predeclared(Kind::Float64)
    }
    pub fn string() -> Type {
        Type::predeclared(Kind::String)
    }
    /// The predeclared type spelled `name`, including the `byte` and `rune`
    /// aliases.
    pub fn lookup_predeclared(name: &str) -> Option<Type> {
        let kind = match name {
            "byte" => Kind::Uint(Bits::B8),
            "rune" => Kind::Int(Bits::B32),
            _ => *PREDECLARED.iter().find(|kind| kind.predeclared_name() == Some(name))?,
        };
        Some(Type::predeclared(kind))
    }
    /// The empty interface.
    pub fn any() -> Type {
        Type(Rc::new(TypeData::unnamed(Kind::Interface, "interface {}".into())))
    }

    // ---- composites ----

    pub fn slice(elem: Type) -> Type {
        let mut data = TypeData::unnamed(Kind::Slice, format!("[]{elem}"));
        data.elem = Some(elem);
        Type(Rc::new(data))
    }
    pub fn array(elem: Type, len: usize) -> Type {
        let mut data = TypeData::unnamed(Kind::Array(len), format!("[{len}]{elem}"));
        data.elem = Some(elem);
        Type(Rc::new(data))
    }
    pub fn map(key: Type, elem: Type) -> Type {
        let mut data = TypeData::unnamed(Kind::Map, format!("map[{key}]{elem}"));
        data.key = Some(key);
        data.elem = Some(elem);
        Type(Rc::new(data))
    }
    pub fn pointer(elem: Type) -> Type {
        let mut data = TypeData::unnamed(Kind::Pointer, format!("*{elem}"));
        data.elem = Some(elem);
        Type(Rc::new(data))
    }
    pub fn of_kind(kind: Kind) -> Type {
        Type(Rc::new(TypeData::unnamed(kind, kind.to_string())))
    }

    /// An anonymous struct type.
    pub fn structure(fields: Vec<Field>) -> Type {
        let body = fields
            .iter()
            .map(|f| {
                let tag = if f.tag.is_empty() { String::new() } else { format!(" {:?}", f.tag.as_str()) };
                if f.anonymous { format!("{}{tag}", f.ty) } else { format!("{} {}{tag}", f.name, f.ty) }
            })
            .collect::<Vec<_>>()
            .join("; ");
        let repr = if body.is_empty() { "struct {}".to_string() } else { format!("struct {{ {body} }}") };
        let data = TypeData::unnamed(Kind::Struct, repr);
        let _ = data.fields.set(fields);
        Type(Rc::new(data))
    }

    // ---- named ----

    /// A named type declared in `module` whose underlying type is `underlying`.
    pub fn named(module: &str, name: &str, underlying: &Type) -> Type {
        let mut data = (*underlying.0).clone();
        data.name = name.to_string();
        data.module = module.to_string();
        data.repr = qualified_repr(module, name);
        data.args = Vec::new();
        data.capabilities = BTreeSet::new();
        Type(Rc::new(data))
    }

    /// A named struct whose fields are supplied later through
    /// [`Type::define_fields`].
    pub fn named_struct(module: &str, name: &str) -> Type {
        let mut data = TypeData::unnamed(Kind::Struct, qualified_repr(module, name));
        data.name = name.to_string();
        data.module = module.to_string();
        Type(Rc::new(data))
    }

    /// An instantiation of the generic type `base` with `args`.
    pub fn instantiate(module: &str, base: &str, args: Vec<Type>, underlying: &Type) -> Type {
        let rendered = args.iter().map(Type::qualified).collect::<Vec<_>>().join(",");
        let name = format!("{base}[{rendered}]");
        let mut data = (*underlying.0).clone();
        data.repr = qualified_repr(module, &name);
        data.name = name;
        data.module = module.to_string();
        data.args = args;
        data.capabilities = BTreeSet::new();
        Type(Rc::new(data))
    }

    /// Sets the fields of a struct created by [`Type::named_struct`]. Returns
    /// false when the fields were already defined.
    pub fn define_fields(&self, fields: Vec<Field>) -> bool {
        self.0.fields.set(fields).is_ok()
    }

    pub fn implementing(self, capability: Capability) -> Type {
        let mut data = Rc::unwrap_or_clone(self.0);
        data.capabilities.insert(capability);
        Type(Rc::new(data))
    }

    // ---- queries ----

    pub fn kind(&self) -> Kind {
        self.0.kind
    }
    /// The type's own name; empty for unnamed composites.
    pub fn name(&self) -> &str {
        &self.0.name
    }
    /// Path of the module declaring the type; empty for predeclared and
    /// unnamed types.
    pub fn module(&self) -> &str {
        &self.0.module
    }
    pub fn type_args(&self) -> &[Type] {
        &self.0.args
    }
    pub fn elem(&self) -> Option<&Type> {
        self.0.elem.as_ref()
    }
    pub fn key_type(&self) -> Option<&Type> {
        self.0.key.as_ref()
    }
    pub fn fields(&self) -> &[Field] {
        self.0.fields.get().map(Vec::as_slice).unwrap_or_default()
    }
    pub fn implements(&self, capability: &Capability) -> bool {
        self.0.capabilities.contains(capability)
    }

    /// Fully qualified spelling, `module/path.Name` for named types.
    pub fn qualified(&self) -> String {
        if self.0.module.is_empty() || self.0.name.is_empty() {
            self.0.repr.clone()
        } else {
            format!("{}.{}", self.0.module, self.0.name)
        }
    }

    pub fn key(&self) -> TypeKey {
        TypeKey {
            repr: self.0.repr.clone(),
            module: self.0.module.clone(),
            kind: self.0.kind,
        }
    }

    /// Projection that forgets type arguments, used to configure a whole
    /// generic family at once.
    pub fn without_type_arguments(&self) -> TypeKey {
        let kind = self.0.kind;
        match kind {
            Kind::Slice | Kind::Map | Kind::Array(_) if self.0.name.is_empty() => TypeKey {
                repr: String::new(),
                module: String::new(),
                kind,
            },
            _ if !self.0.args.is_empty() => TypeKey {
                repr: up_to_opening_bracket(&self.0.repr).to_string(),
                module: self.0.module.clone(),
                kind,
            },
            _ => self.key(),
        }
    }

    /// True when the type is its own generic projection.
    pub fn is_simple(&self) -> bool {
        self.without_type_arguments() == self.key()
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
            || (self.0.kind == other.0.kind
                && self.0.repr == other.0.repr
                && self.0.module == other.0.module)
    }
}

impl Eq for Type {}

impl Hash for Type {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.repr.hash(state);
        self.0.module.hash(state);
        self.0.kind.hash(state);
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.repr)
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type({})", self.0.repr)
    }
}

impl Field {
    /// An exported-ness guess follows the source language's rule: names that
    /// start with an upper-case letter are exported.
    pub fn new(name: &str, ty: Type) -> Field {
        Field {
            name: name.to_string(),
            ty,
            exported: name.chars().next().is_some_and(char::is_uppercase),
            anonymous: false,
            tag: StructTag::default(),
        }
    }

    /// An embedded field; its name is the embedded type's name.
    pub fn embedded(ty: Type) -> Field {
        let name = match ty.kind() {
            Kind::Pointer => ty.elem().map(|e| e.name().to_string()).unwrap_or_default(),
            _ => ty.name().to_string(),
        };
        let name = up_to_opening_bracket(&name).to_string();
        Field { anonymous: true, ..Field::new(&name, ty) }
    }

    pub fn tagged(mut self, tag: &str) -> Field {
        self.tag = StructTag::new(tag);
        self
    }

    pub fn json(&self) -> &str {
        self.tag.get("json")
    }
}

impl Ref {
    pub fn new(ty: Type, omit_empty: bool) -> Ref {
        Ref { ty, omit_empty }
    }
    pub fn plain(ty: Type) -> Ref {
        Ref { ty, omit_empty: false }
    }
}

impl From<Type> for Ref {
    fn from(ty: Type) -> Ref {
        Ref::plain(ty)
    }
}

impl From<&Type> for Ref {
    fn from(ty: &Type) -> Ref {
        Ref::plain(ty.clone())
    }
}

impl fmt::Display for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ty)?;
        if self.omit_empty {
            f.write_str(" (with the omit-if-empty flag)")?;
        }
        Ok(())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn qualified_repr(module: &str, name: &str) -> String {
    if module.is_empty() {
        return name.to_string();
    }
    format!("{}.{name}", last_non_version_segment(module))
}

/// `example.com/shop/v2` is referred to as `shop`.
fn last_non_version_segment(module: &str) -> &str {
    let mut segments = module.rsplit('/');
    let last = segments.next().unwrap_or(module);
    let is_version = last.len() > 1
        && last.starts_with('v')
        && last[1..].bytes().all(|b| b.is_ascii_digit());
    match segments.next() {
        Some(previous) if is_version => previous,
        _ => last,
    }
}

fn up_to_opening_bracket(s: &str) -> &str {
    s.split_once('[').map_or(s, |(head, _)| head)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_types_display_with_short_module() {
        let t = Type::named("example.com/shop/v2", "OrderID", &Type::int64());
        assert_eq!(t.to_string(), "shop.OrderID");
        assert_eq!(t.qualified(), "example.com/shop/v2.OrderID");
        assert_eq!(t.kind(), Kind::Int(Bits::B64));
    }

    #[test]
    fn identity_is_structural() {
        assert_eq!(Type::slice(Type::string()), Type::slice(Type::string()));
        assert_ne!(Type::slice(Type::string()), Type::slice(Type::int()));
        let a = Type::named("m", "A", &Type::string());
        let b = Type::named("m", "A", &Type::string());
        assert_eq!(Ref::plain(a.clone()), Ref::plain(b));
        assert_ne!(Ref::plain(a.clone()), Ref::new(a, true));
    }

    #[test]
    fn generic_projection() {
        let page = Type::named_struct("m", "Page");
        let of_int = Type::instantiate("m", "Page", vec![Type::int()], &page);
        let of_str = Type::instantiate("m", "Page", vec![Type::string()], &page);
        assert_eq!(of_int.to_string(), "m.Page[int]");
        assert_ne!(of_int, of_str);
        assert_eq!(of_int.without_type_arguments(), of_str.without_type_arguments());
        assert!(!of_int.is_simple());
        assert!(page.is_simple());
        assert_eq!(
            Type::slice(Type::int()).without_type_arguments(),
            Type::slice(Type::string()).without_type_arguments()
        );
    }

    #[test]
    fn recursive_struct_fields_are_defined_late() {
        let node = Type::named_struct("m", "Node");
        let fields = vec![Field::new("Next", Type::pointer(node.clone()))];
        assert!(node.define_fields(fields));
        assert!(!node.define_fields(Vec::new()));
        assert_eq!(node.fields()[0].ty.elem(), Some(&node));
    }

    #[test]
    fn anonymous_struct_display() {
        let t = Type::structure(vec![
            Field::new("A", Type::string()).tagged(r#"json:"a""#),
            Field::new("b", Type::int()),
        ]);
        assert_eq!(t.to_string(), r#"struct { A string "json:\"a\""; b int }"#);
        assert!(t.fields()[0].exported);
        assert!(!t.fields()[1].exported);
    }

    #[test]
    fn predeclared_lookup() {
        assert_eq!(Type::lookup_predeclared("byte"), Some(Type::uint8()));
        assert_eq!(Type::lookup_predeclared("int64"), Some(Type::int64()));
        assert_eq!(Type::lookup_predeclared("complex64").map(|t| t.kind()), Some(Kind::Complex64));
        assert!(Type::lookup_predeclared("Order").is_none());
    }

    #[test]
    fn capabilities() {
        let t = Type::named("m", "T", &Type::string()).implementing(Capability::TextMarshaler);
        assert!(t.implements(&Capability::TextMarshaler));
        assert!(!t.implements(&Capability::JsonMarshaler));
    }
}
