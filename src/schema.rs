//! Zod schema algebra.
//!
//! Schemas are immutable values. Every composition (`brand`, `nullable`,
//! `transform`, ...) returns a new schema wrapping the old one, so the
//! structure stays inspectable after the fact: the builder asks whether
//! something is an object, whether it is already nullable, or what number
//! flags sit under a brand.
use crate::ts::{self, Identifier, Source};

/// The module every schema expression imports `z` from.
pub const ZOD_MODULE: &str = "zod";

pub fn z() -> Source {
    Source::imported(ZOD_MODULE, "z")
}

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberCheck {
    Int,
    NonNegative,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NumberSchema {
    checks: Vec<NumberCheck>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringCheck {
    Uuid,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringSchema {
    checks: Vec<StringCheck>,
}

/// How a nullable wrapper is spelled: `x.nullable()` or `z.nullable(x)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullableStyle {
    Method,
    Function,
}

#[derive(Debug, Clone)]
pub struct Property {
    pub name: String,
    pub schema: Schema,
}

#[derive(Debug, Clone)]
pub enum Schema {
    Any,
    Boolean,
    Number(NumberSchema),
    String(StringSchema),
    Literal(String),
    Enum(Vec<String>),
    Array { element: Box<Schema>, length: Option<usize> },
    Record { key: Box<Schema>, value: Box<Schema> },
    Object(Vec<Property>),
    /// `base.extend({ ... })`
    Extend { base: Box<Schema>, shape: Vec<Property> },
    /// `base.merge(other)`
    Merge { base: Box<Schema>, other: Box<Schema> },
    Union(Vec<Schema>),
    DiscriminatedUnion { discriminator: String, members: Vec<Schema> },
    Branded { inner: Box<Schema>, brand: String },
    Nullable { inner: Box<Schema>, style: NullableStyle },
    Optional(Box<Schema>),
    Pipe { from: Box<Schema>, to: Box<Schema> },
    Transform { inner: Box<Schema>, transform: Source },
    /// `z.lazy(() => Name)`, a reference to a declaration still being built.
    Lazy(Identifier),
    Raw(Source),
    /// Renders as the bare name; structural queries see `inner`.
    Declared { name: Identifier, inner: Box<Schema> },
}

/// A named, documented top-level binding.
#[derive(Debug, Clone)]
pub struct Declaration {
    pub comment: String,
    pub identifier: Identifier,
    pub schema: Schema,
    /// The schema reaches itself through `z.lazy`; TypeScript cannot infer
    /// the type of such a binding, so it is annotated.
    pub self_referential: bool,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl NumberSchema {
    pub fn int(mut self) -> Self {
        self.checks.push(NumberCheck::Int);
        self
    }
    pub fn nonnegative(mut self) -> Self {
        self.checks.push(NumberCheck::NonNegative);
        self
    }
    pub fn is_int(&self) -> bool {
        self.checks.contains(&NumberCheck::Int)
    }
    pub fn is_non_negative(&self) -> bool {
        self.checks.contains(&NumberCheck::NonNegative)
    }
}

impl StringSchema {
    pub fn uuid(mut self) -> Self {
        self.checks.push(StringCheck::Uuid);
        self
    }
}

impl From<NumberSchema> for Schema {
    fn from(n: NumberSchema) -> Self {
        Schema::Number(n)
    }
}

impl From<StringSchema> for Schema {
    fn from(s: StringSchema) -> Self {
        Schema::String(s)
    }
}

impl Property {
    pub fn new(name: impl Into<String>, schema: Schema) -> Self {
        Property { name: name.into(), schema }
    }
}

impl Schema {
    // ---- constructors ----

    pub fn number() -> NumberSchema {
        NumberSchema::default()
    }
    pub fn string() -> StringSchema {
        StringSchema::default()
    }
    pub fn literal(value: impl Into<String>) -> Schema {
        Schema::Literal(value.into())
    }
    pub fn array(element: Schema) -> Schema {
        Schema::Array { element: Box::new(element), length: None }
    }
    pub fn fixed_array(element: Schema, length: usize) -> Schema {
        Schema::Array { element: Box::new(element), length: Some(length) }
    }
    pub fn record(key: Schema, value: Schema) -> Schema {
        Schema::Record { key: Box::new(key), value: Box::new(value) }
    }
    pub fn object(shape: Vec<Property>) -> Schema {
        Schema::Object(shape)
    }
    /// `z.enum([...])` over string values.
    pub fn enumeration(values: impl IntoIterator<Item = impl Into<String>>) -> Schema {
        Schema::Enum(values.into_iter().map(Into::into).collect())
    }
    pub fn union(members: Vec<Schema>) -> Schema {
        Schema::Union(members)
    }
    pub fn discriminated_union(discriminator: impl Into<String>, members: Vec<Schema>) -> Schema {
        Schema::DiscriminatedUnion { discriminator: discriminator.into(), members }
    }
    /// `z.nullable(inner)`
    pub fn nullable_of(inner: Schema) -> Schema {
        Schema::Nullable { inner: Box::new(inner), style: NullableStyle::Function }
    }
    pub fn raw(source: impl Into<Source>) -> Schema {
        Schema::Raw(source.into())
    }

    // ---- composition ----

    pub fn brand(self, brand: impl Into<String>) -> Schema {
        Schema::Branded { inner: Box::new(self), brand: brand.into() }
    }

    /// Always adds a wrapper, even around an already nullable schema.
    pub fn nullable(self) -> Schema {
        Schema::Nullable { inner: Box::new(self), style: NullableStyle::Method }
    }

    /// Adds a nullable wrapper unless the schema already is one.
    pub fn ensure_nullable(self) -> Schema {
        if self.is_nullable() { self } else { self.nullable() }
    }

    /// Removes every outer nullable wrapper, reporting whether there was one.
    pub fn strip_nullable(self) -> (Schema, bool) {
        match self {
            Schema::Nullable { inner, .. } => (inner.strip_nullable().0, true),
            other => (other, false),
        }
    }

    pub fn optional(self) -> Schema {
        Schema::Optional(Box::new(self))
    }

    pub fn pipe(self, to: Schema) -> Schema {
        Schema::Pipe { from: Box::new(self), to: Box::new(to) }
    }

    pub fn transform(self, transform: impl Into<Source>) -> Schema {
        Schema::Transform { inner: Box::new(self), transform: transform.into() }
    }

    /// Object extension. Only meaningful on object-shaped schemas.
    pub fn extend(self, shape: Vec<Property>) -> Schema {
        Schema::Extend { base: Box::new(self), shape }
    }

    pub fn merge(self, other: Schema) -> Schema {
        Schema::Merge { base: Box::new(self), other: Box::new(other) }
    }

    /// Replaces the rendered form with `name` while keeping the structure.
    pub fn declared_as(self, name: Identifier) -> Schema {
        let inner = match self {
            Schema::Declared { inner, .. } => inner,
            other => Box::new(other),
        };
        Schema::Declared { name, inner }
    }

    /// `schema.parse(arg)`
    pub fn parse(&self, arg: Source) -> Source {
        Source::invoke_method(self.typescript(), "parse", [arg])
    }

    // ---- queries ----

    pub fn is_nullable(&self) -> bool {
        matches!(self, Schema::Nullable { .. })
    }

    /// The properties of an object-shaped schema, in order.
    pub fn object_shape(&self) -> Option<Vec<&Property>> {
        match self {
            Schema::Object(shape) => Some(shape.iter().collect()),
            Schema::Extend { base, shape } => {
                let mut out = base.object_shape()?;
                out.extend(shape.iter());
                Some(out)
            }
            Schema::Merge { base, other } => {
                let mut out = base.object_shape()?;
                out.extend(other.object_shape()?);
                Some(out)
            }
            Schema::Declared { inner, .. } => inner.object_shape(),
            _ => None,
        }
    }

    pub fn is_object(&self) -> bool {
        self.object_shape().is_some()
    }

    /// The schema under one brand, keeping any declared name.
    pub fn unwrap_brand(&self) -> Option<Schema> {
        match self {
            Schema::Branded { inner, .. } => Some((**inner).clone()),
            Schema::Declared { name, inner } => match &**inner {
                Schema::Branded { inner, .. } => Some((**inner).clone().declared_as(name.clone())),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<&NumberSchema> {
        match self {
            Schema::Number(n) => Some(n),
            Schema::Declared { inner, .. } => inner.as_number(),
            _ => None,
        }
    }

    pub fn is_string(&self) -> bool {
        match self {
            Schema::String(_) => true,
            Schema::Declared { inner, .. } => inner.is_string(),
            _ => false,
        }
    }

    // ---- rendering ----

    pub fn typescript(&self) -> Source {
        match self {
            Schema::Any => zod_call("any", []),
            Schema::Boolean => zod_call("boolean", []),
            Schema::Number(n) => n.checks.iter().fold(zod_call("number", []), |src, check| {
                let method = match check {
                    NumberCheck::Int => "int",
                    NumberCheck::NonNegative => "nonnegative",
                };
                Source::invoke_method(src, method, [])
            }),
            Schema::String(s) => s.checks.iter().fold(zod_call("string", []), |src, check| match check {
                StringCheck::Uuid => Source::invoke_method(src, "uuid", []),
            }),
            Schema::Literal(value) => zod_call("literal", [ts::string_literal(value)]),
            Schema::Enum(values) => {
                zod_call("enum", [Source::array(values.iter().map(|v| ts::string_literal(v)))])
            }
            Schema::Array { element, length } => {
                let array = zod_call("array", [element.typescript()]);
                match length {
                    Some(n) => Source::invoke_method(array, "length", [ts::number_literal(n)]),
                    None => array,
                }
            }
            Schema::Record { key, value } => zod_call("record", [key.typescript(), value.typescript()]),
            Schema::Object(shape) => zod_call("object", [shape_literal(shape)]),
            Schema::Extend { base, shape } => Source::invoke_method(base.typescript(), "extend", [shape_literal(shape)]),
            Schema::Merge { base, other } => Source::invoke_method(base.typescript(), "merge", [other.typescript()]),
            Schema::Union(members) => zod_call("union", [Source::array(members.iter().map(Schema::typescript))]),
            Schema::DiscriminatedUnion { discriminator, members } => zod_call(
                "discriminatedUnion",
                [ts::string_literal(discriminator), Source::array(members.iter().map(Schema::typescript))],
            ),
            Schema::Branded { inner, brand } => {
                Source::invoke_method(inner.typescript(), "brand", [ts::string_literal(brand)])
            }
            Schema::Nullable { inner, style: NullableStyle::Method } => {
                Source::invoke_method(inner.typescript(), "nullable", [])
            }
            Schema::Nullable { inner, style: NullableStyle::Function } => zod_call("nullable", [inner.typescript()]),
            Schema::Optional(inner) => Source::invoke_method(inner.typescript(), "optional", []),
            Schema::Pipe { from, to } => Source::invoke_method(from.typescript(), "pipe", [to.typescript()]),
            Schema::Transform { inner, transform } => {
                Source::invoke_method(inner.typescript(), "transform", [transform.clone()])
            }
            Schema::Lazy(name) => zod_call("lazy", [Source::format("() => {}", [name.into()])]),
            Schema::Raw(source) => source.clone(),
            Schema::Declared { name, .. } => name.into(),
        }
    }
}

impl Declaration {
    pub fn new(comment: String, identifier: Identifier, schema: Schema) -> Self {
        Declaration { comment, identifier, schema, self_referential: false }
    }

    pub fn self_referential(mut self) -> Self {
        self.self_referential = true;
        self
    }

    /// ```text
    /// /** comment */
    /// export const Name = <schema>;
    /// export type Name = z.infer<typeof Name>;
    /// ```
    pub fn typescript(&self) -> Source {
        let name = Source::from(&self.identifier);
        let mut statements = Vec::with_capacity(3);
        statements.extend(ts::doc_comment(&self.comment));
        statements.push(if self.self_referential {
            Source::format("export const {}: {}.ZodTypeAny = {};", [name.clone(), z(), self.schema.typescript()])
        } else {
            Source::format("export const {} = {};", [name.clone(), self.schema.typescript()])
        });
        statements.push(Source::format("export type {} = {}.infer<typeof {}>;", [name.clone(), z(), name]));
        Source::statements(statements)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn zod_call<const N: usize>(function: &str, args: [Source; N]) -> Source {
    Source::invoke_method(z(), function, args)
}

fn shape_literal(shape: &[Property]) -> Source {
    Source::object(shape.iter().map(|p| (p.name.clone(), p.schema.typescript())))
}
