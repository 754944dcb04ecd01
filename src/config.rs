//! Per-type configuration.
//!
//! A [`Config`] is assembled once from an ordered list of [`ConfigOption`]s
//! and never changes afterwards. Options are keyed either by a type's exact
//! identity or by its generic projection; lookups try the exact key first.
//! Later options for the same key replace earlier ones.
//!
//! ```ignore
//! let mapper = Mapper::new([
//!     for_type(&order_id).named("OrderId").template("order-{}").into(),
//!     ConfigOption::CommentLoader(Rc::new(loader)),
//! ]);
//! ```
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use crate::comments::{CommentLoader, Undocumented};
use crate::error::Result;
use crate::resolver::Resolve;
use crate::schema::Schema;
use crate::ts::{Identifier, Source};
use crate::types::{Ref, Type, TypeKey};

/// Builds a schema, resolving whatever it refers to through the resolver.
pub type SchemaFn = Rc<dyn Fn(&mut dyn Resolve) -> Result<Schema>>;
/// Builds a transform expression, resolving whatever it refers to.
pub type TransformFn = Rc<dyn Fn(&mut dyn Resolve) -> Result<Source>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discriminator {
    pub property: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct DiscriminatedUnion {
    pub property: String,
    pub members: Vec<Type>,
}

/// One argument of [`TypeOptions::transform_with`].
#[derive(Debug, Clone)]
pub enum TransformArg {
    Source(Source),
    Type(Type),
    Ref(Ref),
}

pub enum ConfigOption {
    Name(TypeKey, Identifier),
    Unnamed(TypeKey),
    Schema(TypeKey, SchemaFn),
    Template(TypeKey, String),
    UndiscriminatedUnion(TypeKey, Vec<Type>),
    Discriminator(TypeKey, Discriminator),
    DiscriminatedUnion(TypeKey, DiscriminatedUnion),
    Transform(TypeKey, TransformFn),
    CommentLoader(Rc<dyn CommentLoader>),
    Group(Vec<ConfigOption>),
}

/// Fluent construction of the options for one type key.
pub struct TypeOptions {
    key: TypeKey,
    options: Vec<ConfigOption>,
}

pub struct Config {
    names: HashMap<TypeKey, Identifier>,
    unnamed: HashSet<TypeKey>,
    schemas: HashMap<TypeKey, SchemaFn>,
    templates: HashMap<TypeKey, String>,
    unions: HashMap<TypeKey, Vec<Type>>,
    discriminators: HashMap<TypeKey, Discriminator>,
    discriminated_unions: HashMap<TypeKey, DiscriminatedUnion>,
    transforms: HashMap<TypeKey, TransformFn>,
    comments: Rc<dyn CommentLoader>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

/// Options for exactly `ty`.
pub fn for_type(ty: &Type) -> TypeOptions {
    TypeOptions { key: ty.key(), options: Vec::new() }
}

/// Options for every instantiation of the generic type `ty` belongs to.
pub fn for_generic(ty: &Type) -> TypeOptions {
    TypeOptions { key: ty.without_type_arguments(), options: Vec::new() }
}

impl TypeOptions {
    fn with(mut self, option: ConfigOption) -> Self {
        self.options.push(option);
        self
    }

    pub fn named(self, name: impl Into<Identifier>) -> Self {
        let key = self.key.clone();
        self.with(ConfigOption::Name(key, name.into()))
    }

    pub fn unnamed(self) -> Self {
        let key = self.key.clone();
        self.with(ConfigOption::Unnamed(key))
    }

    /// A fixed schema.
    pub fn schema(self, schema: Schema) -> Self {
        self.resolving_schema(move |_| Ok(schema.clone()))
    }

    pub fn resolving_schema(self, f: impl Fn(&mut dyn Resolve) -> Result<Schema> + 'static) -> Self {
        let key = self.key.clone();
        self.with(ConfigOption::Schema(key, Rc::new(f)))
    }

    pub fn template(self, template: impl Into<String>) -> Self {
        let key = self.key.clone();
        self.with(ConfigOption::Template(key, template.into()))
    }

    /// A fixed transform expression.
    pub fn transform(self, transform: impl Into<Source>) -> Self {
        let transform = transform.into();
        self.resolving_transform(move |_| Ok(transform.clone()))
    }

    pub fn resolving_transform(self, f: impl Fn(&mut dyn Resolve) -> Result<Source> + 'static) -> Self {
        let key = self.key.clone();
        self.with(ConfigOption::Transform(key, Rc::new(f)))
    }

    /// A transform built from a format string whose `{}` holes take the
    /// given arguments; types and refs are resolved to their schemas. A hole
    /// count that differs from `args` fails the build with
    /// [`Error::FormatArity`](crate::error::Error::FormatArity).
    pub fn transform_with(self, format: impl Into<String>, args: Vec<TransformArg>) -> Self {
        let format = format.into();
        self.resolving_transform(move |resolver| {
            let sources = args
                .iter()
                .map(|arg| match arg {
                    TransformArg::Source(source) => Ok(source.clone()),
                    TransformArg::Type(ty) => Ok(resolver.resolve(&Ref::plain(ty.clone()))?.typescript()),
                    TransformArg::Ref(r) => Ok(resolver.resolve(r)?.typescript()),
                })
                .collect::<Result<Vec<_>>>()?;
            Source::try_format(&format, sources)
        })
    }

    /// The type is one of `members`, told apart structurally.
    pub fn union_of(self, members: Vec<Type>) -> Self {
        let key = self.key.clone();
        self.with(ConfigOption::UndiscriminatedUnion(key, members))
    }

    /// The type's objects carry `property` with the literal `value`.
    pub fn discriminator(self, property: impl Into<String>, value: impl Into<String>) -> Self {
        let key = self.key.clone();
        let discriminator = Discriminator { property: property.into(), value: value.into() };
        self.with(ConfigOption::Discriminator(key, discriminator))
    }

    /// The type is one of `members`, told apart by `property`.
    pub fn discriminated_union(self, property: impl Into<String>, members: Vec<Type>) -> Self {
        let key = self.key.clone();
        let union = DiscriminatedUnion { property: property.into(), members };
        self.with(ConfigOption::DiscriminatedUnion(key, union))
    }
}

impl From<TypeOptions> for ConfigOption {
    fn from(options: TypeOptions) -> Self {
        ConfigOption::Group(options.options)
    }
}

impl fmt::Debug for ConfigOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigOption::Name(key, name) => f.debug_tuple("Name").field(key).field(name).finish(),
            ConfigOption::Unnamed(key) => f.debug_tuple("Unnamed").field(key).finish(),
            ConfigOption::Schema(key, _) => f.debug_tuple("Schema").field(key).field(&"..").finish(),
            ConfigOption::Template(key, t) => f.debug_tuple("Template").field(key).field(t).finish(),
            ConfigOption::UndiscriminatedUnion(key, m) => {
                f.debug_tuple("UndiscriminatedUnion").field(key).field(m).finish()
            }
            ConfigOption::Discriminator(key, d) => f.debug_tuple("Discriminator").field(key).field(d).finish(),
            ConfigOption::DiscriminatedUnion(key, u) => {
                f.debug_tuple("DiscriminatedUnion").field(key).field(u).finish()
            }
            ConfigOption::Transform(key, _) => f.debug_tuple("Transform").field(key).field(&"..").finish(),
            ConfigOption::CommentLoader(_) => f.write_str("CommentLoader(..)"),
            ConfigOption::Group(options) => f.debug_tuple("Group").field(options).finish(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            names: HashMap::new(),
            unnamed: HashSet::new(),
            schemas: HashMap::new(),
            templates: HashMap::new(),
            unions: HashMap::new(),
            discriminators: HashMap::new(),
            discriminated_unions: HashMap::new(),
            transforms: HashMap::new(),
            comments: Rc::new(Undocumented),
        }
    }
}

impl Config {
    pub fn new(options: impl IntoIterator<Item = ConfigOption>) -> Self {
        let mut config = Config::default();
        for option in options {
            config.apply(option);
        }
        config
    }

    fn apply(&mut self, option: ConfigOption) {
        match option {
            ConfigOption::Name(key, name) => {
                self.names.insert(key, name);
            }
            ConfigOption::Unnamed(key) => {
                self.unnamed.insert(key);
            }
            ConfigOption::Schema(key, f) => {
                self.schemas.insert(key, f);
            }
            ConfigOption::Template(key, template) => {
                self.templates.insert(key, template);
            }
            ConfigOption::UndiscriminatedUnion(key, members) => {
                self.unions.insert(key, members);
            }
            ConfigOption::Discriminator(key, d) => {
                self.discriminators.insert(key, d);
            }
            ConfigOption::DiscriminatedUnion(key, u) => {
                self.discriminated_unions.insert(key, u);
            }
            ConfigOption::Transform(key, f) => {
                self.transforms.insert(key, f);
            }
            ConfigOption::CommentLoader(loader) => self.comments = loader,
            ConfigOption::Group(options) => options.into_iter().for_each(|o| self.apply(o)),
        }
    }

    pub fn name(&self, ty: &Type) -> Option<&Identifier> {
        lookup(&self.names, ty)
    }
    pub fn is_unnamed(&self, ty: &Type) -> bool {
        self.unnamed.contains(&ty.key()) || self.unnamed.contains(&ty.without_type_arguments())
    }
    pub fn schema(&self, ty: &Type) -> Option<&SchemaFn> {
        lookup(&self.schemas, ty)
    }
    pub fn template(&self, ty: &Type) -> Option<&str> {
        lookup(&self.templates, ty).map(String::as_str)
    }
    pub fn undiscriminated_union(&self, ty: &Type) -> Option<&[Type]> {
        lookup(&self.unions, ty).map(Vec::as_slice)
    }
    pub fn discriminator(&self, ty: &Type) -> Option<&Discriminator> {
        lookup(&self.discriminators, ty)
    }
    pub fn discriminated_union(&self, ty: &Type) -> Option<&DiscriminatedUnion> {
        lookup(&self.discriminated_unions, ty)
    }
    pub fn transform(&self, ty: &Type) -> Option<&TransformFn> {
        lookup(&self.transforms, ty)
    }
    pub fn comments(&self) -> &dyn CommentLoader {
        self.comments.as_ref()
    }

    /// Whether the type's schema comes from configuration rather than from
    /// its structure.
    pub fn has_bespoke_schema(&self, ty: &Type) -> bool {
        self.schema(ty).is_some()
            || self.undiscriminated_union(ty).is_some()
            || self.discriminated_union(ty).is_some()
            || self.transform(ty).is_some()
    }
}

fn lookup<'a, V>(map: &'a HashMap<TypeKey, V>, ty: &Type) -> Option<&'a V> {
    map.get(&ty.key()).or_else(|| map.get(&ty.without_type_arguments()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::Mapper;

    #[test]
    fn later_options_win() {
        let t = Type::named("m", "T", &Type::string());
        let config = Config::new([
            for_type(&t).named("First").into(),
            for_type(&t).named("Second").template("t-{}").into(),
        ]);
        assert_eq!(config.name(&t).map(Identifier::as_str), Some("Second"));
        assert_eq!(config.template(&t), Some("t-{}"));
        assert!(!config.has_bespoke_schema(&t));
    }

    #[test]
    fn exact_keys_shadow_generic_keys() {
        let page = Type::named_struct("m", "Page");
        let of_int = Type::instantiate("m", "Page", vec![Type::int()], &page);
        let of_str = Type::instantiate("m", "Page", vec![Type::string()], &page);
        let config = Config::new([
            for_generic(&of_int).named("AnyPage").into(),
            for_type(&of_str).named("StringPage").into(),
        ]);
        assert_eq!(config.name(&of_int).map(Identifier::as_str), Some("AnyPage"));
        assert_eq!(config.name(&of_str).map(Identifier::as_str), Some("StringPage"));
        assert!(config.name(&page).is_none());
    }

    #[test]
    fn bespoke_schemas() {
        let t = Type::named("m", "T", &Type::string());
        let config = Config::new([for_type(&t).schema(Schema::Any).into()]);
        assert!(config.has_bespoke_schema(&t));
        let config = Config::new([for_type(&t).transform("x => x").into()]);
        assert!(config.has_bespoke_schema(&t));
    }

    #[test]
    fn transform_with_resolves_its_arguments() {
        let unit = Type::named("m", "Unit", &Type::string());
        let reading = Type::named("m", "Reading", &Type::float64());
        let mut mapper = Mapper::new([for_type(&reading)
            .unnamed()
            .transform_with(
                "v => [v, {}.parse(\"c\")]",
                vec![TransformArg::Type(unit)],
            )
            .into()]);
        let schema = mapper.resolve(&Ref::plain(reading)).unwrap();
        assert_eq!(schema.typescript().render_body(), "z.number().transform(v => [v, Unit.parse(\"c\")])");
        assert_eq!(mapper.len(), 1);
    }

    #[test]
    fn transform_with_rejects_mismatched_arguments() {
        let t = Type::named("m", "T", &Type::string());
        let mut mapper = Mapper::new([for_type(&t).transform_with("{} {}", vec![]).into()]);
        let err = mapper.resolve(&Ref::plain(t)).unwrap_err();
        assert!(matches!(err, crate::error::Error::FormatArity { holes: 2, args: 0, .. }));
        assert!(mapper.is_empty());
    }
}
