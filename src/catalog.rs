//! JSON type catalogs.
//!
//! A catalog describes the types of one or more modules, the roots to
//! generate schemas for, and per-type configuration. It is what the command
//! line works from:
//!
//! ```json
//! {
//!   "modules": {
//!     "example.com/shop": {
//!       "types": {
//!         "OrderID": { "doc": "OrderID identifies an order.", "underlying": "int64" },
//!         "Order": { "fields": [{ "name": "ID", "type": "OrderID", "tag": "json:\"id\"" }] }
//!       }
//!     }
//!   },
//!   "roots": ["example.com/shop.Order"],
//!   "config": [{ "type": "example.com/shop.OrderID", "template": "order-{}" }]
//! }
//! ```
pub mod expr;

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::debug;

use crate::comments::{CachedLoader, ModuleDocs};
use crate::config::{ConfigOption, TypeOptions, for_generic, for_type};
use crate::error::{Error, Result};
use crate::path_de;
use crate::schema::{Schema, z};
use crate::ts::Source;
use crate::types::{Capability, Field, Ref, Type};
use expr::TypeExpr;

// ————————————————————————————————————————————————————————————————————————————
// FILE FORMAT
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogFile {
    #[serde(default)]
    pub modules: IndexMap<String, ModuleSpec>,
    #[serde(default)]
    pub roots: Vec<String>,
    #[serde(default)]
    pub config: Vec<TypeConfigSpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleSpec {
    #[serde(default)]
    pub types: IndexMap<String, TypeDecl>,
}

/// A named type. Exactly one of `underlying` and `fields` is set; a
/// declaration with `fields` is a struct.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypeDecl {
    #[serde(default)]
    pub doc: String,
    /// Type parameter names of a generic declaration.
    #[serde(default)]
    pub params: Vec<String>,
    pub underlying: Option<String>,
    pub fields: Option<Vec<FieldDecl>>,
    #[serde(default)]
    pub implements: Vec<Capability>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDecl {
    /// Defaults to the type's name for embedded fields.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub embedded: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypeConfigSpec {
    #[serde(rename = "type")]
    pub ty: String,
    /// Applies to every instantiation of the generic type.
    #[serde(default)]
    pub generic: bool,
    pub name: Option<String>,
    #[serde(default)]
    pub unnamed: bool,
    /// A schema expression used verbatim; a leading `z.` imports zod.
    pub schema: Option<String>,
    pub template: Option<String>,
    pub transform: Option<String>,
    pub union: Option<Vec<String>>,
    pub discriminator: Option<DiscriminatorSpec>,
    pub discriminated_union: Option<DiscriminatedUnionSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiscriminatorSpec {
    pub property: String,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiscriminatedUnionSpec {
    pub property: String,
    pub members: Vec<String>,
}

// ————————————————————————————————————————————————————————————————————————————
// CATALOG
// ————————————————————————————————————————————————————————————————————————————

/// A loaded catalog. Types are built on first use and shared afterwards, so
/// the same declaration always yields the same [`Type`] handle.
#[derive(Debug, Default)]
pub struct Catalog {
    file: CatalogFile,
    types: RefCell<HashMap<String, Type>>,
}

/// Where a type expression is being read: the module it sits in and the
/// type parameters in scope.
#[derive(Clone, Copy)]
struct Scope<'a> {
    module: Option<&'a str>,
    params: &'a HashMap<String, Type>,
}

impl Catalog {
    pub fn new(file: CatalogFile) -> Self {
        Catalog { file, types: RefCell::new(HashMap::new()) }
    }

    /// Loads and merges catalog files in order. Later files add modules,
    /// types, roots and configuration to earlier ones.
    pub fn load(paths: &[PathBuf]) -> Result<Self> {
        let mut merged = CatalogFile::default();
        for path in paths {
            let file: CatalogFile = path_de::read_json(path)?;
            debug!(path = %path.display(), modules = file.modules.len(), "loaded catalog");
            for (module, spec) in file.modules {
                merged.modules.entry(module).or_default().types.extend(spec.types);
            }
            merged.roots.extend(file.roots);
            merged.config.extend(file.config);
        }
        Ok(Catalog::new(merged))
    }

    pub fn from_json(path: &Path, src: &str) -> Result<Self> {
        Ok(Catalog::new(path_de::from_str_with_path(path, src)?))
    }

    /// Resolves a fully qualified type expression.
    pub fn resolve_type(&self, src: &str) -> Result<Type> {
        let no_params = HashMap::new();
        self.resolve_expr(&expr::parse(src)?, Scope { module: None, params: &no_params })
    }

    pub fn roots(&self) -> Result<Vec<Ref>> {
        self.file.roots.iter().map(|root| Ok(Ref::plain(self.resolve_type(root)?))).collect()
    }

    /// Configuration options for a mapper, including a comment loader
    /// backed by the catalog's `doc` entries.
    pub fn options(&self) -> Result<Vec<ConfigOption>> {
        let mut options = Vec::with_capacity(self.file.config.len() + 1);
        for spec in &self.file.config {
            options.push(self.type_options(spec)?.into());
        }
        options.push(ConfigOption::CommentLoader(Rc::new(CachedLoader::new(self.docs()))));
        Ok(options)
    }

    fn docs(&self) -> HashMap<String, ModuleDocs> {
        self.file
            .modules
            .iter()
            .map(|(module, spec)| {
                let docs = spec.types.iter().map(|(name, decl)| (name.clone(), decl.doc.clone())).collect();
                (module.clone(), docs)
            })
            .collect()
    }

    fn type_options(&self, spec: &TypeConfigSpec) -> Result<TypeOptions> {
        let ty = self.resolve_type(&spec.ty)?;
        let mut options = if spec.generic { for_generic(&ty) } else { for_type(&ty) };
        if let Some(name) = &spec.name {
            options = options.named(name.as_str());
        }
        if spec.unnamed {
            options = options.unnamed();
        }
        if let Some(schema) = &spec.schema {
            options = options.schema(Schema::raw(zod_expression(schema)));
        }
        if let Some(template) = &spec.template {
            options = options.template(template.as_str());
        }
        if let Some(transform) = &spec.transform {
            options = options.transform(zod_expression(transform));
        }
        if let Some(members) = &spec.union {
            options = options.union_of(self.resolve_all(members)?);
        }
        if let Some(d) = &spec.discriminator {
            options = options.discriminator(d.property.as_str(), d.value.as_str());
        }
        if let Some(u) = &spec.discriminated_union {
            options = options.discriminated_union(u.property.as_str(), self.resolve_all(&u.members)?);
        }
        Ok(options)
    }

    fn resolve_all(&self, exprs: &[String]) -> Result<Vec<Type>> {
        exprs.iter().map(|e| self.resolve_type(e)).collect()
    }

    fn resolve_expr(&self, expr: &TypeExpr, scope: Scope<'_>) -> Result<Type> {
        Ok(match expr {
            TypeExpr::Any => Type::any(),
            TypeExpr::Slice(elem) => Type::slice(self.resolve_expr(elem, scope)?),
            TypeExpr::Array(len, elem) => Type::array(self.resolve_expr(elem, scope)?, *len),
            TypeExpr::Pointer(elem) => Type::pointer(self.resolve_expr(elem, scope)?),
            TypeExpr::Map(key, elem) => Type::map(self.resolve_expr(key, scope)?, self.resolve_expr(elem, scope)?),
            TypeExpr::Named { name, args } => {
                if args.is_empty() {
                    if let Some(param) = scope.params.get(name) {
                        return Ok(param.clone());
                    }
                    if let Some(predeclared) = Type::lookup_predeclared(name) {
                        return Ok(predeclared);
                    }
                }
                let (module, bare) = match expr::split_qualified(name) {
                    (Some(module), bare) => (module, bare),
                    (None, bare) => (scope.module.ok_or_else(|| Error::UnknownType { name: name.clone() })?, bare),
                };
                let args = args.iter().map(|a| self.resolve_expr(a, scope)).collect::<Result<Vec<_>>>()?;
                self.named(module, bare, args)?
            }
        })
    }

    /// The named type `module.name[args]`, building it on first use.
    fn named(&self, module: &str, name: &str, args: Vec<Type>) -> Result<Type> {
        let decl = self
            .file
            .modules
            .get(module)
            .and_then(|m| m.types.get(name))
            .ok_or_else(|| Error::UnknownType { name: format!("{module}.{name}") })?;
        let qualified = format!("{module}.{name}");
        if decl.params.len() != args.len() {
            return Err(Error::InvalidDeclaration {
                name: qualified,
                reason: format!("expects {} type arguments, got {}", decl.params.len(), args.len()),
            });
        }
        let cache_key = if args.is_empty() {
            qualified.clone()
        } else {
            let rendered: Vec<String> = args.iter().map(Type::qualified).collect();
            format!("{qualified}[{}]", rendered.join(","))
        };
        if let Some(ty) = self.types.borrow().get(&cache_key) {
            return Ok(ty.clone());
        }

        let params: HashMap<String, Type> = decl.params.iter().cloned().zip(args.iter().cloned()).collect();
        let scope = Scope { module: Some(module), params: &params };
        let declare = |underlying: &Type| {
            let ty = if args.is_empty() {
                Type::named(module, name, underlying)
            } else {
                Type::instantiate(module, name, args.clone(), underlying)
            };
            decl.implements.iter().cloned().fold(ty, Type::implementing)
        };

        match (&decl.underlying, &decl.fields) {
            (Some(underlying), None) => {
                let underlying = self.resolve_expr(&expr::parse(underlying)?, scope)?;
                let ty = declare(&underlying);
                self.types.borrow_mut().insert(cache_key, ty.clone());
                Ok(ty)
            }
            (None, Some(fields)) => {
                let ty = declare(&Type::named_struct(module, name));
                // Cached before the fields so that they can refer back to it.
                self.types.borrow_mut().insert(cache_key, ty.clone());
                let fields = fields.iter().map(|f| self.field(f, scope)).collect::<Result<Vec<_>>>()?;
                ty.define_fields(fields);
                Ok(ty)
            }
            _ => Err(Error::InvalidDeclaration {
                name: qualified,
                reason: "needs exactly one of `underlying` and `fields`".to_string(),
            }),
        }
    }

    fn field(&self, decl: &FieldDecl, scope: Scope<'_>) -> Result<Field> {
        let ty = self.resolve_expr(&expr::parse(&decl.ty)?, scope)?;
        let field = match (&decl.name, decl.embedded) {
            (_, true) => {
                let mut field = Field::embedded(ty);
                if let Some(name) = &decl.name {
                    field.name = name.clone();
                }
                field
            }
            (Some(name), false) => Field::new(name, ty),
            (None, false) => {
                return Err(Error::InvalidDeclaration {
                    name: decl.ty.clone(),
                    reason: "field without a name must be embedded".to_string(),
                });
            }
        };
        Ok(if decl.tag.is_empty() { field } else { field.tagged(&decl.tag) })
    }
}

/// A TypeScript expression given as text. A leading `z.` refers to the zod
/// import so that it is hoisted with the rest.
fn zod_expression(text: &str) -> Source {
    match text.strip_prefix("z.") {
        Some(rest) => {
            let escaped = rest.replace('{', "{{").replace('}', "}}");
            Source::format(&format!("{{}}.{escaped}"), [z()])
        }
        None => Source::text(text),
    }
}
