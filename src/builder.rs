//! Lowering of source types to Zod schemas.
//!
//! [`SchemaBuilder::build`] turns one [`Ref`] into a schema. Anything the
//! schema refers to goes back through the [`Resolve`] capability, so nested
//! named types come out as references to their own declarations and the
//! resolver keeps the dependency bookkeeping out of this module.
use std::rc::Rc;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::resolver::Resolve;
use crate::schema::{Declaration, Property, Schema};
use crate::tags::{JsonTag, SchemaTag};
use crate::template;
use crate::ts::{Identifier, Source};
use crate::types::{Bits, Capability, Field, Kind, Ref, Type};

/// What building a ref produced: the schema to use where the ref appears,
/// and the declaration backing it when the ref is named.
#[derive(Debug, Clone)]
pub struct Built {
    pub schema: Schema,
    pub declaration: Option<Declaration>,
}

#[derive(Clone, Default)]
pub struct SchemaBuilder {
    config: Rc<Config>,
}

/// A top-level JSON member of a struct.
enum Member<'a> {
    Property { name: &'a str, field: &'a Field },
    Embedded(&'a Type),
}

impl SchemaBuilder {
    pub fn new(config: Config) -> Self {
        SchemaBuilder { config: Rc::new(config) }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn build(&self, r: &Ref, resolver: &mut dyn Resolve) -> Result<Built> {
        let raw = self.build_raw(r, resolver)?;
        let mut schema = match self.config.transform(&r.ty) {
            Some(transform) => raw.clone().transform(transform(resolver)?),
            None => raw.clone(),
        };
        let before_templating = schema.clone();
        if let Some(template) = self.config.template(&r.ty) {
            schema = template::apply(&raw, template)?;
        }

        let Some(name) = self.name(r) else {
            return Ok(Built { schema, declaration: None });
        };
        if self.should_brand(&r.ty, &before_templating) {
            schema = schema.brand(name.as_str());
        }
        let mut comment = format!(
            "{name} corresponds to source type {r} (in module {:?}).\n",
            r.ty.module()
        );
        let original = self.config.comments().load(&r.ty)?;
        if !original.is_empty() {
            comment.push_str("The comment on the original source type follows.\n\n");
            comment.push_str(&original);
        }
        Ok(Built {
            schema: schema.clone().declared_as(name.clone()),
            declaration: Some(Declaration::new(comment, name, schema)),
        })
    }

    /// The identifier `r` is declared under, or `None` when its schema is
    /// inlined wherever it is used.
    pub fn name(&self, r: &Ref) -> Option<Identifier> {
        if r.omit_empty {
            return None;
        }
        if let Some(name) = self.config.name(&r.ty) {
            return Some(name.clone());
        }
        if self.config.is_unnamed(&r.ty) || r.ty.module().is_empty() {
            return None;
        }
        Some(Identifier::new(default_identifier(&r.ty)))
    }

    /// Primitive-backed types get a brand so that two of them with the same
    /// representation stay distinct. Objects and bespoke schemas do not.
    fn should_brand(&self, ty: &Type, schema: &Schema) -> bool {
        if self.config.has_bespoke_schema(ty) {
            return false;
        }
        let mut current = schema.clone();
        loop {
            if current.is_object() {
                return false;
            }
            match current.unwrap_brand() {
                Some(inner) => current = inner,
                None => return true,
            }
        }
    }

    fn build_raw(&self, r: &Ref, resolver: &mut dyn Resolve) -> Result<Schema> {
        let ty = &r.ty;
        if let Some(schema) = self.config.schema(ty) {
            return schema(resolver);
        }
        if let Some(members) = self.config.undiscriminated_union(ty) {
            let members = resolve_members(members, r.omit_empty, resolver)?;
            return Ok(Schema::union(members));
        }
        if let Some(union) = self.config.discriminated_union(ty) {
            let members = resolve_members(&union.members, r.omit_empty, resolver)?;
            return Ok(Schema::discriminated_union(union.property.clone(), members));
        }
        if self.config.template(ty).is_none() && ty.implements(&Capability::TextMarshaler) {
            return Ok(Schema::string().into());
        }

        match ty.kind() {
            Kind::Bool => Ok(Schema::Boolean),
            Kind::Int(_) => Ok(Schema::number().int().into()),
            Kind::Uint(_) | Kind::Uintptr => Ok(Schema::number().nonnegative().int().into()),
            Kind::Float32 | Kind::Float64 => Ok(Schema::number().into()),
            Kind::String => Ok(Schema::string().into()),
            Kind::Array(len) => {
                let element = resolver.resolve(&elem_ref(ty)?)?;
                Ok(Schema::fixed_array(element, len))
            }
            Kind::Interface => Ok(Schema::Any),
            Kind::Map => {
                let key_ty = ty.key_type().cloned().ok_or_else(|| missing(ty, "key"))?;
                let key = resolver.resolve(&Ref::plain(key_ty))?;
                let value = resolver.resolve(&elem_ref(ty)?)?;
                // Nil maps encode as null.
                Ok(homogenized(r, Schema::record(key, value), "r => r ?? {}"))
            }
            Kind::Pointer => {
                let pointee = resolver.resolve(&elem_ref(ty)?)?;
                Ok(if r.omit_empty { pointee } else { pointee.ensure_nullable() })
            }
            Kind::Slice => {
                // Byte slices encode as base64 strings, nil slices as null.
                if is_base64_encoded(ty) {
                    Ok(homogenized(r, Schema::string().into(), "a => a ?? \"\""))
                } else {
                    let element = resolver.resolve(&elem_ref(ty)?)?;
                    Ok(homogenized(r, Schema::array(element), "a => a ?? []"))
                }
            }
            Kind::Struct => self.build_struct(ty, resolver),
            kind @ (Kind::Complex64 | Kind::Complex128 | Kind::Chan | Kind::Func) => {
                Err(Error::UnsupportedKind { ty: ty.to_string(), kind: kind.to_string() })
            }
        }
    }

    fn build_struct(&self, ty: &Type, resolver: &mut dyn Resolve) -> Result<Schema> {
        let mut value_fields = ty.fields().iter().filter(|f| SchemaTag::parse(f.tag.get("zod")).value);
        if let Some(field) = value_fields.next() {
            if value_fields.next().is_some() {
                return Err(Error::MultipleValueFields { ty: ty.to_string() });
            }
            return self.field_schema(field, resolver);
        }

        let members = json_members(ty);
        if let [Member::Embedded(embedded)] = members.as_slice() {
            return resolver.resolve(&Ref::plain((*embedded).clone()));
        }

        let mut schema: Option<Schema> = None;
        let mut properties = Vec::new();
        if let Some(d) = self.config.discriminator(ty) {
            properties.push(Property::new(d.property.clone(), Schema::literal(d.value.clone())));
        }
        for member in members {
            match member {
                Member::Property { name, field } => {
                    properties.push(Property::new(name, self.field_schema(field, resolver)?));
                }
                Member::Embedded(embedded) => {
                    if !properties.is_empty() {
                        schema = Some(with_properties(schema, std::mem::take(&mut properties)));
                    }
                    let resolved = resolver.resolve(&Ref::plain(embedded.clone()))?;
                    if !resolved.is_object() {
                        return Err(Error::EmbeddedNotObject {
                            ty: embedded.to_string(),
                            schema: resolved.typescript().render_body(),
                        });
                    }
                    schema = Some(match schema {
                        Some(schema) => schema.merge(resolved),
                        None => resolved,
                    });
                }
            }
        }
        Ok(match schema {
            Some(schema) if properties.is_empty() => schema,
            schema => with_properties(schema, properties),
        })
    }

    fn field_schema(&self, field: &Field, resolver: &mut dyn Resolve) -> Result<Schema> {
        let json = JsonTag::parse(field.json());
        let directives = SchemaTag::parse(field.tag.get("zod"));
        let r = Ref::new(field.ty.clone(), json.omit_empty);
        let mut schema = resolver.resolve(&r)?;
        if json.string && supports_string_encoding(&field.ty) {
            let (inner, was_nullable) = schema.strip_nullable();
            schema = Schema::from(Schema::string()).transform("s => JSON.parse(s)").pipe(inner);
            if was_nullable {
                schema = schema.ensure_nullable();
            }
        }
        if directives.nullable {
            schema = schema.ensure_nullable();
        }
        if r.omit_empty {
            schema = schema.optional();
        }
        Ok(schema)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn resolve_members(members: &[Type], omit_empty: bool, resolver: &mut dyn Resolve) -> Result<Vec<Schema>> {
    members
        .iter()
        .map(|t| resolver.resolve(&Ref::new(t.clone(), omit_empty)))
        .collect()
}

/// `Page[example.com/shop.Order]` is declared as `Page_Order`.
fn default_identifier(ty: &Type) -> String {
    if ty.name().is_empty() {
        return ty.to_string().chars().filter(|c| c.is_ascii_alphanumeric() || *c == '_').collect();
    }
    let base = ty.name().split_once('[').map_or(ty.name(), |(head, _)| head);
    ty.type_args().iter().fold(base.to_string(), |mut out, arg| {
        out.push('_');
        out.push_str(&default_identifier(arg));
        out
    })
}

fn elem_ref(ty: &Type) -> Result<Ref> {
    ty.elem().cloned().map(Ref::plain).ok_or_else(|| missing(ty, "element"))
}

fn missing(ty: &Type, what: &str) -> Error {
    Error::InvalidDeclaration { name: ty.to_string(), reason: format!("{} type without an {what} type", ty.kind()) }
}

/// Nilable collections become nullable, unless the ref omits empty values,
/// and always carry a transform turning null into the empty value.
fn homogenized(r: &Ref, schema: Schema, transform: &str) -> Schema {
    let schema = if r.omit_empty { schema } else { schema.ensure_nullable() };
    schema.transform(Source::text(transform))
}

fn is_base64_encoded(slice: &Type) -> bool {
    slice.elem().is_some_and(|elem| {
        elem.kind() == Kind::Uint(Bits::B8)
            && !elem.implements(&Capability::JsonMarshaler)
            && !elem.implements(&Capability::TextMarshaler)
    })
}

fn supports_string_encoding(ty: &Type) -> bool {
    match ty.kind() {
        Kind::Pointer => ty.elem().is_some_and(supports_string_encoding),
        Kind::Complex64 | Kind::Complex128 => false,
        kind => kind.is_scalar(),
    }
}

fn with_properties(schema: Option<Schema>, properties: Vec<Property>) -> Schema {
    match schema {
        Some(schema) => schema.extend(properties),
        None => Schema::object(properties),
    }
}

/// Top-level JSON members of a struct in declaration order.
fn json_members(ty: &Type) -> Vec<Member<'_>> {
    let mut members = Vec::new();
    for field in ty.fields() {
        let json = JsonTag::parse(field.json());
        if json.skip {
            continue;
        }
        if field.anonymous && json.name.is_empty() {
            members.push(Member::Embedded(&field.ty));
            continue;
        }
        if !field.exported {
            continue;
        }
        let name = if json.name.is_empty() { field.name.as_str() } else { json.name };
        members.push(Member::Property { name, field });
    }
    members
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigOption, for_type};

    /// Resolves everything inline, the way the memoizing resolver treats
    /// unnamed refs.
    struct Inline(SchemaBuilder);

    impl Resolve for Inline {
        fn resolve(&mut self, r: &Ref) -> Result<Schema> {
            let builder = self.0.clone();
            Ok(builder.build(r, self)?.schema)
        }
    }

    fn build(ty: &Type, options: Vec<ConfigOption>) -> Result<String> {
        let builder = SchemaBuilder::new(Config::new(options));
        let mut inline = Inline(builder.clone());
        let built = builder.build(&Ref::plain(ty.clone()), &mut inline)?;
        Ok(built.schema.typescript().render_body())
    }

    fn render(ty: &Type) -> String {
        build(ty, Vec::new()).unwrap()
    }

    #[test]
    fn scalars() {
        assert_eq!(render(&Type::bool()), "z.boolean()");
        assert_eq!(render(&Type::int64()), "z.number().int()");
        assert_eq!(render(&Type::uint()), "z.number().nonnegative().int()");
        assert_eq!(render(&Type::float64()), "z.number()");
        assert_eq!(render(&Type::string()), "z.string()");
        assert_eq!(render(&Type::any()), "z.any()");
    }

    #[test]
    fn collections_are_homogenized() {
        assert_eq!(
            render(&Type::slice(Type::string())),
            "z.array(z.string()).nullable().transform(a => a ?? [])"
        );
        assert_eq!(render(&Type::slice(Type::uint8())), "z.string().nullable().transform(a => a ?? \"\")");
        assert_eq!(
            render(&Type::map(Type::string(), Type::int())),
            "z.record(z.string(), z.number().int()).nullable().transform(r => r ?? {})"
        );
        assert_eq!(render(&Type::array(Type::bool(), 2)), "z.array(z.boolean()).length(2)");
    }

    #[test]
    fn omit_empty_collections_keep_the_homogenizing_transform() {
        let t = Type::structure(vec![
            Field::new("Tags", Type::map(Type::string(), Type::bool())).tagged(r#"json:"tags,omitempty""#),
            Field::new("Raw", Type::slice(Type::uint8())).tagged(r#"json:"raw,omitempty""#),
        ]);
        assert_eq!(
            render(&t),
            "z.object({\n    \
             tags: z.record(z.string(), z.boolean()).transform(r => r ?? {}).optional(),\n    \
             raw: z.string().transform(a => a ?? \"\").optional(),\n\
             })"
        );
    }

    #[test]
    fn marshaling_bytes_are_not_base64() {
        let b = Type::named("m", "B", &Type::uint8()).implementing(Capability::JsonMarshaler);
        let options = vec![for_type(&b).unnamed().into()];
        assert_eq!(
            build(&Type::slice(b), options).unwrap(),
            "z.array(z.number().nonnegative().int()).nullable().transform(a => a ?? [])"
        );
    }

    #[test]
    fn pointers_are_nullable_once() {
        assert_eq!(render(&Type::pointer(Type::string())), "z.string().nullable()");
        assert_eq!(
            render(&Type::pointer(Type::pointer(Type::string()))),
            "z.string().nullable()"
        );
    }

    #[test]
    fn named_scalars_are_branded_and_declared() {
        let id = Type::named("example.com/shop", "OrderID", &Type::int64());
        let builder = SchemaBuilder::default();
        let mut inline = Inline(builder.clone());
        let built = builder.build(&Ref::plain(id.clone()), &mut inline).unwrap();
        assert_eq!(built.schema.typescript().render_body(), "OrderID");
        let decl = built.declaration.unwrap();
        assert_eq!(decl.schema.typescript().render_body(), "z.number().int().brand(\"OrderID\")");
        assert_eq!(
            decl.comment,
            "OrderID corresponds to source type shop.OrderID (in module \"example.com/shop\").\n"
        );
    }

    #[test]
    fn generic_instantiations_get_plain_identifiers() {
        let order = Type::named("example.com/shop", "Order", &Type::string());
        let page = Type::instantiate(
            "example.com/shop",
            "Page",
            vec![order, Type::slice(Type::int())],
            &Type::structure(Vec::new()),
        );
        let name = SchemaBuilder::default().name(&Ref::plain(page)).unwrap();
        assert_eq!(name.as_str(), "Page_Order_int");
    }

    #[test]
    fn omit_empty_refs_are_never_named() {
        let id = Type::named("m", "Id", &Type::string());
        let builder = SchemaBuilder::default();
        let mut inline = Inline(builder.clone());
        let built = builder.build(&Ref::new(id, true), &mut inline).unwrap();
        assert!(built.declaration.is_none());
        assert_eq!(built.schema.typescript().render_body(), "z.string()");
    }

    #[test]
    fn struct_fields_follow_directives() {
        let t = Type::structure(vec![
            Field::new("Name", Type::string()),
            Field::new("Renamed", Type::bool()).tagged(r#"json:"renamed""#),
            Field::new("Skipped", Type::bool()).tagged(r#"json:"-""#),
            Field::new("Dash", Type::bool()).tagged(r#"json:"-,""#),
            Field::new("hidden", Type::bool()),
            Field::new("Count", Type::int()).tagged(r#"json:"count,string""#),
            Field::new("Maybe", Type::pointer(Type::int())).tagged(r#"json:",string""#),
            Field::new("Opt", Type::slice(Type::string())).tagged(r#"json:",omitempty""#),
            Field::new("Forced", Type::string()).tagged(r#"zod:",nullable""#),
        ]);
        assert_eq!(
            render(&t),
            "z.object({\n    \
             Name: z.string(),\n    \
             renamed: z.boolean(),\n    \
             \"-\": z.boolean(),\n    \
             count: z.string().transform(s => JSON.parse(s)).pipe(z.number().int()),\n    \
             Maybe: z.string().transform(s => JSON.parse(s)).pipe(z.number().int()).nullable(),\n    \
             Opt: z.array(z.string()).transform(a => a ?? []).optional(),\n    \
             Forced: z.string().nullable(),\n\
             })"
        );
    }

    #[test]
    fn string_directive_is_ignored_for_composites() {
        let t = Type::structure(vec![Field::new("Xs", Type::slice(Type::int())).tagged(r#"json:",string""#)]);
        assert_eq!(
            render(&t),
            "z.object({ Xs: z.array(z.number().int()).nullable().transform(a => a ?? []) })"
        );
    }

    #[test]
    fn value_fields_make_the_struct_transparent() {
        let t = Type::structure(vec![
            Field::new("V", Type::slice(Type::string())).tagged(r#"zod:",value""#),
            Field::new("Other", Type::int()),
        ]);
        assert_eq!(render(&t), "z.array(z.string()).nullable().transform(a => a ?? [])");
        let two = Type::structure(vec![
            Field::new("A", Type::int()).tagged(r#"zod:",value""#),
            Field::new("B", Type::int()).tagged(r#"zod:",value""#),
        ]);
        assert!(matches!(build(&two, Vec::new()), Err(Error::MultipleValueFields { .. })));
    }

    #[test]
    fn single_embedded_struct_is_delegated_to() {
        let inner = Type::structure(vec![Field::new("A", Type::string())]);
        let outer = Type::structure(vec![Field::embedded(inner.clone()), Field::new("hidden", Type::int())]);
        assert_eq!(render(&outer), render(&inner));
    }

    #[test]
    fn embedded_structs_merge_in_order() {
        let base = Type::structure(vec![Field::new("A", Type::string())]);
        let t = Type::structure(vec![
            Field::new("First", Type::int()),
            Field::embedded(base.clone()),
            Field::new("Last", Type::bool()),
        ]);
        assert_eq!(
            render(&t),
            "z.object({ First: z.number().int() }).merge(z.object({ A: z.string() })).extend({ Last: z.boolean() })"
        );
        let leading = Type::structure(vec![Field::embedded(base), Field::new("Last", Type::bool())]);
        assert_eq!(render(&leading), "z.object({ A: z.string() }).extend({ Last: z.boolean() })");
    }

    #[test]
    fn embedded_non_objects_are_rejected() {
        let t = Type::structure(vec![Field::embedded(Type::string()), Field::new("A", Type::int())]);
        assert!(matches!(build(&t, Vec::new()), Err(Error::EmbeddedNotObject { .. })));
    }

    #[test]
    fn discriminators_come_first() {
        let t = Type::named_struct("m", "Cat");
        t.define_fields(vec![Field::new("Lives", Type::int())]);
        let options = vec![for_type(&t).unnamed().discriminator("kind", "cat").into()];
        assert_eq!(
            build(&t, options).unwrap(),
            "z.object({\n    kind: z.literal(\"cat\"),\n    Lives: z.number().int(),\n})"
        );
    }

    #[test]
    fn unions_distribute_the_omit_flag() {
        let u = Type::named("m", "U", &Type::any());
        let a = Type::named("m", "A", &Type::string());
        let options = vec![for_type(&u).union_of(vec![a, Type::int()]).into()];
        let builder = SchemaBuilder::new(Config::new(options));
        let mut inline = Inline(builder.clone());
        let built = builder.build(&Ref::new(u, true), &mut inline).unwrap();
        assert_eq!(
            built.schema.typescript().render_body(),
            "z.union([\n    z.string(),\n    z.number().int(),\n])"
        );
    }

    #[test]
    fn text_marshalers_are_strings() {
        let t = Type::named_struct("m", "When").implementing(Capability::TextMarshaler);
        let options = vec![for_type(&t).unnamed().into()];
        assert_eq!(build(&t, options).unwrap(), "z.string()");
    }

    #[test]
    fn templates_replace_the_raw_schema_and_keep_the_brand() {
        let id = Type::named("m", "Id", &Type::int());
        let options = vec![for_type(&id).template("id-{}").into()];
        let builder = SchemaBuilder::new(Config::new(options));
        let mut inline = Inline(builder.clone());
        let decl = builder.build(&Ref::plain(id), &mut inline).unwrap().declaration.unwrap();
        let rendered = decl.schema.typescript().render_body();
        assert!(rendered.starts_with("z.string().transform((s, ctx) => {\n"));
        assert!(rendered.ends_with("}).brand(\"Id\")"));
    }

    #[test]
    fn bespoke_schemas_are_not_branded() {
        let t = Type::named("m", "T", &Type::string());
        let builder = SchemaBuilder::new(Config::new([for_type(&t).transform("s => s.trim()").into()]));
        let mut inline = Inline(builder.clone());
        let decl = builder.build(&Ref::plain(t), &mut inline).unwrap().declaration.unwrap();
        assert_eq!(decl.schema.typescript().render_body(), "z.string().transform(s => s.trim())");
    }

    #[test]
    fn unsupported_kinds_fail() {
        let t = Type::structure(vec![Field::new("C", Type::of_kind(Kind::Chan))]);
        assert!(matches!(build(&t, Vec::new()), Err(Error::UnsupportedKind { .. })));
    }
}
