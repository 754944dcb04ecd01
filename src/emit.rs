//! Ordering and rendering of the declarations a [`Mapper`] collected.
//!
//! Declarations are grouped by the module of the type they were built from.
//! Modules are placed so that, where possible, a module comes after every
//! module it depends on; within a module shallower declarations come first.
use std::collections::HashMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::resolver::{DeclarationEntry, Mapper};
use crate::ts::Source;

type ByModule<'a> = HashMap<&'a str, Vec<DeclarationEntry<'a>>>;

/// Every declaration of `mapper` as one document, blank-line separated.
pub fn supporting_declarations(mapper: &Mapper) -> Source {
    let mut all: ByModule = HashMap::new();
    let mut simple: ByModule = HashMap::new();
    for entry in mapper.declarations() {
        let module = entry.input.ty.module();
        all.entry(module).or_default().push(entry);
        if entry.input.ty.is_simple() {
            simple.entry(module).or_default().push(entry);
        }
    }

    let mut remaining: Vec<&str> = all.keys().copied().collect();
    // Standard-library-like modules first.
    remaining.sort_by_key(|module| (module.contains('.'), *module));

    let mut ordered = Vec::with_capacity(mapper.len());
    while !remaining.is_empty() {
        let index = ready(mapper, &remaining, &all).or_else(|| ready(mapper, &remaining, &simple)).unwrap_or_else(|| {
            debug!(module = remaining[0], "no module is ready; breaking the cycle");
            0
        });
        let module = remaining.remove(index);
        debug!(module, "placing module");
        let mut entries = all.remove(module).unwrap_or_default();
        entries.sort_by(|a, b| {
            a.accounting
                .depth
                .cmp(&b.accounting.depth)
                .then_with(|| a.declaration.identifier.cmp(&b.declaration.identifier))
        });
        ordered.extend(entries);
    }

    Source::statement_groups(1, ordered.into_iter().map(|entry| entry.declaration.typescript()))
}

/// Index of the first module none of whose declarations depend on a module
/// that is still waiting to be placed. References through `z.lazy` are
/// resolved when the schema runs, so they do not count.
fn ready(mapper: &Mapper, remaining: &[&str], declarations: &ByModule<'_>) -> Option<usize> {
    remaining.iter().position(|module| {
        declarations.get(module).into_iter().flatten().all(|entry| {
            entry.accounting.eager().all(|dep| {
                let dep_module = mapper.input_of(dep).map_or(*module, |r| r.ty.module());
                dep_module == *module || !remaining.contains(&dep_module)
            })
        })
    })
}

pub fn generate_string(mapper: &Mapper) -> String {
    supporting_declarations(mapper).render()
}

/// Writes the document to `path`, replacing any existing file.
pub fn generate(mapper: &Mapper, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let document = generate_string(mapper);
    let write_error = |source| Error::Write { path: path.to_path_buf(), source };
    let file = fs::File::create(path).map_err(write_error)?;
    let mut out = BufWriter::new(file);
    out.write_all(document.as_bytes()).map_err(write_error)?;
    out.flush().map_err(write_error)?;
    info!(path = %path.display(), declarations = mapper.len(), "wrote schema document");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::Resolve;
    use crate::types::{Field, Ref, Type};

    fn identifiers(document: &str) -> Vec<&str> {
        document
            .lines()
            .filter_map(|line| line.strip_prefix("export const "))
            .filter_map(|rest| rest.split([' ', ':']).next())
            .collect()
    }

    #[test]
    fn empty_mapper_renders_nothing() {
        assert_eq!(generate_string(&Mapper::new([])), "");
    }

    #[test]
    fn dependencies_come_first() {
        let when = Type::named("time", "Duration", &Type::int64());
        let id = Type::named("example.com/app", "Id", &Type::string());
        let user = Type::named_struct("example.com/app", "User");
        user.define_fields(vec![Field::new("ID", id), Field::new("Idle", when)]);
        let team = Type::named_struct("example.com/app/teams", "Team");
        team.define_fields(vec![Field::new("Members", Type::slice(user))]);

        let mut mapper = Mapper::new([]);
        mapper.resolve_all([&Ref::plain(team)]).unwrap();
        let document = generate_string(&mapper);
        assert_eq!(identifiers(&document), ["Duration", "Id", "User", "Team"]);
        assert!(document.starts_with("import { z } from \"zod\";\n\n/**\n"));
        assert!(document.contains("z.infer<typeof Id>;\n\n/**\n * User corresponds"));
    }

    #[test]
    fn module_order_beats_declaration_order() {
        // `a.example/x` sorts first but depends on `b.example/y`.
        let leaf = Type::named("b.example/y", "Leaf", &Type::bool());
        let root = Type::named_struct("a.example/x", "Root");
        root.define_fields(vec![Field::new("L", leaf)]);
        let mut mapper = Mapper::new([]);
        mapper.resolve_all([&Ref::plain(root)]).unwrap();
        assert_eq!(identifiers(&generate_string(&mapper)), ["Leaf", "Root"]);
    }

    #[test]
    fn lazily_referenced_modules_come_first() {
        let a = Type::named_struct("one.example/a", "A");
        let b = Type::named_struct("two.example/b", "B");
        a.define_fields(vec![Field::new("B", Type::pointer(b.clone()))]);
        b.define_fields(vec![Field::new("A", Type::pointer(a.clone()))]);
        let mut mapper = Mapper::new([]);
        mapper.resolve_all([&Ref::plain(a)]).unwrap();
        let document = generate_string(&mapper);
        // B only refers to A through `z.lazy`, so it can be declared first.
        assert_eq!(identifiers(&document), ["B", "A"]);
        assert!(document.contains("export const B: z.ZodTypeAny = z.object({ A: z.lazy(() => A).nullable() });"));
        assert!(document.contains("export const A = z.object({ B: B.nullable() });"));
    }

    #[test]
    fn output_is_deterministic() {
        let build = || {
            let types: Vec<Type> = ["Zeta", "Alpha", "Mid"]
                .iter()
                .map(|name| Type::named("example.com/m", name, &Type::string()))
                .collect();
            let mut mapper = Mapper::new([]);
            let refs: Vec<Ref> = types.into_iter().map(Ref::plain).collect();
            mapper.resolve_all(&refs).unwrap();
            generate_string(&mapper)
        };
        let first = build();
        assert_eq!(identifiers(&first), ["Alpha", "Mid", "Zeta"]);
        assert_eq!(first, build());
    }

    #[test]
    fn generate_writes_the_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schemas.ts");
        let mut mapper = Mapper::new([]);
        mapper.resolve(&Ref::plain(Type::named("m", "Flag", &Type::bool()))).unwrap();
        generate(&mapper, &path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), generate_string(&mapper));

        let missing = dir.path().join("no/such/dir/out.ts");
        assert!(matches!(generate(&mapper, &missing), Err(Error::Write { .. })));
    }
}
