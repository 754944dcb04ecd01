//! Memoizing resolution of refs to schemas.
//!
//! The [`Mapper`] owns every declaration produced during a run. Resolving a
//! ref that names a declaration builds it once and from then on hands out a
//! reference to it. Alongside each result the mapper tracks [`Accounting`]:
//! which declarations the result depends on and how deep that dependency
//! chain goes. The emitter uses both to order its output.
use std::collections::{BTreeSet, HashMap, HashSet};

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::builder::SchemaBuilder;
use crate::config::{Config, ConfigOption};
use crate::error::{Error, Result};
use crate::schema::{Declaration, Schema};
use crate::ts::Identifier;
use crate::types::Ref;

/// Capability handed to the builder for resolving nested refs.
pub trait Resolve {
    fn resolve(&mut self, r: &Ref) -> Result<Schema>;
}

/// Dependencies observed while resolving something.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Accounting {
    pub dependencies: BTreeSet<Identifier>,
    /// The dependencies only ever referred to through `z.lazy`, which need
    /// not be declared first.
    pub lazy: BTreeSet<Identifier>,
    /// 1 + the deepest dependency, 0 without dependencies.
    pub depth: usize,
}

#[derive(Debug, Clone)]
pub struct WithAccounting<T> {
    pub value: T,
    pub accounting: Accounting,
}

pub struct Mapper {
    builder: SchemaBuilder,
    names_by_input: HashMap<Ref, Identifier>,
    declarations: IndexMap<Identifier, Mapped>,
    /// Unnamed refs being built inline since the last named reservation.
    inline: HashSet<Ref>,
}

/// A declaration the mapper holds, with the ref it was built from.
#[derive(Debug, Clone, Copy)]
pub struct DeclarationEntry<'a> {
    pub input: &'a Ref,
    pub declaration: &'a Declaration,
    pub accounting: &'a Accounting,
}

struct Mapped {
    input: Ref,
    slot: Slot,
}

enum Slot {
    /// Reserved while the declaration is being built.
    Pending,
    Done {
        declaration: WithAccounting<Declaration>,
        reference: WithAccounting<Schema>,
    },
}

/// Forwards nested resolutions to the mapper and records what they saw.
struct AccountingResolver<'m> {
    mapper: &'m mut Mapper,
    observed: Accounting,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl Accounting {
    fn single(name: Identifier, depth: usize) -> Self {
        Accounting { dependencies: BTreeSet::from([name]), lazy: BTreeSet::new(), depth }
    }

    fn lazy(name: Identifier) -> Self {
        Accounting { dependencies: BTreeSet::from([name.clone()]), lazy: BTreeSet::from([name]), depth: 1 }
    }

    fn absorb(&mut self, other: &Accounting) {
        self.depth = self.depth.max(other.depth);
        for dep in &other.dependencies {
            let seen_eagerly = self.dependencies.contains(dep) && !self.lazy.contains(dep);
            if other.lazy.contains(dep) && !seen_eagerly {
                self.lazy.insert(dep.clone());
            } else {
                self.lazy.remove(dep);
            }
            self.dependencies.insert(dep.clone());
        }
    }

    /// Dependencies that must be declared before the dependent.
    pub fn eager(&self) -> impl Iterator<Item = &Identifier> {
        self.dependencies.difference(&self.lazy)
    }
}

impl Mapper {
    pub fn new(options: impl IntoIterator<Item = ConfigOption>) -> Self {
        Mapper::with_builder(SchemaBuilder::new(Config::new(options)))
    }

    pub fn with_builder(builder: SchemaBuilder) -> Self {
        Mapper {
            builder,
            names_by_input: HashMap::new(),
            declarations: IndexMap::new(),
            inline: HashSet::new(),
        }
    }

    pub fn resolve_all<'r>(&mut self, refs: impl IntoIterator<Item = &'r Ref>) -> Result<()> {
        for r in refs {
            self.resolve_with_accounting(r)?;
        }
        Ok(())
    }

    pub fn resolve_with_accounting(&mut self, r: &Ref) -> Result<WithAccounting<Schema>> {
        if let Some(name) = self.names_by_input.get(r) {
            return Ok(self.reference(name));
        }

        let builder = self.builder.clone();
        let Some(name) = builder.name(r) else {
            // Without a name there is nothing for a nested request to refer to.
            if !self.inline.insert(r.clone()) {
                return Err(Error::UnnamedRecursion { ty: r.to_string() });
            }
            let mut nested = AccountingResolver { mapper: self, observed: Accounting::default() };
            let built = builder.build(r, &mut nested);
            let observed = nested.observed;
            self.inline.remove(r);
            let built = built?;
            trace!(input = %r, "resolved inline");
            return Ok(WithAccounting { value: built.schema, accounting: observed });
        };
        if let Some(existing) = self.declarations.get(&name) {
            return Err(Error::DuplicateDeclaration {
                name: name.to_string(),
                existing: existing.input.to_string(),
                requested: r.to_string(),
            });
        }

        self.declarations.insert(name.clone(), Mapped { input: r.clone(), slot: Slot::Pending });
        self.names_by_input.insert(r.clone(), name.clone());
        // Inline refs met below this point can fall back on the reserved name.
        let outer_inline = std::mem::take(&mut self.inline);
        let mut nested = AccountingResolver { mapper: self, observed: Accounting::default() };
        let built = builder.build(r, &mut nested);
        let observed = nested.observed;
        self.inline = outer_inline;
        let built = match built {
            Ok(built) => built,
            Err(err) => {
                self.declarations.shift_remove(&name);
                self.names_by_input.remove(r);
                return Err(err);
            }
        };
        // A nameable ref always comes back with a declaration.
        let declaration = built.declaration.unwrap_or_else(|| {
            Declaration::new(String::new(), name.clone(), built.schema.clone())
        });
        let declaration = if observed.lazy.is_empty() { declaration } else { declaration.self_referential() };
        debug!(declaration = %name, input = %r, depth = observed.depth, "declared");

        let reference = WithAccounting {
            value: built.schema,
            accounting: Accounting::single(name.clone(), observed.depth + 1),
        };
        let slot = Slot::Done {
            declaration: WithAccounting { value: declaration, accounting: observed },
            reference: reference.clone(),
        };
        if let Some(mapped) = self.declarations.get_mut(&name) {
            mapped.slot = slot;
        }
        Ok(reference)
    }

    /// Every finished declaration, in the order resolution started them.
    pub fn declarations(&self) -> impl Iterator<Item = DeclarationEntry<'_>> {
        self.declarations.values().filter_map(|mapped| match &mapped.slot {
            Slot::Done { declaration, .. } => Some(DeclarationEntry {
                input: &mapped.input,
                declaration: &declaration.value,
                accounting: &declaration.accounting,
            }),
            Slot::Pending => None,
        })
    }

    /// The ref declared as `name`.
    pub fn input_of(&self, name: &Identifier) -> Option<&Ref> {
        self.declarations.get(name).map(|mapped| &mapped.input)
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    fn reference(&self, name: &Identifier) -> WithAccounting<Schema> {
        match self.declarations.get(name).map(|mapped| &mapped.slot) {
            Some(Slot::Done { reference, .. }) => reference.clone(),
            // Still being built: refer to it lazily.
            _ => WithAccounting { value: Schema::Lazy(name.clone()), accounting: Accounting::lazy(name.clone()) },
        }
    }
}

impl Resolve for Mapper {
    fn resolve(&mut self, r: &Ref) -> Result<Schema> {
        Ok(self.resolve_with_accounting(r)?.value)
    }
}

impl Resolve for AccountingResolver<'_> {
    fn resolve(&mut self, r: &Ref) -> Result<Schema> {
        let resolved = self.mapper.resolve_with_accounting(r)?;
        self.observed.absorb(&resolved.accounting);
        Ok(resolved.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::for_type;
    use crate::types::{Field, Type};

    fn names(mapper: &Mapper) -> Vec<String> {
        mapper.declarations().map(|d| d.declaration.identifier.to_string()).collect()
    }

    #[test]
    fn named_refs_are_declared_once() {
        let id = Type::named("m", "Id", &Type::string());
        let mut mapper = Mapper::new([]);
        let first = mapper.resolve_with_accounting(&Ref::plain(id.clone())).unwrap();
        let second = mapper.resolve_with_accounting(&Ref::plain(id)).unwrap();
        assert_eq!(first.value.typescript().render_body(), "Id");
        assert_eq!(second.accounting, first.accounting);
        assert_eq!(first.accounting.depth, 1);
        assert_eq!(names(&mapper), ["Id"]);
    }

    #[test]
    fn unnamed_refs_report_what_they_observed() {
        let id = Type::named("m", "Id", &Type::string());
        let mut mapper = Mapper::new([]);
        let list = mapper.resolve_with_accounting(&Ref::plain(Type::slice(id))).unwrap();
        assert_eq!(list.accounting, Accounting::single("Id".into(), 1));
        let plain = mapper.resolve_with_accounting(&Ref::plain(Type::string())).unwrap();
        assert_eq!(plain.accounting, Accounting::default());
    }

    #[test]
    fn declarations_record_their_closure_and_references_hide_it() {
        let id = Type::named("m", "Id", &Type::string());
        let user = Type::named_struct("m", "User");
        user.define_fields(vec![Field::new("ID", id)]);
        let team = Type::named_struct("m", "Team");
        team.define_fields(vec![Field::new("Lead", user)]);

        let mut mapper = Mapper::new([]);
        let reference = mapper.resolve_with_accounting(&Ref::plain(team)).unwrap();
        assert_eq!(reference.accounting, Accounting::single("Team".into(), 3));
        let depths: Vec<_> = mapper
            .declarations()
            .map(|d| (d.declaration.identifier.to_string(), d.accounting.depth))
            .collect();
        assert_eq!(depths, [("Team".to_string(), 2), ("User".to_string(), 1), ("Id".to_string(), 0)]);
        let team_entry = mapper.declarations().next().unwrap();
        assert_eq!(team_entry.accounting.dependencies, BTreeSet::from(["User".into()]));
    }

    #[test]
    fn recursive_types_refer_to_themselves_lazily() {
        let node = Type::named_struct("m", "Node");
        node.define_fields(vec![
            Field::new("Value", Type::int()),
            Field::new("Next", Type::pointer(node.clone())),
        ]);
        let mut mapper = Mapper::new([]);
        mapper.resolve(&Ref::plain(node)).unwrap();
        let entry = mapper.declarations().next().unwrap();
        assert_eq!(
            entry.declaration.schema.typescript().render_body(),
            "z.object({\n    Value: z.number().int(),\n    Next: z.lazy(() => Node).nullable(),\n})"
        );
        assert!(entry.accounting.dependencies.contains(&Identifier::new("Node")));
    }

    #[test]
    fn lazy_references_stay_lazy_until_seen_eagerly() {
        let mut accounting = Accounting::default();
        accounting.absorb(&Accounting::lazy("A".into()));
        assert_eq!(accounting.eager().count(), 0);
        accounting.absorb(&Accounting::single("A".into(), 2));
        assert_eq!(accounting.eager().collect::<Vec<_>>(), [&Identifier::new("A")]);
        accounting.absorb(&Accounting::lazy("A".into()));
        assert_eq!(accounting.eager().count(), 1);
        assert_eq!(accounting.depth, 2);
    }

    #[test]
    fn unnamed_recursive_types_are_errors() {
        let node = Type::named_struct("m", "Node");
        node.define_fields(vec![Field::new("Next", Type::pointer(node.clone()))]);
        let mut mapper = Mapper::new([for_type(&node).unnamed().into()]);
        let err = mapper.resolve(&Ref::plain(node.clone())).unwrap_err();
        assert!(matches!(err, Error::UnnamedRecursion { ref ty } if ty == "m.Node"));
        // Pointers to a named recursive type are still fine.
        let named = Type::named_struct("m", "List");
        named.define_fields(vec![Field::new("Next", Type::pointer(named.clone()))]);
        let mut mapper = Mapper::new([]);
        let schema = mapper.resolve(&Ref::plain(Type::pointer(named))).unwrap();
        assert_eq!(schema.typescript().render_body(), "List.nullable()");
        assert_eq!(mapper.len(), 1);
    }

    #[test]
    fn clashing_names_are_rejected() {
        let a = Type::named("m", "A", &Type::string());
        let b = Type::named("m", "B", &Type::int());
        let mut mapper = Mapper::new([for_type(&b).named("A").into()]);
        mapper.resolve(&Ref::plain(a.clone())).unwrap();
        let err = mapper.resolve(&Ref::plain(b)).unwrap_err();
        assert!(matches!(err, Error::DuplicateDeclaration { ref name, .. } if name == "A"));
        // The same input again is fine.
        mapper.resolve(&Ref::plain(a)).unwrap();
        assert_eq!(mapper.len(), 1);
    }

    #[test]
    fn failed_builds_leave_no_reservation() {
        let bad = Type::named_struct("m", "Bad");
        bad.define_fields(vec![Field::new("F", Type::of_kind(crate::types::Kind::Func))]);
        let mut mapper = Mapper::new([]);
        assert!(mapper.resolve(&Ref::plain(bad)).is_err());
        assert!(mapper.is_empty());
    }
}
