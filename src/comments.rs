//! Documentation comments for named types.
//!
//! A [`CommentLoader`] answers "what is the doc comment of this type". The
//! [`CachedLoader`] answers from per-module tables that it fetches from a
//! [`DocSource`] the first time a module is asked about, so a single loader
//! can be shared (through `Rc`) by every mapper in a run.
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use crate::error::{Error, Result};
use crate::types::Type;

pub trait CommentLoader {
    /// The doc comment of `ty`, empty when the type has none. Failing to find
    /// the type at all is an error.
    fn load(&self, ty: &Type) -> Result<String>;
}

/// Loader for runs that do not care about documentation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Undocumented;

impl CommentLoader for Undocumented {
    fn load(&self, _: &Type) -> Result<String> {
        Ok(String::new())
    }
}

/// Doc comments of one module, by bare type name.
pub type ModuleDocs = HashMap<String, String>;

/// Where the [`CachedLoader`] gets module tables from.
pub trait DocSource {
    /// `None` when the module is unknown.
    fn module_docs(&self, module: &str) -> Result<Option<ModuleDocs>>;
}

#[derive(Debug)]
pub struct CachedLoader<S> {
    source: S,
    modules: RefCell<HashMap<String, Rc<ModuleDocs>>>,
}

impl<S: DocSource> CachedLoader<S> {
    pub fn new(source: S) -> Self {
        CachedLoader { source, modules: RefCell::new(HashMap::new()) }
    }

    fn module(&self, module: &str) -> Result<Rc<ModuleDocs>> {
        if let Some(docs) = self.modules.borrow().get(module) {
            return Ok(Rc::clone(docs));
        }
        let docs = self
            .source
            .module_docs(module)?
            .ok_or_else(|| Error::ModuleNotFound { module: module.to_string() })?;
        debug!(module, types = docs.len(), "loaded module documentation");
        let docs = Rc::new(docs);
        self.modules.borrow_mut().insert(module.to_string(), Rc::clone(&docs));
        Ok(docs)
    }

    /// Number of modules fetched so far.
    pub fn cached_modules(&self) -> usize {
        self.modules.borrow().len()
    }
}

impl<S: DocSource> CommentLoader for CachedLoader<S> {
    fn load(&self, ty: &Type) -> Result<String> {
        // Predeclared and unnamed types have no declaration to document.
        if ty.module().is_empty() {
            return Ok(String::new());
        }
        let docs = self.module(ty.module())?;
        // Generic instantiations share the comment of their declaration.
        let name = ty.name().split_once('[').map_or(ty.name(), |(base, _)| base);
        docs.get(name).cloned().ok_or_else(|| Error::CommentNotFound {
            ty: ty.to_string(),
            module: ty.module().to_string(),
        })
    }
}

impl DocSource for HashMap<String, ModuleDocs> {
    fn module_docs(&self, module: &str) -> Result<Option<ModuleDocs>> {
        Ok(self.get(module).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Counting {
        calls: Cell<usize>,
    }

    impl DocSource for Counting {
        fn module_docs(&self, module: &str) -> Result<Option<ModuleDocs>> {
            self.calls.set(self.calls.get() + 1);
            if module != "m" {
                return Ok(None);
            }
            let mut docs = ModuleDocs::new();
            docs.insert("A".into(), "A is documented.\n".into());
            docs.insert("Page".into(), "Page of results.\n".into());
            Ok(Some(docs))
        }
    }

    #[test]
    fn modules_are_fetched_once() {
        let loader = CachedLoader::new(Counting { calls: Cell::new(0) });
        let a = Type::named("m", "A", &Type::string());
        assert_eq!(loader.load(&a).unwrap(), "A is documented.\n");
        assert_eq!(loader.load(&a).unwrap(), "A is documented.\n");
        assert_eq!(loader.source.calls.get(), 1);
        assert_eq!(loader.cached_modules(), 1);
    }

    #[test]
    fn generic_instantiations_use_the_base_comment() {
        let loader = CachedLoader::new(Counting { calls: Cell::new(0) });
        let page = Type::instantiate("m", "Page", vec![Type::int()], &Type::named_struct("m", "Page"));
        assert_eq!(loader.load(&page).unwrap(), "Page of results.\n");
    }

    #[test]
    fn missing_types_and_modules_fail() {
        let loader = CachedLoader::new(Counting { calls: Cell::new(0) });
        let b = Type::named("m", "B", &Type::string());
        assert!(matches!(loader.load(&b), Err(Error::CommentNotFound { .. })));
        let c = Type::named("other", "C", &Type::string());
        assert!(matches!(loader.load(&c), Err(Error::ModuleNotFound { .. })));
    }

    #[test]
    fn types_outside_modules_have_no_comment() {
        let loader = CachedLoader::new(Counting { calls: Cell::new(0) });
        assert_eq!(loader.load(&Type::slice(Type::string())).unwrap(), "");
        assert_eq!(loader.cached_modules(), 0);
    }

    #[test]
    fn undocumented_is_always_empty() {
        assert_eq!(Undocumented.load(&Type::string()).unwrap(), "");
    }
}
