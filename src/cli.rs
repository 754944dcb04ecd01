//! Command line: catalog → (document | single schema)
use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};

use crate::catalog::Catalog;
use crate::emit;
use crate::resolver::Mapper;
use crate::types::Ref;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// generate Zod schemas from a JSON catalog of statically typed declarations
#[derive(Parser, Debug)]
#[command(name = "zodgen", version)]
pub struct CommandLineInterface {
    /// log filter, overriding RUST_LOG (e.g. `debug` or `zodgen::resolver=trace`)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// resolve the root types and write the TypeScript document
    Generate(GenerateOut),
    /// print the schema expression of one type and the declarations it needs
    Resolve(ResolveOut),
}

#[derive(Args, Debug, Clone)]
struct CatalogSettings {
    /// One or more catalog files. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    catalog: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct GenerateOut {
    #[command(flatten)]
    catalog_settings: CatalogSettings,

    /// fully qualified root types (the catalog's roots if omitted)
    #[arg(long)]
    root: Vec<String>,

    /// output .ts file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

#[derive(clap::Parser, Debug)]
struct ResolveOut {
    #[command(flatten)]
    catalog_settings: CatalogSettings,

    /// fully qualified type expression, e.g. `example.com/shop.Page[example.com/shop.Order]`
    #[arg(long = "type")]
    ty: String,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl CatalogSettings {
    fn load(&self) -> anyhow::Result<Catalog> {
        let paths = resolve_file_path_patterns(&self.catalog).context("failed to resolve catalog file paths")?;
        Ok(Catalog::load(&paths)?)
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn log_level(&self) -> Option<&str> {
        self.log_level.as_deref()
    }

    pub fn run(&self) -> anyhow::Result<()> {
        match &self.cmd {
            Command::Generate(target) => {
                // debug path
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(());
                }
                let catalog = target.catalog_settings.load()?;
                let mapper = resolve_roots(&catalog, &target.root)?;
                if let Some(out) = target.out.as_ref() {
                    if let Some(parent) = out.parent() {
                        std::fs::create_dir_all(parent)
                            .with_context(|| format!("failed to create {}", parent.display()))?;
                    }
                    emit::generate(&mapper, out)?;
                } else {
                    print!("{}", emit::generate_string(&mapper));
                }
            }
            Command::Resolve(target) => {
                let catalog = target.catalog_settings.load()?;
                let ty = catalog.resolve_type(&target.ty)?;
                let mut mapper = Mapper::new(catalog.options()?);
                let resolved = mapper.resolve_with_accounting(&Ref::plain(ty))?;
                println!("{}", resolved.value.typescript().render_body());
                if !mapper.is_empty() {
                    print!("\n{}", emit::generate_string(&mapper));
                }
            }
        }
        Ok(())
    }
}

/// Resolves `roots`, or the catalog's own roots when none are given.
pub fn resolve_roots(catalog: &Catalog, roots: &[String]) -> crate::Result<Mapper> {
    let roots = if roots.is_empty() {
        catalog.roots()?
    } else {
        roots.iter().map(|root| Ok(Ref::plain(catalog.resolve_type(root)?))).collect::<crate::Result<Vec<_>>>()?
    };
    let mut mapper = Mapper::new(catalog.options()?);
    mapper.resolve_all(&roots)?;
    Ok(mapper)
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

pub fn resolve_file_path_patterns<I>(patterns: I) -> anyhow::Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const CATALOG: &str = r#"{
        "modules": { "m": { "types": {
            "Id": { "underlying": "string" },
            "User": { "fields": [{ "name": "ID", "type": "Id" }] }
        } } },
        "roots": ["m.User"]
    }"#;

    #[test]
    fn globs_expand_and_literals_pass_through() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.catalog.json"), "{}").unwrap();
        fs::write(dir.path().join("b.catalog.json"), "{}").unwrap();
        let pattern = format!("{}/*.catalog.json", dir.path().display());
        let paths = resolve_file_path_patterns([pattern.as_str(), "literal.json"]).unwrap();
        assert_eq!(paths.len(), 3);
        assert!(paths[0].ends_with("a.catalog.json"));
        assert_eq!(paths[2], PathBuf::from("literal.json"));

        let none = format!("{}/*.missing", dir.path().display());
        assert!(resolve_file_path_patterns([none]).is_err());
    }

    #[test]
    fn roots_default_to_the_catalog() {
        let catalog = Catalog::from_json(std::path::Path::new("inline.json"), CATALOG).unwrap();
        let mapper = resolve_roots(&catalog, &[]).unwrap();
        assert_eq!(mapper.len(), 2);
        let only_id = resolve_roots(&catalog, &["m.Id".to_string()]).unwrap();
        assert_eq!(only_id.len(), 1);
    }

    #[test]
    fn generate_creates_the_output_directory() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = dir.path().join("shop.catalog.json");
        fs::write(&catalog, CATALOG).unwrap();
        let out = dir.path().join("nested/out/schemas.ts");
        let cli = CommandLineInterface::try_parse_from([
            "zodgen",
            "generate",
            "--catalog",
            catalog.to_str().unwrap(),
            "--out",
            out.to_str().unwrap(),
        ])
        .unwrap();
        cli.run().unwrap();
        let document = fs::read_to_string(out).unwrap();
        assert!(document.contains("export const User = z.object({ ID: Id });\n"));
    }

    #[test]
    fn log_level_is_global() {
        let cli = CommandLineInterface::try_parse_from(["zodgen", "resolve", "-c", "x.json", "--type", "m.Id", "--log-level", "debug"])
            .unwrap();
        assert_eq!(cli.log_level(), Some("debug"));
    }
}
