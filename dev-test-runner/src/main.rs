//! Golden-file runner: every `<name>.catalog.json` under the fixtures
//! directory must generate exactly the sibling `<name>.ts`.
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, bail};
use clap::Parser;
use colored::Colorize;

use zodgen::catalog::Catalog;

#[derive(Parser, Debug)]
#[command(name = "dev-test-runner")]
struct CommandLineInterface {
    /// directory holding `*.catalog.json` fixtures and their expected `.ts` output
    #[arg(long, default_value = "fixtures")]
    fixtures: PathBuf,

    /// overwrite the expected output with what is generated now
    #[arg(long)]
    bless: bool,
}

enum Outcome {
    Pass,
    Blessed,
    Fail(String),
}

fn main() -> ExitCode {
    let cli = CommandLineInterface::parse();
    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(error) => {
            eprintln!("{} {error:#}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &CommandLineInterface) -> anyhow::Result<bool> {
    let pattern = cli.fixtures.join("*.catalog.json");
    let pattern = pattern.to_str().context("fixture directory is not valid UTF-8")?;
    let catalogs = glob::glob(pattern)?.collect::<Result<Vec<_>, _>>()?;
    if catalogs.is_empty() {
        bail!("no fixtures under {}", cli.fixtures.display());
    }

    let mut failures = 0;
    for catalog in &catalogs {
        let label = catalog.display().to_string();
        match check(catalog, cli.bless) {
            Ok(Outcome::Pass) => println!("{} {label}", "pass".green()),
            Ok(Outcome::Blessed) => println!("{} {label}", "blessed".yellow()),
            Ok(Outcome::Fail(diff)) => {
                failures += 1;
                println!("{} {label}\n{diff}", "FAIL".red().bold());
            }
            Err(error) => {
                failures += 1;
                println!("{} {label}: {error:#}", "ERROR".red().bold());
            }
        }
    }
    println!("\n{} fixtures, {} failed", catalogs.len(), failures);
    Ok(failures == 0)
}

fn check(catalog_path: &Path, bless: bool) -> anyhow::Result<Outcome> {
    let expected_path = expected_path(catalog_path)?;
    let catalog = Catalog::load(&[catalog_path.to_path_buf()])?;
    let mapper = zodgen::cli::resolve_roots(&catalog, &[])?;
    let actual = zodgen::generate_string(&mapper);

    if bless {
        std::fs::write(&expected_path, &actual)
            .with_context(|| format!("failed to write {}", expected_path.display()))?;
        return Ok(Outcome::Blessed);
    }
    let expected = std::fs::read_to_string(&expected_path)
        .with_context(|| format!("failed to read {}", expected_path.display()))?;
    if expected == actual {
        return Ok(Outcome::Pass);
    }
    Ok(Outcome::Fail(first_difference(&expected, &actual)))
}

/// `shop.catalog.json` → `shop.ts`
fn expected_path(catalog_path: &Path) -> anyhow::Result<PathBuf> {
    let file_name = catalog_path.file_name().and_then(|n| n.to_str()).context("fixture without a file name")?;
    let stem = file_name.strip_suffix(".catalog.json").context("fixture is not a .catalog.json file")?;
    Ok(catalog_path.with_file_name(format!("{stem}.ts")))
}

fn first_difference(expected: &str, actual: &str) -> String {
    let mut expected_lines = expected.lines();
    let mut actual_lines = actual.lines();
    let mut line = 1;
    loop {
        match (expected_lines.next(), actual_lines.next()) {
            (Some(e), Some(a)) if e == a => line += 1,
            (None, None) => return "  (outputs differ only in trailing whitespace)".to_string(),
            (e, a) => {
                return format!(
                    "  line {line}\n  {} {}\n  {} {}",
                    "expected:".green(),
                    e.unwrap_or("<end of file>"),
                    "actual:  ".red(),
                    a.unwrap_or("<end of file>"),
                );
            }
        }
    }
}
