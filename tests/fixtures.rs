//! Every `fixtures/<name>.catalog.json` generates exactly `fixtures/<name>.ts`.
use std::fs;
use std::path::Path;

use zodgen::catalog::Catalog;

#[test]
fn fixtures_match_their_golden_output() {
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures");
    let pattern = fixtures.join("*.catalog.json");
    let mut checked = 0;
    for entry in glob::glob(pattern.to_str().unwrap()).unwrap() {
        let catalog_path = entry.unwrap();
        let file_name = catalog_path.file_name().unwrap().to_str().unwrap();
        let stem = file_name.strip_suffix(".catalog.json").unwrap();
        let expected = fs::read_to_string(fixtures.join(format!("{stem}.ts"))).unwrap();

        let catalog = Catalog::load(&[catalog_path.clone()]).unwrap();
        let mapper = zodgen::cli::resolve_roots(&catalog, &[]).unwrap();
        assert_eq!(zodgen::generate_string(&mapper), expected, "fixture {stem}");
        checked += 1;
    }
    assert!(checked >= 2, "expected the shop and tree fixtures, found {checked}");
}
