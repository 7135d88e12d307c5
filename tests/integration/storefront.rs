//! Storefront copy fixes applied to a mock Vite build.
//!
//! The bundle strings mirror what a minified React product page looks like:
//! `c.jsx(...)` calls with `children:` and `className:` props on one line.

use bundle_patcher::config::{apply_config, load_from_str, Mode, RunReport};
use bundle_patcher::PatchStatus;
use std::fs;
use tempfile::TempDir;

const PRODUCT_PAGE: &str = concat!(
    r#"c.jsx("h1",{children:h.title}),"#,
    r#"c.jsx("p",{className:"text-base lg:text-lg text-charcoal-600",children:h.subtitle}),"#,
    r#"c.jsx("h3",{children:"Why this formula works"}),"#,
    r#"c.jsx("li",{children:"Daily serving daily for stress response"}),"#,
    r#"c.jsx("p",{children:"300mg KSM-66® every day"}),"#,
    r#"c.jsx("p",{children:"24+ studies on KSM-66® efficacy."}),"#,
    r#"c.jsx("span",{children:"KSM-66® Ashwagandha"}),"#,
    r#"c.jsx("img",{src:"/images/bottle-front.png",alt:""}),"#,
    r#"c.jsx("img",{src:'/images/logo.svg'})"#,
);

fn setup_build() -> TempDir {
    let dir = TempDir::new().unwrap();

    fs::create_dir_all(dir.path().join("assets")).unwrap();
    fs::create_dir_all(dir.path().join("dist/assets")).unwrap();

    fs::write(dir.path().join("assets/bundle.js"), PRODUCT_PAGE).unwrap();
    fs::write(
        dir.path().join("dist/assets/index-4yg8eD9p.js"),
        PRODUCT_PAGE,
    )
    .unwrap();
    fs::write(
        dir.path().join("dist/assets/vendor-Bq1x.js"),
        "var React={};",
    )
    .unwrap();

    dir
}

fn read(dir: &TempDir, rel: &str) -> String {
    fs::read_to_string(dir.path().join(rel)).unwrap()
}

const ASSET_URLS: &str = r#"
[meta]
name = "shopify-asset-urls"
description = "Serve /images/ through the Shopify asset CDN when available"

[[targets]]
path = "assets/bundle.js"

[[targets]]
dir = "dist/assets"

[[rules]]
id = "asset-prefix"
type = "regex"
pattern = '''["']/images/([^"'+?&%]+)["']'''
replace = '(window.ShopifyAssetsUrl || "/images/") + "$1"'
"#;

const COPY_FIXES: &str = r#"
[meta]
name = "copy-fixes"
version = "5.0.0"

[[targets]]
path = "dist/assets/index-4yg8eD9p.js"

[[rules]]
id = "hide-why-section"
type = "literal"
find = 'children:"Why this formula works"'
replace = 'className:"hidden",children:"Why this formula works"'
unless_contains = 'className:"hidden",children:"Why this formula works"'

[[rules]]
id = "daily-typo"
type = "literal"
find = "Daily serving daily for stress response"
replace = "Daily serving for stress response"

[[rules]]
id = "flavor-line"
type = "literal"
find = 'className:"text-base lg:text-lg text-charcoal-600",children:h.subtitle'
replace = 'className:"text-base lg:text-lg text-charcoal-600",children:h.subtitle}),c.jsx("p",{className:"text-sm font-medium text-sage-700 mt-1",children:"Flavor: Mixed Berry"'
unless_contains = "Flavor: Mixed Berry"

[[rules]]
id = "dose-phrase"
type = "regex"
pattern = '300mg KSM-66® (?:per|every) day'
replace = "Daily serving"

[[rules]]
id = "studies"
type = "literal"
find = "24+ studies on KSM-66® efficacy."
replace = "24+ clinical studies on efficacy."

[[rules]]
id = "ingredient-name"
type = "literal"
find = "KSM-66® Ashwagandha"
replace = "Clinically studied Ashwagandha"
"#;

#[test]
fn test_asset_urls_rewritten_in_every_bundle() {
    let build = setup_build();
    let config = load_from_str(ASSET_URLS).unwrap();

    let report = apply_config(&config, build.path(), None, Mode::Apply).unwrap();
    let statuses: Vec<_> = report
        .files()
        .iter()
        .map(|(_, result)| result.as_ref().unwrap().status)
        .collect();
    // assets/bundle.js, then dist/assets/index-*.js and vendor-*.js in name order
    assert_eq!(
        statuses,
        vec![
            PatchStatus::Changed,
            PatchStatus::Changed,
            PatchStatus::Unchanged
        ]
    );

    for rel in ["assets/bundle.js", "dist/assets/index-4yg8eD9p.js"] {
        let content = read(&build, rel);
        assert!(content.contains(
            r#"src:(window.ShopifyAssetsUrl || "/images/") + "bottle-front.png",alt:"""#
        ));
        assert!(content.contains(r#"src:(window.ShopifyAssetsUrl || "/images/") + "logo.svg"}"#));
    }
    assert_eq!(read(&build, "dist/assets/vendor-Bq1x.js"), "var React={};");
}

#[test]
fn test_asset_urls_second_run_is_noop() {
    let build = setup_build();
    let config = load_from_str(ASSET_URLS).unwrap();

    let _ = apply_config(&config, build.path(), None, Mode::Apply).unwrap();
    let once = read(&build, "assets/bundle.js");

    let report = apply_config(&config, build.path(), None, Mode::Apply).unwrap();
    assert!(report
        .files()
        .iter()
        .all(|(_, r)| r.as_ref().unwrap().status == PatchStatus::Unchanged));
    assert_eq!(read(&build, "assets/bundle.js"), once);
}

#[test]
fn test_copy_fixes_applied_in_order() {
    let build = setup_build();
    let config = load_from_str(COPY_FIXES).unwrap();

    let report = apply_config(&config, build.path(), None, Mode::Apply).unwrap();
    let outcome = report.files()[0].1.as_ref().unwrap();
    assert_eq!(outcome.status, PatchStatus::Changed);
    assert!(outcome.idempotent);
    assert!(outcome.hits.iter().all(|hit| hit.replacements == 1));

    let content = read(&build, "dist/assets/index-4yg8eD9p.js");
    assert!(content.contains(r#"className:"hidden",children:"Why this formula works""#));
    assert!(content.contains("Daily serving for stress response"));
    assert!(content.contains(r#"children:"Flavor: Mixed Berry"}),"#));
    assert!(content.contains(r#"{children:"Daily serving"}"#));
    assert!(content.contains("24+ clinical studies on efficacy."));
    assert!(content.contains("Clinically studied Ashwagandha"));
    assert!(!content.contains("KSM-66®"));

    // the source bundle is not a target of this config
    assert_eq!(read(&build, "assets/bundle.js"), PRODUCT_PAGE);
}

#[test]
fn test_copy_fixes_are_stable_across_runs() {
    let build = setup_build();
    let config = load_from_str(COPY_FIXES).unwrap();

    let _ = apply_config(&config, build.path(), None, Mode::Apply).unwrap();
    let once = read(&build, "dist/assets/index-4yg8eD9p.js");

    for _ in 0..3 {
        let report = apply_config(&config, build.path(), None, Mode::Apply).unwrap();
        let outcome = report.files()[0].1.as_ref().unwrap();
        assert_eq!(outcome.status, PatchStatus::Unchanged);
    }

    let content = read(&build, "dist/assets/index-4yg8eD9p.js");
    assert_eq!(content, once);
    assert_eq!(content.matches("Flavor: Mixed Berry").count(), 1);
    assert_eq!(content.matches(r#"className:"hidden""#).count(), 1);
}

#[test]
fn test_unguarded_insertion_is_flagged() {
    let build = setup_build();
    let config = load_from_str(
        r#"
[[targets]]
path = "dist/assets/index-4yg8eD9p.js"

[[rules]]
id = "hide-why-section"
type = "literal"
find = 'children:"Why this formula works"'
replace = 'className:"hidden",children:"Why this formula works"'
"#,
    )
    .unwrap();

    let report = apply_config(&config, build.path(), None, Mode::Check).unwrap();
    let outcome = report.files()[0].1.as_ref().unwrap();

    assert_eq!(outcome.status, PatchStatus::Changed);
    assert!(!outcome.idempotent);
    assert_eq!(read(&build, "dist/assets/index-4yg8eD9p.js"), PRODUCT_PAGE);
}

#[test]
fn test_configs_compose() {
    let build = setup_build();
    let assets = load_from_str(ASSET_URLS).unwrap();
    let copy = load_from_str(COPY_FIXES).unwrap();

    for config in [&assets, &copy] {
        let report = apply_config(config, build.path(), None, Mode::Apply).unwrap();
        assert!(!report.has_errors());
    }

    let content = read(&build, "dist/assets/index-4yg8eD9p.js");
    assert!(content.contains("window.ShopifyAssetsUrl"));
    assert!(content.contains("Flavor: Mixed Berry"));

    // both configs report nothing left to do
    for config in [&assets, &copy] {
        let report = apply_config(config, build.path(), None, Mode::Check).unwrap();
        assert!(matches!(report, RunReport::Files(_)));
        assert!(report
            .files()
            .iter()
            .all(|(_, r)| r.as_ref().unwrap().status == PatchStatus::Unchanged));
    }
}
