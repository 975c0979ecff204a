//! Config patching against staged trees.

use monotree_codemod::{
    apply_config_patch, apply_config_patches, patch_source, CodemodTarget, ConfigPatch,
    ObjectLocator, PatchMode, PatchOutcome, PatchValue, SourceLanguage,
};
use monotree_core::MonotreeError;
use monotree_tree::{StagedTree, TreePath};
use proptest::prelude::*;
use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const NEXT_CONFIG: &str = r#"//@ts-check

// eslint-disable-next-line @typescript-eslint/no-var-requires
const { composePlugins, withNx } = require("@nx/next");

/**
 * @type {import('@nx/next/plugins/with-nx').WithNxOptions}
 **/
const nextConfig = {
  nx: {
    // Set this to true if you would like to use SVGR
    svgr: false
  }
};

module.exports = composePlugins(withNx)(nextConfig);
"#;

const VITE_CONFIG: &str = r#"import { defineConfig } from 'vite';

export default defineConfig({
  // keep the dev server stable
  server: {
    port: 4200,
    host: 'localhost',
  },
});
"#;

fn write(root: &Path, path: &str, content: &str) {
    let full = root.join(path);
    fs::create_dir_all(full.parent().unwrap()).unwrap();
    fs::write(full, content).unwrap();
}

fn path(p: &str) -> TreePath {
    TreePath::new(p).unwrap()
}

fn vite_locator() -> ObjectLocator {
    ObjectLocator::default_export_call("defineConfig")
}

#[test]
fn test_patch_is_staged_and_idempotent() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "apps/demo/vite.config.ts", VITE_CONFIG);
    let file = path("apps/demo/vite.config.ts");
    let patch = ConfigPatch::new()
        .set("build.outputDirectory", PatchValue::literal("dist/apps/demo/.output"))
        .set("server.port", PatchValue::literal(4200));

    let mut tree = StagedTree::new(dir.path());
    let report = apply_config_patch(&mut tree, &file, &vite_locator(), &patch).unwrap();
    assert!(report.changed);
    assert_eq!(report.outcomes[0].outcome, PatchOutcome::Inserted);
    assert_eq!(report.outcomes[1].outcome, PatchOutcome::Unchanged);

    let staged = tree.read_to_string(&file).unwrap();
    assert!(staged.starts_with("import { defineConfig } from 'vite';\n\nexport default defineConfig({\n  // keep the dev server stable\n"));
    assert!(staged.ends_with("  },\n  build: {\n    outputDirectory: 'dist/apps/demo/.output',\n  },\n});\n"));

    // Not on disk until commit
    assert_eq!(fs::read_to_string(dir.path().join("apps/demo/vite.config.ts")).unwrap(), VITE_CONFIG);

    let second = apply_config_patch(&mut tree, &file, &vite_locator(), &patch).unwrap();
    assert!(!second.changed);
    assert_eq!(tree.read_to_string(&file).unwrap(), staged);
}

#[test]
fn test_variable_locator_on_next_config() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "apps/site/next.config.js", NEXT_CONFIG);
    let file = path("apps/site/next.config.js");
    let patch = ConfigPatch::new()
        .set("nx.svgr", PatchValue::literal(true))
        .set_with_mode("distDir", PatchValue::literal("../../dist/apps/site"), PatchMode::Skip);

    let mut tree = StagedTree::new(dir.path());
    apply_config_patch(
        &mut tree,
        &file,
        &ObjectLocator::Variable {
            name: "nextConfig".to_string(),
        },
        &patch,
    )
    .unwrap();

    let staged = tree.read_to_string(&file).unwrap();
    assert!(staged.contains(
        "  nx: {\n    // Set this to true if you would like to use SVGR\n    svgr: true\n  },\n  distDir: \"../../dist/apps/site\"\n};"
    ));
    assert!(staged.starts_with("//@ts-check\n\n// eslint-disable-next-line"));
}

#[test]
fn test_missing_file_is_not_found() {
    let dir = TempDir::new().unwrap();
    let mut tree = StagedTree::new(dir.path());
    let err = apply_config_patch(
        &mut tree,
        &path("vite.config.ts"),
        &vite_locator(),
        &ConfigPatch::new(),
    )
    .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_unparseable_file_is_reported() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "vite.config.ts", "export default defineConfig({ server: { port: 4200 }\n");
    let mut tree = StagedTree::new(dir.path());
    let err = apply_config_patch(
        &mut tree,
        &path("vite.config.ts"),
        &vite_locator(),
        &ConfigPatch::new().set("build.outDir", PatchValue::literal("dist")),
    )
    .unwrap_err();
    assert!(matches!(err, MonotreeError::Parse { .. }));
    assert!(err.is_codemod_failure());
    assert!(!tree.has_changes());
}

#[test]
fn test_unsupported_extension_is_rejected() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "config.json", "{}");
    let mut tree = StagedTree::new(dir.path());
    let err = apply_config_patch(&mut tree, &path("config.json"), &vite_locator(), &ConfigPatch::new())
        .unwrap_err();
    assert!(matches!(err, MonotreeError::InvalidInput(_)));
}

#[test]
fn test_batch_continues_past_failures() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a/vite.config.ts", VITE_CONFIG);
    write(dir.path(), "b/vite.config.ts", "export default getConfig();\n");
    write(dir.path(), "c/vite.config.ts", "export default defineConfig({ build: {} });\n");

    let patch = ConfigPatch::new().set("build.outDir", PatchValue::literal("dist"));
    let targets: Vec<CodemodTarget> = ["a", "b", "missing", "c"]
        .iter()
        .map(|project| CodemodTarget {
            file: path(&format!("{}/vite.config.ts", project)),
            locator: vite_locator(),
            patch: patch.clone(),
        })
        .collect();

    let mut tree = StagedTree::new(dir.path());
    let results = apply_config_patches(&mut tree, &targets);
    assert_eq!(results.len(), 4);
    assert!(results[0].result.is_ok());
    assert!(matches!(
        results[1].result,
        Err(MonotreeError::TargetObjectNotFound { .. })
    ));
    assert!(results[2].result.as_ref().is_err_and(|e| e.is_not_found()));
    assert!(results[3].result.as_ref().is_ok_and(|r| r.changed));

    assert_eq!(
        tree.read_to_string(&path("c/vite.config.ts")).unwrap(),
        "export default defineConfig({ build: {\n  outDir: 'dist'\n} });\n"
    );
}

#[test]
fn test_parenthesized_satisfies_export() {
    let source = "import type { UserConfig } from 'vite';\n\nexport default ({\n  base: '/',\n} satisfies UserConfig);\n";
    let patch = ConfigPatch::new().set("build.target", PatchValue::literal(json!(["es2020", "edge88"])));
    let (output, _) = patch_source(
        source,
        SourceLanguage::TypeScript,
        "vite.config.ts",
        &ObjectLocator::default_export(),
        &patch,
    )
    .unwrap();
    assert_eq!(
        output,
        "import type { UserConfig } from 'vite';\n\nexport default ({\n  base: '/',\n  build: {\n    target: ['es2020', 'edge88'],\n  },\n} satisfies UserConfig);\n"
    );
}

proptest! {
    #[test]
    fn prop_patch_twice_is_byte_identical(
        key in "[a-z][a-zA-Z0-9]{0,8}",
        number in any::<i32>(),
        text in "[a-zA-Z0-9 ./_-]{0,16}",
        flag in any::<bool>(),
    ) {
        prop_assume!(key != "enabled");
        let patch = ConfigPatch::new()
            .set(&format!("build.{}", key), PatchValue::literal(number))
            .set(&format!("extra.{}.label", key), PatchValue::literal(text.clone()))
            .set("extra.enabled", PatchValue::literal(flag));

        let (first, _) = patch_source(VITE_CONFIG, SourceLanguage::TypeScript, "vite.config.ts", &vite_locator(), &patch).unwrap();
        let (second, outcomes) = patch_source(&first, SourceLanguage::TypeScript, "vite.config.ts", &vite_locator(), &patch).unwrap();

        prop_assert_eq!(&first, &second);
        prop_assert!(outcomes.iter().all(|o| o.outcome == PatchOutcome::Unchanged));
        prop_assert!(first.contains("// keep the dev server stable"));
    }
}
