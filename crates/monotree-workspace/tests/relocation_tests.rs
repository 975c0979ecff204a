//! End-to-end relocation scenarios against real temporary workspaces.

use monotree_core::{MonotreeError, ToolConfig};
use monotree_tree::{StagedTree, TreePath};
use monotree_workspace::{
    convert_to_monorepo, ProjectRegistry, ReferenceKind, RelocateRequest, RelocationEngine,
};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(root: &Path, path: &str, content: &str) {
    let full = root.join(path);
    fs::create_dir_all(full.parent().unwrap()).unwrap();
    fs::write(full, content).unwrap();
}

fn read(root: &Path, path: &str) -> String {
    fs::read_to_string(root.join(path)).unwrap()
}

fn read_json(root: &Path, path: &str) -> Value {
    serde_json::from_str(&read(root, path)).unwrap()
}

fn p(path: &str) -> TreePath {
    TreePath::new(path).unwrap()
}

/// A standalone application at the root with one library next to it.
fn standalone_app() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(
        root,
        "project.json",
        r#"{
  "name": "demo",
  "$schema": "./node_modules/nx/schemas/project-schema.json",
  "sourceRoot": "./src",
  "projectType": "application",
  "targets": {
    "build": {
      "executor": "@nx/vite:build",
      "outputs": ["{options.outputPath}"],
      "options": { "outputPath": "dist/demo" }
    }
  }
}"#,
    );
    write(root, "src/main.ts", "import { Button } from '@demo/shared-ui';\nimport { app } from './app';\n");
    write(root, "src/app.ts", "export const app = 1;\n");
    write(root, "tsconfig.app.json", r#"{ "extends": "./tsconfig.base.json", "include": ["src/**/*.ts"] }"#);
    write(
        root,
        "tsconfig.base.json",
        r#"{ "compilerOptions": { "paths": { "@demo/shared-ui": ["shared-ui/src/index.ts"] } } }"#,
    );
    write(root, "nx.json", r#"{ "defaultProject": "demo" }"#);
    write(root, "README.md", "# demo\n");
    write(
        root,
        "shared-ui/project.json",
        r#"{
  "name": "shared-ui",
  "sourceRoot": "shared-ui/src",
  "projectType": "library",
  "targets": {
    "test": { "executor": "@nx/vite:test", "options": { "reportsDirectory": "coverage/shared-ui" } }
  }
}"#,
    );
    write(root, "shared-ui/src/index.ts", "export * from './lib/button';\n");
    write(root, "shared-ui/src/lib/button.ts", "export const Button = 'button';\n");
    dir
}

/// An integrated workspace with a library consumed by an application.
fn integrated() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(
        root,
        "libs/ui/project.json",
        r#"{
  "name": "ui",
  "sourceRoot": "libs/ui/src",
  "projectType": "library",
  "targets": {
    "build": {
      "executor": "@nx/js:tsc",
      "options": { "outputPath": "dist/libs/ui", "main": "libs/ui/src/index.ts" }
    }
  }
}"#,
    );
    write(root, "libs/ui/src/index.ts", "export * from './lib/util';\n");
    write(root, "libs/ui/src/lib/util.ts", "export const util = 1;\n");
    write(
        root,
        "apps/web/project.json",
        r#"{
  "name": "web",
  "projectType": "application",
  "implicitDependencies": ["ui"],
  "targets": {
    "build": { "executor": "@nx/vite:build", "options": { "styles": ["libs/ui/src/styles.css"] } }
  }
}"#,
    );
    write(
        root,
        "apps/web/src/main.ts",
        "import { util } from '@demo/ui';\nimport { button } from '@demo/ui/button';\nimport { raw } from '../../../libs/ui/src/lib/util';\n",
    );
    write(
        root,
        "tsconfig.base.json",
        r#"{ "compilerOptions": { "paths": { "@demo/ui": ["libs/ui/src/index.ts"], "@demo/ui/button": ["libs/ui/src/button.ts"] } } }"#,
    );
    write(root, "nx.json", r#"{ "defaultProject": "ui", "plugins": [] }"#);
    dir
}

#[test]
fn test_convert_standalone_app_to_apps_and_libs() {
    let dir = standalone_app();
    let root = dir.path();
    let config = ToolConfig::default();

    let mut tree = StagedTree::new(root);
    let report = convert_to_monorepo(&mut tree, &config).unwrap();
    assert_eq!(report.scheme.apps_dir, "apps");
    assert_eq!(report.relocations[0].project, "demo");
    assert_eq!(report.relocations[1].new_root, p("libs/shared-ui"));
    tree.commit().unwrap();

    let demo = read_json(root, "apps/demo/project.json");
    assert!(demo.get("root").is_none());
    let keys: Vec<&str> = demo.as_object().unwrap().keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["name", "$schema", "sourceRoot", "projectType", "targets"]);
    assert_eq!(demo["sourceRoot"], json!("./apps/demo/src"));
    assert_eq!(demo["$schema"], json!("../../node_modules/nx/schemas/project-schema.json"));
    assert_eq!(demo["targets"]["build"]["options"]["outputPath"], json!("dist/apps/demo"));
    assert_eq!(demo["targets"]["build"]["outputs"], json!(["{options.outputPath}"]));

    assert_eq!(
        read(root, "apps/demo/src/main.ts"),
        "import { Button } from '@demo/shared-ui';\nimport { app } from './app';\n"
    );
    assert_eq!(
        read_json(root, "apps/demo/tsconfig.app.json")["extends"],
        json!("../../tsconfig.base.json")
    );

    let shared = read_json(root, "libs/shared-ui/project.json");
    assert_eq!(shared["sourceRoot"], json!("libs/shared-ui/src"));
    assert_eq!(
        shared["targets"]["test"]["options"]["reportsDirectory"],
        json!("coverage/libs/shared-ui")
    );
    assert!(root.join("libs/shared-ui/src/lib/button.ts").is_file());

    assert_eq!(
        read_json(root, "tsconfig.base.json")["compilerOptions"]["paths"]["@demo/shared-ui"],
        json!(["libs/shared-ui/src/index.ts"])
    );
    assert_eq!(read_json(root, "nx.json")["defaultProject"], json!("demo"));

    assert!(!root.join("src").exists());
    assert!(!root.join("shared-ui").exists());
    assert!(!root.join("project.json").exists());
    assert!(root.join("README.md").is_file());
    assert!(root.join("tsconfig.base.json").is_file());
}

#[test]
fn test_convert_root_library_uses_packages() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(root, "project.json", r#"{ "name": "toolkit", "projectType": "library" }"#);
    write(root, "src/index.ts", "export const toolkit = 1;\n");
    write(root, "e2e/project.json", r#"{ "name": "e2e", "projectType": "application" }"#);

    let config = ToolConfig::default();
    let mut tree = StagedTree::new(root);
    let report = convert_to_monorepo(&mut tree, &config).unwrap();

    assert_eq!(report.scheme.apps_dir, "packages");
    assert!(tree.is_file(&p("packages/toolkit/src/index.ts")));
    assert!(tree.is_file(&p("packages/e2e/project.json")));
}

#[test]
fn test_converted_workspace_has_no_overlapping_roots() {
    let dir = standalone_app();
    let config = ToolConfig::default();
    let mut tree = StagedTree::new(dir.path());
    convert_to_monorepo(&mut tree, &config).unwrap();

    let registry = ProjectRegistry::build(&tree, &config).unwrap();
    assert_eq!(registry.len(), 2);
    assert!(registry.root_project().is_none());
    assert!(registry.overlapping_roots().is_empty());
}

#[test]
fn test_convert_requires_root_project() {
    let dir = integrated();
    let mut tree = StagedTree::new(dir.path());
    let err = convert_to_monorepo(&mut tree, &ToolConfig::default()).unwrap_err();
    assert!(matches!(err, MonotreeError::InvalidInput(_)));
    assert!(!tree.has_changes());
}

#[test]
fn test_move_with_rename_rewrites_every_reference() {
    let dir = integrated();
    let root = dir.path();
    let config = ToolConfig::default();
    let mut tree = StagedTree::new(root);

    let request = RelocateRequest::new("ui", "libs/shared-ui")
        .with_new_name("shared-ui")
        .with_update_import_path(true);
    let report = RelocationEngine::new(&config).relocate(&mut tree, &request).unwrap();

    let kinds: Vec<ReferenceKind> = report.references.iter().map(|r| r.kind).collect();
    assert!(kinds.contains(&ReferenceKind::DefaultProjectPointer));
    assert!(kinds.contains(&ReferenceKind::ImplicitDependency));
    assert!(kinds.contains(&ReferenceKind::TargetOptionPath));
    tree.commit().unwrap();

    assert_eq!(
        read(root, "apps/web/src/main.ts"),
        "import { util } from '@demo/shared-ui';\nimport { button } from '@demo/shared-ui/button';\nimport { raw } from '../../../libs/shared-ui/src/lib/util';\n"
    );

    let paths = read_json(root, "tsconfig.base.json")["compilerOptions"]["paths"].clone();
    assert_eq!(
        paths,
        json!({
            "@demo/shared-ui": ["libs/shared-ui/src/index.ts"],
            "@demo/shared-ui/button": ["libs/shared-ui/src/button.ts"]
        })
    );
    let keys: Vec<String> = paths.as_object().unwrap().keys().cloned().collect();
    assert_eq!(keys, vec!["@demo/shared-ui", "@demo/shared-ui/button"]);

    let web = read_json(root, "apps/web/project.json");
    assert_eq!(web["implicitDependencies"], json!(["shared-ui"]));
    assert_eq!(
        web["targets"]["build"]["options"]["styles"],
        json!(["libs/shared-ui/src/styles.css"])
    );

    let nx = read_json(root, "nx.json");
    assert_eq!(nx["defaultProject"], json!("shared-ui"));
    assert_eq!(nx["plugins"], json!([]));

    let moved = read_json(root, "libs/shared-ui/project.json");
    assert_eq!(moved["name"], json!("shared-ui"));
    assert_eq!(moved["targets"]["build"]["options"]["outputPath"], json!("dist/libs/shared-ui"));
    assert_eq!(moved["targets"]["build"]["options"]["main"], json!("libs/shared-ui/src/index.ts"));
    assert!(!root.join("libs/ui").exists());
}

#[test]
fn test_sibling_under_old_import_path_is_left_alone() {
    let dir = integrated();
    let root = dir.path();
    write(
        root,
        "tsconfig.base.json",
        r#"{ "compilerOptions": { "paths": { "@demo/ui": ["libs/ui/src/index.ts"], "@demo/ui/forms": ["libs/forms/src/index.ts"] } } }"#,
    );
    write(root, "libs/forms/project.json", r#"{ "name": "forms", "projectType": "library" }"#);
    write(root, "libs/forms/src/index.ts", "export const f = 1;\n");
    write(
        root,
        "apps/web/src/main.ts",
        "import { util } from '@demo/ui';\nimport { f } from '@demo/ui/forms';\n",
    );

    let config = ToolConfig::default();
    let mut tree = StagedTree::new(root);
    let request = RelocateRequest::new("ui", "libs/shared-ui")
        .with_new_name("shared-ui")
        .with_update_import_path(true);
    RelocationEngine::new(&config).relocate(&mut tree, &request).unwrap();
    tree.commit().unwrap();

    assert_eq!(
        read(root, "apps/web/src/main.ts"),
        "import { util } from '@demo/shared-ui';\nimport { f } from '@demo/ui/forms';\n"
    );
    let paths = read_json(root, "tsconfig.base.json")["compilerOptions"]["paths"].clone();
    let keys: Vec<String> = paths.as_object().unwrap().keys().cloned().collect();
    assert_eq!(keys, vec!["@demo/shared-ui", "@demo/ui/forms"]);
    assert_eq!(paths["@demo/ui/forms"], json!(["libs/forms/src/index.ts"]));
}

#[test]
fn test_tsconfig_with_comments_is_rewritten() {
    let dir = integrated();
    let root = dir.path();
    write(
        root,
        "libs/ui/tsconfig.json",
        "{\n  // shared compiler settings\n  \"extends\": \"../../tsconfig.base.json\",\n  \"include\": [\"src/**/*.ts\",],\n}\n",
    );
    write(
        root,
        "tsconfig.base.json",
        r#"{
  /* workspace aliases */
  "compilerOptions": { "paths": { "@demo/ui": ["libs/ui/src/index.ts"], } }
}"#,
    );
    let config = ToolConfig::default();
    let mut tree = StagedTree::new(root);

    let request = RelocateRequest::new("ui", "packages/shared/ui");
    RelocationEngine::new(&config).relocate(&mut tree, &request).unwrap();
    tree.commit().unwrap();

    let tsconfig = read_json(root, "packages/shared/ui/tsconfig.json");
    assert_eq!(tsconfig["extends"], json!("../../../tsconfig.base.json"));
    assert_eq!(tsconfig["include"], json!(["src/**/*.ts"]));
    let paths = read_json(root, "tsconfig.base.json")["compilerOptions"]["paths"].clone();
    assert_eq!(paths["@demo/ui"], json!(["packages/shared/ui/src/index.ts"]));
}

#[test]
fn test_move_without_rename_keeps_names() {
    let dir = integrated();
    let root = dir.path();
    let config = ToolConfig::default();
    let mut tree = StagedTree::new(root);

    let request = RelocateRequest::new("ui", "packages/ui");
    RelocationEngine::new(&config).relocate(&mut tree, &request).unwrap();
    tree.commit().unwrap();

    assert_eq!(read_json(root, "nx.json")["defaultProject"], json!("ui"));
    assert_eq!(read_json(root, "apps/web/project.json")["implicitDependencies"], json!(["ui"]));
    assert!(read(root, "apps/web/src/main.ts").contains("from '@demo/ui'"));
    assert!(read(root, "apps/web/src/main.ts").contains("'../../../packages/ui/src/lib/util'"));
}

#[test]
fn test_specifier_text_in_comments_and_strings_is_untouched() {
    let dir = integrated();
    let root = dir.path();
    let main = "// import { old } from '../../../libs/ui/src/lib/util';\n\
                import { raw } from '../../../libs/ui/src/lib/util';\n\
                const hint = \"import { raw } from '../../../libs/ui/src/lib/util'\";\n";
    write(root, "apps/web/src/main.ts", main);
    let config = ToolConfig::default();
    let mut tree = StagedTree::new(root);

    let request = RelocateRequest::new("ui", "packages/ui");
    RelocationEngine::new(&config).relocate(&mut tree, &request).unwrap();
    tree.commit().unwrap();

    assert_eq!(
        read(root, "apps/web/src/main.ts"),
        "// import { old } from '../../../libs/ui/src/lib/util';\n\
         import { raw } from '../../../packages/ui/src/lib/util';\n\
         const hint = \"import { raw } from '../../../libs/ui/src/lib/util'\";\n"
    );
}

#[test]
fn test_move_without_reference_updates() {
    let dir = integrated();
    let root = dir.path();
    let config = ToolConfig::default();
    let mut tree = StagedTree::new(root);

    let request = RelocateRequest::new("ui", "packages/ui").with_update_references(false);
    let report = RelocationEngine::new(&config).relocate(&mut tree, &request).unwrap();

    assert!(report.references.is_empty());
    assert!(tree.is_file(&p("packages/ui/src/lib/util.ts")));
    assert!(tree
        .read_to_string(&p("apps/web/src/main.ts"))
        .unwrap()
        .contains("'../../../libs/ui/src/lib/util'"));
}

#[test]
fn test_destination_collision() {
    let dir = integrated();
    let config = ToolConfig::default();
    let mut tree = StagedTree::new(dir.path());
    let engine = RelocationEngine::new(&config);

    for destination in ["apps/web", "apps/web/ui", "apps"] {
        let err = engine
            .relocate(&mut tree, &RelocateRequest::new("ui", destination))
            .unwrap_err();
        match err {
            MonotreeError::DestinationCollision { existing, .. } => assert_eq!(existing, "web"),
            other => panic!("expected collision for {}, got {:?}", destination, other),
        }
    }
    assert!(!tree.has_changes());
}

#[test]
fn test_unknown_project_and_name_clash() {
    let dir = integrated();
    let config = ToolConfig::default();
    let mut tree = StagedTree::new(dir.path());
    let engine = RelocationEngine::new(&config);

    let err = engine
        .relocate(&mut tree, &RelocateRequest::new("missing", "libs/missing"))
        .unwrap_err();
    assert!(err.is_not_found());

    let err = engine
        .relocate(&mut tree, &RelocateRequest::new("ui", "libs/web").with_new_name("web"))
        .unwrap_err();
    assert!(matches!(err, MonotreeError::ProjectExists(name) if name == "web"));
}

#[test]
fn test_wildcard_mapping_is_ambiguous() {
    let dir = integrated();
    let root = dir.path();
    write(
        root,
        "tsconfig.base.json",
        r#"{ "compilerOptions": { "paths": { "@demo/*": ["libs/*"] } } }"#,
    );
    write(root, "libs/forms/project.json", r#"{ "name": "forms" }"#);

    let config = ToolConfig::default();
    let mut tree = StagedTree::new(root);
    let err = RelocationEngine::new(&config)
        .relocate(&mut tree, &RelocateRequest::new("ui", "packages/ui"))
        .unwrap_err();

    match err {
        MonotreeError::ReferenceRewriteAmbiguous { specifier, candidates, .. } => {
            assert_eq!(specifier, "@demo/*");
            assert_eq!(candidates, vec!["forms", "ui"]);
        }
        other => panic!("expected ambiguity, got {:?}", other),
    }
    assert!(!tree.has_changes());
}

#[test]
fn test_abort_before_commit_leaves_disk_unchanged() {
    let dir = standalone_app();
    let root = dir.path();
    let before = read(root, "tsconfig.base.json");
    {
        let config = ToolConfig::default();
        let mut tree = StagedTree::new(root);
        convert_to_monorepo(&mut tree, &config).unwrap();

        assert!(tree.is_file(&p("apps/demo/src/main.ts")));
        assert!(!tree.exists(&p("src")));
        let children: Vec<String> = tree
            .children(&TreePath::root())
            .unwrap()
            .iter()
            .map(|c| c.to_string())
            .collect();
        assert!(children.contains(&"apps".to_string()));
        assert!(!children.contains(&"shared-ui".to_string()));
    }

    assert!(root.join("src/main.ts").is_file());
    assert!(root.join("shared-ui/project.json").is_file());
    assert!(!root.join("apps").exists());
    assert_eq!(read(root, "tsconfig.base.json"), before);
}
