//! Vite build-config migration over whole workspaces.

use monotree_codemod::{update_vite_build_config, ViteBuildConfigMigration};
use monotree_core::{MonotreeError, ToolConfig};
use monotree_tree::{StagedTree, TreePath};
use monotree_workspace::{Generator, GeneratorRunner, ProjectConfiguration};
use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const HEADER: &str = r#"
/// <reference types="vitest" />
import { defineConfig } from 'vite';
import react from '@vitejs/plugin-react';
import viteTsConfigPaths from 'vite-tsconfig-paths';

export default defineConfig({
  cacheDir: '../../node_modules/.vite/demo',
  server: {
    port: 4200,
    host: 'localhost',
  },

  preview: {
    port: 4300,
    host: 'localhost',
  },

  plugins: [
    react(),
    viteTsConfigPaths({
      root: '../../'
    })
  ],

  // Uncomment this if you are using workers.
  // worker: {
  //  plugins: [
  //    viteTsConfigPaths({
  //      root: '../../',
  //    }),
  //  ],
  // },
"#;

const TEST_SECTION: &str = r#"
  test: {
    globals: true,
    cache: {
      dir: '../../node_modules/.vitest',
    },
    environment: 'jsdom',
    include: ['src/**/*.{test,spec}.{js,mjs,cjs,ts,mts,cts,jsx,tsx}'],
  },"#;

fn write(root: &Path, path: &str, content: &str) {
    let full = root.join(path);
    fs::create_dir_all(full.parent().unwrap()).unwrap();
    fs::write(full, content).unwrap();
}

fn add_vite_project(root: &Path, name: &str, project_root: &str, output_path: &str) {
    let manifest = json!({
        "name": name,
        "sourceRoot": format!("{}/src", project_root),
        "projectType": "application",
        "targets": {
            "build": {
                "executor": "@nx/vite:build",
                "outputs": ["{options.outputPath}"],
                "defaultConfiguration": "production",
                "options": { "outputPath": output_path },
                "configurations": {
                    "development": { "mode": "development" },
                    "production": { "mode": "production" }
                }
            }
        }
    });
    write(
        root,
        &format!("{}/project.json", project_root),
        &serde_json::to_string_pretty(&manifest).unwrap(),
    );
}

/// Project without a build section (`apps/demo`)
fn without_build(root: &Path) {
    add_vite_project(root, "demo", "apps/demo", "dist/apps/demo");
    write(root, "apps/demo/vite.config.ts", &format!("{}{}\n}});\n", HEADER, TEST_SECTION));
}

/// Project whose build section has other settings (`demo2` at depth one)
fn with_build(root: &Path) {
    add_vite_project(root, "demo2", "demo2", "dist/demo2");
    write(
        root,
        "demo2/vite.config.ts",
        &format!(
            "{}\n  build: {{\n    someProperty: 'someValue',\n  }},\n{}\n}});\n",
            HEADER, TEST_SECTION
        ),
    );
}

/// Project with production file replacements (`demo3` at depth one)
fn with_file_replacements(root: &Path) {
    let manifest = json!({
        "name": "demo3",
        "sourceRoot": "demo3/src",
        "projectType": "application",
        "targets": {
            "build": {
                "executor": "@nx/vite:build",
                "outputs": ["{options.outputPath}"],
                "defaultConfiguration": "production",
                "options": { "outputPath": "dist/demo3" },
                "configurations": {
                    "development": { "mode": "development" },
                    "production": {
                        "mode": "production",
                        "fileReplacements": [{
                            "replace": "demo3/src/environments/environment.ts",
                            "with": "demo3/src/environments/environment.prod.ts"
                        }]
                    }
                }
            }
        }
    });
    write(root, "demo3/project.json", &serde_json::to_string_pretty(&manifest).unwrap());
    write(
        root,
        "demo3/vite.config.ts",
        &format!(
            "{}\n  build: {{\n    someProperty: 'someValue',\n  }},\n{}\n}});\n",
            HEADER, TEST_SECTION
        ),
    );
}

fn read(tree: &StagedTree, path: &str) -> String {
    tree.read_to_string(&TreePath::new(path).unwrap()).unwrap()
}

#[test]
fn test_adds_build_section() {
    let dir = TempDir::new().unwrap();
    without_build(dir.path());

    let mut tree = StagedTree::new(dir.path());
    let report = update_vite_build_config(&mut tree, &ToolConfig::default()).unwrap();
    assert_eq!(report.updated, vec!["demo"]);
    assert!(report.is_clean());

    let expected = format!(
        "{}{}\n  build: {{\n    outDir: '../../dist/apps/demo',\n    reportCompressedSize: true,\n    commonjsOptions: {{\n      transformMixedEsModules: true,\n    }},\n  }},\n}});\n",
        HEADER, TEST_SECTION
    );
    assert_eq!(read(&tree, "apps/demo/vite.config.ts"), expected);

    let settings = ToolConfig::default().workspace;
    let manifest =
        ProjectConfiguration::read(&tree, &TreePath::new("apps/demo").unwrap(), &settings).unwrap();
    assert_eq!(manifest.targets["build"].option_str("outputPath"), Some("dist/apps/demo"));
}

#[test]
fn test_merges_into_existing_build_section() {
    let dir = TempDir::new().unwrap();
    with_build(dir.path());

    let mut tree = StagedTree::new(dir.path());
    update_vite_build_config(&mut tree, &ToolConfig::default()).unwrap();

    let content = read(&tree, "demo2/vite.config.ts");
    assert!(content.contains(
        "  build: {\n    someProperty: 'someValue',\n    outDir: '../dist/demo2',\n    reportCompressedSize: true,\n    commonjsOptions: {\n      transformMixedEsModules: true,\n    },\n  },\n"
    ));
    assert!(content.contains("  // Uncomment this if you are using workers.\n"));
}

#[test]
fn test_second_run_changes_nothing() {
    let dir = TempDir::new().unwrap();
    without_build(dir.path());
    with_build(dir.path());
    let config = ToolConfig::default();

    let mut tree = StagedTree::new(dir.path());
    update_vite_build_config(&mut tree, &config).unwrap();
    let first = (read(&tree, "apps/demo/vite.config.ts"), read(&tree, "demo2/vite.config.ts"));

    let report = update_vite_build_config(&mut tree, &config).unwrap();
    assert!(report.updated.is_empty());
    assert_eq!(report.unchanged.len(), 2);
    assert_eq!(
        (read(&tree, "apps/demo/vite.config.ts"), read(&tree, "demo2/vite.config.ts")),
        first
    );
}

#[test]
fn test_file_replacements_become_replace_files_plugin() {
    let dir = TempDir::new().unwrap();
    with_file_replacements(dir.path());
    let config = ToolConfig::default();

    let mut tree = StagedTree::new(dir.path());
    let report = update_vite_build_config(&mut tree, &config).unwrap();
    assert_eq!(report.updated, vec!["demo3"]);

    let content = read(&tree, "demo3/vite.config.ts");
    assert!(content.contains(
        "import viteTsConfigPaths from 'vite-tsconfig-paths';\nimport { replaceFiles } from '@nx/vite/plugins/rollup-replace-files.plugin';\n\nexport default"
    ));
    assert!(content.contains(
        "  plugins: [\n    react(),\n    viteTsConfigPaths({\n      root: '../../'\n    }),\n    replaceFiles([{\n      replace: 'demo3/src/environments/environment.ts',\n      with: 'demo3/src/environments/environment.prod.ts'\n    }])\n  ],\n"
    ));
    assert!(content.contains("    outDir: '../dist/demo3',\n"));

    let report = update_vite_build_config(&mut tree, &config).unwrap();
    assert_eq!(report.unchanged, vec!["demo3"]);
    assert_eq!(read(&tree, "demo3/vite.config.ts"), content);
    assert_eq!(content.matches("replaceFiles").count(), 2);

    let settings = config.workspace;
    let manifest = ProjectConfiguration::read(&tree, &TreePath::new("demo3").unwrap(), &settings).unwrap();
    assert_eq!(manifest.targets["build"].option_str("outputPath"), Some("dist/demo3"));
}

#[test]
fn test_projects_without_replacements_get_no_plugin() {
    let dir = TempDir::new().unwrap();
    without_build(dir.path());

    let mut tree = StagedTree::new(dir.path());
    update_vite_build_config(&mut tree, &ToolConfig::default()).unwrap();
    assert!(!read(&tree, "apps/demo/vite.config.ts").contains("replaceFiles"));
}

#[test]
fn test_user_out_dir_is_kept() {
    let dir = TempDir::new().unwrap();
    add_vite_project(dir.path(), "web", "apps/web", "dist/apps/web");
    write(
        dir.path(),
        "apps/web/vite.config.ts",
        "import { defineConfig } from 'vite';\n\nexport default defineConfig({\n  build: {\n    outDir: 'out',\n    reportCompressedSize: false,\n  },\n});\n",
    );

    let mut tree = StagedTree::new(dir.path());
    update_vite_build_config(&mut tree, &ToolConfig::default()).unwrap();
    assert_eq!(
        read(&tree, "apps/web/vite.config.ts"),
        "import { defineConfig } from 'vite';\n\nexport default defineConfig({\n  build: {\n    outDir: 'out',\n    reportCompressedSize: false,\n    commonjsOptions: {\n      transformMixedEsModules: true,\n    },\n  },\n});\n"
    );
}

#[test]
fn test_failures_are_collected_per_project() {
    let dir = TempDir::new().unwrap();
    without_build(dir.path());
    add_vite_project(dir.path(), "broken", "apps/broken", "dist/apps/broken");
    write(dir.path(), "apps/broken/vite.config.ts", "export default defineConfig({\n");
    add_vite_project(dir.path(), "dynamic", "apps/dynamic", "dist/apps/dynamic");
    write(dir.path(), "apps/dynamic/vite.config.ts", "export default loadConfig();\n");
    // Not a vite project at all
    write(
        dir.path(),
        "libs/util/project.json",
        r#"{ "name": "util", "targets": { "build": { "executor": "@nx/js:tsc", "options": { "outputPath": "dist/libs/util" } } } }"#,
    );

    let mut tree = StagedTree::new(dir.path());
    let report = update_vite_build_config(&mut tree, &ToolConfig::default()).unwrap();

    assert_eq!(report.updated, vec!["demo"]);
    assert_eq!(report.failures.len(), 2);
    let broken = report.failures.iter().find(|(name, _)| name == "broken").unwrap();
    assert!(matches!(broken.1, MonotreeError::Parse { .. }));
    let dynamic = report.failures.iter().find(|(name, _)| name == "dynamic").unwrap();
    assert!(matches!(dynamic.1, MonotreeError::TargetObjectNotFound { .. }));
}

#[tokio::test]
async fn test_generator_commits_migration() {
    let dir = TempDir::new().unwrap();
    without_build(dir.path());
    let generators: Vec<Box<dyn Generator>> =
        vec![Box::new(ViteBuildConfigMigration::new(ToolConfig::default()))];

    let mut tree = StagedTree::new(dir.path());
    let report = GeneratorRunner::new().run(&mut tree, &generators).await.unwrap();

    assert_eq!(report.generators, vec!["vite-build-config"]);
    assert_eq!(report.changes.len(), 1);
    let on_disk = fs::read_to_string(dir.path().join("apps/demo/vite.config.ts")).unwrap();
    assert!(on_disk.contains("outDir: '../../dist/apps/demo'"));
}
