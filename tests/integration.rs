use std::path::{Path, PathBuf};
use std::sync::Arc;

use tsdeps::fs::MemoryFileSystem;
use tsdeps::{
    ProviderError, Resolution, ResolutionCaveat, SourceFileProvider, TypeScriptProvider,
    UnresolvedReason,
};

fn fixture_source() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/sample_project")
}

/// Copy the fixture project to a temporary directory so tests don't conflict.
fn setup_project() -> tempfile::TempDir {
    let src = fixture_source();
    let tmp = tempfile::TempDir::new().unwrap();
    copy_dir_recursive(&src, tmp.path()).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let dst_path = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &dst_path)?;
        } else {
            std::fs::copy(entry.path(), &dst_path)?;
        }
    }
    Ok(())
}

fn open(root: &Path) -> TypeScriptProvider {
    TypeScriptProvider::open(root.join("tsconfig.json")).unwrap()
}

fn relative(root: &Path, files: &[PathBuf]) -> Vec<String> {
    files
        .iter()
        .map(|f| f.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
        .collect()
}

#[test]
fn test_inventory_is_closure_without_declaration_files() {
    let tmp = setup_project();
    let provider = open(tmp.path());
    let root = provider.options().root_dir.clone();

    assert_eq!(
        relative(&root, provider.source_files()),
        vec![
            "src/componentA/componentA.ts",
            "src/componentA/helperA1.ts",
            "src/componentA/helperA2/index.ts",
            "src/componentB/componentB.ts",
            "src/index.ts",
            "src/polyfills.ts",
            "src/shared/logger.ts",
            // Outside `include`, reached through componentB
            "vendor/format.ts",
        ]
    );
    assert!(provider.index().contains(&root.join("src/just-types/types.i.d.ts")));
    assert!(provider.index().skipped().is_empty());
}

#[test]
fn test_imports_of_skips_type_only_declaration() {
    let tmp = setup_project();
    let provider = open(tmp.path());
    let root = provider.options().root_dir.clone();

    let imports = provider
        .imports_of(&root.join("src/componentA/componentA.ts"))
        .unwrap();
    let specifiers: Vec<_> = imports.iter().map(|i| i.specifier.as_str()).collect();
    assert_eq!(
        specifiers,
        vec!["../componentB/componentB", "./helperA1", "./helperA2"]
    );
    assert!(imports.iter().all(|i| !i.is_type_only));
}

#[test]
fn test_graph_edges_from_provider() {
    let tmp = setup_project();
    let provider = open(tmp.path());
    let root = provider.options().root_dir.clone();

    // Drive the provider the way a graph builder does
    let mut edges = Vec::new();
    for file in provider.source_files() {
        for import in provider.imports_of(file).unwrap() {
            let resolution = provider.resolve(file, &import.specifier).unwrap();
            if let Some(target) = resolution.path() {
                edges.push((
                    file.strip_prefix(&root).unwrap().to_path_buf(),
                    target.strip_prefix(&root).unwrap().to_path_buf(),
                ));
            }
        }
    }

    let has_edge = |from: &str, to: &str| {
        edges
            .iter()
            .any(|(f, t)| f == Path::new(from) && t == Path::new(to))
    };
    assert!(has_edge("src/index.ts", "src/componentA/componentA.ts"));
    assert!(has_edge("src/index.ts", "src/shared/logger.ts"));
    assert!(has_edge("src/index.ts", "src/polyfills.ts"));
    assert!(has_edge("src/componentA/componentA.ts", "src/componentA/helperA2/index.ts"));
    assert!(has_edge("src/componentB/componentB.ts", "vendor/format.ts"));
    // Type-only imports contribute no edges
    assert!(!edges
        .iter()
        .any(|(_, t)| t.to_string_lossy().contains("just-types")));
}

#[test]
fn test_resolve_alias_and_unresolved_package() {
    let tmp = setup_project();
    let provider = open(tmp.path());
    let root = provider.options().root_dir.clone();
    let index = root.join("src/index.ts");

    assert_eq!(
        provider.resolve(&index, "@shared/logger").unwrap(),
        Resolution::ResolvedWithCaveat(root.join("src/shared/logger.ts"), ResolutionCaveat::PathAlias)
    );
    assert_eq!(
        provider.resolve(&index, "not-installed").unwrap(),
        Resolution::Unresolved(UnresolvedReason::PackageNotFound("not-installed".to_string()))
    );
}

#[test]
fn test_cached_provider_agrees() {
    let tmp = setup_project();
    let plain = open(tmp.path());
    let cached = TypeScriptProvider::builder()
        .cache_resolutions(true)
        .build(tmp.path().join("tsconfig.json"))
        .unwrap();

    assert_eq!(plain.source_files(), cached.source_files());
    for file in plain.source_files() {
        for import in plain.imports_of(file).unwrap() {
            assert_eq!(
                plain.resolve(file, &import.specifier).unwrap(),
                cached.resolve(file, &import.specifier).unwrap()
            );
        }
    }
}

#[test]
fn test_missing_configuration_is_fatal() {
    let tmp = tempfile::TempDir::new().unwrap();
    let result = TypeScriptProvider::open(tmp.path().join("tsconfig.json"));
    assert!(matches!(result, Err(ProviderError::Configuration { .. })));
}

#[test]
fn test_partial_failure_tolerated_during_indexing() {
    let mut memory = MemoryFileSystem::with_files([
        ("/repo/tsconfig.json", r#"{ "files": ["src/main.ts"] }"#),
        (
            "/repo/src/main.ts",
            "import { a } from './a';\nimport { b } from './b';\n",
        ),
        ("/repo/src/b.ts", "export const b = 1;"),
    ]);
    memory.add_unreadable("/repo/src/a.ts");

    let provider = TypeScriptProvider::builder()
        .file_system(Arc::new(memory))
        .build("/repo/tsconfig.json")
        .unwrap();

    assert_eq!(
        provider.source_files(),
        &vec![PathBuf::from("/repo/src/main.ts"), PathBuf::from("/repo/src/b.ts")]
    );
    let skipped = provider.index().skipped();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].path, PathBuf::from("/repo/src/a.ts"));

    // A direct request for the same file surfaces the failure
    assert!(matches!(
        provider.imports_of(Path::new("/repo/src/a.ts")),
        Err(ProviderError::SourceUnavailable { .. })
    ));
}

#[test]
fn test_imports_of_file_outside_inventory() {
    let tmp = setup_project();
    let provider = open(tmp.path());
    let root = provider.options().root_dir.clone();

    let scratch = root.join("scratch.ts");
    std::fs::write(&scratch, "import type { X } from './x';\nimport './y';\n").unwrap();
    let imports = provider.imports_of(&scratch).unwrap();
    assert_eq!(imports.len(), 1);
    assert_eq!(imports[0].specifier, "./y");
    assert_eq!(imports[0].position.line, 2);
}
