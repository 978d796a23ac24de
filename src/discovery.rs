//! Discovery Module for the Tanni compiler
//!
//! Finds `.tanni` files under a directory and compiles them as a batch.

use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::codegen::{CompileOptions, CompileResult};
use crate::validate::{CompilerError, ERR_UNREADABLE_FILE};

pub const COMPONENT_EXTENSION: &str = "tanni";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectEntry {
    pub path: PathBuf,
    pub component_name: String,
    pub result: Result<CompileResult, CompilerError>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPONENT DISCOVERY
// ═══════════════════════════════════════════════════════════════════════════════

/// Recursively find all component files, sorted by path.
pub fn discover_components(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(Result::ok)
        .map(|entry| entry.into_path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == COMPONENT_EXTENSION))
        .collect();
    files.sort();
    files
}

/// PascalCase component name from a file stem: `todo-item.tanni` → `TodoItem`.
pub fn component_name_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let name: String = stem
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect();

    match name.chars().next() {
        None => crate::codegen::DEFAULT_COMPONENT_NAME.to_string(),
        Some(first) if first.is_ascii_digit() => format!("_{}", name),
        Some(_) => name,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BATCH COMPILE
// ═══════════════════════════════════════════════════════════════════════════════

/// Compile every component under `dir` in parallel. A failing file reports
/// its error without stopping the others.
pub fn compile_project(dir: &Path, runtime_module: &str) -> Vec<ProjectEntry> {
    let files = discover_components(dir);
    debug!(dir = %dir.display(), files = files.len(), "compiling project");

    files
        .into_par_iter()
        .map(|path| {
            let component_name = component_name_from_path(&path);
            let options = CompileOptions {
                id: Some(path.to_string_lossy().into_owned()),
                runtime_module: runtime_module.to_string(),
                component_name: component_name.clone(),
            };
            let result = match fs::read_to_string(&path) {
                Ok(source) => crate::compile(&source, &options),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to read component");
                    Err(CompilerError::new(
                        ERR_UNREADABLE_FILE,
                        &format!("Failed to read file: {}", e),
                        options.file_identity(),
                        1,
                        1,
                    ))
                }
            };
            ProjectEntry {
                path,
                component_name,
                result,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("tanni-discovery-{}-{}", name, std::process::id()));
        fs::remove_dir_all(&dir).ok();
        fs::create_dir_all(dir.join("nested")).expect("create scratch dir");
        dir
    }

    #[test]
    fn test_component_name_from_path() {
        assert_eq!(component_name_from_path(Path::new("src/todo-item.tanni")), "TodoItem");
        assert_eq!(component_name_from_path(Path::new("Counter.tanni")), "Counter");
        assert_eq!(component_name_from_path(Path::new("user_card.v2.tanni")), "UserCardV2");
        assert_eq!(component_name_from_path(Path::new("404.tanni")), "_404");
    }

    #[test]
    fn test_discover_and_compile_project() {
        let dir = scratch_dir("project");
        fs::write(dir.join("b-card.tanni"), "<template><p>{{ title }}</p></template>").expect("write");
        fs::write(dir.join("nested/a-list.tanni"), "<template><ul></template>").expect("write");
        fs::write(dir.join("notes.md"), "not a component").expect("write");

        let found = discover_components(&dir);
        assert_eq!(found.len(), 2);

        let entries = compile_project(&dir, "tanni/runtime");
        assert_eq!(entries.len(), 2);
        let card = entries.iter().find(|e| e.component_name == "BCard").expect("card entry");
        assert!(card.result.as_ref().is_ok_and(|r| r.code.contains("function BCard(")));
        let list = entries.iter().find(|e| e.component_name == "AList").expect("list entry");
        assert_eq!(list.result.as_ref().unwrap_err().code, crate::validate::ERR_UNCLOSED_TAG);

        fs::remove_dir_all(&dir).ok();
    }
}
