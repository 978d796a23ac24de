//! # Tanni
//!
//! Compiler and runtime for `.tanni` single-file components.
//!
//! ## Pipeline
//!
//! 1. **Split**: `parse::split_sections` pulls the script, template and style
//!    sections out of the file.
//! 2. **Parse**: `parse::parse_at` scans the template into a raw tree. Tag
//!    nesting errors are fatal.
//! 3. **Transform**: `transform::transform` classifies attributes and
//!    validates directives, producing the semantic IR.
//! 4. **Generate**: `codegen::generate` emits the component module and
//!    collects the stylesheet.
//!
//! Every stage returns `Result<_, CompilerError>`; there is never partial
//! output.
//!
//! ## Runtime
//!
//! [`reactive`] is the signal/memo/effect graph the generated code runs on,
//! and [`dom`] holds the insertion, spreading and event delegation
//! primitives over an in-process DOM.

#[cfg(feature = "napi")]
use napi_derive::napi;
use tracing::debug;

mod cache;
mod codegen;
mod discovery;
mod parse;
mod script;
mod transform;
mod validate;

pub mod dom;
pub mod reactive;

#[cfg(test)]
mod runtime_tests;

pub use cache::{CacheEntry, CompileCache};
pub use codegen::{generate, CompileOptions, CompileResult, DEFAULT_COMPONENT_NAME, DEFAULT_RUNTIME_MODULE};
pub use discovery::{compile_project, component_name_from_path, discover_components, ProjectEntry};
pub use parse::{is_component_tag, parse, parse_at, split_sections, ComponentSource, RawNode, RawTree};
pub use script::{preprocess_script, ProcessedScript};
pub use transform::{split_interpolations, transform};
pub use validate::*;

/// Compile a component source into its module code and stylesheet.
pub fn compile(source: &str, options: &CompileOptions) -> Result<CompileResult, CompilerError> {
    let file = options.file_identity();
    let component = options.component_name.as_str();

    let sections = split_sections(source, file)?;
    debug!(component, styles = sections.style_blocks.len(), "sections split");

    let raw = parse_at(&sections.template_text, file, sections.template_line, sections.template_column)?;
    debug!(component, nodes = raw.children.len(), "template parsed");

    let tree = transform(&raw, file)?;
    debug!(component, "template lowered");

    let result = generate(&tree, &sections, options)?;
    debug!(component, bytes = result.code.len(), "module emitted");

    Ok(result)
}

#[cfg(feature = "napi")]
#[napi]
pub fn compile_native(source: String, options_json: Option<String>) -> napi::Result<CompileResult> {
    let options: CompileOptions = match options_json {
        Some(json) => serde_json::from_str(&json).map_err(|e| napi::Error::from_reason(e.to_string()))?,
        None => CompileOptions::default(),
    };
    compile(&source, &options).map_err(|e| napi::Error::from_reason(e.to_string()))
}
