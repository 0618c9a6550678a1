//! Core compiler pipeline for the Jack language.
//!
//! The pipeline is roughly:
//!
//!   source .jack
//!     -> lexer      (tokens with line numbers)
//!     -> parser     (concrete syntax tree of grammar rules)
//!     -> codegen_vm (scoped walk of the tree, stack-machine instructions)
//!     -> vm         (text form, one instruction per line)
//!
//! The CLI and any other front-end should depend on this crate rather than
//! reimplementing the pipeline.

// ---------------------------------------------------------------------
// Error handling
// ---------------------------------------------------------------------

pub mod error;

// ---------------------------------------------------------------------
// Front-end: lexing and parsing
// ---------------------------------------------------------------------

pub mod lexer;
pub mod cursor;
pub mod parser;
pub mod ast;
pub mod xml;

// ---------------------------------------------------------------------
// Semantic layer: scopes and variable slots
// ---------------------------------------------------------------------

pub mod scope;

// ---------------------------------------------------------------------
// Back-end: code generation and compiler orchestration
// ---------------------------------------------------------------------

pub mod vm;
pub mod codegen_vm;
pub mod compiler;

// ---------------------------------------------------------------------
// Source discovery
// ---------------------------------------------------------------------

pub mod sources;

// ---------------------------------------------------------------------
// Public API re-exports
// ---------------------------------------------------------------------

pub use compiler::{CompilationArtifact, compile_source, compile_to_vm, emit_xml};
pub use error::CoreError;
pub use sources::{SourceFile, collect_sources};
