//! bidl-compiler
//!
//! This crate implements:
//!  1) A tokenizer + parser for `.idl` files, with imports,
//!  2) A binder that resolves and checks the parsed schema (duplicate names, unknown types, bad defaults, etc.),
//!  3) Code generation of a declarations file and a definitions file per input,
//!  4) A compatibility checker comparing an old and a new tree of `.idl` files,
//!  5) Error types (`CompileError`, `ErrorCollection`, `CompatibilityAbort`).

pub mod error;
pub mod common;
pub mod tokenizer;
pub mod nodes;
pub mod context;
pub mod syntax;
pub mod imports;
pub mod parser;
pub mod bson;
pub mod ast;
pub mod binder;
pub mod rust_types;
pub mod writer;
pub mod field_usage;
pub mod enum_types;
pub mod struct_types;
pub mod generator;
pub mod compiler;
pub mod compatibility_errors;
pub mod compatibility;

pub use compatibility::check_compatibility;
pub use compatibility::check_directories;
pub use compatibility::check_error_reply;
pub use compatibility_errors::{CompatibilityAbort, CompatibilityErrorCollection, CompatibilityErrorId};
pub use compiler::{compile_file, generate_code, parse_file, write_generated, CompileOptions};
pub use error::{CompileError, ErrorCollection};
pub use generator::GeneratedCode;
