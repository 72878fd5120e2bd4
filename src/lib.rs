//! SQL compilation and execution pipeline for a column-oriented,
//! time-partitioned database (section 1: "the SQL compilation and
//! execution pipeline ... plus the table mutation executors").
//!
//! The physical table store, the HTTP/PostgreSQL wire servers, the UDP
//! line receiver, configuration file parsing, and the text-import CSV
//! parser are out of scope (section 1); this crate consumes the storage
//! engine only through the trait boundary in [`engine`].
//!
//! Example, compiling and running a statement against the bundled mock
//! engine (feature `mock-engine`, on by default):
//! ```
//! use qdb_sqlcore::compiler::{Compiler, ExecutionContext};
//! use qdb_sqlcore::config::CompilerConfig;
//! use qdb_sqlcore::engine::mock::MockEngine;
//!
//! let engine = MockEngine::new();
//! let mut compiler = Compiler::new(CompilerConfig::default());
//! let ctx = ExecutionContext::new();
//! compiler
//!     .compile(&engine, &ctx, "CREATE TABLE a (x INT, ts TIMESTAMP) TIMESTAMP(ts) PARTITION BY DAY")
//!     .unwrap();
//! ```

/// Parse-tree expression nodes (`ExpressionNode`) and the arena pools
/// that own them.
pub mod ast;
/// Top-level `compile()` entry point, the retry loop, and the keyword-
/// dispatched mutation executors (CREATE/ALTER/DROP/TRUNCATE/REPAIR/COPY).
pub mod compiler;
/// Compiler and mutation tunables (`CompilerConfig`).
pub mod config;
/// Record-to-row copier builder: one compiled-in conversion functor per
/// column, built once per statement.
pub mod copier;
/// Code generator: turns an optimised `QueryModel` into a
/// `RecordCursorFactory` tree.
pub mod cursor;
/// Interfaces consumed from the storage engine (section 6.3), plus an
/// in-memory `mock` implementation used by tests.
pub mod engine;
/// Crate-wide `SqlError`/`ErrorKind`/`Result`.
pub mod error;
/// Binds AST expression nodes to typed, evaluatable function/operator
/// instances (`FunctionRegistry`, `Binder`, `ScalarExpr`).
pub mod functions;
/// Tokenizer for the SQL dialect subset of section 6.1.
pub mod lexer;
/// Typed models produced by the parser: `QueryModel`, `CreateTableModel`,
/// `InsertModel`, `CopyModel`, and the `ExecutionModel` tag.
pub mod model;
/// Rule-based `QueryModel` rewrite: name resolution, predicate push-down,
/// join/sub-query handling.
pub mod optimiser;
/// Consumes tokens from the lexer and emits an AST of expression nodes
/// plus a typed `ExecutionModel`.
pub mod parser;
/// Arena-style reusable storage for parse tokens, AST nodes, and query
/// model nodes, reset between compilations.
pub mod pool;
/// The closed set of column types, their cast groups, and assignability
/// (section 3).
pub mod types;
/// Runtime value representation produced by literal/constant folding.
pub mod value;
