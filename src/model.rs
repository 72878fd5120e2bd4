//! Typed models produced by the parser: `QueryModel`, `CreateTableModel`,
//! `InsertModel`, `CopyModel`, and the `ExecutionModel`/`CompiledQuery`
//! tags that route them through the compiler.
//!
//! Grounded on the teacher's `SelectExpression`/`TableExpression` pair in
//! `expr.rs` (source or nested select, column list, WHERE, ORDER BY) and
//! its `DO` enum in `run.rs` (one variant per mutation the compiler can
//! dispatch). Section 3 asks for one richer `QueryModel` per SELECT
//! (joins, GROUP BY, SAMPLE BY, nested models) plus separate
//! `CreateTableModel`/`InsertModel`/`CopyModel` structs, which is what's
//! implemented here; the teacher's single flat `SelectExpression` becomes
//! this crate's `QueryModel`, generalised with `joins` and `sample_by`.

use crate::ast::{ExprId, QueryColumn};
use crate::types::ColumnType;
use std::collections::HashMap;

/// `PARTITION BY` mode (section 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionBy {
    None,
    Day,
    Month,
    Year,
}

/// A join between the running FROM clause and one more table expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

#[derive(Debug, Clone)]
pub struct Join {
    pub kind: JoinKind,
    pub table: String,
    pub predicate: Option<ExprId>,
}

/// Either a base table by name or a nested sub-query (section 3: "source
/// (table name or nested model)").
#[derive(Debug, Clone)]
pub enum FromClause {
    Table(String),
    Nested(Box<QueryModel>),
}

/// Composite AST of a SELECT. Mutable during optimisation (section 3).
#[derive(Debug, Clone)]
pub struct QueryModel {
    pub columns: Vec<QueryColumn>,
    pub from: Option<FromClause>,
    pub joins: Vec<Join>,
    pub wher: Option<ExprId>,
    pub group_by: Vec<ExprId>,
    pub sample_by: Option<String>,
    pub order_by: Vec<(ExprId, bool)>, // bool = descending
    pub limit: Option<i64>,
}

impl QueryModel {
    pub fn new() -> Self {
        QueryModel {
            columns: Vec::new(),
            from: None,
            joins: Vec::new(),
            wher: None,
            group_by: Vec::new(),
            sample_by: None,
            order_by: Vec::new(),
            limit: None,
        }
    }

    /// `SELECT * FROM t` has no explicit projection list; the code
    /// generator expands it against the source's metadata.
    pub fn is_star(&self) -> bool {
        self.columns.is_empty()
    }
}

impl Default for QueryModel {
    fn default() -> Self {
        Self::new()
    }
}

/// An explicit column in a `CREATE TABLE` column list (section 3).
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    pub name: String,
    pub col_type: ColumnType,
    /// SYMBOL-only options.
    pub symbol_capacity: Option<u32>,
    pub symbol_cache: Option<bool>,
    pub indexed: bool,
    pub index_value_block_capacity: Option<u32>,
}

/// Resolved `(from, to)` pair for one cast column, checked against
/// section 3's cast groups once the source query's projection type is
/// known (section 4.5 step 4). `CreateTableModel::casts` only carries the
/// requested target type at parse time -- the source type isn't known
/// until the nested query is compiled.
#[derive(Debug, Clone, Copy)]
pub struct ColumnCast {
    pub from: ColumnType,
    pub to: ColumnType,
}

/// Parse-time `CAST(col AS type)` requests from `CREATE TABLE AS SELECT`
/// (section 3), keyed by column name. The `from` half of each pair is
/// filled in by the CREATE TABLE executor once it has compiled the
/// nested query and knows that column's actual source type.
pub type ColumnCastModel = HashMap<String, ColumnType>;

/// `CREATE TABLE [AS SELECT]` (section 3).
#[derive(Debug, Clone)]
pub struct CreateTableModel {
    pub table_name: String,
    pub columns: Vec<ColumnSpec>,
    pub casts: ColumnCastModel,
    pub timestamp_column: Option<String>,
    pub partition_by: PartitionBy,
    pub query: Option<Box<QueryModel>>,
}

/// `INSERT INTO t [(cols)] VALUES (...)` or `INSERT INTO t [(cols)] <query>` (section 3).
#[derive(Debug, Clone)]
pub struct InsertModel {
    pub table_name: String,
    /// Empty means "all columns, in table order".
    pub columns: Vec<String>,
    pub values: Vec<ExprId>,
    pub query: Option<Box<QueryModel>>,
}

/// `COPY 'path'|'stdin' INTO t` (section 3).
#[derive(Debug, Clone)]
pub struct CopyModel {
    pub source: CopySource,
    pub table_name: String,
}

#[derive(Debug, Clone)]
pub enum CopySource {
    Stdin,
    File(String),
}

/// One or more names following `ALTER TABLE t ADD|DROP COLUMN` (section 4.6).
#[derive(Debug, Clone)]
pub enum AlterColumnOp {
    Add(ColumnSpec),
    Drop(String),
}

#[derive(Debug, Clone)]
pub struct AlterTableModel {
    pub table_name: String,
    pub ops: Vec<AlterColumnOp>,
}

/// What the parser produced, before the optimiser/codegen stage decides
/// what to do with it (section 2: "Parser ... emit ... a typed
/// ExecutionModel (QUERY, CREATE_TABLE, INSERT, COPY, RENAME)"). `Rename`
/// is not exercised by anything in the SQL surface of section 6.1, but the
/// tag is kept because section 2 names it explicitly as one of the five
/// ExecutionModel kinds the parser must be able to emit.
#[derive(Debug, Clone)]
pub enum ExecutionModel {
    Query(QueryModel),
    CreateTable(CreateTableModel),
    Insert(InsertModel),
    Copy(CopyModel),
    Rename { from: String, to: String },
}
