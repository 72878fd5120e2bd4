//! Parse-tree expression nodes and the pools that own them.
//!
//! Grounded on the teacher's `Expr`/`ExprIs` pair in `expr.rs`: a struct
//! carrying `(exp, data_type, is_constant, checked, col)` wrapping an enum
//! of node shapes, built during parsing and annotated in place during
//! `c_check`. Section 3 calls this `ExpressionNode`
//! `(kind, token, position, lhs, rhs, args)` and requires node lifetime to
//! be bounded by one `compile()` call; here that's enforced by storing
//! nodes in a `NodePool<ExprNode>` (see `pool.rs`) and addressing children
//! by `NodeId` rather than by owned `Box`, so a pool `reset()` invalidates
//! every id at once instead of leaving a tree of boxes to drop one at a
//! time.

use crate::pool::{NodeId, NodePool};
use crate::types::ColumnType;
use crate::value::Value;

pub type ExprId = NodeId<ExprNode>;

/// Binary/unary operator spelled out in the grammar (section 6.1 dialect).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Concat,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Not,
    Neg,
}

/// One node of a scalar expression tree. Kinds mirror section 3's
/// `ExpressionNode`: LITERAL/CONSTANT collapse into `Literal`, OPERATOR
/// is `Binary`/`Unary`, FUNCTION is `Call`, SET_OPERATION has no
/// expression-level use in this dialect subset (it belongs to the
/// opaque QUERY side), and QUERY is `ScalarSubquery`.
#[derive(Debug, Clone)]
pub enum ExprKind {
    Literal(Value),
    ColumnRef(String),
    Binary(Op, ExprId, ExprId),
    Unary(Op, ExprId),
    Call(String, Vec<ExprId>),
    /// CASE WHEN .. THEN .. ELSE end; list of (when, then) plus a mandatory else.
    Case(Vec<(ExprId, ExprId)>, ExprId),
}

#[derive(Debug, Clone)]
pub struct ExprNode {
    pub kind: ExprKind,
    /// Byte offset of this expression's leading token, for error reporting.
    pub position: usize,
    /// Filled in by the function parser / optimiser once the expression's
    /// type is known; `None` until then.
    pub resolved_type: Option<ColumnType>,
}

impl ExprNode {
    pub fn new(kind: ExprKind, position: usize) -> Self {
        ExprNode {
            kind,
            position,
            resolved_type: None,
        }
    }
}

/// One projected column of a SELECT list (section 3: `QueryColumn`).
#[derive(Debug, Clone)]
pub struct QueryColumn {
    pub alias: Option<String>,
    pub expr: ExprId,
    pub position: usize,
}

/// All pools used by a single `compile()` call. Owned exclusively by the
/// `Compiler` (section 3 Ownership) and reset at the start of every call.
#[derive(Default)]
pub struct Pools {
    pub exprs: NodePool<ExprNode>,
}

impl Pools {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.exprs.reset();
    }

    pub fn alloc(&mut self, kind: ExprKind, position: usize) -> ExprId {
        self.exprs.alloc(ExprNode::new(kind, position))
    }

    pub fn get(&self, id: ExprId) -> &ExprNode {
        self.exprs.get(id)
    }

    pub fn get_mut(&mut self, id: ExprId) -> &mut ExprNode {
        self.exprs.get_mut(id)
    }
}
