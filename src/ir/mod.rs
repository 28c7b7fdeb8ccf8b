//! IR:
//!   - Expression trees over an arena ([`Exprs`]), addressed by [`ExprIndex`].
//!   - A flat statement list per [`Procedure`], with labels and jumps.
//!   - Reference counting is explicit: loads of ref-counted cells produce an `Incr`,
//!     scope exit and borrowed call arguments produce a `Decr`.
//!   - A `Shared` node is computed once and may be referenced from several parents.
//!     Its use counts are filled by [`Procedure::resolve`] into a side table.

use std::{collections::HashSet, ops::Index, sync::Arc};

use serde::Deserialize;
use typed_generational_arena::{StandardSlab, StandardSlabIndex};

pub mod builder;
mod cell;
mod display;
mod errors;
mod procedure;
mod resolve;
pub mod runtime;

pub use cell::{Cell, CellDecl, DeclId, StorageClass, VariableInfo};
pub use errors::IrError;
pub use procedure::{JumpTarget, ProcId, Procedure};
pub use resolve::{ResolvedProcedure, SharedUses};

pub type ExprIndex = StandardSlabIndex<Expr>;
pub type StmtIndex = usize;
pub type LabelIndex = usize;

/// A numeric literal as understood by the bytecode machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Literal {
    Int(i32),
    Bool(bool),
}

impl From<i32> for Literal {
    fn from(value: i32) -> Self {
        Literal::Int(value)
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Literal::Bool(value)
    }
}

/// The operation of an expression node, with the payload that kind carries.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    NumberLiteral(Literal),
    /// Address of a labelled datum. `info` is free-form text for dumps.
    PointerLiteral { label: String, info: String },
    /// Call into the runtime support library.
    RuntimeCall { name: String, is_async: bool },
    /// Call of a user procedure.
    ProcCall { callee: ProcId, is_async: bool },
    /// Single operand computed once, possibly referenced from several positions.
    Shared,
    FieldAccess(usize),
    /// Operands: the target cell reference, then the value.
    Store,
    CellRef(Arc<Cell>),
    /// The caller owns one more reference to the operand's value.
    Incr,
    /// Release one reference to the operand's value.
    Decr,
    /// Evaluates every operand in order, the value is the last one.
    Sequence,
    /// The value left behind by a jump, consumed at the label.
    JmpValue,
}

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub args: Vec<ExprIndex>,
}

impl Expr {
    pub fn is_literal(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::NumberLiteral(_) | ExprKind::PointerLiteral { .. }
        )
    }

    pub fn is_shared(&self) -> bool {
        matches!(self.kind, ExprKind::Shared)
    }

    pub fn is_async(&self) -> bool {
        match self.kind {
            ExprKind::RuntimeCall { is_async, .. } | ExprKind::ProcCall { is_async, .. } => {
                is_async
            }
            _ => false,
        }
    }

    /// The single operand of a wrapper node (`Shared`, `Incr`, `Decr`, `FieldAccess`).
    pub fn operand(&self) -> ExprIndex {
        self.args[0]
    }
}

/// Arena owning the expression nodes of one procedure.
#[derive(Debug, Clone)]
pub struct Exprs {
    nodes: StandardSlab<Expr>,
}

impl Default for Exprs {
    fn default() -> Self {
        Self::new()
    }
}

impl Exprs {
    pub fn new() -> Self {
        Self {
            nodes: StandardSlab::new(),
        }
    }

    pub(crate) fn alloc(&mut self, kind: ExprKind, args: Vec<ExprIndex>) -> ExprIndex {
        self.nodes.insert(Expr { kind, args })
    }

    pub fn get(&self, idx: ExprIndex) -> Option<&Expr> {
        self.nodes.get(idx)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether evaluating `idx` again is free of effects and yields the same value.
    ///
    /// A shared node qualifies once its value has been materialized, that is when the
    /// code generator already consumed it at least once.
    pub fn is_stateless(&self, idx: ExprIndex, uses: &SharedUses) -> bool {
        match self[idx].kind {
            ExprKind::NumberLiteral(_) | ExprKind::PointerLiteral { .. } => true,
            ExprKind::Shared => uses.current(idx) != 0,
            _ => false,
        }
    }

    /// Whether evaluating `idx` may write to any cell. Conservative.
    pub fn can_update_cells(&self, idx: ExprIndex, uses: &SharedUses) -> bool {
        let expr = &self[idx];
        match expr.kind {
            ExprKind::NumberLiteral(_)
            | ExprKind::PointerLiteral { .. }
            | ExprKind::CellRef(_)
            | ExprKind::JmpValue => false,

            ExprKind::Shared => {
                if self.is_stateless(idx, uses) {
                    return false;
                }
                self.can_update_cells(expr.operand(), uses)
            }

            ExprKind::Incr | ExprKind::Decr | ExprKind::FieldAccess(_) => {
                self.can_update_cells(expr.operand(), uses)
            }

            ExprKind::RuntimeCall { .. } | ExprKind::ProcCall { .. } | ExprKind::Sequence => {
                true
            }

            ExprKind::Store => true,
        }
    }
}

impl Index<ExprIndex> for Exprs {
    type Output = Expr;

    fn index(&self, idx: ExprIndex) -> &Expr {
        &self.nodes[idx]
    }
}

/// How a jump decides whether it is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JmpMode {
    #[default]
    Always,
    IfZero,
    IfNotZero,
}

/// A statement of a procedure body.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Evaluate for effect.
    Expr(ExprIndex),
    Label(LabelIndex),
    Jmp {
        target: JumpTarget,
        mode: JmpMode,
        /// The tested value for conditional jumps, or the carried value.
        expr: Option<ExprIndex>,
    },
    /// The evaluation stack must hold no pending values here.
    StackEmpty,
}

impl Stmt {
    pub fn expr(&self) -> Option<ExprIndex> {
        match self {
            Stmt::Expr(expr) => Some(*expr),
            Stmt::Jmp { expr, .. } => *expr,
            Stmt::Label(_) | Stmt::StackEmpty => None,
        }
    }
}

/// Any IR node, as reported by [`walk`].
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Expr(ExprIndex, &'a Expr),
    Stmt(StmtIndex, &'a Stmt),
}

/// Visits `stmts` in order. Each statement is reported, then its expression tree in
/// pre-order. A shared node is reported at every position referencing it, but its
/// operand is entered only at the first one.
pub fn walk<'a, F>(exprs: &'a Exprs, stmts: &'a [Stmt], mut f: F)
where
    F: FnMut(Node<'a>),
{
    let mut entered = HashSet::new();
    for (idx, stmt) in stmts.iter().enumerate() {
        f(Node::Stmt(idx, stmt));
        if let Some(expr) = stmt.expr() {
            walk_expr(exprs, expr, &mut entered, &mut f);
        }
    }
}

fn walk_expr<'a, F>(
    exprs: &'a Exprs,
    idx: ExprIndex,
    entered: &mut HashSet<ExprIndex>,
    f: &mut F,
) where
    F: FnMut(Node<'a>),
{
    let expr = &exprs[idx];
    f(Node::Expr(idx, expr));

    if expr.is_shared() && !entered.insert(idx) {
        return;
    }

    for &arg in &expr.args {
        walk_expr(exprs, arg, entered, f);
    }
}
