use std::{path::PathBuf, sync::Arc};

use bitvm_ir::driver::{ScriptError, compile_script};
use bitvm_ir::ir::{Cell, ExprIndex, ExprKind, Node, ResolvedProcedure, walk};
use tempfile::TempDir;

#[derive(Debug)]
pub struct CompileResult {
    #[allow(unused)]
    pub folder: TempDir,
    #[allow(unused)]
    pub script_file: PathBuf,
    pub procedure: ResolvedProcedure,
}

/// Writes `source` to a temporary script file named after `name` and compiles it.
pub fn compile_source(source: &str, name: &str) -> Result<CompileResult, ScriptError> {
    let folder = tempfile::tempdir()?;
    let script_file = folder.path().join(name).with_extension("toml");
    std::fs::write(&script_file, source)?;

    tracing::debug!("script:\n{}", source);
    let procedure = compile_script(&script_file)?;

    Ok(CompileResult {
        folder,
        script_file,
        procedure,
    })
}

/// Every `Incr` node of the procedure, that is every load retaining a reference.
#[allow(unused)]
pub fn retained_loads(procedure: &ResolvedProcedure) -> Vec<ExprIndex> {
    let mut loads = Vec::new();
    walk(procedure.exprs(), procedure.stmts(), |node| {
        if let Node::Expr(idx, expr) = node {
            if expr.kind == ExprKind::Incr && !loads.contains(&idx) {
                loads.push(idx);
            }
        }
    });
    loads
}

/// The shared node wrapping `expr`, if any.
#[allow(unused)]
pub fn sharing_node(procedure: &ResolvedProcedure, expr: ExprIndex) -> Option<ExprIndex> {
    let mut found = None;
    walk(procedure.exprs(), procedure.stmts(), |node| {
        if let Node::Expr(idx, shared) = node {
            if shared.is_shared() && shared.operand() == expr {
                found = Some(idx);
            }
        }
    });
    found
}

/// How many `Decr` nodes release `expr`.
#[allow(unused)]
pub fn releases_of(procedure: &ResolvedProcedure, expr: ExprIndex) -> usize {
    let mut releases = 0;
    walk(procedure.exprs(), procedure.stmts(), |node| {
        if let Node::Expr(_, decr) = node {
            if decr.kind == ExprKind::Decr && decr.operand() == expr {
                releases += 1;
            }
        }
    });
    releases
}

/// How many `Decr` nodes release the raw slot of `cell`, as emitted on scope exit.
#[allow(unused)]
pub fn slot_releases(procedure: &ResolvedProcedure, cell: &Arc<Cell>) -> usize {
    let exprs = procedure.exprs();
    let mut releases = 0;
    walk(exprs, procedure.stmts(), |node| {
        if let Node::Expr(_, decr) = node {
            if decr.kind != ExprKind::Decr {
                return;
            }
            if let ExprKind::CellRef(slot) = &exprs[decr.operand()].kind {
                if Arc::ptr_eq(slot, cell) {
                    releases += 1;
                }
            }
        }
    });
    releases
}

/// Names of the runtime helpers called by the procedure, in walk order.
#[allow(unused)]
pub fn runtime_calls(procedure: &ResolvedProcedure) -> Vec<String> {
    let mut calls = Vec::new();
    walk(procedure.exprs(), procedure.stmts(), |node| {
        if let Node::Expr(_, expr) = node {
            if let ExprKind::RuntimeCall { name, .. } = &expr.kind {
                calls.push(name.clone());
            }
        }
    });
    calls
}
