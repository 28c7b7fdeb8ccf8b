use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use tracing::{debug, instrument};

use super::{
    ScriptError,
    config::{CellClass, ExprSpec, ProcedureScript, StmtSpec},
};
use crate::ir::{Cell, CellDecl, DeclId, ExprIndex, LabelIndex, ProcId, Procedure, VariableInfo};

/// Builds the procedure described by `script`, in statement order. The result is not
/// resolved yet.
#[instrument(level = "debug", skip_all, fields(name = ?script.procedure.name))]
pub fn lower_script(script: &ProcedureScript) -> Result<Procedure, ScriptError> {
    let header = &script.procedure;
    let mut procedure = Procedure::new(ProcId(header.id), header.name.clone());
    procedure.parent = header.parent.map(ProcId);
    procedure.is_root = header.root;

    let mut cells = HashMap::new();
    let mut decls = HashSet::new();
    let mut globals = 0;

    for (pos, spec) in script.cells.iter().enumerate() {
        let decl = DeclId(spec.decl.unwrap_or(pos as u32));
        if !decls.insert(decl) {
            return Err(ScriptError::DuplicateDecl {
                decl: decl.0,
                name: spec.name.clone(),
            });
        }

        let decl = CellDecl {
            decl,
            name: Some(spec.name.clone()),
            info: VariableInfo {
                captured: spec.captured,
                written: spec.written,
            },
            ref_counted: spec.ref_counted,
        };

        let cell = match spec.class {
            CellClass::Arg => procedure.mk_arg(decl),
            CellClass::Local => procedure.mk_local(decl),
            CellClass::Captured => procedure.mk_captured(decl),
            CellClass::Global => {
                globals += 1;
                Cell::global(globals - 1, decl)
            }
        };
        debug!("declared {cell}");

        if cells.insert(spec.name.as_str(), cell).is_some() {
            return Err(ScriptError::DuplicateCell {
                name: spec.name.clone(),
            });
        }
    }

    let mut ctx = LowerCtx {
        procedure,
        cells,
        labels: HashMap::new(),
    };

    for stmt in &script.body {
        ctx.lower_stmt(stmt)?;
    }

    Ok(ctx.procedure)
}

struct LowerCtx<'s> {
    procedure: Procedure,
    cells: HashMap<&'s str, Arc<Cell>>,
    /// Script label names to label handles, allocated on first mention so jumps can
    /// come before the label.
    labels: HashMap<&'s str, LabelIndex>,
}

impl<'s> LowerCtx<'s> {
    fn cell(&self, name: &str) -> Result<Arc<Cell>, ScriptError> {
        self.cells
            .get(name)
            .cloned()
            .ok_or_else(|| ScriptError::UnknownCell {
                name: name.to_string(),
            })
    }

    fn label(&mut self, name: &'s str) -> LabelIndex {
        *self
            .labels
            .entry(name)
            .or_insert_with(|| self.procedure.mk_label(name))
    }

    fn lower_stmt(&mut self, stmt: &'s StmtSpec) -> Result<(), ScriptError> {
        match stmt {
            StmtSpec::Expr { expr } => {
                let expr = self.lower_expr(expr)?;
                self.procedure.emit_expr(expr);
            }
            StmtSpec::Store { cell, value, init } => {
                let cell = self.cell(cell)?;
                let value = self.lower_expr(value)?;
                let exprs = &mut self.procedure.exprs;
                let store = if *init {
                    cell.store_direct(exprs, value)
                } else {
                    cell.store_by_ref(exprs, value)
                };
                self.procedure.emit_expr(store);
            }
            StmtSpec::Label { name } => {
                let label = self.label(name);
                self.procedure.emit_label(label);
            }
            StmtSpec::Jmp { target, mode, cond } => {
                let label = self.label(target);
                let cond = cond
                    .as_ref()
                    .map(|cond| self.lower_expr(cond))
                    .transpose()?;
                self.procedure.emit_jmp(label, cond, *mode);
            }
            StmtSpec::StackEmpty => {
                self.procedure.stack_empty();
            }
            StmtSpec::Clr { cell } => {
                let cell = self.cell(cell)?;
                self.procedure.emit_clr_if_ref(&cell)?;
            }
            StmtSpec::Clrs => self.procedure.emit_clrs()?,
        }
        Ok(())
    }

    fn lower_expr(&mut self, expr: &'s ExprSpec) -> Result<ExprIndex, ScriptError> {
        let lowered = match expr {
            ExprSpec::Num(value) => self.procedure.exprs.numlit(*value),
            ExprSpec::Bool(value) => self.procedure.exprs.numlit(*value),
            ExprSpec::Ptr { label, info } => self.procedure.exprs.ptrlit(label, info),
            ExprSpec::Load(name) => {
                let cell = self.cell(name)?;
                cell.load(&mut self.procedure.exprs)
            }
            ExprSpec::Call(call) => {
                let args = self.lower_exprs(&call.args)?;
                self.procedure
                    .exprs
                    .rtcall_mask(&call.name, call.mask, call.is_async, args)
            }
            ExprSpec::ProcCall {
                callee,
                is_async,
                args,
            } => {
                let args = self.lower_exprs(args)?;
                self.procedure
                    .exprs
                    .proc_call(ProcId(*callee), *is_async, args)
            }
            ExprSpec::Field { of, index } => {
                let of = self.lower_expr(of)?;
                self.procedure.exprs.field_access(of, *index)
            }
            ExprSpec::Seq(items) => {
                let items = self.lower_exprs(items)?;
                self.procedure.exprs.sequence(items)
            }
            ExprSpec::JmpValue => self.procedure.exprs.jmp_value(),
        };
        Ok(lowered)
    }

    fn lower_exprs(&mut self, exprs: &'s [ExprSpec]) -> Result<Vec<ExprIndex>, ScriptError> {
        exprs.iter().map(|expr| self.lower_expr(expr)).collect()
    }
}
