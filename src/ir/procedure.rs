use std::sync::Arc;

use tracing::debug;

use super::{
    Cell, CellDecl, DeclId, ExprIndex, Exprs, IrError, JmpMode, LabelIndex, Stmt, StmtIndex,
    StorageClass,
};

/// Identifies a procedure within the compiled program, used by procedure calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcId(pub u32);

/// Where a jump goes: a label handle, or the name of a label that may be placed later.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JumpTarget {
    Label(LabelIndex),
    Name(String),
}

impl From<LabelIndex> for JumpTarget {
    fn from(label: LabelIndex) -> Self {
        JumpTarget::Label(label)
    }
}

impl From<&str> for JumpTarget {
    fn from(name: &str) -> Self {
        JumpTarget::Name(name.to_string())
    }
}

impl From<String> for JumpTarget {
    fn from(name: String) -> Self {
        JumpTarget::Name(name)
    }
}

/// The body of one compiled function under construction.
///
/// Statements are only ever appended. Once emission is done, [`Procedure::resolve`]
/// consumes the procedure and links its jumps and shared nodes.
#[derive(Debug, Clone)]
pub struct Procedure {
    pub id: ProcId,
    /// The name of the source function, if it has one.
    pub name: Option<String>,
    /// The enclosing procedure for closures.
    pub parent: Option<ProcId>,
    /// The program entry point. It never returns, so it never releases its cells.
    pub is_root: bool,
    pub exprs: Exprs,
    pub locals: Vec<Arc<Cell>>,
    pub captured: Vec<Arc<Cell>>,
    pub args: Vec<Arc<Cell>>,
    pub(crate) body: Vec<Stmt>,
    /// Label names, by handle. Its length is the label counter.
    pub(crate) labels: Vec<String>,
}

impl Procedure {
    pub fn new(id: ProcId, name: Option<String>) -> Self {
        Self {
            id,
            name,
            parent: None,
            is_root: false,
            exprs: Exprs::new(),
            locals: Vec::new(),
            captured: Vec::new(),
            args: Vec::new(),
            body: Vec::new(),
            labels: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("inline")
    }

    pub fn num_args(&self) -> usize {
        self.args.len()
    }

    pub fn stmts(&self) -> &[Stmt] {
        &self.body
    }

    /// The name given to `label` by [`Procedure::mk_label`], `?` for a handle it never
    /// returned.
    pub fn label_name(&self, label: LabelIndex) -> &str {
        self.labels.get(label).map(String::as_str).unwrap_or("?")
    }

    pub fn mk_local(&mut self, decl: CellDecl) -> Arc<Cell> {
        let cell = Arc::new(Cell::new(self.locals.len(), StorageClass::Local, decl));
        self.locals.push(Arc::clone(&cell));
        cell
    }

    pub fn mk_arg(&mut self, decl: CellDecl) -> Arc<Cell> {
        let cell = Arc::new(Cell::new(self.args.len(), StorageClass::Argument, decl));
        self.args.push(Arc::clone(&cell));
        cell
    }

    pub fn mk_captured(&mut self, decl: CellDecl) -> Arc<Cell> {
        let cell = Arc::new(Cell::new(self.captured.len(), StorageClass::Captured, decl));
        self.captured.push(Arc::clone(&cell));
        cell
    }

    /// Finds the cell declared for `decl`: captured cells first, then locals, then
    /// arguments unless `no_args` is set.
    pub fn local_index(&self, decl: DeclId, no_args: bool) -> Option<&Arc<Cell>> {
        let find = |cells: &[Arc<Cell>]| cells.iter().position(|c| c.decl == decl);

        if let Some(i) = find(&self.captured) {
            return Some(&self.captured[i]);
        }
        if let Some(i) = find(&self.locals) {
            return Some(&self.locals[i]);
        }
        if no_args {
            return None;
        }
        find(&self.args).map(|i| &self.args[i])
    }

    pub fn emit(&mut self, stmt: Stmt) -> StmtIndex {
        self.body.push(stmt);
        self.body.len() - 1
    }

    pub fn emit_expr(&mut self, expr: ExprIndex) -> StmtIndex {
        self.emit(Stmt::Expr(expr))
    }

    /// Allocates a label named `.{base}.{n}`. The counter makes the name unique even
    /// when the same base is requested several times.
    pub fn mk_label(&mut self, base: &str) -> LabelIndex {
        let label = self.labels.len();
        let name = format!(".{base}.{label}");
        debug!("new label {name}");
        self.labels.push(name);
        label
    }

    pub fn emit_label(&mut self, label: LabelIndex) -> StmtIndex {
        self.emit(Stmt::Label(label))
    }

    pub fn emit_label_direct(&mut self, base: &str) -> LabelIndex {
        let label = self.mk_label(base);
        self.emit_label(label);
        label
    }

    pub fn stack_empty(&mut self) -> StmtIndex {
        self.emit(Stmt::StackEmpty)
    }

    pub fn emit_jmp(
        &mut self,
        target: impl Into<JumpTarget>,
        expr: Option<ExprIndex>,
        mode: JmpMode,
    ) -> StmtIndex {
        self.emit(Stmt::Jmp {
            target: target.into(),
            mode,
            expr,
        })
    }

    pub fn emit_jmp_z(&mut self, target: impl Into<JumpTarget>, expr: ExprIndex) -> StmtIndex {
        self.emit_jmp(target, Some(expr), JmpMode::IfZero)
    }

    /// Releases the frame's own reference held by `cell`, if it holds one.
    pub fn emit_clr_if_ref(&mut self, cell: &Arc<Cell>) -> Result<(), IrError> {
        if cell.is_global() || cell.is_captured() {
            return Err(IrError::ReleaseOfNonLocal {
                cell: cell.to_string(),
            });
        }

        if cell.is_ref() || cell.is_boxed_local() {
            debug!("releasing {cell} at scope exit");
            let slot = cell.load_core(&mut self.exprs);
            let decr = self.exprs.decr(slot);
            self.emit_expr(decr);
        }

        Ok(())
    }

    /// Releases every local and argument at scope exit.
    pub fn emit_clrs(&mut self) -> Result<(), IrError> {
        if self.is_root {
            return Ok(());
        }

        let cells: Vec<Arc<Cell>> = self.locals.iter().chain(&self.args).cloned().collect();
        for cell in &cells {
            self.emit_clr_if_ref(cell)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{ExprKind, VariableInfo};

    #[test]
    fn labels_with_same_base_are_distinct() {
        let mut proc = Procedure::new(ProcId(0), None);
        let a = proc.mk_label("loop");
        let b = proc.mk_label("loop");
        assert_ne!(proc.label_name(a), proc.label_name(b));
        assert_eq!(proc.label_name(a), ".loop.0");
        assert_eq!(proc.label_name(b), ".loop.1");
    }

    #[test]
    fn unnamed_procedure_is_inline() {
        assert_eq!(Procedure::new(ProcId(3), None).name(), "inline");
        assert_eq!(
            Procedure::new(ProcId(3), Some("main".to_string())).name(),
            "main"
        );
    }

    #[test]
    fn local_index_prefers_captured_and_can_skip_args() {
        let mut proc = Procedure::new(ProcId(0), None);
        let arg = proc.mk_arg(CellDecl::new(DeclId(1), "a"));
        let local = proc.mk_local(CellDecl::new(DeclId(2), "b"));
        let cap = proc.mk_captured(CellDecl::new(DeclId(2), "b"));

        assert_eq!(proc.local_index(DeclId(2), false), Some(&cap));
        assert_ne!(proc.local_index(DeclId(2), false), Some(&local));
        assert_eq!(proc.local_index(DeclId(1), false), Some(&arg));
        assert_eq!(proc.local_index(DeclId(1), true), None);
        assert_eq!(proc.num_args(), 1);
    }

    #[test]
    fn clrs_release_ref_and_boxed_cells_only() {
        let mut proc = Procedure::new(ProcId(0), None);
        proc.mk_local(CellDecl::new(DeclId(1), "plain"));
        proc.mk_local(CellDecl::new(DeclId(2), "rc").with_ref_counted(true));
        proc.mk_local(CellDecl::new(DeclId(3), "boxed").with_info(VariableInfo {
            captured: true,
            written: true,
        }));
        proc.mk_arg(CellDecl::new(DeclId(4), "arg").with_ref_counted(true));

        proc.emit_clrs().unwrap();

        let released: Vec<String> = proc
            .stmts()
            .iter()
            .map(|stmt| {
                let Stmt::Expr(decr) = stmt else {
                    panic!("unexpected {stmt:?}")
                };
                assert_eq!(proc.exprs[*decr].kind, ExprKind::Decr);
                match &proc.exprs[proc.exprs[*decr].operand()].kind {
                    ExprKind::CellRef(cell) => cell.name.clone().unwrap(),
                    other => panic!("unexpected {other:?}"),
                }
            })
            .collect();
        assert_eq!(released, vec!["rc", "boxed", "arg"]);
    }

    #[test]
    fn root_procedure_never_releases() {
        let mut proc = Procedure::new(ProcId(0), None);
        proc.is_root = true;
        proc.mk_local(CellDecl::new(DeclId(1), "rc").with_ref_counted(true));
        proc.emit_clrs().unwrap();
        assert!(proc.stmts().is_empty());
    }

    #[test]
    fn releasing_global_or_captured_is_an_error() {
        let mut proc = Procedure::new(ProcId(0), None);
        let global = Cell::global(0, CellDecl::new(DeclId(1), "g").with_ref_counted(true));
        let cap = proc.mk_captured(CellDecl::new(DeclId(2), "c").with_ref_counted(true));

        assert_eq!(
            proc.emit_clr_if_ref(&global),
            Err(IrError::ReleaseOfNonLocal {
                cell: "[REF g]".to_string()
            })
        );
        assert!(proc.emit_clr_if_ref(&cap).is_err());
        assert!(proc.stmts().is_empty());
    }
}
