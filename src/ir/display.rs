use std::{
    collections::{HashMap, HashSet},
    fmt,
    sync::Arc,
};

use itertools::Itertools;

use super::{
    Cell, ExprIndex, ExprKind, Exprs, JmpMode, JumpTarget, Literal, Procedure, ResolvedProcedure,
    Stmt, resolve::Linkage,
};

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(value) => write!(f, "{value}"),
            Literal::Bool(value) => write!(f, "{value}"),
        }
    }
}

impl fmt::Display for JmpMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JmpMode::Always => "jmp",
            JmpMode::IfZero => "jmpz",
            JmpMode::IfNotZero => "jmpnz",
        })
    }
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_procedure(f, self, None)
    }
}

impl fmt::Display for ResolvedProcedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_procedure(f, self.procedure(), Some(&self.linkage))
    }
}

fn cell_list(cells: &[Arc<Cell>]) -> String {
    if cells.is_empty() {
        return "-".to_string();
    }
    cells.iter().map(|cell| cell.to_string()).join(", ")
}

fn write_procedure(
    f: &mut fmt::Formatter<'_>,
    procedure: &Procedure,
    linkage: Option<&Linkage>,
) -> fmt::Result {
    write!(f, "proc {} #{}", procedure.name(), procedure.id.0)?;
    if let Some(parent) = procedure.parent {
        write!(f, " in #{}", parent.0)?;
    }
    if procedure.is_root {
        write!(f, " (root)")?;
    }
    writeln!(f)?;
    writeln!(f, "  args: {}", cell_list(&procedure.args))?;
    writeln!(f, "  locals: {}", cell_list(&procedure.locals))?;
    writeln!(f, "  captured: {}", cell_list(&procedure.captured))?;

    let mut printer = ExprPrinter {
        exprs: &procedure.exprs,
        uses: linkage.map(|linkage| &linkage.shared_uses),
        seen: HashSet::new(),
    };

    for (idx, stmt) in procedure.stmts().iter().enumerate() {
        write!(f, "{idx:>4}  ")?;
        match stmt {
            Stmt::Expr(expr) => {
                write!(f, "expr ")?;
                printer.write(f, *expr)?;
            }
            Stmt::Label(label) => {
                write!(f, "{}:", procedure.label_name(*label))?;
                if let Some(linkage) = linkage {
                    write!(f, "  ; {} incoming", linkage.incoming[*label])?;
                }
            }
            Stmt::Jmp { target, mode, expr } => {
                let resolved = linkage.and_then(|linkage| linkage.jump_targets.get(&idx));
                let name = match (resolved, target) {
                    (Some(label), _) | (None, JumpTarget::Label(label)) => {
                        procedure.label_name(*label)
                    }
                    (None, JumpTarget::Name(name)) => name.as_str(),
                };
                write!(f, "{mode} {name}")?;
                if let Some(expr) = expr {
                    write!(f, " ")?;
                    printer.write(f, *expr)?;
                }
            }
            Stmt::StackEmpty => write!(f, "stack_empty")?,
        }
        writeln!(f)?;
    }

    Ok(())
}

/// Prints expression trees as s-expressions. A shared node is printed in full at its
/// first position as `(shared#N ...)` and as `@N` everywhere else.
struct ExprPrinter<'a> {
    exprs: &'a Exprs,
    uses: Option<&'a HashMap<ExprIndex, usize>>,
    seen: HashSet<ExprIndex>,
}

impl ExprPrinter<'_> {
    fn write(&mut self, f: &mut fmt::Formatter<'_>, idx: ExprIndex) -> fmt::Result {
        let expr = &self.exprs[idx];
        let head = match &expr.kind {
            ExprKind::NumberLiteral(value) => return write!(f, "{value}"),
            ExprKind::PointerLiteral { label, info } if info.is_empty() => {
                return write!(f, "&{label}");
            }
            ExprKind::PointerLiteral { label, info } => return write!(f, "&{label} {info:?}"),
            ExprKind::CellRef(cell) => return write!(f, "{cell}"),
            ExprKind::JmpValue => return write!(f, "jmp_value"),
            ExprKind::Shared => {
                let id = idx.to_idx();
                if !self.seen.insert(idx) {
                    return write!(f, "@{id}");
                }
                match self.uses.and_then(|uses| uses.get(&idx)) {
                    Some(count) => format!("shared#{id} x{count}"),
                    None => format!("shared#{id}"),
                }
            }
            ExprKind::RuntimeCall { name, is_async } => {
                format!("call{} {name}", if *is_async { ".async" } else { "" })
            }
            ExprKind::ProcCall { callee, is_async } => {
                format!("proccall{} #{}", if *is_async { ".async" } else { "" }, callee.0)
            }
            ExprKind::FieldAccess(field) => format!("field.{field}"),
            ExprKind::Store => "store".to_string(),
            ExprKind::Incr => "incr".to_string(),
            ExprKind::Decr => "decr".to_string(),
            ExprKind::Sequence => "seq".to_string(),
        };

        write!(f, "({head}")?;
        for &arg in &expr.args {
            write!(f, " ")?;
            self.write(f, arg)?;
        }
        write!(f, ")")
    }
}
