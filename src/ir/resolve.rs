use std::collections::HashMap;

use tracing::{debug, instrument};

use super::{
    ExprIndex, Exprs, IrError, JumpTarget, LabelIndex, Node, Procedure, Stmt, StmtIndex, walk,
};

/// Jump linkage and use counts computed by [`Procedure::resolve`].
#[derive(Debug, Clone, Default)]
pub(crate) struct Linkage {
    /// Statement where each label is placed, by label handle.
    pub label_stmts: Vec<Option<StmtIndex>>,
    /// Number of jumps targeting each label, by label handle.
    pub incoming: Vec<usize>,
    pub jump_targets: HashMap<StmtIndex, LabelIndex>,
    /// Number of positions referencing each shared node.
    pub shared_uses: HashMap<ExprIndex, usize>,
}

/// A procedure whose emission is complete, ready for code generation. Read-only.
#[derive(Debug, Clone)]
pub struct ResolvedProcedure {
    procedure: Procedure,
    pub(crate) linkage: Linkage,
}

impl Procedure {
    /// Links every jump to its label and counts the uses of every shared node.
    ///
    /// Consumes the procedure, so it runs exactly once and nothing can be emitted
    /// afterwards.
    #[instrument(level = "debug", skip_all, fields(name = %self.name(), id = self.id.0))]
    pub fn resolve(self) -> Result<ResolvedProcedure, IrError> {
        let mut label_stmts = vec![None; self.labels.len()];
        let mut by_name = HashMap::new();

        for (idx, stmt) in self.body.iter().enumerate() {
            if let Stmt::Label(label) = stmt {
                let Some(name) = self.labels.get(*label) else {
                    return Err(IrError::UnknownLabel {
                        label: *label,
                        stmt: idx,
                    });
                };
                if label_stmts[*label].replace(idx).is_some() {
                    return Err(IrError::DuplicateLabel {
                        name: name.clone(),
                        stmt: idx,
                    });
                }
                by_name.insert(name.as_str(), *label);
            }
        }

        let mut incoming = vec![0; self.labels.len()];
        let mut jump_targets = HashMap::new();

        for (idx, stmt) in self.body.iter().enumerate() {
            let Stmt::Jmp { target, .. } = stmt else {
                continue;
            };

            let label = match target {
                JumpTarget::Label(label) => {
                    let Some(&placed) = label_stmts.get(*label) else {
                        return Err(IrError::UnknownLabel {
                            label: *label,
                            stmt: idx,
                        });
                    };
                    placed.map(|_| *label)
                }
                JumpTarget::Name(name) => by_name.get(name.as_str()).copied(),
            };

            let Some(label) = label else {
                let name = match target {
                    JumpTarget::Label(label) => self.label_name(*label).to_string(),
                    JumpTarget::Name(name) => name.clone(),
                };
                return Err(IrError::UndefinedLabel { name, jump: idx });
            };

            incoming[label] += 1;
            jump_targets.insert(idx, label);
        }

        let mut shared_uses = HashMap::new();
        walk(&self.exprs, &self.body, |node| {
            if let Node::Expr(idx, expr) = node {
                if expr.is_shared() {
                    *shared_uses.entry(idx).or_insert(0) += 1;
                }
            }
        });

        debug!(
            "resolved {} statements, {} jumps, {} shared nodes",
            self.body.len(),
            jump_targets.len(),
            shared_uses.len()
        );

        Ok(ResolvedProcedure {
            procedure: self,
            linkage: Linkage {
                label_stmts,
                incoming,
                jump_targets,
                shared_uses,
            },
        })
    }
}

impl ResolvedProcedure {
    pub fn procedure(&self) -> &Procedure {
        &self.procedure
    }

    pub fn exprs(&self) -> &Exprs {
        &self.procedure.exprs
    }

    pub fn stmts(&self) -> &[Stmt] {
        &self.procedure.body
    }

    pub fn label_name(&self, label: LabelIndex) -> &str {
        self.procedure.label_name(label)
    }

    /// The label the jump at `stmt` goes to, `None` if `stmt` isn't a jump.
    pub fn jump_target(&self, stmt: StmtIndex) -> Option<LabelIndex> {
        self.linkage.jump_targets.get(&stmt).copied()
    }

    /// The statement where `label` is placed.
    pub fn label_stmt(&self, label: LabelIndex) -> Option<StmtIndex> {
        self.linkage.label_stmts.get(label).copied().flatten()
    }

    pub fn incoming_jumps(&self, label: LabelIndex) -> usize {
        self.linkage.incoming.get(label).copied().unwrap_or(0)
    }

    /// How many positions reference the shared node `expr`. Zero for other nodes.
    pub fn total_uses(&self, expr: ExprIndex) -> usize {
        self.linkage.shared_uses.get(&expr).copied().unwrap_or(0)
    }

    /// A fresh tracker for the code generator, with no use consumed yet.
    pub fn use_tracker(&self) -> SharedUses {
        SharedUses {
            total: self.linkage.shared_uses.clone(),
            current: HashMap::new(),
        }
    }
}

/// Consumption state of shared nodes while generating code.
///
/// The first use of a shared node computes it, later uses re-read the materialized
/// value, the last one may drop it.
#[derive(Debug, Clone, Default)]
pub struct SharedUses {
    total: HashMap<ExprIndex, usize>,
    current: HashMap<ExprIndex, usize>,
}

impl SharedUses {
    pub fn total(&self, expr: ExprIndex) -> usize {
        self.total.get(&expr).copied().unwrap_or(0)
    }

    pub fn current(&self, expr: ExprIndex) -> usize {
        self.current.get(&expr).copied().unwrap_or(0)
    }

    /// Records one use of `expr` and returns how many uses have been recorded so far.
    pub fn record_use(&mut self, expr: ExprIndex) -> usize {
        let current = self.current.entry(expr).or_insert(0);
        *current += 1;
        *current
    }

    pub fn is_last_use(&self, expr: ExprIndex) -> bool {
        let total = self.total(expr);
        total != 0 && self.current(expr) == total
    }
}
