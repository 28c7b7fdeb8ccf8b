//! Node factories and the reference-counting call protocol.
//!
//! Factories don't check operand types, the emitting side is responsible for that.
//! Each kind has its own factory so the payload and arity always match the kind.

use tracing::debug;

use super::{ExprIndex, ExprKind, Exprs, Literal, ProcId};

impl Exprs {
    pub fn numlit(&mut self, value: impl Into<Literal>) -> ExprIndex {
        self.alloc(ExprKind::NumberLiteral(value.into()), Vec::new())
    }

    pub fn ptrlit(&mut self, label: impl Into<String>, info: impl Into<String>) -> ExprIndex {
        self.alloc(
            ExprKind::PointerLiteral {
                label: label.into(),
                info: info.into(),
            },
            Vec::new(),
        )
    }

    pub fn rtcall(&mut self, name: impl Into<String>, args: Vec<ExprIndex>) -> ExprIndex {
        self.alloc(
            ExprKind::RuntimeCall {
                name: name.into(),
                is_async: false,
            },
            args,
        )
    }

    pub fn proc_call(&mut self, callee: ProcId, is_async: bool, args: Vec<ExprIndex>) -> ExprIndex {
        self.alloc(ExprKind::ProcCall { callee, is_async }, args)
    }

    pub fn field_access(&mut self, of: ExprIndex, field: usize) -> ExprIndex {
        self.alloc(ExprKind::FieldAccess(field), vec![of])
    }

    /// `dst` is expected to be a cell reference.
    pub fn store(&mut self, dst: ExprIndex, src: ExprIndex) -> ExprIndex {
        self.alloc(ExprKind::Store, vec![dst, src])
    }

    pub fn incr(&mut self, of: ExprIndex) -> ExprIndex {
        self.alloc(ExprKind::Incr, vec![of])
    }

    pub fn decr(&mut self, of: ExprIndex) -> ExprIndex {
        self.alloc(ExprKind::Decr, vec![of])
    }

    pub fn sequence(&mut self, items: Vec<ExprIndex>) -> ExprIndex {
        self.alloc(ExprKind::Sequence, items)
    }

    pub fn jmp_value(&mut self) -> ExprIndex {
        self.alloc(ExprKind::JmpValue, Vec::new())
    }

    /// Marks `expr` as computed once and referenced from several positions.
    ///
    /// Literals are returned as is since re-evaluating them is free, and so are
    /// nodes that are already shared.
    pub fn shared(&mut self, expr: ExprIndex) -> ExprIndex {
        let node = &self[expr];
        if node.is_literal() || node.is_shared() {
            return expr;
        }
        self.alloc(ExprKind::Shared, vec![expr])
    }

    /// Runtime call where the arguments whose bit is set in `mask` are only borrowed
    /// by the callee.
    ///
    /// Passing a ref-counted value normally hands one reference to the callee. For a
    /// borrowed argument that reference is still ours after the call, so the argument
    /// is shared and released right after the call:
    ///
    /// ```text
    /// (seq (shared call) (decr arg_i)... (shared call))
    /// ```
    ///
    /// With an empty mask this is a plain call.
    pub fn rtcall_mask(
        &mut self,
        name: impl Into<String>,
        mask: u32,
        is_async: bool,
        args: Vec<ExprIndex>,
    ) -> ExprIndex {
        let name = name.into();
        let mut decrs = Vec::new();

        let args: Vec<ExprIndex> = args
            .into_iter()
            .enumerate()
            .map(|(i, arg)| {
                if i < 32 && mask & (1 << i) != 0 {
                    let arg = self.shared(arg);
                    decrs.push(self.decr(arg));
                    arg
                } else {
                    arg
                }
            })
            .collect();

        let call = self.alloc(ExprKind::RuntimeCall { name, is_async }, args);

        if decrs.is_empty() {
            return call;
        }

        debug!("{} borrowed argument(s) released after call", decrs.len());

        let call = self.shared(call);
        let mut items = Vec::with_capacity(decrs.len() + 2);
        items.push(call);
        items.extend(decrs);
        items.push(call);
        self.sequence(items)
    }
}
