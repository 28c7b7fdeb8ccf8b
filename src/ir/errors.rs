use thiserror::Error;

use super::{LabelIndex, StmtIndex};

/// An internal inconsistency in the IR handed over by the translator.
///
/// None of these are user errors, they point at a bug in the emitting code.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IrError {
    #[error("jump at statement {jump} targets undefined label {name:?}")]
    UndefinedLabel { name: String, jump: StmtIndex },
    #[error("statement {stmt} refers to label #{label}, which was never allocated")]
    UnknownLabel { label: LabelIndex, stmt: StmtIndex },
    #[error("label {name:?} placed more than once")]
    DuplicateLabel { name: String, stmt: StmtIndex },
    #[error("cell {cell} can't be released at scope exit, only locals and arguments can")]
    ReleaseOfNonLocal { cell: String },
}
