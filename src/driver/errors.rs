use thiserror::Error;

use crate::ir::IrError;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("failed to read script: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid script: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("cell {name:?} is not declared")]
    UnknownCell { name: String },
    #[error("cell {name:?} is declared twice")]
    DuplicateCell { name: String },
    #[error("cell {name:?} reuses declaration id {decl}")]
    DuplicateDecl { decl: u32, name: String },
    #[error(transparent)]
    Ir(#[from] IrError),
}
