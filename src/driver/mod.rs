use std::path::Path;

use crate::ir::ResolvedProcedure;

pub mod config;
mod errors;
pub mod script;

pub use errors::ScriptError;

/// Reads the procedure script at `path`, builds it and resolves it.
pub fn compile_script(path: &Path) -> Result<ResolvedProcedure, ScriptError> {
    let script = config::ProcedureScript::load(path)?;
    let procedure = script::lower_script(&script)?;
    Ok(procedure.resolve()?)
}
