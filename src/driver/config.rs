use std::path::Path;

use serde::Deserialize;

use super::ScriptError;
use crate::ir::JmpMode;

/// A procedure script, a TOML description of one procedure body:
///
/// ```toml
/// [procedure]
/// name = "sum"
///
/// [[cells]]
/// name = "xs"
/// class = "arg"
/// ref_counted = true
///
/// [[body]]
/// op = "expr"
/// expr = { call = { name = "bitvm::length", mask = 1, args = [{ load = "xs" }] } }
///
/// [[body]]
/// op = "clrs"
/// ```
#[derive(Debug, Deserialize)]
pub struct ProcedureScript {
    pub procedure: ProcedureHeader,
    #[serde(default)]
    pub cells: Vec<CellSpec>,
    #[serde(default)]
    pub body: Vec<StmtSpec>,
}

impl ProcedureScript {
    pub fn parse(input: &str) -> Result<Self, ScriptError> {
        Ok(toml::from_str(input)?)
    }

    pub fn load(path: &Path) -> Result<Self, ScriptError> {
        let input = std::fs::read_to_string(path)?;
        Self::parse(&input)
    }
}

/// Meta information about the procedure.
#[derive(Debug, Deserialize, Default)]
pub struct ProcedureHeader {
    pub name: Option<String>,
    #[serde(default)]
    pub id: u32,
    pub parent: Option<u32>,
    /// Whether this is the program entry point.
    #[serde(default)]
    pub root: bool,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CellClass {
    Arg,
    Local,
    Captured,
    Global,
}

/// Declares a cell.
#[derive(Debug, Deserialize)]
pub struct CellSpec {
    pub name: String,
    pub class: CellClass,
    /// The declaration id, defaults to the position in the cell list. Must be unique.
    pub decl: Option<u32>,
    #[serde(default)]
    pub ref_counted: bool,
    #[serde(default)]
    pub captured: bool,
    #[serde(default)]
    pub written: bool,
}

/// A statement, tagged by `op`.
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StmtSpec {
    Expr {
        expr: ExprSpec,
    },
    /// Assignment. `init` marks the first initialization, which bypasses boxing.
    Store {
        cell: String,
        value: ExprSpec,
        #[serde(default)]
        init: bool,
    },
    Label {
        name: String,
    },
    Jmp {
        target: String,
        #[serde(default)]
        mode: JmpMode,
        cond: Option<ExprSpec>,
    },
    StackEmpty,
    /// Release a single cell.
    Clr {
        cell: String,
    },
    /// Release every local and argument.
    Clrs,
}

/// An expression, externally tagged: `{ num = 1 }`, `{ load = "x" }`, ...
#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExprSpec {
    Num(i32),
    Bool(bool),
    Ptr {
        label: String,
        #[serde(default)]
        info: String,
    },
    Load(String),
    Call(CallSpec),
    ProcCall {
        callee: u32,
        #[serde(default)]
        is_async: bool,
        #[serde(default)]
        args: Vec<ExprSpec>,
    },
    Field {
        of: Box<ExprSpec>,
        index: usize,
    },
    Seq(Vec<ExprSpec>),
    JmpValue,
}

/// A runtime call. Arguments whose bit is set in `mask` are only borrowed.
#[derive(Debug, Deserialize)]
pub struct CallSpec {
    pub name: String,
    #[serde(default)]
    pub mask: u32,
    #[serde(default)]
    pub is_async: bool,
    #[serde(default)]
    pub args: Vec<ExprSpec>,
}
