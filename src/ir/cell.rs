use std::{fmt, sync::Arc};

use educe::Educe;

use super::{ExprIndex, ExprKind, Exprs, runtime};

/// Opaque handle to the front-end declaration a cell was created for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(pub u32);

/// What the translator found out about a variable's uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct VariableInfo {
    /// Referenced from a nested closure.
    pub captured: bool,
    /// Assigned after its initialization.
    pub written: bool,
}

/// Where a cell lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageClass {
    Argument,
    Local,
    /// Lives in the closure environment of the procedure reading it.
    Captured,
    Global,
}

/// Everything the translator supplies when declaring a cell.
#[derive(Debug, Clone, Default)]
pub struct CellDecl {
    pub decl: DeclId,
    pub name: Option<String>,
    pub info: VariableInfo,
    pub ref_counted: bool,
}

impl CellDecl {
    pub fn new(decl: DeclId, name: impl Into<String>) -> Self {
        Self {
            decl,
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn with_info(mut self, info: VariableInfo) -> Self {
        self.info = info;
        self
    }

    pub fn with_ref_counted(mut self, ref_counted: bool) -> Self {
        self.ref_counted = ref_counted;
        self
    }
}

/// A storage slot for one variable.
///
/// The storage class and reference-counting flag are fixed at creation, cells are
/// shared behind an [`Arc`] between the procedure declaring them, the expressions
/// referencing them and the closures capturing them.
#[derive(Debug, Clone, Educe)]
#[educe(PartialEq, Eq, Hash)]
pub struct Cell {
    /// Position within its storage class (local slot, argument number, ...).
    pub index: usize,
    pub decl: DeclId,
    #[educe(PartialEq(ignore), Hash(ignore))]
    pub name: Option<String>,
    pub info: VariableInfo,
    pub class: StorageClass,
    /// The value held is managed by Incr/Decr.
    pub ref_counted: bool,
}

impl Cell {
    pub fn new(index: usize, class: StorageClass, decl: CellDecl) -> Self {
        Self {
            index,
            decl: decl.decl,
            name: decl.name,
            info: decl.info,
            class,
            ref_counted: decl.ref_counted,
        }
    }

    /// Globals are not owned by any procedure.
    pub fn global(index: usize, decl: CellDecl) -> Arc<Self> {
        Arc::new(Self::new(index, StorageClass::Global, decl))
    }

    pub fn is_argument(&self) -> bool {
        self.class == StorageClass::Argument
    }

    pub fn is_captured(&self) -> bool {
        self.class == StorageClass::Captured
    }

    pub fn is_local(&self) -> bool {
        self.class == StorageClass::Local
    }

    pub fn is_global(&self) -> bool {
        self.class == StorageClass::Global
    }

    pub fn is_ref(&self) -> bool {
        self.ref_counted
    }

    /// A local that is both captured and reassigned has to live in a heap box shared
    /// by its frame and the closure, otherwise one of them would see a stale copy.
    pub fn is_boxed_local(&self) -> bool {
        self.is_local() && self.info.captured && self.info.written
    }

    /// Suffix selecting the ref-counted flavour of a runtime helper.
    pub fn ref_suffix(&self) -> &'static str {
        if self.is_ref() { "Ref" } else { "" }
    }

    /// The raw slot, without unboxing or retaining.
    pub fn load_core(self: &Arc<Self>, exprs: &mut Exprs) -> ExprIndex {
        exprs.alloc(ExprKind::CellRef(Arc::clone(self)), Vec::new())
    }

    /// Reads the cell's value. For a ref-counted cell the caller receives one
    /// reference of its own, which it must release with a matching `Decr`.
    pub fn load(self: &Arc<Self>, exprs: &mut Exprs) -> ExprIndex {
        let mut expr = self.load_core(exprs);

        if self.is_boxed_local() {
            expr = exprs.rtcall(runtime::boxed_helper(runtime::LDLOC, self), vec![expr]);
        }

        if self.is_ref() {
            expr = exprs.incr(expr);
        }

        expr
    }

    /// Writes the raw slot, ignoring any box. Only valid for the first initialization.
    pub fn store_direct(self: &Arc<Self>, exprs: &mut Exprs, src: ExprIndex) -> ExprIndex {
        let dst = self.load_core(exprs);
        exprs.store(dst, src)
    }

    /// Assignment. Boxed locals are written through their box.
    pub fn store_by_ref(self: &Arc<Self>, exprs: &mut Exprs, src: ExprIndex) -> ExprIndex {
        if self.is_boxed_local() {
            let dst = self.load_core(exprs);
            exprs.rtcall(runtime::boxed_helper(runtime::STLOC, self), vec![dst, src])
        } else {
            self.store_direct(exprs, src)
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut name = self.name.clone().unwrap_or_else(|| "?".to_string());
        if self.is_argument() {
            name = format!("ARG {name}");
        }
        if self.is_ref() {
            name = format!("REF {name}");
        }
        write!(f, "[{name}]")
    }
}
