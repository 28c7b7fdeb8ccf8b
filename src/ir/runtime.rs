//! Entry points of the runtime support library referenced by the IR.

use super::Cell;

/// Reads a boxed local.
pub const LDLOC: &str = "bitvm::ldloc";
/// Writes a boxed local.
pub const STLOC: &str = "bitvm::stloc";

/// The flavour of a boxed-local helper matching the cell's reference counting.
pub fn boxed_helper(base: &str, cell: &Cell) -> String {
    format!("{base}{}", cell.ref_suffix())
}
