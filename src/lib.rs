pub mod driver;
pub mod ir;
