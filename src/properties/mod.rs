//! Logical, scalar and physical properties of expressions and the building blocks they are made of.

pub mod cardinality;
pub mod colset;
pub mod constraints;
pub mod fd;
pub mod logical;
pub mod ordering;
pub mod physical;
pub mod scalar;

pub use cardinality::Cardinality;
pub use colset::ColSet;
pub use fd::FuncDepSet;
pub use ordering::{OrderingChoice, OrderingColumnChoice};
