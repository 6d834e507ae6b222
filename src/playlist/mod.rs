pub mod assembler;
pub mod insights;
pub mod naming;
pub mod resolver;

pub use assembler::*;
pub use insights::*;
