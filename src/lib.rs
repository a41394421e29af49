//! Register allocation and lowering for a linear three-address IR.

pub mod cli;
pub mod ir;
pub mod lir;
pub mod liveness;
pub mod lower;
pub mod regalloc;
