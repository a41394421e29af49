pub mod linear_scan;

pub use linear_scan::LinearScan;

use std::fmt;

use indexmap::{IndexMap, IndexSet};

use crate::liveness::FunctionLiveness;

/// A physical register, named per the RISC-V calling convention:
/// `t`-registers caller-saved, `s`-registers callee-saved, `a`-registers
/// carrying arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Reg(pub &'static str);

impl Reg {
    pub fn name(self) -> &'static str {
        self.0
    }

    /// Callee-saved registers survive calls; everything else is the
    /// caller's problem.
    pub fn is_callee_saved(self) -> bool {
        self.0.starts_with('s')
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Scratch used by instruction lowering for loads, stores and results.
pub const SCRATCH: Reg = Reg("t0");
/// Second scratch: operand staging and the parallel-copy cycle breaker.
pub const COPY_SCRATCH: Reg = Reg("t1");

/// General-pool caller-saved registers, in allocation order.
pub const CALLER_SAVED: [Reg; 4] = [Reg("t2"), Reg("t3"), Reg("t4"), Reg("t5")];

/// General-pool callee-saved registers, in allocation order.
pub const CALLEE_SAVED: [Reg; 11] = [
    Reg("s1"),
    Reg("s2"),
    Reg("s3"),
    Reg("s4"),
    Reg("s5"),
    Reg("s6"),
    Reg("s7"),
    Reg("s8"),
    Reg("s9"),
    Reg("s10"),
    Reg("s11"),
];

/// Argument registers, reserved for parameter passing. Never drawn from
/// the general pools.
pub const ARG_REGS: [Reg; 6] = [
    Reg("a2"),
    Reg("a3"),
    Reg("a4"),
    Reg("a5"),
    Reg("a6"),
    Reg("a7"),
];

/// Where each variable of one function lives after allocation. Frozen once
/// the scan completes; lowering only reads it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Allocation {
    /// Variable → assigned register. Absent entries are spilled or dead.
    pub table: IndexMap<String, Reg>,
    /// Variables with no register: they live in their named stack slot.
    pub spilled: IndexSet<String>,
}

impl Allocation {
    pub fn register_for(&self, var: &str) -> Option<Reg> {
        self.table.get(var).copied()
    }

    pub fn is_spilled(&self, var: &str) -> bool {
        self.spilled.contains(var)
    }

    /// Whether any variable of this function is assigned `reg`.
    pub fn uses_register(&self, reg: Reg) -> bool {
        self.table.values().any(|&r| r == reg)
    }

    /// True iff some variable assigned to `reg` is live across `line`:
    /// defined at or before it and used strictly after it. Drives the
    /// caller-saved save/restore decision at call sites.
    pub fn is_live_across_call(&self, live: &FunctionLiveness, reg: Reg, line: usize) -> bool {
        self.table.iter().any(|(var, &r)| {
            r == reg
                && live.def_line(var).is_some_and(|def| def <= line)
                && live.use_line(var).is_some_and(|use_line| line < use_line)
        })
    }
}
