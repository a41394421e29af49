mod frame;

pub use frame::FrameLayout;

use std::fmt;

use crate::ir::Op;
use crate::regalloc::Reg;

/// One lowered instruction. Stack slots are still identified by name; the
/// frame layout maps names to offsets.
#[derive(Debug, PartialEq, Clone)]
pub enum LInstr {
    /// `reg = imm`
    LoadImm(Reg, i64),
    /// `reg = @func`
    LoadAddr(Reg, String),
    /// `dst = a op b`, all registers.
    BinOp(Reg, Reg, Op, Reg),
    /// `dst = [base + offset]`
    Load { dst: Reg, base: Reg, offset: i64 },
    /// `[base + offset] = src`
    Store { base: Reg, offset: i64, src: Reg },
    /// `dst = src`, register to register.
    MoveReg(Reg, Reg),
    /// `reg = slot`: read a stack slot.
    LoadSlot(Reg, String),
    /// `slot = reg`: write a stack slot.
    StoreSlot(String, Reg),
    /// `dst = alloc size`
    Alloc(Reg, Reg),
    /// `print reg`
    Print(Reg),
    /// `error "msg"`
    Error(String),
    /// `name:`
    Label(String),
    /// `goto label`
    Goto(String),
    /// `if0 cond goto label`
    IfGoto { cond: Reg, target: String },
    /// Indirect call through `callee`; arguments beyond the register file
    /// travel in the named stack slots.
    Call {
        dst: Reg,
        callee: Reg,
        stack_args: Vec<String>,
    },
}

impl fmt::Display for LInstr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LInstr::LoadImm(dst, imm) => write!(f, "{dst} = {imm}"),
            LInstr::LoadAddr(dst, func) => write!(f, "{dst} = @{func}"),
            LInstr::BinOp(dst, a, op, b) => write!(f, "{dst} = {a} {op} {b}"),
            LInstr::Load { dst, base, offset } => write!(f, "{dst} = [{base} + {offset}]"),
            LInstr::Store { base, offset, src } => write!(f, "[{base} + {offset}] = {src}"),
            LInstr::MoveReg(dst, src) => write!(f, "{dst} = {src}"),
            LInstr::LoadSlot(dst, slot) => write!(f, "{dst} = {slot}"),
            LInstr::StoreSlot(slot, src) => write!(f, "{slot} = {src}"),
            LInstr::Alloc(dst, size) => write!(f, "{dst} = alloc {size}"),
            LInstr::Print(v) => write!(f, "print {v}"),
            LInstr::Error(msg) => write!(f, "error \"{msg}\""),
            LInstr::Label(name) => write!(f, "{name}:"),
            LInstr::Goto(target) => write!(f, "goto {target}"),
            LInstr::IfGoto { cond, target } => write!(f, "if0 {cond} goto {target}"),
            LInstr::Call {
                dst,
                callee,
                stack_args,
            } => write!(f, "{dst} = call {callee}({})", stack_args.join(" ")),
        }
    }
}

/// A lowered function. Only parameters passed on the stack (beyond the
/// argument registers) remain in the declared parameter list.
#[derive(Debug, PartialEq, Clone)]
pub struct LFunction {
    pub name: String,
    pub stack_params: Vec<String>,
    pub body: Vec<LInstr>,
    /// Slot holding the return value on exit.
    pub ret: String,
    pub frame: FrameLayout,
}

impl fmt::Display for LFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "func {}({})", self.name, self.stack_params.join(" "))?;
        for instr in &self.body {
            writeln!(f, "  {instr}")?;
        }
        writeln!(f, "  return {}", self.ret)
    }
}

#[derive(Debug, PartialEq, Clone, Default)]
pub struct LProgram {
    pub functions: Vec<LFunction>,
}

impl fmt::Display for LProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for func in &self.functions {
            write!(f, "{func}")?;
        }
        Ok(())
    }
}
