pub mod parallel_copy;

use thiserror::Error;

use crate::ir::{Function, Instr, Program};
use crate::lir::{FrameLayout, LFunction, LInstr, LProgram};
use crate::liveness::{self, FunctionLiveness};
use crate::lower::parallel_copy::{CopyMove, CopySrc};
use crate::regalloc::{ARG_REGS, Allocation, CALLEE_SAVED, CALLER_SAVED, COPY_SCRATCH, LinearScan, Reg, SCRATCH};

#[derive(Debug, Error, PartialEq)]
pub enum LowerError {
    /// A variable is read or written at a site where it has neither a
    /// register nor a stack slot.
    #[error("{func}: line {line}: variable `{var}` has no register or stack slot")]
    UnboundVariable {
        func: String,
        var: String,
        line: usize,
    },
    /// The parallel-copy walk hit a register with no pending move, which
    /// means the copy graph was malformed.
    #[error("{func}: parallel copy cycle broke down at {reg}")]
    UnresolvedCycle { func: String, reg: Reg },
}

/// Lower every function in `prog` with `budget` general-purpose registers.
pub fn lower_program(prog: &Program, budget: usize) -> Result<LProgram, LowerError> {
    let allocator = LinearScan::new(budget);
    let mut functions = Vec::new();
    for func in &prog.functions {
        functions.push(lower_function(func, &allocator)?);
    }
    Ok(LProgram { functions })
}

pub fn lower_function(func: &Function, allocator: &LinearScan) -> Result<LFunction, LowerError> {
    let live = liveness::analyze(func);
    let alloc = allocator.allocate(&live);
    let lowered = Lowerer {
        func,
        live,
        alloc,
        out: Vec::new(),
    }
    .run()?;
    log::debug!(
        "{}: frame is {} bytes ({} locals)",
        lowered.name,
        lowered.frame.frame_size(),
        lowered.frame.locals().count()
    );
    Ok(lowered)
}

fn save_slot(reg: Reg) -> String {
    format!("save_{reg}")
}

fn arg_slot(i: usize) -> String {
    format!("arg_{i}")
}

struct Lowerer<'a> {
    func: &'a Function,
    live: FunctionLiveness,
    alloc: Allocation,
    out: Vec<LInstr>,
}

impl Lowerer<'_> {
    fn run(mut self) -> Result<LFunction, LowerError> {
        let stack_params: Vec<String> = self
            .func
            .params
            .iter()
            .skip(ARG_REGS.len())
            .cloned()
            .collect();

        // Callee-saved registers the allocator handed out must survive us.
        let saved: Vec<Reg> = CALLEE_SAVED
            .into_iter()
            .filter(|&r| self.alloc.uses_register(r))
            .collect();
        for &reg in &saved {
            self.out.push(LInstr::StoreSlot(save_slot(reg), reg));
        }

        // Stack-passed formals that won a register are loaded once up front.
        for param in &stack_params {
            if let Some(reg) = self.alloc.register_for(param) {
                self.out.push(LInstr::LoadSlot(reg, param.clone()));
            }
        }

        for (idx, instr) in self.func.body.iter().enumerate() {
            self.lower_instr(instr, idx + 1)?;
        }

        // Park the return value in its slot, then restore what we borrowed.
        let ret_line = self.func.body.len() + 1;
        if let Some(reg) = self.alloc.register_for(&self.func.ret) {
            self.out
                .push(LInstr::StoreSlot(self.func.ret.clone(), reg));
        } else if !self.slot_resident(&self.func.ret) {
            return Err(self.unbound(&self.func.ret, ret_line));
        }
        for &reg in &saved {
            self.out.push(LInstr::LoadSlot(reg, save_slot(reg)));
        }

        let frame = FrameLayout::new(stack_params.len(), &self.out);
        Ok(LFunction {
            name: self.func.name.clone(),
            stack_params,
            body: self.out,
            ret: self.func.ret.clone(),
            frame,
        })
    }

    fn lower_instr(&mut self, instr: &Instr, line: usize) -> Result<(), LowerError> {
        match instr {
            Instr::Const(dst, imm) => {
                if self.live.is_dead(dst) {
                    return Ok(());
                }
                let imm = *imm;
                self.write(dst, line, |target| LInstr::LoadImm(target, imm))
            }
            Instr::FuncAddr(dst, callee) => {
                if self.live.is_dead(dst) {
                    return Ok(());
                }
                let callee = callee.clone();
                self.write(dst, line, |target| LInstr::LoadAddr(target, callee))
            }
            Instr::BinOp(dst, a, op, b) => {
                if self.live.is_dead(dst) {
                    return Ok(());
                }
                let ra = self.read(a, SCRATCH, line)?;
                let rb = self.read(b, COPY_SCRATCH, line)?;
                let op = *op;
                self.write(dst, line, |target| LInstr::BinOp(target, ra, op, rb))
            }
            Instr::Load { dst, base, offset } => {
                if self.live.is_dead(dst) {
                    return Ok(());
                }
                let base = self.read(base, SCRATCH, line)?;
                let offset = *offset;
                self.write(dst, line, |target| LInstr::Load {
                    dst: target,
                    base,
                    offset,
                })
            }
            Instr::Store { base, offset, src } => {
                let base = self.read(base, SCRATCH, line)?;
                let src = self.read(src, COPY_SCRATCH, line)?;
                self.out.push(LInstr::Store {
                    base,
                    offset: *offset,
                    src,
                });
                Ok(())
            }
            Instr::Move(dst, src) => {
                if self.live.is_dead(dst) {
                    return Ok(());
                }
                let src = self.read(src, SCRATCH, line)?;
                if let Some(reg) = self.alloc.register_for(dst) {
                    if reg != src {
                        self.out.push(LInstr::MoveReg(reg, src));
                    }
                    Ok(())
                } else if self.slot_resident(dst) {
                    self.out.push(LInstr::StoreSlot(dst.clone(), src));
                    Ok(())
                } else {
                    Err(self.unbound(dst, line))
                }
            }
            Instr::Alloc(dst, size) => {
                if self.live.is_dead(dst) {
                    return Ok(());
                }
                let size = self.read(size, SCRATCH, line)?;
                self.write(dst, line, |target| LInstr::Alloc(target, size))
            }
            Instr::Print(v) => {
                let v = self.read(v, SCRATCH, line)?;
                self.out.push(LInstr::Print(v));
                Ok(())
            }
            Instr::Error(msg) => {
                self.out.push(LInstr::Error(msg.clone()));
                Ok(())
            }
            Instr::Label(name) => {
                self.out.push(LInstr::Label(name.clone()));
                Ok(())
            }
            Instr::Goto(target) => {
                self.out.push(LInstr::Goto(target.clone()));
                Ok(())
            }
            Instr::IfGoto { cond, target } => {
                let cond = self.read(cond, SCRATCH, line)?;
                self.out.push(LInstr::IfGoto {
                    cond,
                    target: target.clone(),
                });
                Ok(())
            }
            Instr::Call { dst, callee, args } => self.lower_call(dst, callee, args, line),
        }
    }

    /// Full call sequence: save what must survive, move the callee address
    /// out of harm's way, stage stack arguments, shuffle register arguments
    /// as one parallel copy, call, restore, and land the result.
    fn lower_call(
        &mut self,
        dst: &str,
        callee: &str,
        args: &[String],
        line: usize,
    ) -> Result<(), LowerError> {
        let saved: Vec<Reg> = CALLER_SAVED
            .into_iter()
            .chain(ARG_REGS)
            .filter(|&r| self.alloc.is_live_across_call(&self.live, r, line))
            .collect();
        for &reg in &saved {
            self.out.push(LInstr::StoreSlot(save_slot(reg), reg));
        }

        // The callee address goes to t0 before the argument copy runs, since
        // the copy may overwrite the register it currently sits in.
        match self.alloc.register_for(callee) {
            Some(reg) => self.out.push(LInstr::MoveReg(SCRATCH, reg)),
            None if self.slot_resident(callee) => {
                self.out.push(LInstr::LoadSlot(SCRATCH, callee.to_string()));
            }
            None => return Err(self.unbound(callee, line)),
        }

        // Stack arguments are staged while their sources are still intact.
        let mut stack_args = Vec::new();
        for (i, arg) in args.iter().enumerate().skip(ARG_REGS.len()) {
            let slot = arg_slot(i);
            let src = self.read(arg, COPY_SCRATCH, line)?;
            self.out.push(LInstr::StoreSlot(slot.clone(), src));
            stack_args.push(slot);
        }

        let mut moves = Vec::new();
        for (arg, &reg) in args.iter().zip(ARG_REGS.iter()) {
            let src = match self.alloc.register_for(arg) {
                Some(src) => CopySrc::Reg(src),
                None if self.slot_resident(arg) => CopySrc::Slot(arg.clone()),
                None => return Err(self.unbound(arg, line)),
            };
            moves.push(CopyMove { dst: reg, src });
        }
        self.out
            .extend(parallel_copy::resolve(moves, COPY_SCRATCH, &self.func.name)?);

        self.out.push(LInstr::Call {
            dst: SCRATCH,
            callee: SCRATCH,
            stack_args,
        });

        for &reg in &saved {
            self.out.push(LInstr::LoadSlot(reg, save_slot(reg)));
        }

        if !self.live.is_dead(dst) {
            match self.alloc.register_for(dst) {
                Some(reg) => self.out.push(LInstr::MoveReg(reg, SCRATCH)),
                None if self.slot_resident(dst) => {
                    self.out.push(LInstr::StoreSlot(dst.to_string(), SCRATCH));
                }
                None => return Err(self.unbound(dst, line)),
            }
        }
        Ok(())
    }

    /// Bring `var` into a register for reading, using `scratch` when it
    /// lives in a stack slot.
    fn read(&mut self, var: &str, scratch: Reg, line: usize) -> Result<Reg, LowerError> {
        if let Some(reg) = self.alloc.register_for(var) {
            return Ok(reg);
        }
        if self.slot_resident(var) {
            self.out.push(LInstr::LoadSlot(scratch, var.to_string()));
            return Ok(scratch);
        }
        Err(self.unbound(var, line))
    }

    /// Compute a value with `emit` into `var`'s register, or into t0
    /// followed by a store when `var` lives in a slot.
    fn write(
        &mut self,
        var: &str,
        line: usize,
        emit: impl FnOnce(Reg) -> LInstr,
    ) -> Result<(), LowerError> {
        if let Some(reg) = self.alloc.register_for(var) {
            self.out.push(emit(reg));
        } else if self.slot_resident(var) {
            self.out.push(emit(SCRATCH));
            self.out.push(LInstr::StoreSlot(var.to_string(), SCRATCH));
        } else {
            return Err(self.unbound(var, line));
        }
        Ok(())
    }

    /// Spilled variables and stack-passed formals live in slots named after
    /// themselves.
    fn slot_resident(&self, var: &str) -> bool {
        self.alloc.is_spilled(var)
            || self
                .func
                .params
                .iter()
                .position(|p| p == var)
                .is_some_and(|i| i >= ARG_REGS.len())
    }

    fn unbound(&self, var: &str, line: usize) -> LowerError {
        LowerError::UnboundVariable {
            func: self.func.name.clone(),
            var: var.to_string(),
            line,
        }
    }
}
