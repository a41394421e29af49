pub mod parser;

use std::fmt;

/// Binary operators. `LessThan` produces 0 or 1 like the arithmetic ops
/// produce numbers, so it shares the three-address shape.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Op {
    Add,
    Sub,
    Mul,
    LessThan,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Add => write!(f, "+"),
            Op::Sub => write!(f, "-"),
            Op::Mul => write!(f, "*"),
            Op::LessThan => write!(f, "<"),
        }
    }
}

/// One three-address instruction. All operands are variable names except
/// for immediates, function names, labels and error messages.
#[derive(Debug, PartialEq, Clone)]
pub enum Instr {
    /// `dst = imm`
    Const(String, i64),
    /// `dst = @func`: take the address of a function.
    FuncAddr(String, String),
    /// `dst = a op b`
    BinOp(String, String, Op, String),
    /// `dst = [base + offset]`
    Load {
        dst: String,
        base: String,
        offset: i64,
    },
    /// `[base + offset] = src`
    Store {
        base: String,
        offset: i64,
        src: String,
    },
    /// `dst = src`
    Move(String, String),
    /// `dst = alloc size`: heap-allocate `size` bytes.
    Alloc(String, String),
    /// `print v`
    Print(String),
    /// `error "msg"`: abort with a message.
    Error(String),
    /// `name:`
    Label(String),
    /// `goto label`
    Goto(String),
    /// `if0 cond goto label`: branch when `cond` is zero.
    IfGoto { cond: String, target: String },
    /// `dst = call callee(args...)`: indirect call through the function
    /// address held in `callee`.
    Call {
        dst: String,
        callee: String,
        args: Vec<String>,
    },
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::Const(dst, imm) => write!(f, "{dst} = {imm}"),
            Instr::FuncAddr(dst, func) => write!(f, "{dst} = @{func}"),
            Instr::BinOp(dst, a, op, b) => write!(f, "{dst} = {a} {op} {b}"),
            Instr::Load { dst, base, offset } => write!(f, "{dst} = [{base} + {offset}]"),
            Instr::Store { base, offset, src } => write!(f, "[{base} + {offset}] = {src}"),
            Instr::Move(dst, src) => write!(f, "{dst} = {src}"),
            Instr::Alloc(dst, size) => write!(f, "{dst} = alloc {size}"),
            Instr::Print(v) => write!(f, "print {v}"),
            Instr::Error(msg) => write!(f, "error \"{msg}\""),
            Instr::Label(name) => write!(f, "{name}:"),
            Instr::Goto(target) => write!(f, "goto {target}"),
            Instr::IfGoto { cond, target } => write!(f, "if0 {cond} goto {target}"),
            Instr::Call { dst, callee, args } => {
                write!(f, "{dst} = call {callee}({})", args.join(" "))
            }
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Function {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Instr>,
    /// Variable whose value the function returns.
    pub ret: String,
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "func {}({})", self.name, self.params.join(" "))?;
        for instr in &self.body {
            writeln!(f, "  {instr}")?;
        }
        writeln!(f, "  return {}", self.ret)
    }
}

#[derive(Debug, PartialEq, Clone, Default)]
pub struct Program {
    pub functions: Vec<Function>,
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for func in &self.functions {
            write!(f, "{func}")?;
        }
        Ok(())
    }
}
