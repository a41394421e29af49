mod interval;

pub use interval::{LiveInterval, build_intervals};

use std::collections::{BTreeSet, HashMap};

use indexmap::IndexMap;

use crate::ir::{Function, Instr};

/// Liveness facts for a single function. Built once by [`analyze`] and
/// never mutated afterwards; the allocator and lowering only read it.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionLiveness {
    pub func: String,
    /// Ordered formal parameters, as declared.
    pub formals: Vec<String>,
    /// Variable → line of its first definition. First writer wins:
    /// re-definitions never move the interval start.
    defs: IndexMap<String, usize>,
    /// Variable → line of its latest use. `None` is the provisional
    /// "defined but not yet known to be used" marker.
    uses: IndexMap<String, Option<usize>>,
    /// Lines holding a call instruction.
    call_lines: BTreeSet<usize>,
}

impl FunctionLiveness {
    fn new(func: &str, formals: &[String]) -> Self {
        FunctionLiveness {
            func: func.to_string(),
            formals: formals.to_vec(),
            defs: IndexMap::new(),
            uses: IndexMap::new(),
            call_lines: BTreeSet::new(),
        }
    }

    /// Record a definition. Only the first def of a variable counts.
    pub fn record_def(&mut self, var: &str, line: usize) {
        self.defs.entry(var.to_string()).or_insert(line);
    }

    /// Record a use. `None` marks a fresh def with no use yet; it may later
    /// be replaced by a real line, but a real line is never replaced by
    /// `None`. Uses of variables never defined in this function are ignored.
    pub fn record_use(&mut self, var: &str, line: Option<usize>) {
        if !self.defs.contains_key(var) {
            return;
        }
        match self.uses.entry(var.to_string()) {
            indexmap::map::Entry::Vacant(e) => {
                e.insert(line);
            }
            indexmap::map::Entry::Occupied(mut e) => {
                if line.is_some() {
                    e.insert(line);
                }
            }
        }
    }

    /// Mark `line` as holding a call instruction.
    pub fn record_call(&mut self, line: usize) {
        self.call_lines.insert(line);
    }

    pub fn def_line(&self, var: &str) -> Option<usize> {
        self.defs.get(var).copied()
    }

    pub fn use_line(&self, var: &str) -> Option<usize> {
        self.uses.get(var).copied().flatten()
    }

    /// True when some call lies strictly between `start` and `end`.
    pub fn has_call_between(&self, start: usize, end: usize) -> bool {
        if start + 1 >= end {
            return false;
        }
        self.call_lines.range(start + 1..end).next().is_some()
    }

    /// A variable is dead when it has a def but no use at or after it.
    /// Variables never defined here are not considered dead; a use of one
    /// is an input inconsistency that lowering reports.
    pub fn is_dead(&self, var: &str) -> bool {
        let Some(def) = self.def_line(var) else {
            return false;
        };
        match self.use_line(var) {
            None => true,
            Some(use_line) => use_line < def,
        }
    }

    /// Deterministic iteration over all defined variables, in first-def
    /// (insertion) order.
    pub fn defined_vars(&self) -> impl Iterator<Item = (&String, usize)> {
        self.defs.iter().map(|(var, &line)| (var, line))
    }

    /// Extend the use of every variable live across `target_line` down to
    /// `branch_line`. Called for branches whose target precedes them.
    fn extend_across_back_edge(&mut self, target_line: usize, branch_line: usize) {
        let extended: Vec<String> = self
            .defs
            .iter()
            .filter(|&(var, &def)| {
                def < target_line
                    && self
                        .use_line(var)
                        .is_some_and(|use_line| use_line > target_line)
            })
            .map(|(var, _)| var.clone())
            .collect();
        for var in extended {
            self.record_use(&var, Some(branch_line));
        }
    }
}

/// Build the liveness model for `func` in one forward walk. Lines are
/// numbered from 1; formal parameters are seeded as defined on line 0, and
/// the return variable is used one line past the end of the body. Backward
/// branches extend uses across the loop, so the result over-approximates
/// liveness but never under-approximates it.
pub fn analyze(func: &Function) -> FunctionLiveness {
    let mut model = FunctionLiveness::new(&func.name, &func.params);
    let mut labels: HashMap<String, usize> = HashMap::new();

    for formal in &func.params {
        model.record_def(formal, 0);
        model.record_use(formal, None);
    }

    for (idx, instr) in func.body.iter().enumerate() {
        let line = idx + 1;
        match instr {
            Instr::Const(dst, _) | Instr::FuncAddr(dst, _) => {
                model.record_def(dst, line);
                model.record_use(dst, None);
            }
            Instr::BinOp(dst, a, _, b) => {
                model.record_def(dst, line);
                model.record_use(dst, None);
                model.record_use(a, Some(line));
                model.record_use(b, Some(line));
            }
            Instr::Load { dst, base, .. } => {
                model.record_def(dst, line);
                model.record_use(dst, None);
                model.record_use(base, Some(line));
            }
            Instr::Store { base, src, .. } => {
                model.record_use(base, Some(line));
                model.record_use(src, Some(line));
            }
            Instr::Move(dst, src) => {
                model.record_def(dst, line);
                model.record_use(dst, None);
                model.record_use(src, Some(line));
            }
            Instr::Alloc(dst, size) => {
                model.record_def(dst, line);
                model.record_use(dst, None);
                model.record_use(size, Some(line));
            }
            Instr::Print(v) => {
                model.record_use(v, Some(line));
            }
            Instr::Error(_) => {}
            Instr::Label(name) => {
                labels.insert(name.clone(), line);
            }
            Instr::Goto(target) => {
                if let Some(&target_line) = labels.get(target)
                    && target_line < line
                {
                    model.extend_across_back_edge(target_line, line);
                }
            }
            Instr::IfGoto { cond, target } => {
                model.record_use(cond, Some(line));
                if let Some(&target_line) = labels.get(target)
                    && target_line < line
                {
                    model.extend_across_back_edge(target_line, line);
                }
            }
            Instr::Call { dst, callee, args } => {
                model.record_def(dst, line);
                model.record_use(dst, None);
                model.record_use(callee, Some(line));
                for arg in args {
                    model.record_use(arg, Some(line));
                }
                model.record_call(line);
            }
        }
    }

    model.record_use(&func.ret, Some(func.body.len() + 1));
    model
}
