use indexmap::IndexSet;

use super::LInstr;

/// Stack frame layout for one lowered function. Locals are every slot the
/// body writes, in first-write order, so offsets are stable across runs.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct FrameLayout {
    pub param_count: usize,
    locals: IndexSet<String>,
}

impl FrameLayout {
    pub fn new(param_count: usize, body: &[LInstr]) -> Self {
        let mut locals = IndexSet::new();
        for instr in body {
            match instr {
                LInstr::StoreSlot(slot, _) => {
                    locals.insert(slot.clone());
                }
                LInstr::Call { stack_args, .. } => {
                    for slot in stack_args {
                        locals.insert(slot.clone());
                    }
                }
                _ => {}
            }
        }
        Self {
            param_count,
            locals,
        }
    }

    pub fn locals(&self) -> impl Iterator<Item = &str> {
        self.locals.iter().map(String::as_str)
    }

    /// Bytes reserved on entry: saved ra and fp plus one word per local.
    pub fn frame_size(&self) -> i64 {
        8 + 4 * self.locals.len() as i64
    }

    /// Offset of a local slot from the stack pointer. ra sits at
    /// `frame_size - 4` and fp at `frame_size - 8`; locals follow below.
    pub fn local_offset(&self, slot: &str) -> Option<i64> {
        let idx = self.locals.get_index_of(slot)? as i64;
        Some(self.frame_size() - 12 - 4 * idx)
    }

    /// Offset of the i-th stack-passed parameter, in the caller's frame.
    pub fn param_offset(&self, i: usize) -> i64 {
        self.frame_size() + 4 * i as i64
    }
}
