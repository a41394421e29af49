use indexmap::IndexMap;

use super::LowerError;
use crate::lir::LInstr;
use crate::regalloc::Reg;

/// Source of one copy: another register, or a stack slot.
#[derive(Debug, PartialEq, Clone)]
pub enum CopySrc {
    Reg(Reg),
    Slot(String),
}

#[derive(Debug, PartialEq, Clone)]
pub struct CopyMove {
    pub dst: Reg,
    pub src: CopySrc,
}

/// Orders `moves` so every source is read before it is clobbered. Acyclic
/// moves are peeled off leaves-first; each remaining cycle of length n is
/// broken through `scratch` in n + 1 moves. Slot loads cannot clobber a
/// register source, so they run last.
pub fn resolve(
    moves: Vec<CopyMove>,
    scratch: Reg,
    func: &str,
) -> Result<Vec<LInstr>, LowerError> {
    let mut graph: IndexMap<Reg, Reg> = IndexMap::new();
    let mut slot_loads = Vec::new();
    for m in moves {
        match m.src {
            CopySrc::Reg(src) if src == m.dst => {}
            CopySrc::Reg(src) => {
                graph.insert(m.dst, src);
            }
            CopySrc::Slot(slot) => slot_loads.push(LInstr::LoadSlot(m.dst, slot)),
        }
    }
    log::debug!("{func}: resolving parallel copy of {} register moves", graph.len());

    let mut out = Vec::new();
    loop {
        let Some(dst) = graph
            .keys()
            .find(|dst| !graph.values().any(|src| src == *dst))
            .copied()
        else {
            break;
        };
        let Some(src) = graph.shift_remove(&dst) else {
            break;
        };
        out.push(LInstr::MoveReg(dst, src));
    }

    // Everything left is cycles.
    while let Some(start) = graph.keys().next().copied() {
        out.push(LInstr::MoveReg(scratch, start));
        let mut cur = start;
        loop {
            let Some(src) = graph.shift_remove(&cur) else {
                return Err(LowerError::UnresolvedCycle {
                    func: func.to_string(),
                    reg: cur,
                });
            };
            if src == start {
                out.push(LInstr::MoveReg(cur, scratch));
                break;
            }
            out.push(LInstr::MoveReg(cur, src));
            cur = src;
        }
    }

    out.extend(slot_loads);
    Ok(out)
}
