use std::collections::VecDeque;

use crate::liveness::{FunctionLiveness, LiveInterval, build_intervals};

use super::{ARG_REGS, Allocation, CALLEE_SAVED, CALLER_SAVED, Reg};

/// The two general register pools, filled up to a configured budget.
/// Expired registers return to the front of their class pool and are
/// handed out from the front again, so the most recently freed register
/// is reused first.
#[derive(Debug)]
struct RegisterPools {
    caller: VecDeque<Reg>,
    callee: VecDeque<Reg>,
}

impl RegisterPools {
    fn with_budget(budget: usize) -> Self {
        let caller: VecDeque<Reg> = CALLER_SAVED.iter().copied().take(budget).collect();
        let callee: VecDeque<Reg> = CALLEE_SAVED
            .iter()
            .copied()
            .take(budget.saturating_sub(caller.len()))
            .collect();
        RegisterPools { caller, callee }
    }

    fn take(&mut self, prefer_callee: bool) -> Option<Reg> {
        if prefer_callee {
            self.callee.pop_front().or_else(|| self.caller.pop_front())
        } else {
            self.caller.pop_front().or_else(|| self.callee.pop_front())
        }
    }

    fn release(&mut self, reg: Reg) {
        if reg.is_callee_saved() {
            self.callee.push_front(reg);
        } else {
            self.caller.push_front(reg);
        }
    }
}

/// The allocator itself. Stateless between functions: every call to
/// [`LinearScan::allocate`] gets fresh pools and a fresh active list.
#[derive(Debug, Clone, Copy)]
pub struct LinearScan {
    budget: usize,
}

impl LinearScan {
    /// An allocator limited to `budget` general registers in total.
    pub fn new(budget: usize) -> Self {
        LinearScan { budget }
    }

    /// An allocator over the full register file.
    pub fn full() -> Self {
        LinearScan::new(CALLER_SAVED.len() + CALLEE_SAVED.len())
    }

    /// Allocate registers for one function: a single sweep over the
    /// intervals in start order, expiring, assigning from the preferred
    /// pool, or spilling. Deterministic: identical inputs yield identical
    /// tables and spill sets.
    pub fn allocate(&self, live: &FunctionLiveness) -> Allocation {
        let mut alloc = Allocation::default();

        // Formals in the first argument-register slots keep their argument
        // register for their whole lifetime.
        for (formal, &reg) in live.formals.iter().zip(ARG_REGS.iter()) {
            alloc.table.insert(formal.clone(), reg);
        }

        let intervals = build_intervals(live, ARG_REGS.len());
        let mut pools = RegisterPools::with_budget(self.budget);
        let mut active: Vec<LiveInterval> = Vec::new();

        for interval in intervals {
            expire_old_intervals(&mut active, &mut pools, &alloc, interval.start);

            match pools.take(interval.spans_call) {
                Some(reg) => {
                    log::debug!(
                        "{}: `{}` [{}, {}] -> {}",
                        live.func,
                        interval.var,
                        interval.start,
                        interval.end,
                        reg
                    );
                    alloc.table.insert(interval.var.clone(), reg);
                    active.push(interval);
                    active.sort_by_key(|i| i.end);
                }
                None => spill_at_interval(interval, &mut active, &mut alloc, &live.func),
            }
        }

        alloc
    }
}

/// Return the registers of every active interval ending before `start` to
/// their class pools. The active list is sorted by end, so we only peel
/// from the front.
fn expire_old_intervals(
    active: &mut Vec<LiveInterval>,
    pools: &mut RegisterPools,
    alloc: &Allocation,
    start: usize,
) {
    while active.first().is_some_and(|i| i.end < start) {
        let expired = active.remove(0);
        if let Some(reg) = alloc.register_for(&expired.var) {
            pools.release(reg);
        }
    }
}

/// Both pools are empty: either evict the active interval with the latest
/// end (when it ends strictly later than the incoming one) or spill the
/// incoming interval. Ties and non-improving candidates always spill the
/// incoming interval.
fn spill_at_interval(
    interval: LiveInterval,
    active: &mut Vec<LiveInterval>,
    alloc: &mut Allocation,
    func: &str,
) {
    let last_end = match active.last() {
        Some(last) => last.end,
        None => {
            // Nothing to evict: the pool budget is zero. Not an error, but
            // worth seeing when debugging allocation quality.
            log::warn!(
                "{func}: no spill candidate for `{}`, spilled outright",
                interval.var
            );
            alloc.spilled.insert(interval.var);
            return;
        }
    };

    if last_end > interval.end {
        let Some(evicted) = active.pop() else {
            return;
        };
        log::debug!(
            "{func}: evicting `{}` (ends {}) in favor of `{}` (ends {})",
            evicted.var,
            evicted.end,
            interval.var,
            interval.end
        );
        if let Some(reg) = alloc.table.shift_remove(&evicted.var) {
            alloc.table.insert(interval.var.clone(), reg);
        }
        alloc.spilled.insert(evicted.var);
        active.push(interval);
        active.sort_by_key(|i| i.end);
    } else {
        log::debug!("{func}: spilling incoming `{}`", interval.var);
        alloc.spilled.insert(interval.var);
    }
}
